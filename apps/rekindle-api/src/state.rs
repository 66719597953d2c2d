use std::sync::Arc;

use rekindle_service::RekindleService;

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<RekindleService>,
	/// Bearer token required on `/v1/*`. `None` leaves the routes open.
	pub trigger_token: Option<Arc<str>>,
}
impl AppState {
	pub fn new(config: rekindle_config::Config) -> color_eyre::Result<Self> {
		let service = RekindleService::new(config)?;

		Ok(Self::from_service(service))
	}

	pub fn from_service(service: RekindleService) -> Self {
		let trigger_token = service.cfg.security.trigger_token.as_deref().map(Arc::from);

		Self { service: Arc::new(service), trigger_token }
	}
}
