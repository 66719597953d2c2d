pub mod cursor;
pub mod dispatch;
pub mod status;
pub mod sweep;

mod error;

pub use cursor::{BatchCursor, BatchProgress, BatchRequest};
pub use dispatch::{DispatchReport, SendReport};
pub use error::{Error, Result};
pub use status::{ConversationStatus, OverviewReport, PreviewReport, PreviewRequest, StatusReport};

use std::{future::Future, pin::Pin, sync::Arc};

use time::OffsetDateTime;
use tokio::sync::Mutex;

use rekindle_config::{Config, Email};
use rekindle_domain::{CharacterProfile, ChatEvent, OperatorPolicy, Thresholds, UserAccount};
use rekindle_providers::email::{self, OutboundEmail};
use rekindle_storage::{StoreClient, UserPage};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Read and append access to the hosted table store.
pub trait MessageStore
where
	Self: Send + Sync,
{
	fn query_users<'a>(
		&'a self,
		offset: u64,
		limit: u32,
	) -> BoxFuture<'a, rekindle_storage::Result<UserPage>>;

	fn query_chat_events<'a>(
		&'a self,
		since: OffsetDateTime,
		user_refs: Option<&'a [String]>,
	) -> BoxFuture<'a, rekindle_storage::Result<Vec<ChatEvent>>>;

	fn resolve_user<'a>(
		&'a self,
		user_ref: &'a str,
	) -> BoxFuture<'a, rekindle_storage::Result<Option<UserAccount>>>;

	fn resolve_character<'a>(
		&'a self,
		character_ref: &'a str,
	) -> BoxFuture<'a, rekindle_storage::Result<Option<CharacterProfile>>>;

	fn record_check_in<'a>(
		&'a self,
		user_ref: &'a str,
		character_ref: &'a str,
		timestamp: OffsetDateTime,
	) -> BoxFuture<'a, rekindle_storage::Result<()>>;
}

pub trait Mailer
where
	Self: Send + Sync,
{
	fn send<'a>(
		&'a self,
		cfg: &'a Email,
		email: &'a OutboundEmail<'a>,
	) -> BoxFuture<'a, rekindle_providers::Result<Option<String>>>;
}

pub struct RekindleService {
	pub cfg: Config,
	pub store: Arc<dyn MessageStore>,
	pub mailer: Arc<dyn Mailer>,
	thresholds: Thresholds,
	policy: OperatorPolicy,
	sweep_lock: Mutex<()>,
}
impl RekindleService {
	pub fn new(cfg: Config) -> Result<Self> {
		let store = StoreClient::new(&cfg.store)?;

		Ok(Self::with_collaborators(cfg, Arc::new(store), Arc::new(DefaultMailer)))
	}

	pub fn with_collaborators(
		cfg: Config,
		store: Arc<dyn MessageStore>,
		mailer: Arc<dyn Mailer>,
	) -> Self {
		let thresholds = Thresholds::from(&cfg.detector);
		let policy = OperatorPolicy::from(&cfg.eligibility);

		Self { cfg, store, mailer, thresholds, policy, sweep_lock: Mutex::new(()) }
	}

	pub fn thresholds(&self) -> &Thresholds {
		&self.thresholds
	}

	pub fn policy(&self) -> &OperatorPolicy {
		&self.policy
	}

	pub(crate) fn lookback_start(&self, now: OffsetDateTime) -> OffsetDateTime {
		now - time::Duration::hours(i64::from(self.cfg.detector.lookback_hours))
	}
}

struct DefaultMailer;

impl Mailer for DefaultMailer {
	fn send<'a>(
		&'a self,
		cfg: &'a Email,
		email: &'a OutboundEmail<'a>,
	) -> BoxFuture<'a, rekindle_providers::Result<Option<String>>> {
		Box::pin(email::send_email(cfg, email))
	}
}

impl MessageStore for StoreClient {
	fn query_users<'a>(
		&'a self,
		offset: u64,
		limit: u32,
	) -> BoxFuture<'a, rekindle_storage::Result<UserPage>> {
		Box::pin(StoreClient::query_users(self, offset, limit))
	}

	fn query_chat_events<'a>(
		&'a self,
		since: OffsetDateTime,
		user_refs: Option<&'a [String]>,
	) -> BoxFuture<'a, rekindle_storage::Result<Vec<ChatEvent>>> {
		Box::pin(StoreClient::query_chat_events(self, since, user_refs))
	}

	fn resolve_user<'a>(
		&'a self,
		user_ref: &'a str,
	) -> BoxFuture<'a, rekindle_storage::Result<Option<UserAccount>>> {
		Box::pin(StoreClient::resolve_user(self, user_ref))
	}

	fn resolve_character<'a>(
		&'a self,
		character_ref: &'a str,
	) -> BoxFuture<'a, rekindle_storage::Result<Option<CharacterProfile>>> {
		Box::pin(StoreClient::resolve_character(self, character_ref))
	}

	fn record_check_in<'a>(
		&'a self,
		user_ref: &'a str,
		character_ref: &'a str,
		timestamp: OffsetDateTime,
	) -> BoxFuture<'a, rekindle_storage::Result<()>> {
		Box::pin(StoreClient::record_check_in(self, user_ref, character_ref, timestamp))
	}
}
