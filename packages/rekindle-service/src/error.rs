pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("Upstream unavailable during {stage}: {message}")]
	UpstreamUnavailable { stage: &'static str, message: String },
	#[error("A re-engagement sweep is already running.")]
	SweepInProgress,
	#[error("Invalid configuration: {message}")]
	InvalidConfig { message: String },
}
impl Error {
	pub(crate) fn upstream<E>(stage: &'static str) -> impl FnOnce(E) -> Self
	where
		E: std::fmt::Display,
	{
		move |err| Self::UpstreamUnavailable { stage, message: err.to_string() }
	}
}
impl From<rekindle_storage::Error> for Error {
	fn from(err: rekindle_storage::Error) -> Self {
		match err {
			rekindle_storage::Error::InvalidConfig { message } => Self::InvalidConfig { message },
			rekindle_storage::Error::InvalidHeaderName(inner) =>
				Self::InvalidConfig { message: inner.to_string() },
			rekindle_storage::Error::InvalidHeaderValue(inner) =>
				Self::InvalidConfig { message: inner.to_string() },
			other => Self::UpstreamUnavailable { stage: "store", message: other.to_string() },
		}
	}
}
