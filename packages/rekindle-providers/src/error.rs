pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Reqwest(#[from] reqwest::Error),
	#[error(transparent)]
	SerdeJson(#[from] serde_json::Error),
	#[error(transparent)]
	InvalidHeaderName(#[from] reqwest::header::InvalidHeaderName),
	#[error(transparent)]
	InvalidHeaderValue(#[from] reqwest::header::InvalidHeaderValue),
	#[error("{message}")]
	InvalidConfig { message: String },
	#[error("Email provider responded with {status}: {body}")]
	Status { status: u16, body: String },
}
impl Error {
	/// Rejections concern a single message; anything else means the provider itself is
	/// unreachable or failing.
	pub fn failure(&self) -> SendFailure {
		match self {
			Self::Status { status, .. } if (400..500).contains(status) && *status != 429 =>
				SendFailure::Rejected,
			Self::InvalidConfig { .. }
			| Self::InvalidHeaderName(_)
			| Self::InvalidHeaderValue(_)
			| Self::SerdeJson(_) => SendFailure::Rejected,
			Self::Status { .. } | Self::Reqwest(_) => SendFailure::Unavailable,
		}
	}
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SendFailure {
	Rejected,
	Unavailable,
}
