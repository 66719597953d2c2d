pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Scan stopped at offset {offset}: {source}")]
	Batch {
		offset: u64,
		#[source]
		source: rekindle_service::Error,
	},
}
