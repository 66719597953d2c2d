pub mod client;
pub mod rows;

mod error;

pub use client::{StoreClient, USER_FILTER_CHUNK, UserPage};
pub use error::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;
