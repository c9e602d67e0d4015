//! Discovery errors

use thiserror::Error;

pub type DiscoveryResult<T> = Result<T, DiscoveryError>;

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned {status}")]
    Status { url: String, status: u16 },

    #[error("timed out after {0}ms")]
    Timeout(u64),

    #[error("unexpected response: {0}")]
    Parse(String),
}

impl From<DiscoveryError> for archivefever_core::Error {
    fn from(err: DiscoveryError) -> Self {
        archivefever_core::Error::Discovery(err.to_string())
    }
}
