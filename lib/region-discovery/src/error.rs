use region_api::MetadataError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Seed endpoint {url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("Account metadata could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Account metadata rejected: {0}")]
    Metadata(#[from] MetadataError),
}
