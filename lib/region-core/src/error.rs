use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid routing configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Configuration parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<region_api::RequestError> for CoreError {
    fn from(err: region_api::RequestError) -> Self {
        CoreError::InvalidArgument(err.to_string())
    }
}
