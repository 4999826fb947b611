use thiserror::Error;

#[derive(Error, Debug)]
pub enum JobwireError {
    #[error("Malformed request body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),
}
