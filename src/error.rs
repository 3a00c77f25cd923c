use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    Config(String),
    #[error("failed to parse config: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("unknown provider in config: {0}")]
    InvalidProvider(String),
}

pub type Result<T> = std::result::Result<T, Error>;
