use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("gpio error: {0}")]
    Gpio(String),
    #[error("device timeout after {waited_ms} ms")]
    Timeout { waited_ms: u64 },
    #[error("camera error: {0}")]
    Camera(String),
    #[error("motion rejected: {0}")]
    Motion(String),
}

pub type Result<T> = std::result::Result<T, HwError>;
