use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HwError {
    /// The device refused the command (soft limit, bad value, wrong state).
    #[error("command rejected: {0}")]
    Rejected(String),
    #[error("device timeout")]
    Timeout,
    #[error("device fault: {0}")]
    Fault(String),
}

pub type Result<T> = std::result::Result<T, HwError>;
