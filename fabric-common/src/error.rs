//! The behavioral error kinds from `spec.md` §7, shared by every component.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FabricError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("no path to destination")]
    Unreachable,

    #[error("transport error: {0}")]
    TransportError(#[from] reqwest::Error),

    #[error("corrupt payload: {0}")]
    Corrupt(String),

    #[error("stale registry entry: {0}")]
    Stale(String),
}

impl FabricError {
    /// True for errors tier/candidate fallthrough should recover from
    /// silently, per the propagation policy in `spec.md` §7.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, FabricError::InvalidArgument(_))
    }
}

pub type Result<T> = std::result::Result<T, FabricError>;
