//! Error types for the transaction service

use crate::status::{Group, Status};

/// Error type for transaction service operations
#[derive(Debug, thiserror::Error)]
pub enum TxnError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid transaction ID")]
    InvalidTxnId,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("client is closed")]
    Closed,

    #[error("peer [{0}] not found")]
    PeerNotFound(String),

    #[error(transparent)]
    Status(#[from] Status),

    #[error("multiple errors: [{}]", join_errors(.0))]
    Multiple(Vec<TxnError>),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, TxnError>;

impl TxnError {
    /// Shorthand for a classified status error
    pub fn status(group: Group, code: i32, message: impl Into<String>) -> Self {
        TxnError::Status(Status::new(group, code, message))
    }

    /// Returns the status if this error carries one
    pub fn as_status(&self) -> Option<&Status> {
        match self {
            TxnError::Status(status) => Some(status),
            _ => None,
        }
    }
}

fn join_errors(errors: &[TxnError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
