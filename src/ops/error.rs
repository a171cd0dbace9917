use crate::path::VirtualPath;
use crate::store::StoreError;
use serde::Serialize;
use thiserror::Error;

/// A leaf that did not make it through a multi-leaf operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeafFailure {
    pub path: VirtualPath,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OpsError {
    #[error("an item named {0} already exists")]
    Conflict(VirtualPath),
    #[error("item not found: {0}")]
    NotFound(String),
    #[error("{} of {} leaves failed", .failed.len(), .succeeded.len() + .failed.len())]
    PartialFailure {
        succeeded: Vec<VirtualPath>,
        failed: Vec<LeafFailure>,
    },
    #[error("transport failure: {0}")]
    TransportFailure(String),
    #[error("invalid name: {0}")]
    InvalidName(String),
    #[error("invalid target: {0}")]
    InvalidTarget(String),
    #[error("another operation is in progress")]
    Busy,
}

pub type OpsResult<T> = Result<T, OpsError>;

impl From<StoreError> for OpsError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(path) => OpsError::NotFound(path),
            StoreError::Transport(msg) => OpsError::TransportFailure(msg),
        }
    }
}

impl OpsError {
    /// Errors caught before any store call is made; these never change state.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            OpsError::Conflict(_)
                | OpsError::InvalidName(_)
                | OpsError::InvalidTarget(_)
                | OpsError::Busy
        )
    }

    pub fn failed_leaves(&self) -> &[LeafFailure] {
        match self {
            OpsError::PartialFailure { failed, .. } => failed,
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorMessage {
    pub title: String,
    pub message: String,
    pub suggestion: Option<String>,
    pub recoverable: bool,
}

impl OpsError {
    pub fn to_user_message(&self) -> ErrorMessage {
        match self {
            OpsError::Conflict(path) => ErrorMessage {
                title: "Name Already In Use".to_string(),
                message: format!("An item named {} already exists", path),
                suggestion: Some("Choose a different name or destination.".to_string()),
                recoverable: true,
            },
            OpsError::NotFound(path) => ErrorMessage {
                title: "Item Not Found".to_string(),
                message: format!("{} no longer exists", path),
                suggestion: Some("The item may have been moved or deleted. Refresh the folder.".to_string()),
                recoverable: false,
            },
            OpsError::PartialFailure { succeeded, failed } => ErrorMessage {
                title: "Operation Partially Completed".to_string(),
                message: format!(
                    "{} items succeeded, {} failed: {}",
                    succeeded.len(),
                    failed.len(),
                    failed
                        .iter()
                        .map(|leaf| leaf.path.to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
                suggestion: Some(
                    "Some items may be in both locations. Refresh and retry the failed items."
                        .to_string(),
                ),
                recoverable: true,
            },
            OpsError::TransportFailure(msg) => ErrorMessage {
                title: "Storage Unavailable".to_string(),
                message: format!("The storage backend could not complete the request: {}", msg),
                suggestion: Some("Check your connection and try again.".to_string()),
                recoverable: true,
            },
            OpsError::InvalidName(msg) => ErrorMessage {
                title: "Invalid Name".to_string(),
                message: msg.clone(),
                suggestion: Some("Names cannot be empty or contain '/'.".to_string()),
                recoverable: true,
            },
            OpsError::InvalidTarget(msg) => ErrorMessage {
                title: "Invalid Destination".to_string(),
                message: msg.clone(),
                suggestion: Some("Pick a folder outside the item being moved.".to_string()),
                recoverable: true,
            },
            OpsError::Busy => ErrorMessage {
                title: "Please Wait".to_string(),
                message: "Another operation is still running.".to_string(),
                suggestion: Some("Try again once it finishes.".to_string()),
                recoverable: true,
            },
        }
    }

    pub fn is_recoverable(&self) -> bool {
        self.to_user_message().recoverable
    }

    pub fn get_suggestion(&self) -> Option<String> {
        self.to_user_message().suggestion
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryStrategy {
    Retry,
    Skip,
    Abort,
}

pub fn suggest_recovery_strategy(error: &OpsError) -> RecoveryStrategy {
    match error {
        OpsError::TransportFailure(_) | OpsError::PartialFailure { .. } | OpsError::Busy => {
            RecoveryStrategy::Retry
        }
        OpsError::NotFound(_) => RecoveryStrategy::Skip,
        _ => RecoveryStrategy::Abort,
    }
}
