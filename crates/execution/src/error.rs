// In crates/execution/src/error.rs

use crate::types::OrderId;
use core_types::ExecutionReport;
use thiserror::Error;

/// Transport-level failures. Unfavourable outcomes such as a timeout are
/// report statuses, not errors.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid order request: {reason}")]
    InvalidRequest { reason: String },

    #[error("Unknown order {0}")]
    UnknownOrder(OrderId),

    #[error("API client error: {0}")]
    ApiClientError(#[from] api_client::Error),

    /// The exchange stopped answering after orders went out. `report` holds
    /// every fill recorded up to that point and carries no status.
    #[error(
        "Lifecycle interrupted after {} attempt(s), {} filled: {}",
        .report.attempt_index,
        .report.filled_quantity,
        .source
    )]
    Transport {
        report: Box<ExecutionReport>,
        source: Box<Error>,
    },
}

impl Error {
    /// Fills recorded before the lifecycle was interrupted, if any order went out.
    pub fn partial_report(&self) -> Option<&ExecutionReport> {
        match self {
            Error::Transport { report, .. } => Some(report.as_ref()),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
