// In crates/core-types/src/lib.rs

pub mod decision;
pub mod error;
pub mod lenient;
pub mod report;
pub mod types;

// Re-export the most important types for easy access from other crates.
pub use decision::{Action, Decision, ExecutionPreference, Grade, InterventionLevel};
pub use error::{Error, Result};
pub use report::{ExecutionAttempt, ExecutionReport, ExecutionStatus};
pub use types::{AccountState, OpenPosition, Side, Symbol, SymbolClass};
