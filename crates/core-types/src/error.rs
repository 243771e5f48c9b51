// In crates/core-types/src/error.rs

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Unknown grade token: {0}")]
    UnknownGrade(String),

    #[error("Invalid value for field `{field}`: {value}")]
    InvalidField { field: &'static str, value: String },
}

pub type Result<T> = std::result::Result<T, Error>;
