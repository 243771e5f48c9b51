// In crates/decision/src/lib.rs

//! Turns raw model output into normalized `Decision`s.
//!
//! Extraction locates the JSON array inside free-form reasoning text and
//! decodes it (with a single repair pass when the text is malformed);
//! normalization then resolves aliases, rounds numeric fields and folds
//! loosely written enum values into their canonical form.

pub mod error;
pub mod extract;
pub mod normalize;
pub mod repair;

pub use error::{Error, Result};
pub use extract::{Extraction, extract};
pub use normalize::normalize;
