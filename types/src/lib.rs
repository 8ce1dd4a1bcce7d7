//! Core value types for rofs.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! The streaming tools in `rofs-tools` consume and produce these.

mod budget;
mod window;

pub use budget::{BudgetExceeded, OutputBudget};
pub use window::{FileContent, FileReadResult, FileWindow};
