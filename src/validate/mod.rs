//! Validation: declarative field rules and structural length-bound
//! inference from their regex patterns.

pub mod limits;
mod rules;

pub use limits::{infer, LengthBounds};
pub use rules::{validate_record, ValidationReport, ValidationRule};
