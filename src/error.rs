//! Structural errors raised by the core.
//!
//! Missing grading data is not an error anywhere in the core; it reduces to
//! empty or zero results. Only a roster whose schema does not match the
//! configured columns fails loudly.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RosterError {
    #[error("roster header has no column named '{column}' (found: {found})")]
    MissingColumn { column: String, found: String },

    #[error("roster CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type RosterResult<T> = Result<T, RosterError>;
