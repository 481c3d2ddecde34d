//! Errors for building and querying the firmware API table.
use miette::Diagnostic;
use thiserror::Error;

/// The table could not be built.
#[derive(Debug, Error, Diagnostic, Clone, PartialEq, Eq)]
pub enum ApiTableError {
    #[error("symbols '{first}' and '{second}' share hash {hash:#010x}")]
    #[diagnostic(help("rename one of the exported symbols; the table cannot tell them apart"))]
    HashCollision {
        hash: u32,
        first: String,
        second: String,
    },
}

/// A name that the firmware does not export.
#[derive(Debug, Error, Diagnostic, Clone, PartialEq, Eq)]
#[error("unresolved symbol: {name}")]
pub struct Unresolved {
    pub name: String,
}

impl Unresolved {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}
