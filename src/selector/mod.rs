//! Selector subsystem
//!
//! Declarative filter expressions and their compilation into key-range
//! scans. Only prefix matching on the document identity is compiled; the
//! projection list is accepted and carried but never applied.

mod compiler;
mod expr;
mod format;

pub use compiler::compile;
pub use expr::{CmpExpr, Expr, Literal, Operator};
pub use format::{Formatter, PrefixFormatter};

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectorError {
    /// Expression shape cannot be compiled into a key range
    #[error("unsupported selector type: {shape}")]
    Unsupported { shape: &'static str },

    /// Selector document could not be parsed
    #[error("malformed selector: {0}")]
    Malformed(String),
}

impl SelectorError {
    pub fn malformed(message: impl Into<String>) -> Self {
        SelectorError::Malformed(message.into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            SelectorError::Unsupported { .. } => "AERO_UNSUPPORTED_SELECTOR",
            SelectorError::Malformed(_) => "AERO_MALFORMED_SELECTOR",
        }
    }
}

/// Projection list passed to `select`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fields(Vec<String>);

impl Fields {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Fields(fields.into_iter().map(Into::into).collect())
    }

    /// Every field.
    pub fn all() -> Self {
        Fields::default()
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
