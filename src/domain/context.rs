//! Error context extension trait
//!
//! Adds `.context()` and `.with_context()` to any `Result` whose error
//! converts into [`StrataError`], keeping library code on the domain error
//! type instead of `anyhow`.
//!
//! ```rust
//! use strata::domain::Result;
//! use strata::domain::context::ResultExt;
//!
//! fn read_records(path: &str) -> Result<String> {
//!     std::fs::read_to_string(path).with_context(|| format!("Failed to read records from {path}"))
//! }
//! ```

use crate::domain::errors::StrataError;
use crate::domain::result::Result;

/// Extension trait for adding context to `Result` types
pub trait ResultExt<T> {
    /// Add context to an error (evaluated eagerly)
    fn context<C>(self, context: C) -> Result<T>
    where
        C: std::fmt::Display + Send + Sync + 'static;

    /// Add context to an error, computing it only on failure
    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: std::fmt::Display + Send + Sync + 'static,
        F: FnOnce() -> C;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<StrataError>,
{
    fn context<C>(self, context: C) -> Result<T>
    where
        C: std::fmt::Display + Send + Sync + 'static,
    {
        self.map_err(|e| wrap(e.into(), context))
    }

    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: std::fmt::Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        self.map_err(|e| wrap(e.into(), f()))
    }
}

/// Keeps the variant of I/O and serialization errors so callers can still
/// map them to exit codes
fn wrap(base: StrataError, context: impl std::fmt::Display) -> StrataError {
    match base {
        StrataError::Io(msg) => StrataError::Io(format!("{context}: {msg}")),
        StrataError::Serialization(msg) => StrataError::Serialization(format!("{context}: {msg}")),
        StrataError::Validation(msg) => StrataError::Validation(format!("{context}: {msg}")),
        StrataError::Configuration(msg) => StrataError::Configuration(format!("{context}: {msg}")),
        other => StrataError::Other(format!("{context}: {other}")),
    }
}
