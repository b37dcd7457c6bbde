//! `twoface::TfError` pairs an internal Rust error with a user-facing description. Users only
//! ever see the user-facing half; the internal half (which may mention file paths or other
//! implementation details) stays in the logs.

mod extensions;
pub mod externalerror;
mod integrations;

pub use extensions::*;
pub use externalerror::{Cause, ExternalError};
use std::fmt;
use std::fmt::{Display, Formatter};

/// An error with two faces: the internal one for logs, the external one for API responses.
#[derive(Debug)]
pub struct TfError {
    /// The underlying error from some function. May contain sensitive information (e.g. paths
    /// on the server's disk), so it should not be shown to users.
    pub internal: anyhow::Error,
    /// A user-friendly error that doesn't contain any sensitive information.
    pub external: ExternalError,
}

/// Displaying a TfError only displays the external section. The internal error remains private.
impl Display for TfError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::result::Result<(), fmt::Error> {
        write!(f, "{}", self.external)
    }
}

/// Return type of a function that could fail with a twoface error.
pub type Fallible<T> = Result<T, TfError>;
