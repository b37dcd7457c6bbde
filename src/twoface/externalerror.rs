use actix_web::http::StatusCode;
use std::fmt;

/// Used to create HTTP responses with the given text and status code.
#[derive(Debug)]
pub struct ExternalError {
    /// A user-facing explanation of what caused the error.
    pub cause: Cause,
    /// Error text that will describe the problem to the user.
    pub text: &'static str,
}

/// A user-facing explanation of what caused the error.
#[derive(Debug, Clone, Copy)]
pub enum Cause {
    /// The requested post, comment or file doesn't exist.
    NotFound,
    /// The request was well-formed but asked for something invalid, e.g. deleting a comment
    /// index that's out of range.
    UserActionInvalid,
    /// The post document couldn't be read or didn't match the expected schema.
    StorageRead,
    /// The post document or an uploaded image couldn't be written.
    StorageWrite,
}

impl fmt::Display for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        // Make fmt::Display the same as fmt::Debug, i.e. each variant's name.
        write!(f, "{:?}", self)
    }
}

impl Into<StatusCode> for Cause {
    /// Causes can be mapped to HTTP status codes. ExternalError doesn't use status codes directly,
    /// because some components (e.g. the datastore) shouldn't need to know about HTTP codes.
    fn into(self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::UserActionInvalid => StatusCode::BAD_REQUEST,
            Self::StorageRead => StatusCode::INTERNAL_SERVER_ERROR,
            Self::StorageWrite => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for ExternalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "{}: {}", self.cause, self.text)
    }
}

impl Default for ExternalError {
    // Default to StorageRead and a very vague generic message.
    fn default() -> Self {
        Self {
            cause: Cause::StorageRead,
            text: "Internal server error",
        }
    }
}
