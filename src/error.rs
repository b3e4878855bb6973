//! Status vocabulary shared by every public operation.
//!
//! Each failure carries a [`Status`] with a stable integer code and a fixed
//! human-readable string, plus a free-form message naming the entity that
//! failed. Callers branch on the status; the message is for operators.

use std::fmt;
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Status {
    InvalidArgument,
    NotFound,
    AlreadyExists,
    NotSupported,
    InvalidState,
    IoFailure,
    InternalError,
    /// Resource held by another session. Raised by backends, never by the catalog.
    TableLocked,
}

impl Status {
    /// Stable numeric code. Never renumber an existing entry.
    pub fn code(self) -> i32 {
        match self {
            Status::InvalidArgument => 3,
            Status::AlreadyExists => 4,
            Status::NotFound => 6,
            Status::TableLocked => 13,
            Status::IoFailure => 14,
            Status::NotSupported => 17,
            Status::InternalError => 22,
            Status::InvalidState => 27,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::InvalidArgument => "Invalid arguments",
            Status::NotFound => "Object not found",
            Status::AlreadyExists => "Already exists",
            Status::NotSupported => "Operation not supported",
            Status::InvalidState => "Invalid state",
            Status::IoFailure => "IO error",
            Status::InternalError => "Internal error",
            Status::TableLocked => "Resource held by another session",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{status}: {message}")]
pub struct TdiError {
    status: Status,
    message: String,
}

pub type Result<T, E = TdiError> = std::result::Result<T, E>;

impl TdiError {
    pub fn new(status: Status, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(Status::InvalidArgument, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(Status::NotFound, message)
    }

    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::new(Status::AlreadyExists, message)
    }

    pub fn not_supported(message: impl Into<String>) -> Self {
        Self::new(Status::NotSupported, message)
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::new(Status::InvalidState, message)
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(Status::IoFailure, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(Status::InternalError, message)
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn code(&self) -> i32 {
        self.status.code()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Prefix the message with the entity being processed; the status is kept.
    pub fn context(self, context: impl fmt::Display) -> Self {
        Self {
            status: self.status,
            message: format!("{context}: {}", self.message),
        }
    }
}

/// `with_context` for library results, in the spirit of `anyhow::Context`.
pub trait ResultExt<T> {
    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: fmt::Display,
        F: FnOnce() -> C;
}

impl<T> ResultExt<T> for Result<T> {
    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: fmt::Display,
        F: FnOnce() -> C,
    {
        self.map_err(|err| err.context(f()))
    }
}
