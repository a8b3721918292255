//! Shared error taxonomy for the litertlm workspace.
//!
//! Every crate in this workspace returns [`Error`] at its public
//! boundaries instead of growing its own ad hoc error type. The variant
//! set mirrors the error kinds a container reader/writer or a
//! constrained-decoding engine can raise (see the top-level spec's error
//! handling design).

#![forbid(unsafe_code)]

use std::fmt;
use thiserror::Error;

/// The error taxonomy shared across the container and constrained-decoding
/// subsystems.
///
/// Each variant carries a human-readable message; callers that need to
/// branch on the error kind should match on the variant, not parse the
/// message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Caller-supplied input violates a precondition (unaligned offset,
    /// wrong constraint-arg variant, empty tool list when required,
    /// unknown section-metadata key name).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Section with requested key absent; tokenizer absent; model-kind
    /// absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// Operation invoked in the wrong lifecycle state (e.g. `stream()`
    /// before `prepare()`; scheduling on a stopped worker pool).
    #[error("failed precondition: {0}")]
    FailedPrecondition(String),

    /// Magic bytes wrong, FlatBuffers verification fails, header corrupt.
    #[error("invalid format: {0}")]
    InvalidFormat(String),

    /// Major version mismatch.
    #[error("unsupported version: {0}")]
    UnsupportedVersion(String),

    /// Zlib decompression fails or length disagreement; partial token
    /// sequence during decode.
    #[error("data loss: {0}")]
    DataLoss(String),

    /// Timed wait elapsed.
    #[error("deadline exceeded: {0}")]
    DeadlineExceeded(String),

    /// Feature flag disabled at build (e.g. HF tokenizer support off).
    #[error("unimplemented: {0}")]
    Unimplemented(String),

    /// Engine-internal failure not otherwise classifiable; always carries
    /// a descriptive message.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Short machine-readable name for the variant, used by the FFI
    /// envelope and by tests that assert on error kind without matching
    /// the full `Display` string.
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidArgument(_) => "invalid_argument",
            Error::NotFound(_) => "not_found",
            Error::FailedPrecondition(_) => "failed_precondition",
            Error::InvalidFormat(_) => "invalid_format",
            Error::UnsupportedVersion(_) => "unsupported_version",
            Error::DataLoss(_) => "data_loss",
            Error::DeadlineExceeded(_) => "deadline_exceeded",
            Error::Unimplemented(_) => "unimplemented",
            Error::Internal(_) => "internal",
        }
    }

    /// The variant's own message, independent of `Display`'s `"kind:
    /// message"` framing.
    pub fn message(&self) -> &str {
        match self {
            Error::InvalidArgument(m)
            | Error::NotFound(m)
            | Error::FailedPrecondition(m)
            | Error::InvalidFormat(m)
            | Error::UnsupportedVersion(m)
            | Error::DataLoss(m)
            | Error::DeadlineExceeded(m)
            | Error::Unimplemented(m)
            | Error::Internal(m) => m,
        }
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Error::NotFound(msg.into())
    }

    pub fn failed_precondition(msg: impl Into<String>) -> Self {
        Error::FailedPrecondition(msg.into())
    }

    pub fn invalid_format(msg: impl Into<String>) -> Self {
        Error::InvalidFormat(msg.into())
    }

    pub fn unsupported_version(msg: impl Into<String>) -> Self {
        Error::UnsupportedVersion(msg.into())
    }

    pub fn data_loss(msg: impl Into<String>) -> Self {
        Error::DataLoss(msg.into())
    }

    pub fn deadline_exceeded(msg: impl Into<String>) -> Self {
        Error::DeadlineExceeded(msg.into())
    }

    pub fn unimplemented(msg: impl Into<String>) -> Self {
        Error::Unimplemented(msg.into())
    }

    pub fn internal(msg: impl fmt::Display) -> Self {
        Error::Internal(msg.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Error::NotFound(err.to_string()),
            std::io::ErrorKind::PermissionDenied => Error::InvalidArgument(err.to_string()),
            _ => Error::Internal(err.to_string()),
        }
    }
}

/// Result alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_is_stable_snake_case() {
        assert_eq!(Error::invalid_argument("x").code(), "invalid_argument");
        assert_eq!(Error::not_found("x").code(), "not_found");
        assert_eq!(Error::internal("x").code(), "internal");
    }

    #[test]
    fn display_includes_kind_and_message() {
        let err = Error::invalid_format("bad magic");
        let shown = err.to_string();
        assert!(shown.contains("invalid format"));
        assert!(shown.contains("bad magic"));
    }

    #[test]
    fn message_strips_kind_prefix() {
        let err = Error::data_loss("short inflate");
        assert_eq!(err.message(), "short inflate");
    }

    #[test]
    fn io_not_found_maps_to_not_found() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: Error = io_err.into();
        assert_eq!(err.code(), "not_found");
    }

    #[test]
    fn io_other_maps_to_internal() {
        let io_err = std::io::Error::other("boom");
        let err: Error = io_err.into();
        assert_eq!(err.code(), "internal");
    }
}
