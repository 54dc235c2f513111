//! Error type shared by every layer of the crate.
//!
//! Errors are shallow: each one is a translation of either a validation
//! failure on our side (unknown option, bad mode, wrong shape) or a failure
//! reported by the codec engine. Nothing is retried.
//!
//! [`ErrorKind`] groups the variants into the failure classes callers
//! usually branch on:
//!
//! | Kind | Raised for |
//! |---|---|
//! | `Parameter` | unknown option key, option of the wrong type |
//! | `Value` | option out of range, malformed mode, bad image shape |
//! | `Lookup` | unknown extension/format, capability the format lacks |
//! | `Codec` | engine decode or encode failure |
//! | `Index` | frame or metadata index past the end |
//! | `State` | session already closed, append rejected |
//! | `Io` | filesystem errors |

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{format} does not accept the keyword argument '{name}'")]
    UnknownOption { format: String, name: String },
    #[error("option '{name}' expects {expected}, got {got}")]
    OptionType {
        name: String,
        expected: &'static str,
        got: String,
    },
    #[error("invalid value for option '{name}': {reason}")]
    InvalidOption { name: String, reason: String },
    #[error("{0}")]
    InvalidArgument(String),
    #[error("no format found for {0}")]
    UnsupportedFormat(String),
    #[error("format {format} cannot {action}")]
    Capability {
        format: &'static str,
        action: &'static str,
    },
    #[error("could not decode {format} data: {message}")]
    Decode {
        format: &'static str,
        message: String,
    },
    #[error("could not encode {format} data: {message}")]
    Encode {
        format: &'static str,
        message: String,
    },
    #[error("index {index} is out of range for {len} frame(s)")]
    Index { index: usize, len: usize },
    #[error("{format} writer accepts only a single image")]
    AppendRejected { format: &'static str },
    #[error("{0} has already been closed")]
    Closed(&'static str),
}

/// Coarse failure class of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Parameter,
    Value,
    Lookup,
    Codec,
    Index,
    State,
    Io,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io(_) => ErrorKind::Io,
            Error::UnknownOption { .. } | Error::OptionType { .. } => ErrorKind::Parameter,
            Error::InvalidOption { .. } | Error::InvalidArgument(_) => ErrorKind::Value,
            Error::UnsupportedFormat(_) | Error::Capability { .. } => ErrorKind::Lookup,
            Error::Decode { .. } | Error::Encode { .. } => ErrorKind::Codec,
            Error::Index { .. } => ErrorKind::Index,
            Error::AppendRejected { .. } | Error::Closed(_) => ErrorKind::State,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
