use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed strategy or signature.  Raised before any I/O happens.
    InvalidArgument,
    /// The underlying source, sink or file failed.
    IoFailure,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Read failed: {0}")]
    Read(#[source] io::Error),
    #[error("Write failed: {0}")]
    Write(#[source] io::Error),
    #[error("{}: {source}", .path.display())]
    Path {
        path:   PathBuf,
        #[source]
        source: io::Error,
    },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Error::Read(_) | Error::Write(_) | Error::Path { .. } => ErrorKind::IoFailure,
        }
    }

    /// The underlying I/O error, if any.
    pub fn io_error(&self) -> Option<&io::Error> {
        match self {
            Error::InvalidArgument(_) => None,
            Error::Read(e) | Error::Write(e) => Some(e),
            Error::Path { source, .. } => Some(source),
        }
    }

    /// Attach a path to a read or write failure so the message names it.
    pub fn at_path(self, path: impl Into<PathBuf>) -> Self {
        match self {
            Error::Read(source) | Error::Write(source) => Error::Path { path: path.into(), source },
            other => other,
        }
    }

    pub(crate) fn path(path: &std::path::Path, source: io::Error) -> Self {
        Error::Path { path: path.to_path_buf(), source }
    }
}
