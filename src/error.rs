//! Error types for help compilation.
//!
//! Only conditions that stop the run live here. Ordinary source problems are
//! recorded as [`Diagnostic`](crate::diagnostics::Diagnostic)s and compilation
//! keeps going so that one run reports as much as possible.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that abort a compile, print, or patch run.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unable to open \"{}\": {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("too many errors ({0})")]
    TooManyErrors(usize),

    #[error("too many warnings ({0})")]
    TooManyWarnings(usize),

    #[error("help topic \"{title}\" is too large ({size} bytes, limit {limit})")]
    TopicTooLarge {
        title: String,
        size: usize,
        limit: usize,
    },

    #[error("table is too large (more than {0} links)")]
    TableTooLarge(usize),

    #[error("read-ahead buffer overflow")]
    PushbackOverflow,

    #[error("hot-link #{0} was never resolved")]
    UnresolvedLink(usize),

    #[error("compilation failed with {errors} error(s)")]
    CompilationFailed { errors: usize },

    #[error("source has no DocContents")]
    NoContents,

    #[error("help signature not found in \"{}\"", .0.display())]
    SignatureNotFound(PathBuf),

    #[error("no help found in \"{}\"", .0.display())]
    NoHelpFound(PathBuf),

    #[error("{what} is too long for the help file ({len} bytes)")]
    FieldTooLong { what: &'static str, len: usize },
}

impl Error {
    pub(crate) fn open(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Open {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
