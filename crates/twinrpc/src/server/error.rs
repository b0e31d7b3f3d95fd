use std::{
    error::Error as StdError,
    fmt::{self, Display, Formatter},
};

pub use crate::Status;

/// Shorthand type for `Result<T, Status>`.
pub type ServerResult<T> = Result<T, Status>;

/// Errors that can occur while building a routes table.
#[derive(Debug)]
pub enum RouteError {
    /// Two services were registered at the same path.
    Conflict {
        /// The path registered twice.
        path: String,
    },
    /// A path couldn't be inserted into the router.
    InvalidPath {
        /// The offending path.
        path: String,
        /// Why it was rejected.
        reason: matchit::InsertError,
    },
}

impl Display for RouteError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            RouteError::Conflict { path } => {
                write!(f, "more than one service registered for {}", path)
            }
            RouteError::InvalidPath { path, reason } => {
                write!(f, "invalid route path {}: {}", path, reason)
            }
        }
    }
}

impl StdError for RouteError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            RouteError::InvalidPath { reason, .. } => Some(reason),
            RouteError::Conflict { .. } => None,
        }
    }
}
