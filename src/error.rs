// SPDX-License-Identifier: Apache-2.0

//! Error type shared by the SMT encoding and proving entry points.

/// Errors surfaced by encoding, predicate construction, and proving.
///
/// Each variant carries a one-line diagnostic string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// An IR opcode the encoder does not support.
    Unimplemented(String),
    /// A sort or width mismatch at a boundary call.
    InvalidArgument(String),
    /// An error surfaced from the solver's error callback.
    Internal(String),
    /// A predicate or query referenced a node outside the encoded function.
    NotFound(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Unimplemented(msg) => write!(f, "unimplemented: {}", msg),
            Error::InvalidArgument(msg) => write!(f, "invalid argument: {}", msg),
            Error::Internal(msg) => write!(f, "internal: {}", msg),
            Error::NotFound(msg) => write!(f, "not found: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;
