//! Error taxonomy used across the whole pipeline.
//!
//! Recoverable errors (the ones a script can legitimately trigger, such as
//! calling a method that doesn't exist) are distinguished from `Panic`,
//! which signals a compiler-internal invariant violation (bad register
//! index, bad ref index, bad sub-code index) and should never be
//! observable from well-formed bytecode.

use std::fmt;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("arity mismatch: `{method}` expected {expected}, got {got}")]
    ArityMismatch {
        method: String,
        expected: String,
        got: usize,
    },

    #[error("unknown method `{method}` on `{class}`")]
    UnknownMethod { class: String, method: String },

    #[error("type error: {0}")]
    TypeError(String),

    #[error("unknown scoped variable `{0}`")]
    UnknownScopedVariable(String),

    #[error("keyword arguments required for `{method}`, call sites must name: {missing}")]
    UnderspecifiedCall { method: String, missing: String },

    #[error("compiler invariant violated: {0}")]
    Panic(String),

    #[error("{0}")]
    Syntax(String),
}

impl Error {
    pub fn arity(method: impl Into<String>, expected: impl Into<String>, got: usize) -> Self {
        Error::ArityMismatch {
            method: method.into(),
            expected: expected.into(),
            got,
        }
    }

    pub fn unknown_method(class: impl Into<String>, method: impl Into<String>) -> Self {
        Error::UnknownMethod {
            class: class.into(),
            method: method.into(),
        }
    }

    pub fn type_error(msg: impl fmt::Display) -> Self {
        Error::TypeError(msg.to_string())
    }

    pub fn panic(msg: impl fmt::Display) -> Self {
        Error::Panic(msg.to_string())
    }

    /// `Panic`-class errors indicate a compiler bug, not a user-triggerable
    /// failure; callers such as the CLI may want to report them distinctly.
    pub fn is_panic(&self) -> bool {
        matches!(self, Error::Panic(_))
    }
}

/// Construct and return an `Err(Error::TypeError(...))`, hebi-style.
#[macro_export]
macro_rules! fail {
    ($($arg:tt)*) => {
        return Err($crate::error::Error::type_error(format!($($arg)*)))
    };
}

/// Construct an `Error::TypeError` without returning (for use in `.ok_or_else`).
#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::error::Error::type_error(format!($($arg)*))
    };
}

/// Construct and return an `Err(Error::Panic(...))`.
#[macro_export]
macro_rules! bug {
    ($($arg:tt)*) => {
        return Err($crate::error::Error::panic(format!($($arg)*)))
    };
}
