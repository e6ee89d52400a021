use std::io;

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Everything that can abort the pipeline. All of these are fatal; there is
/// no partial-output mode.
#[derive(Error, Debug)]
pub enum Error {
    #[error("preprocessor error: {0}")]
    Preprocessor(String),
    #[error("C syntax error: {0}")]
    Parse(String),
    #[error("redefinition of '{0}'")]
    Redefinition(String),
    #[error("no member named '{0}'")]
    MemberNotFound(String),
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
    #[error("undeclared identifier '{0}'")]
    UnknownIdentifier(String),
    #[error("too many symbols in one namespace")]
    AlphabetExhausted,
    #[error("unsupported construct: {0}")]
    Unsupported(String),
    #[error("invalid width list: {0}")]
    InvalidWidths(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    pub(crate) fn mismatch(detail: impl Into<String>) -> Self {
        Error::TypeMismatch(detail.into())
    }

    pub(crate) fn unsupported(detail: impl Into<String>) -> Self {
        Error::Unsupported(detail.into())
    }
}
