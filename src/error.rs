//! Error types
//!
//! Two error classes live here, both distinct from a leakage violation (which is
//! a normal [`crate::ProbeResult`] with `violated = true`):
//!
//! - [`ProbeError`]: the public headers could not be preprocessed. This is a
//!   broken public contract, not a leak.
//! - [`ConfigError`]: the manifest, registry or aggregate is malformed.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("failed to read header {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("public header `{header}` not found in any include directory")]
    PublicHeaderNotFound { header: String },

    #[error("{file}:{line}: included header \"{target}\" not found")]
    HeaderNotFound {
        file: String,
        line: usize,
        target: String,
    },

    #[error("{file}:{line}: #error {message}")]
    ErrorDirective {
        file: String,
        line: usize,
        message: String,
    },

    #[error("{file}:{line}: malformed #{directive}: {message}")]
    MalformedDirective {
        file: String,
        line: usize,
        directive: String,
        message: String,
    },

    #[error("{file}:{line}: invalid #if expression: {message}")]
    InvalidExpression {
        file: String,
        line: usize,
        message: String,
    },

    #[error("{file}:{line}: unterminated conditional block")]
    UnterminatedConditional { file: String, line: usize },

    #[error("{file}:{line}: #{directive} without matching #if")]
    UnmatchedConditional {
        file: String,
        line: usize,
        directive: String,
    },

    #[error("{file}:{line}: #include nested deeper than {limit} levels")]
    IncludeDepthExceeded {
        file: String,
        line: usize,
        limit: usize,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read manifest {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse manifest {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid marker name `{0}`: must be a C identifier")]
    InvalidMarker(String),

    #[error("marker `{0}` has no originating dependency")]
    MissingDependency(String),

    #[error("marker `{0}` is registered more than once")]
    DuplicateMarker(String),

    #[error("public header identifier must not be empty")]
    EmptyHeader,

    #[error("invalid define `{0}`: expected NAME or NAME=VALUE")]
    InvalidDefine(String),
}
