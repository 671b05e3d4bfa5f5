//! Typed error kinds surfaced at the command boundary.
//!
//! Per-file and per-entity failures inside extraction and propagation never
//! use these: they degrade to diagnostics and the run continues. These types
//! cover the cases where no meaningful answer exists.

use thiserror::Error;

use crate::model::FunctionKey;

/// Failure to resolve a user-supplied function name to a key.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("function not found: {name}")]
    FunctionNotFound {
        name: String,
        /// Close matches by edit distance, best first (at most three).
        suggestions: Vec<String>,
    },

    #[error("ambiguous function name {name:?}: {count} matches", count = .matches.len())]
    AmbiguousFunction {
        name: String,
        matches: Vec<FunctionKey>,
    },
}

/// Malformed configuration file. Fatal before analysis begins.
#[derive(Debug, Error)]
#[error("invalid config {path}: {message}")]
pub struct ConfigError {
    pub path: String,
    pub message: String,
}

/// Malformed stub file. The stub is skipped; analysis continues.
#[derive(Debug, Error)]
#[error("invalid stub file {path}: {problems}", problems = .errors.join("; "))]
pub struct StubError {
    pub path: String,
    pub errors: Vec<String>,
}
