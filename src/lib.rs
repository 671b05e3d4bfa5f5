//! Uncaught - static exception-flow analyzer for Python codebases.
//!
//! Given a directory of Python source, uncaught answers: for each
//! externally reachable entrypoint (HTTP route handler, CLI script),
//! which exception types can propagate out unhandled? It also supports
//! point queries: where an exception is raised or caught, who calls a
//! function, and what escapes from it.
//!
//! # Architecture
//!
//! The analysis is a three-stage pipeline:
//!
//! ```text
//! files ──▶ extract ──▶ FileExtraction ──▶ model ──▶ ProgramModel
//!              ▲              │                          │
//!              │              ▼                          ▼
//!           detect          cache                    propagate
//!                                                        │
//!                                                        ▼
//!                                               PropagationResult
//!                                                        │
//!                                                        ▼
//!                                                      query
//! ```
//!
//! - `extract`: tree-sitter CST walk producing per-file fact tables
//! - `detect`: configurable pattern matchers classifying decorators and
//!   class bases as entrypoints or global handlers
//! - `model`: merged program model, class hierarchy, name index
//! - `propagate`: call graph plus a monotone fixpoint computing per-
//!   function escape sets with evidence
//! - `query`: typed answers for audits, traces, and point lookups
//! - `cache`: content-addressed per-file persistence of extractions
//!
//! The analysis is deliberately over- and under-approximate: it tracks
//! names, not values, and stays flow-insensitive within functions.

pub mod cache;
pub mod cli;
pub mod config;
pub mod detect;
pub mod errors;
pub mod extract;
pub mod model;
pub mod propagate;
pub mod query;
pub mod report;
pub mod session;
pub mod stubs;

pub use config::Config;
pub use errors::{ConfigError, ResolveError, StubError};
pub use model::{FileExtraction, FunctionKey, ProgramModel, ResolutionMode};
pub use propagate::{PropagationResult, MAX_ITERATIONS};
pub use session::AnalysisSession;
pub use stubs::StubLibrary;
