//! Typed result records for query functions.
//!
//! These define the contract between queries and formatters; the JSON
//! output of each CLI command is the serialized form of one of these.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::cache::CacheStats;
use crate::model::{
    CatchSite, Confidence, Entrypoint, GlobalHandler, RaiseSite, ResolutionKind, ResolutionMode,
};

/// Result of finding raise sites for an exception.
#[derive(Debug, Serialize)]
pub struct RaisesResult {
    pub exception_type: String,
    pub include_subclasses: bool,
    pub types_searched: BTreeSet<String>,
    pub matches: Vec<RaiseSite>,
}

/// Which direction a catch matched the queried exception.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CatchMatchKind {
    /// The handler names the queried type itself.
    Exact,
    /// The handler names a base class of the queried type.
    CatchesBase,
    /// A bare `except:` (or `except Exception:`) handler.
    CatchesAll,
}

/// One catch site matching a catches query.
#[derive(Debug, Serialize)]
pub struct CatchMatch {
    pub site: CatchSite,
    /// The caught name that matched.
    pub matched_type: String,
    pub kind: CatchMatchKind,
}

/// Result of finding catch sites for an exception.
#[derive(Debug, Serialize)]
pub struct CatchesResult {
    pub exception_type: String,
    pub include_subclasses: bool,
    pub types_searched: BTreeSet<String>,
    pub matches: Vec<CatchMatch>,
    pub global_handlers: Vec<GlobalHandler>,
}

/// One caller of a function.
#[derive(Debug, Serialize)]
pub struct CallerInfo {
    pub caller: String,
    pub resolution: ResolutionKind,
}

/// Result of a callers query.
#[derive(Debug, Serialize)]
pub struct CallersResult {
    pub function: String,
    pub mode: ResolutionMode,
    pub callers: Vec<CallerInfo>,
}

/// One hop on an evidence path, origin-last.
#[derive(Debug, Serialize)]
pub struct PathHop {
    pub caller: String,
    pub callee: String,
    pub file: String,
    pub line: usize,
    pub resolution: ResolutionKind,
}

/// Evidence for one escaping exception.
#[derive(Debug, Serialize)]
pub struct EvidenceDetail {
    pub origin_file: String,
    pub origin_line: usize,
    pub path: Vec<PathHop>,
}

/// One exception escaping a function.
#[derive(Debug, Serialize)]
pub struct EscapeInfo {
    pub exception: String,
    pub confidence: Confidence,
    pub evidence: Option<EvidenceDetail>,
}

/// Result of an escapes query.
#[derive(Debug, Serialize)]
pub struct EscapesResult {
    pub function: String,
    pub mode: ResolutionMode,
    pub escapes: Vec<EscapeInfo>,
}

/// A node in the trace tree.
#[derive(Debug, Serialize)]
pub struct TraceNode {
    pub function: String,
    pub qualified: String,
    pub direct_raises: Vec<String>,
    pub escapes: Vec<String>,
    /// True for a repeat visit: rendered as "…(see above)".
    pub cycle: bool,
    pub calls: Vec<TraceNode>,
}

/// Result of a trace query.
#[derive(Debug, Serialize)]
pub struct TraceResult {
    pub function: String,
    pub max_depth: usize,
    pub root: Option<TraceNode>,
    pub escaping: Vec<String>,
}

/// One exception class in the hierarchy listing.
#[derive(Debug, Serialize)]
pub struct ExceptionClassInfo {
    pub name: String,
    pub bases: Vec<String>,
    pub file: String,
    pub line: usize,
    /// No base of this class is defined in the scanned tree.
    pub is_root: bool,
}

/// Result of the exceptions query.
#[derive(Debug, Serialize)]
pub struct ExceptionsResult {
    pub classes: Vec<ExceptionClassInfo>,
    pub roots: Vec<String>,
}

/// One subclass in a subclasses query.
#[derive(Debug, Serialize)]
pub struct SubclassInfo {
    pub name: String,
    pub file: Option<String>,
    pub line: Option<usize>,
}

/// Result of a subclasses query.
#[derive(Debug, Serialize)]
pub struct SubclassesResult {
    pub class_name: String,
    pub base_file: Option<String>,
    pub base_line: Option<usize>,
    pub subclasses: Vec<SubclassInfo>,
}

/// Result of the stats query.
#[derive(Debug, Serialize)]
pub struct StatsResult {
    pub functions: usize,
    pub classes: usize,
    pub exception_classes: usize,
    pub raise_sites: usize,
    pub catch_sites: usize,
    pub call_sites: usize,
    pub imports: usize,
    pub entrypoints: usize,
    pub http_routes: usize,
    pub cli_scripts: usize,
    pub global_handlers: usize,
    pub detected_frameworks: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheStats>,
}

/// Result of listing entrypoints.
#[derive(Debug, Serialize)]
pub struct EntrypointsResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub framework: Option<String>,
    pub http_routes: Vec<Entrypoint>,
    pub cli_scripts: Vec<Entrypoint>,
    pub other: Vec<Entrypoint>,
}

/// One uncaught exception at an entrypoint.
#[derive(Debug, Serialize)]
pub struct UncaughtInfo {
    pub exception: String,
    pub confidence: Confidence,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin_line: Option<usize>,
}

/// Audit buckets for one entrypoint.
#[derive(Debug, Default, Serialize)]
pub struct AuditBuckets {
    /// Exception -> framework response.
    pub framework_handled: BTreeMap<String, String>,
    /// Exception -> handler function.
    pub caught_by_global: BTreeMap<String, String>,
    pub locally_caught: Vec<String>,
    pub uncaught: Vec<UncaughtInfo>,
}

/// One audited entrypoint.
#[derive(Debug, Serialize)]
pub struct AuditEntry {
    pub entrypoint: Entrypoint,
    /// Resolved function key, if resolution succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_key: Option<String>,
    pub buckets: AuditBuckets,
}

impl AuditEntry {
    pub fn has_uncaught(&self) -> bool {
        !self.buckets.uncaught.is_empty()
    }
}

/// Result of a framework audit.
#[derive(Debug, Serialize)]
pub struct AuditResult {
    pub framework: String,
    pub total_entrypoints: usize,
    pub clean_count: usize,
    pub entries: Vec<AuditEntry>,
}

impl AuditResult {
    pub fn has_uncaught(&self) -> bool {
        self.entries.iter().any(|e| e.has_uncaught())
    }
}

/// One route reaching the queried exception.
#[derive(Debug, Serialize)]
pub struct RouteHit {
    pub entrypoint: Entrypoint,
    /// Which of the searched types escape it.
    pub matched: Vec<String>,
}

/// Result of a routes-to query.
#[derive(Debug, Serialize)]
pub struct RoutesToResult {
    pub framework: String,
    pub exception_type: String,
    pub include_subclasses: bool,
    pub types_searched: BTreeSet<String>,
    pub routes: Vec<RouteHit>,
}

/// Result of listing stubs.
#[derive(Debug, Serialize)]
pub struct StubsListResult {
    pub modules: Vec<StubModuleInfo>,
}

#[derive(Debug, Serialize)]
pub struct StubModuleInfo {
    pub module: String,
    pub functions: BTreeMap<String, Vec<String>>,
}
