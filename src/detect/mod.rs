//! Detector framework: configurable pattern matchers that classify
//! decorators and class bases as entrypoints or global handlers.
//!
//! Builtin framework configurations live in `frameworks`; users add their
//! own as YAML `FrameworkConfig` records under `<config-dir>/detectors/`.

mod frameworks;
mod patterns;

use std::fs;
use std::path::Path;

pub use frameworks::{django_config, fastapi_config, flask_config, get_framework_config};
pub use patterns::{
    detect_cli_entrypoint, ClassRoutePattern, DecoratorRoutePattern, FrameworkConfig,
    HandlerPattern, RegistrationCallPattern, HTTP_METHOD_NAMES,
};

use crate::extract::ParsedFile;
use crate::model::{Entrypoint, GlobalHandler};

/// A detector classifies source constructs as entrypoints or handlers.
pub trait Detector: Send + Sync {
    fn name(&self) -> &str;
    fn detect_entrypoints(&self, parsed: &ParsedFile) -> Vec<Entrypoint>;
    fn detect_global_handlers(&self, parsed: &ParsedFile) -> Vec<GlobalHandler>;
}

/// Detector driven by a `FrameworkConfig`.
pub struct GenericDetector {
    config: FrameworkConfig,
}

impl GenericDetector {
    pub fn new(config: FrameworkConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FrameworkConfig {
        &self.config
    }
}

impl Detector for GenericDetector {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn detect_entrypoints(&self, parsed: &ParsedFile) -> Vec<Entrypoint> {
        patterns::detect_entrypoints(parsed, &self.config)
    }

    fn detect_global_handlers(&self, parsed: &ParsedFile) -> Vec<GlobalHandler> {
        patterns::detect_global_handlers(parsed, &self.config)
    }
}

/// Detector for `if __name__ == "__main__":` CLI scripts.
pub struct CliScriptDetector;

impl Detector for CliScriptDetector {
    fn name(&self) -> &str {
        "cli"
    }

    fn detect_entrypoints(&self, parsed: &ParsedFile) -> Vec<Entrypoint> {
        detect_cli_entrypoint(parsed).into_iter().collect()
    }

    fn detect_global_handlers(&self, _parsed: &ParsedFile) -> Vec<GlobalHandler> {
        Vec::new()
    }
}

/// The builtin detector set: flask, fastapi, django, plus CLI scripts.
pub fn builtin_detectors() -> Vec<Box<dyn Detector>> {
    vec![
        Box::new(GenericDetector::new(flask_config())),
        Box::new(GenericDetector::new(fastapi_config())),
        Box::new(GenericDetector::new(django_config())),
        Box::new(CliScriptDetector),
    ]
}

/// Load user detector records from `<config-dir>/detectors/*.yaml`.
///
/// Malformed files are skipped with a diagnostic; analysis continues.
pub fn load_user_detectors(config_dir: &Path) -> (Vec<Box<dyn Detector>>, Vec<String>) {
    let mut detectors: Vec<Box<dyn Detector>> = Vec::new();
    let mut diagnostics = Vec::new();

    let dir = config_dir.join("detectors");
    let Ok(entries) = fs::read_dir(&dir) else {
        return (detectors, diagnostics);
    };

    let mut paths: Vec<_> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .map(|e| e == "yaml" || e == "yml")
                .unwrap_or(false)
        })
        .collect();
    paths.sort();

    for path in paths {
        match fs::read_to_string(&path) {
            Ok(content) => match serde_yaml::from_str::<FrameworkConfig>(&content) {
                Ok(config) => detectors.push(Box::new(GenericDetector::new(config))),
                Err(e) => diagnostics.push(format!("skipping detector {}: {}", path.display(), e)),
            },
            Err(e) => diagnostics.push(format!("skipping detector {}: {}", path.display(), e)),
        }
    }

    (detectors, diagnostics)
}

/// Run every detector over a parsed file.
pub fn run_detectors(
    detectors: &[Box<dyn Detector>],
    parsed: &ParsedFile,
) -> (Vec<Entrypoint>, Vec<GlobalHandler>) {
    let mut entrypoints = Vec::new();
    let mut handlers = Vec::new();
    for detector in detectors {
        entrypoints.extend(detector.detect_entrypoints(parsed));
        handlers.extend(detector.detect_global_handlers(parsed));
    }
    (entrypoints, handlers)
}
