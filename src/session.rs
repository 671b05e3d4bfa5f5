//! Analysis session: owns the immutable model plus the per-mode
//! propagation memo.
//!
//! All mutable analysis state is scoped here; there are no process-wide
//! singletons. The memo lives for the session and is dropped with it.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

use crate::config::{Config, CONFIG_DIR};
use crate::errors::StubError;
use crate::extract::{self, ScanOptions};
use crate::model::{ProgramModel, ResolutionMode};
use crate::propagate::{propagate, PropagateOptions, PropagationResult};
use crate::stubs::{self, StubLibrary};

pub struct AnalysisSession {
    pub model: ProgramModel,
    pub config: Config,
    pub stubs: StubLibrary,
    /// Stub files skipped during loading.
    pub stub_errors: Vec<StubError>,
    memo: RwLock<HashMap<ResolutionMode, Arc<PropagationResult>>>,
}

impl AnalysisSession {
    /// Build a session for a project directory: load config and stubs,
    /// scan the tree into a model.
    pub fn open(directory: &Path, config: Config, scan: &ScanOptions) -> anyhow::Result<Self> {
        let config_dir = directory.join(CONFIG_DIR);

        let mut options = ScanOptions {
            exclude: scan.exclude.clone(),
            use_cache: scan.use_cache,
            progress: scan.progress.clone(),
        };
        options.exclude.extend(config.exclude.iter().cloned());

        let model = extract::build_model(directory, &config_dir, &options)?;
        let (stub_library, stub_errors) = stubs::load_stubs(&config_dir);

        Ok(Self::new(model, config, stub_library, stub_errors))
    }

    pub fn new(
        model: ProgramModel,
        config: Config,
        stubs: StubLibrary,
        stub_errors: Vec<StubError>,
    ) -> Self {
        Self {
            model,
            config,
            stubs,
            stub_errors,
            memo: RwLock::new(HashMap::new()),
        }
    }

    /// Propagation result for a mode, computed lazily and memoized.
    ///
    /// `aggressive` shares the `default` result: the declared fuzzy
    /// expansion collapsed into default resolution.
    pub fn propagation(&self, mode: ResolutionMode) -> Arc<PropagationResult> {
        let mode = match mode {
            ResolutionMode::Aggressive => ResolutionMode::Default,
            other => other,
        };

        if let Some(result) = self.memo.read().unwrap().get(&mode) {
            return result.clone();
        }

        let result = Arc::new(propagate(
            &self.model,
            Some(&self.stubs),
            &PropagateOptions {
                mode,
                skip_evidence: false,
                async_boundaries: self.config.async_boundaries.clone(),
            },
        ));
        self.memo
            .write()
            .unwrap()
            .insert(mode, result.clone());
        result
    }

    /// Drop memoized propagation results (used after a model rebuild).
    pub fn clear_propagation(&self) {
        self.memo.write().unwrap().clear();
    }
}
