//! Directory extraction: file discovery, parallel per-file extraction,
//! detector runs, and cache consultation.

mod python;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use walkdir::WalkDir;

pub use python::{ParsedFile, PythonExtractor};

use crate::cache::FileCache;
use crate::detect::{self, Detector};
use crate::model::{FileExtraction, ProgramModel};

/// Directories never worth scanning.
const DEFAULT_EXCLUDED_DIRS: &[&str] = &[
    "__pycache__",
    ".venv",
    "venv",
    "site-packages",
    "node_modules",
    ".git",
    "dist",
    "build",
    ".tox",
    ".mypy_cache",
];

/// Progress callback: (processed, total).
pub type ProgressCallback = Arc<dyn Fn(usize, usize) + Send + Sync>;

/// Options for a directory scan.
pub struct ScanOptions {
    /// Extra exclude globs from config or CLI.
    pub exclude: Vec<String>,
    pub use_cache: bool,
    pub progress: Option<ProgressCallback>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            exclude: Vec::new(),
            use_cache: true,
            progress: None,
        }
    }
}

/// Enumerate Python files under a directory, applying excludes.
///
/// Returned paths are (absolute, relative) pairs sorted by relative path.
pub fn collect_python_files(
    root: &Path,
    exclude: &[String],
) -> anyhow::Result<Vec<(PathBuf, String)>> {
    let matchers: Vec<_> = exclude
        .iter()
        .filter_map(|p| globset::Glob::new(p).ok().map(|g| g.compile_matcher()))
        .collect();

    let mut files = Vec::new();
    for entry in WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| {
            let name = e.file_name().to_string_lossy();
            if e.depth() > 0 && e.file_type().is_dir() && name.starts_with('.') && name != "." {
                return false;
            }
            if e.file_type().is_dir() && DEFAULT_EXCLUDED_DIRS.contains(&name.as_ref()) {
                return false;
            }
            true
        })
    {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("py") {
            continue;
        }

        let relative = path
            .strip_prefix(root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/");

        if matchers.iter().any(|m| m.is_match(&relative)) {
            continue;
        }
        files.push((path.to_path_buf(), relative));
    }

    files.sort_by(|a, b| a.1.cmp(&b.1));
    Ok(files)
}

/// Extract one file: cache lookup, CST walk, detector runs.
fn extract_one(
    extractor: &PythonExtractor,
    detectors: &[Box<dyn Detector>],
    cache: Option<&FileCache>,
    absolute: &Path,
    relative: &str,
) -> FileExtraction {
    let source = match std::fs::read(absolute) {
        Ok(bytes) => bytes,
        Err(e) => return FileExtraction::failed(format!("{}: {}", relative, e)),
    };

    if let Some(cache) = cache {
        if let Some(hit) = cache.get(relative, &source) {
            return hit;
        }
    }

    let mut extraction = match extractor.parse(relative, &source) {
        Ok(parsed) => {
            let mut extraction = extractor.extract(&parsed);
            let (entrypoints, handlers) = detect::run_detectors(detectors, &parsed);
            extraction.entrypoints = entrypoints;
            extraction.global_handlers = handlers;
            extraction
        }
        Err(e) => FileExtraction::failed(format!("{}: {}", relative, e)),
    };

    extraction.entrypoints.sort_by(|a, b| (a.line, a.function.clone()).cmp(&(b.line, b.function.clone())));
    extraction
        .global_handlers
        .sort_by(|a, b| (a.line, a.handled_type.clone()).cmp(&(b.line, b.handled_type.clone())));

    if let Some(cache) = cache {
        cache.put(relative, &source, &extraction);
    }
    extraction
}

/// Scan a directory into a `ProgramModel`.
///
/// Files are extracted in parallel; each worker owns its file's source and
/// tree. Merging is sequential, so extraction order never shows in the
/// output. A parse failure contributes an empty extraction with a
/// diagnostic and the scan continues.
pub fn build_model(
    root: &Path,
    config_dir: &Path,
    options: &ScanOptions,
) -> anyhow::Result<ProgramModel> {
    let files = collect_python_files(root, &options.exclude)?;
    let total = files.len();

    let cache = options.use_cache.then(|| FileCache::open(config_dir));

    let mut detectors = detect::builtin_detectors();
    let (user_detectors, detector_diagnostics) = detect::load_user_detectors(config_dir);
    detectors.extend(user_detectors);

    let extractor = PythonExtractor::new();
    let processed = AtomicUsize::new(0);
    let progress = options.progress.clone();

    let extractions: Vec<(String, FileExtraction)> = files
        .par_iter()
        .map(|(absolute, relative)| {
            let extraction =
                extract_one(&extractor, &detectors, cache.as_ref(), absolute, relative);
            let done = processed.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(cb) = &progress {
                cb(done, total);
            }
            (relative.clone(), extraction)
        })
        .collect();

    if let Some(cache) = &cache {
        cache.flush();
    }

    let mut model = ProgramModel::assemble(extractions);
    model.diagnostics.extend(detector_diagnostics);
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    #[test]
    fn collects_only_python_files() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "a.py", "x = 1\n");
        write(temp.path(), "b.txt", "not python\n");
        write(temp.path(), "pkg/c.py", "y = 2\n");
        write(temp.path(), ".venv/lib/site.py", "z = 3\n");

        let files = collect_python_files(temp.path(), &[]).unwrap();
        let relatives: Vec<&str> = files.iter().map(|(_, r)| r.as_str()).collect();
        assert_eq!(relatives, vec!["a.py", "pkg/c.py"]);
    }

    #[test]
    fn exclude_globs_apply() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "a.py", "x = 1\n");
        write(temp.path(), "generated/g.py", "y = 2\n");

        let files =
            collect_python_files(temp.path(), &["generated/**".to_string()]).unwrap();
        let relatives: Vec<&str> = files.iter().map(|(_, r)| r.as_str()).collect();
        assert_eq!(relatives, vec!["a.py"]);
    }

    #[test]
    fn model_builds_from_directory() {
        let temp = TempDir::new().unwrap();
        write(
            temp.path(),
            "svc.py",
            "def helper():\n    raise ValueError(\"x\")\n",
        );
        write(
            temp.path(),
            "api.py",
            "from svc import helper\n\n@app.route(\"/x\")\ndef handler():\n    helper()\n",
        );

        let options = ScanOptions {
            use_cache: false,
            ..Default::default()
        };
        let model = build_model(temp.path(), &temp.path().join(".uncaught"), &options).unwrap();

        assert_eq!(model.functions.len(), 2);
        assert_eq!(model.raise_sites.len(), 1);
        assert_eq!(model.entrypoints.len(), 1);
        assert_eq!(model.entrypoints[0].function, "handler");
    }

    #[test]
    fn unreadable_and_unparsable_files_degrade_to_diagnostics() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "good.py", "def f():\n    pass\n");
        write(temp.path(), "bad.py", "def broken(:\n");

        let options = ScanOptions {
            use_cache: false,
            ..Default::default()
        };
        let model = build_model(temp.path(), &temp.path().join(".uncaught"), &options).unwrap();

        // The good file still contributes.
        assert!(model.functions.keys().any(|k| k.file() == "good.py"));
        assert!(model.diagnostics.iter().any(|d| d.contains("bad.py")));
    }

    #[test]
    fn second_build_hits_cache_and_agrees() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "a.py", "def f():\n    raise KeyError()\n");
        let config_dir = temp.path().join(".uncaught");

        let options = ScanOptions::default();
        let first = build_model(temp.path(), &config_dir, &options).unwrap();
        let second = build_model(temp.path(), &config_dir, &options).unwrap();

        assert_eq!(first.raise_sites, second.raise_sites);
        assert!(config_dir.join(crate::cache::CACHE_FILENAME).exists());
    }
}
