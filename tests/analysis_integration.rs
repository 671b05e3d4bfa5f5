//! Integration tests for the full analysis pipeline.
//!
//! These tests run the analyzer against the checked-in `testdata/`
//! fixtures: a small service layer, a FastAPI-shaped API module with a
//! global handler, and a CLI tool calling a stubbed external library.

use std::path::PathBuf;

use uncaught::config::Config;
use uncaught::detect;
use uncaught::extract::ScanOptions;
use uncaught::model::{Confidence, FunctionKey, ResolutionMode};
use uncaught::query;
use uncaught::session::AnalysisSession;

fn sample_app_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("testdata")
        .join("sample_app")
}

/// Build a session over the fixture tree. The cache stays off so test
/// runs never write into the checked-in fixtures.
fn analyze_sample_app() -> AnalysisSession {
    let dir = sample_app_path();
    let config = Config::load(&dir).expect("fixture config should load");
    let scan = ScanOptions {
        use_cache: false,
        ..Default::default()
    };
    AnalysisSession::open(&dir, config, &scan).expect("fixture tree should analyze")
}

#[test]
fn sample_app_stats() {
    let session = analyze_sample_app();
    let stats = query::get_stats(&session.model, None);

    assert_eq!(stats.functions, 7);
    assert_eq!(stats.classes, 4);
    // AppError, DbError, and UpstreamFault; Repo is not an exception.
    // UpstreamFault counts through its HTTPErrorResponse base.
    assert_eq!(stats.exception_classes, 3);
    assert_eq!(stats.raise_sites, 2);
    assert_eq!(stats.catch_sites, 1);
    assert_eq!(stats.imports, 4);
    assert_eq!(stats.entrypoints, 3);
    assert_eq!(stats.http_routes, 2);
    assert_eq!(stats.cli_scripts, 1);
    assert_eq!(stats.global_handlers, 1);
    assert!(stats.detected_frameworks.is_empty());
}

#[test]
fn sample_app_exception_listing() {
    let session = analyze_sample_app();
    let result = query::find_exceptions(&session.model);

    let names: Vec<&str> = result.classes.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["AppError", "DbError", "UpstreamFault"]);

    // AppError roots the app hierarchy; UpstreamFault's base lives outside
    // the scanned tree, so it is a root too. DbError hangs off AppError.
    assert_eq!(result.roots, vec!["AppError", "UpstreamFault"]);
}

#[test]
fn sample_app_fastapi_audit() {
    let session = analyze_sample_app();
    let audit = query::audit_entrypoints(&session, &detect::fastapi_config());

    assert_eq!(audit.total_entrypoints, 2);
    assert_eq!(audit.clean_count, 1);
    assert!(audit.has_uncaught());

    let entry = |name: &str| {
        audit
            .entries
            .iter()
            .find(|e| e.entrypoint.function == name)
            .unwrap()
    };

    // list_items reaches Repo.load's KeyError with nothing in the way.
    let list_items = entry("list_items");
    assert_eq!(list_items.buckets.uncaught.len(), 1);
    assert_eq!(list_items.buckets.uncaught[0].exception, "KeyError");
    assert_eq!(list_items.buckets.uncaught[0].confidence, Confidence::High);
    assert_eq!(
        list_items.buckets.uncaught[0].origin_file.as_deref(),
        Some("services.py")
    );

    // create_item's DbError is absorbed by the AppError global handler.
    let create_item = entry("create_item");
    assert!(create_item.buckets.uncaught.is_empty());
    assert_eq!(
        create_item.buckets.caught_by_global.get("errors.DbError"),
        Some(&"handle_app_error".to_string())
    );
}

#[test]
fn sample_app_cli_audit_uses_stub() {
    let session = analyze_sample_app();
    let config = detect::FrameworkConfig {
        name: "cli".to_string(),
        ..Default::default()
    };
    let audit = query::audit_entrypoints(&session, &config);

    assert_eq!(audit.total_entrypoints, 1);
    assert!(audit.has_uncaught());
    let uncaught = &audit.entries[0].buckets.uncaught;
    assert_eq!(uncaught.len(), 1);
    assert_eq!(uncaught[0].exception, "PaymentDeclined");
}

#[test]
fn sample_app_local_catch_stops_escape() {
    let session = analyze_sample_app();
    let propagation = session.propagation(ResolutionMode::Default);

    // guarded_save catches DbError around the only raising call.
    let escapes = propagation.escapes_of(&FunctionKey::new("services.py", "guarded_save"));
    assert!(escapes.is_empty(), "got {:?}", escapes);
}

#[test]
fn sample_app_callers_of_repo_save() {
    let session = analyze_sample_app();
    let result = query::find_callers(&session, "Repo.save", ResolutionMode::Default, false)
        .expect("Repo.save should resolve");

    let callers: Vec<&str> = result.callers.iter().map(|c| c.caller.as_str()).collect();
    assert!(callers.contains(&"api.py::create_item"), "got {:?}", callers);
    assert!(
        callers.contains(&"services.py::guarded_save"),
        "got {:?}",
        callers
    );
}
