//! End-to-end scenarios: real directories of Python source through the
//! full extract -> model -> propagate -> query pipeline.

use std::fs;
use std::path::Path;

use tempfile::TempDir;

use uncaught::config::Config;
use uncaught::detect;
use uncaught::extract::ScanOptions;
use uncaught::model::{Confidence, FunctionKey, ResolutionMode};
use uncaught::query;
use uncaught::session::AnalysisSession;

fn write(dir: &Path, name: &str, content: &str) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn analyze(files: &[(&str, &str)]) -> AnalysisSession {
    let temp = TempDir::new().unwrap();
    for (name, content) in files {
        write(temp.path(), name, content);
    }
    let scan = ScanOptions {
        use_cache: false,
        ..Default::default()
    };
    AnalysisSession::open(temp.path(), Config::default(), &scan).unwrap()
}

#[test]
fn direct_raise_escapes_an_entrypoint() {
    let session = analyze(&[
        ("a.py", "def f():\n    raise ValueError(\"x\")\n"),
        (
            "b.py",
            "from a import f\n\n@app.get(\"/f\")\ndef h():\n    f()\n",
        ),
    ]);

    let propagation = session.propagation(ResolutionMode::Default);
    let escapes = propagation.escapes_of(&FunctionKey::new("b.py", "h"));
    assert!(escapes.contains("ValueError"), "got {:?}", escapes);

    let audit = query::audit_entrypoints(&session, &detect::fastapi_config());
    assert_eq!(audit.total_entrypoints, 1);
    assert!(audit.has_uncaught());

    let entry = &audit.entries[0];
    assert_eq!(entry.entrypoint.metadata.get("method").unwrap(), "GET");
    assert_eq!(entry.entrypoint.metadata.get("path").unwrap(), "/f");
    assert_eq!(entry.buckets.uncaught.len(), 1);
    assert_eq!(entry.buckets.uncaught[0].exception, "ValueError");
    assert_eq!(entry.buckets.uncaught[0].confidence, Confidence::High);
}

#[test]
fn catch_by_base_class_stops_the_subclass() {
    let session = analyze(&[
        (
            "a.py",
            "class MyErr(ValueError):\n    pass\n\ndef f():\n    raise MyErr()\n",
        ),
        (
            "b.py",
            "from a import f\n\ndef g():\n    try:\n        f()\n    except ValueError:\n        pass\n",
        ),
    ]);

    let propagation = session.propagation(ResolutionMode::Default);
    let escapes = propagation.escapes_of(&FunctionKey::new("b.py", "g"));
    assert!(!escapes.contains("MyErr"), "got {:?}", escapes);
    assert!(!escapes.contains("a.MyErr"), "got {:?}", escapes);
}

#[test]
fn reraise_does_not_double_count() {
    let temp = TempDir::new().unwrap();
    write(
        temp.path(),
        "a.py",
        "import risky_lib\n\ndef f():\n    try:\n        risky_lib.risky()\n    except KeyError as e:\n        raise\n",
    );
    // Stub the external callee to raise KeyError.
    write(
        temp.path(),
        ".uncaught/stubs/risky_lib.yaml",
        "module: risky_lib\nfunctions:\n  risky: [KeyError]\n",
    );

    let scan = ScanOptions {
        use_cache: false,
        ..Default::default()
    };
    let session = AnalysisSession::open(temp.path(), Config::default(), &scan).unwrap();

    let propagation = session.propagation(ResolutionMode::Default);
    let key = FunctionKey::new("a.py", "f");
    let escapes = propagation.escapes_of(&key);
    assert_eq!(
        escapes.into_iter().collect::<Vec<_>>(),
        vec!["KeyError".to_string()]
    );

    // The bare raise contributes no direct raise of its own.
    assert!(propagation.direct_raises_of(&key).is_empty());

    // Evidence points at the stubbed callee, not the bare raise.
    let best = propagation.best_evidence(&key, "KeyError").unwrap();
    assert_eq!(best.path.len(), 1);
    assert_eq!(
        best.path[0].resolution_kind,
        uncaught::model::ResolutionKind::Stub
    );
}

#[test]
fn name_fallback_ambiguity_default_vs_strict() {
    let files = [
        (
            "a.py",
            "class A:\n    def save(self):\n        raise OSError()\n",
        ),
        (
            "b.py",
            "class B:\n    def save(self):\n        raise ValueError()\n",
        ),
        ("c.py", "def do(x):\n    x.save()\n"),
    ];

    let session = analyze(&files);
    let key = FunctionKey::new("c.py", "do");

    let default = session.propagation(ResolutionMode::Default);
    let escapes = default.escapes_of(&key);
    assert!(escapes.contains("OSError"), "got {:?}", escapes);
    assert!(escapes.contains("ValueError"));
    for exception in ["OSError", "ValueError"] {
        let best = default.best_evidence(&key, exception).unwrap();
        assert_eq!(best.confidence(), Confidence::Low);
    }

    let strict = session.propagation(ResolutionMode::Strict);
    assert!(strict.escapes_of(&key).is_empty());
}

#[test]
fn framework_handled_exception_is_not_uncaught() {
    let session = analyze(&[(
        "a.py",
        "from fwk import HTTPException\n\n@router.get(\"/x\")\ndef h():\n    raise HTTPException(404)\n",
    )]);

    let audit = query::audit_entrypoints(&session, &detect::fastapi_config());
    assert_eq!(audit.total_entrypoints, 1);
    assert!(!audit.has_uncaught());
    assert_eq!(audit.clean_count, 1);

    let buckets = &audit.entries[0].buckets;
    assert!(buckets.framework_handled.contains_key("fwk.HTTPException"));
    assert!(buckets.uncaught.is_empty());
}

#[test]
fn constructor_tracking_through_an_inheritance_chain() {
    let files = [
        (
            "svc.py",
            "class Svc:\n    def run(self):\n        self._step()\n\nclass SvcA(Svc):\n    def _step(self):\n        raise A()\n\nclass SvcB(Svc):\n    def _step(self):\n        raise B()\n",
        ),
        (
            "caller.py",
            "from svc import SvcA\n\ndef use():\n    s = SvcA()\n    s.run()\n",
        ),
    ];

    let session = analyze(&files);
    let key = FunctionKey::new("caller.py", "use");

    let default = session.propagation(ResolutionMode::Default);
    let escapes = default.escapes_of(&key);
    assert!(escapes.contains("A"), "got {:?}", escapes);
    // The sibling implementation arrives through polymorphic expansion.
    assert!(escapes.contains("B"));
    let best = default.best_evidence(&key, "B").unwrap();
    assert_eq!(best.confidence(), Confidence::Low);

    let strict = session.propagation(ResolutionMode::Strict);
    assert!(!strict.escapes_of(&key).contains("B"));
}

#[test]
fn stub_contribution_reaches_escape_set() {
    let temp = TempDir::new().unwrap();
    write(
        temp.path(),
        "a.py",
        "import http_client\n\ndef f():\n    http_client.get(u)\n",
    );
    write(
        temp.path(),
        ".uncaught/stubs/http_client.yaml",
        "module: http_client\nfunctions:\n  get: [TimeoutError]\n",
    );

    let scan = ScanOptions {
        use_cache: false,
        ..Default::default()
    };
    let session = AnalysisSession::open(temp.path(), Config::default(), &scan).unwrap();

    let propagation = session.propagation(ResolutionMode::Default);
    let escapes = propagation.escapes_of(&FunctionKey::new("a.py", "f"));
    assert!(escapes.contains("TimeoutError"), "got {:?}", escapes);
}

#[test]
fn mode_ordering_strict_default_aggressive() {
    let files = [
        (
            "a.py",
            "class A:\n    def save(self):\n        raise OSError()\n",
        ),
        (
            "b.py",
            "from a import A\n\ndef direct():\n    a = A()\n    a.save()\n\ndef indirect(x):\n    x.save()\n",
        ),
    ];
    let session = analyze(&files);

    let strict = session.propagation(ResolutionMode::Strict);
    let default = session.propagation(ResolutionMode::Default);
    let aggressive = session.propagation(ResolutionMode::Aggressive);

    for (key, strict_escapes) in &strict.escapes {
        let default_escapes = default.escapes.get(key).cloned().unwrap_or_default();
        let aggressive_escapes = aggressive.escapes.get(key).cloned().unwrap_or_default();
        assert!(strict_escapes.is_subset(&default_escapes), "{}", key);
        assert!(default_escapes.is_subset(&aggressive_escapes), "{}", key);
    }
}

#[test]
fn cli_script_audit_covers_module_scope() {
    let session = analyze(&[(
        "tool.py",
        "def main():\n    raise RuntimeError(\"boom\")\n\nif __name__ == \"__main__\":\n    main()\n",
    )]);

    let config = detect::FrameworkConfig {
        name: "cli".to_string(),
        ..Default::default()
    };
    let audit = query::audit_entrypoints(&session, &config);
    assert_eq!(audit.total_entrypoints, 1);
    assert!(audit.has_uncaught());
    assert_eq!(audit.entries[0].buckets.uncaught[0].exception, "RuntimeError");
}

#[test]
fn global_handler_absorbs_registered_exception() {
    let session = analyze(&[(
        "api.py",
        r#"class AppError(Exception):
    pass

@app.exception_handler(AppError)
def handle(request, exc):
    pass

@router.get("/x")
def h():
    raise AppError()
"#,
    )]);

    let audit = query::audit_entrypoints(&session, &detect::fastapi_config());
    assert!(!audit.has_uncaught());
    assert!(audit.entries[0]
        .buckets
        .caught_by_global
        .contains_key("AppError"));
}

#[test]
fn handled_base_classes_config_extends_framework_handling() {
    let temp = TempDir::new().unwrap();
    write(
        temp.path(),
        "api.py",
        "class ApiError(Exception):\n    pass\n\nclass NotFound(ApiError):\n    pass\n\n@router.get(\"/x\")\ndef h():\n    raise NotFound()\n",
    );
    write(
        temp.path(),
        ".uncaught/config.yaml",
        "handled_base_classes:\n  - ApiError\n",
    );

    let config = Config::load(temp.path()).unwrap();
    let scan = ScanOptions {
        use_cache: false,
        ..Default::default()
    };
    let session = AnalysisSession::open(temp.path(), config, &scan).unwrap();

    let audit = query::audit_entrypoints(&session, &detect::fastapi_config());
    assert!(!audit.has_uncaught(), "NotFound should be handled via ApiError");
}

#[test]
fn async_boundary_severs_propagation() {
    let temp = TempDir::new().unwrap();
    write(
        temp.path(),
        "tasks.py",
        "def heavy():\n    raise MemoryError()\n",
    );
    write(
        temp.path(),
        "api.py",
        "from tasks import heavy\n\ndef enqueue():\n    heavy()\n",
    );
    write(temp.path(), ".uncaught/config.yaml", "async_boundaries:\n  - heavy\n");

    let config = Config::load(temp.path()).unwrap();
    let scan = ScanOptions {
        use_cache: false,
        ..Default::default()
    };
    let session = AnalysisSession::open(temp.path(), config, &scan).unwrap();

    let propagation = session.propagation(ResolutionMode::Default);
    let escapes = propagation.escapes_of(&FunctionKey::new("api.py", "enqueue"));
    assert!(!escapes.contains("MemoryError"), "got {:?}", escapes);
}

#[test]
fn routes_to_walks_back_to_entrypoints() {
    let session = analyze(&[
        ("svc.py", "def boom():\n    raise OSError()\n"),
        (
            "api.py",
            "from svc import boom\n\n@router.get(\"/x\")\ndef route_x():\n    boom()\n\n@router.get(\"/y\")\ndef route_y():\n    return 1\n",
        ),
    ]);

    let result =
        query::routes_to_exception(&session, &detect::fastapi_config(), "OSError", false);
    assert_eq!(result.routes.len(), 1);
    assert_eq!(result.routes[0].entrypoint.function, "route_x");
    assert_eq!(result.routes[0].matched, vec!["OSError".to_string()]);
}
