//! Application assembly through the public builder
//!
//! Stub modules stand in for the real API so the graph rules can be
//! exercised end to end, including serving the assembled routes.

mod common;

use axum::http::StatusCode;
use axum_test::TestServer;
use rehab::core::resource::Handlers;
use rehab::prelude::*;
use rehab::server::{AssemblyReport, Duplicate};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;

async fn pong() -> &'static str {
    "pong"
}

struct Stub {
    name: &'static str,
    path: &'static str,
    dependencies: &'static [&'static str],
}

impl Resource for Stub {
    fn name(&self) -> &str {
        self.name
    }

    fn path(&self) -> &str {
        self.path
    }

    fn dependencies(&self) -> BTreeSet<String> {
        self.dependencies.iter().map(|d| d.to_string()).collect()
    }

    fn handlers(&self) -> Handlers {
        Handlers::new().get(pong)
    }
}

struct StubModule {
    name: &'static str,
    resources: Vec<StubResource>,
}

impl ResourceModule for StubModule {
    fn name(&self) -> &str {
        self.name
    }

    fn resources(&self) -> Vec<Arc<dyn Resource>> {
        self.resources
            .iter()
            .map(|&(name, path, dependencies)| {
                Arc::new(Stub {
                    name,
                    path,
                    dependencies,
                }) as Arc<dyn Resource>
            })
            .collect()
    }
}

type StubResource = (&'static str, &'static str, &'static [&'static str]);

fn module(name: &'static str, resources: Vec<StubResource>) -> StubModule {
    StubModule { name, resources }
}

fn res(
    name: &'static str,
    path: &'static str,
    dependencies: &'static [&'static str],
) -> StubResource {
    (name, path, dependencies)
}

fn builder(entry: &str, modules: Vec<StubModule>) -> anyhow::Result<ServerBuilder> {
    let mut config = AppConfig::default();
    config.server.entry_module = entry.to_string();

    let mut builder = ServerBuilder::new()
        .with_config(config)
        .with_store(InMemoryStore::new());
    for m in modules {
        builder = builder.register_module(m)?;
    }
    Ok(builder)
}

fn report(entry: &str, modules: Vec<StubModule>) -> anyhow::Result<AssemblyReport> {
    Ok(builder(entry, modules)?.build_host()?.report)
}

fn assembly_error(result: anyhow::Result<AssemblyReport>) -> AssemblyError {
    match result {
        Ok(report) => panic!("assembly should fail, got {:?}", report),
        Err(err) => err
            .downcast::<AssemblyError>()
            .expect("failure is an assembly error"),
    }
}

#[tokio::test]
async fn test_entry_and_dependency_are_both_served() {
    let app = builder(
        "app",
        vec![
            module("app", vec![res("index", "/", &["auth"])]),
            module("auth", vec![res("accounts", "/accounts", &[])]),
        ],
    )
    .expect("modules register")
    .build()
    .expect("assembles");

    let server = TestServer::try_new(app).expect("Failed to create test server");
    server.get("/").await.assert_text("pong");
    server.get("/accounts").await.assert_text("pong");
    server.get("/elsewhere").await.assert_status_not_found();
}

#[tokio::test]
async fn test_unreferenced_module_is_not_mounted() {
    let report = report(
        "app",
        vec![
            module("app", vec![res("index", "/", &[])]),
            module("orphan", vec![res("orphan", "/orphan", &[])]),
        ],
    )
    .expect("assembles");

    assert_eq!(report.modules, vec!["app"]);
    assert_eq!(report.paths, vec!["/"]);
}

#[tokio::test]
async fn test_shared_dependency_is_walked_once() {
    let report = report(
        "app",
        vec![
            module("app", vec![res("index", "/", &["left", "right"])]),
            module("left", vec![res("left", "/left", &["base"])]),
            module("right", vec![res("right", "/right", &["base"])]),
            module("base", vec![res("base", "/base", &[])]),
        ],
    )
    .expect("diamonds are allowed");

    assert_eq!(report.modules, vec!["app", "left", "base", "right"]);
    assert_eq!(report.paths.len(), 4);
}

#[tokio::test]
async fn test_self_dependency_is_a_cycle() {
    let err = assembly_error(report(
        "app",
        vec![module("app", vec![res("index", "/", &["app"])])],
    ));

    match err {
        AssemblyError::DependencyCycle { cycle } => assert_eq!(cycle, vec!["app", "app"]),
        other => panic!("expected a cycle, got {}", other),
    }
}

#[tokio::test]
async fn test_indirect_cycle_names_the_loop() {
    let err = assembly_error(report(
        "app",
        vec![
            module("app", vec![res("index", "/", &["a"])]),
            module("a", vec![res("a", "/a", &["b"])]),
            module("b", vec![res("b", "/b", &["a"])]),
        ],
    ));

    assert_eq!(err.to_string(), "dependency cycle: a -> b -> a");
}

#[tokio::test]
async fn test_two_modules_claiming_one_path_fail() {
    let err = assembly_error(report(
        "app",
        vec![
            module("app", vec![res("index", "/", &["other"]), res("x", "/x", &[])]),
            module("other", vec![res("also_x", "/x", &[])]),
        ],
    ));

    match err {
        AssemblyError::DuplicateRegistration(Duplicate::Path { path, claimed_by }) => {
            assert_eq!(path, "/x");
            assert_eq!(claimed_by, "x");
        }
        other => panic!("expected a duplicate path, got {}", other),
    }
}

#[tokio::test]
async fn test_missing_dependency_fails() {
    let err = assembly_error(report(
        "app",
        vec![module("app", vec![res("index", "/", &["ghost"])])],
    ));
    assert!(matches!(err, AssemblyError::Configuration { .. }));
}

#[tokio::test]
async fn test_registering_a_module_twice_fails() {
    let result = builder(
        "app",
        vec![
            module("app", vec![res("index", "/", &[])]),
            module("app", vec![res("index", "/", &[])]),
        ],
    );
    let err = result
        .err()
        .expect("second registration fails")
        .downcast::<AssemblyError>()
        .expect("failure is an assembly error");
    assert!(matches!(
        err,
        AssemblyError::DuplicateRegistration(Duplicate::Module(_))
    ));
}

#[tokio::test]
async fn test_default_application_assembles_from_app() {
    let h = common::harness().await;

    let response = h.server.get("/").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["_links"]["self"]["href"], "/");
    assert_eq!(body["_links"]["rd:forms"]["href"], "/forms");

    let response = h.server.get("/health").await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["status"], "ok");

    h.server
        .get("/search/patients")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}
