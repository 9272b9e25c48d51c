//! REST surface tests driven through the router with `tower::ServiceExt`.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use common::ScriptedSource;
use dbpulse_daemon::collectors::{MetricSource, SourceRegistry};
use dbpulse_daemon::config::DaemonConfig;
use dbpulse_daemon::storage::InMemoryStorage;
use dbpulse_daemon::Server;
use dbpulse_types::{CollectorKind, MonitoredInstance};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tower::ServiceExt;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn server_with(sources: Vec<Arc<ScriptedSource>>) -> Server {
    let mut config = DaemonConfig::default();
    config.scheduler.autostart = false;
    config.inventory.instances = vec![MonitoredInstance::new("SQLPROD01", "sqlprod01.local")];

    let registry = sources.into_iter().fold(SourceRegistry::new(), |registry, source| {
        registry.with_source(source as Arc<dyn MetricSource>)
    });
    Server::with_parts(config, Arc::new(InMemoryStorage::new()), registry)
        .await
        .unwrap()
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn wait_until_idle(app: &Router) {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let (_, health) = call(app, "GET", "/api/v1/health", None).await;
            if health["running_collectors"].as_array().unwrap().is_empty() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("collector runs did not settle");
}

// ---------------------------------------------------------------------------
// Collectors
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_reports_version_and_idle_collectors() {
    let app = server_with(Vec::new()).await.router();

    let (status, body) = call(&app, "GET", "/api/v1/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert!(body["running_collectors"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn lists_every_seeded_collector() {
    let app = server_with(Vec::new()).await.router();

    let (status, body) = call(&app, "GET", "/api/v1/collectors", None).await;
    assert_eq!(status, StatusCode::OK);
    let collectors = body.as_array().unwrap();
    assert_eq!(collectors.len(), 13);

    let cpu = collectors.iter().find(|c| c["kind"] == "cpu").unwrap();
    assert_eq!(cpu["display_name"], "CPU");
    assert_eq!(cpu["enabled"], true);
    assert_eq!(cpu["running"], false);
}

#[tokio::test]
async fn invalid_collector_update_is_rejected() {
    let app = server_with(Vec::new()).await.router();

    let (status, body) = call(
        &app,
        "PUT",
        "/api/v1/collectors/cpu",
        Some(json!({ "interval_secs": 10 })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (status, _) = call(
        &app,
        "PUT",
        "/api/v1/collectors/cpu",
        Some(json!({ "parallel_degree": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn weight_change_returns_total_warning() {
    let app = server_with(Vec::new()).await.router();

    let (status, body) = call(
        &app,
        "PUT",
        "/api/v1/collectors/cpu",
        Some(json!({ "weight": 20.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["config"]["weight"], 20.0);
    assert_eq!(body["weights"]["total_weight"], 110.0);
    assert!(body["weights"]["warning"].is_string());

    let (_, weights) = call(&app, "GET", "/api/v1/collectors/weights", None).await;
    assert_eq!(weights["total_weight"], 110.0);
}

#[tokio::test]
async fn unknown_collector_is_not_found() {
    let app = server_with(Vec::new()).await.router();

    let (status, body) = call(&app, "POST", "/api/v1/collectors/replication/run", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn manual_run_is_accepted_then_logged() {
    let cpu = ScriptedSource::new(CollectorKind::Cpu);
    cpu.set("SQLPROD01", &[("Utilization", 95.0)]);
    let app = server_with(vec![cpu]).await.router();

    let (status, body) = call(&app, "POST", "/api/v1/collectors/cpu/run", None).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let run_id = body["run_id"].as_str().unwrap().to_string();
    assert_eq!(body["kind"], "cpu");

    wait_until_idle(&app).await;

    let (status, logs) = call(&app, "GET", "/api/v1/collectors/cpu/executions?limit=5", None).await;
    assert_eq!(status, StatusCode::OK);
    let logs = logs.as_array().unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0]["run_id"], run_id);
    assert_eq!(logs[0]["status"], "completed");
    assert_eq!(logs[0]["trigger"], "manual");
    assert_eq!(logs[0]["success_count"], 1);

    let (status, categories) =
        call(&app, "GET", "/api/v1/scores/SQLPROD01/categories", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(categories[0]["score"], 70.0);
}

#[tokio::test]
async fn overlapping_manual_run_conflicts() {
    let gate = Arc::new(Semaphore::new(0));
    let cpu = ScriptedSource::gated(CollectorKind::Cpu, gate.clone());
    cpu.set("SQLPROD01", &[("Utilization", 20.0)]);
    let app = server_with(vec![cpu]).await.router();

    let (status, _) = call(&app, "POST", "/api/v1/collectors/cpu/run", None).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let (status, body) = call(&app, "POST", "/api/v1/collectors/cpu/run", None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CONFLICT");

    let (_, collectors) = call(&app, "GET", "/api/v1/collectors", None).await;
    let cpu = collectors
        .as_array()
        .unwrap()
        .iter()
        .find(|c| c["kind"] == "cpu")
        .cloned()
        .unwrap();
    assert_eq!(cpu["running"], true);

    gate.add_permits(1);
    wait_until_idle(&app).await;
}

#[tokio::test]
async fn disabled_collector_run_is_rejected() {
    let app = server_with(Vec::new()).await.router();

    let (status, _) = call(
        &app,
        "PUT",
        "/api/v1/collectors/tempdb_config",
        Some(json!({ "enabled": false })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = call(&app, "POST", "/api/v1/collectors/tempdb_config/run", None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

#[tokio::test]
async fn rules_can_be_replaced_and_reset() {
    let app = server_with(Vec::new()).await.router();

    let (status, defaults) = call(&app, "GET", "/api/v1/collectors/cpu/rules", None).await;
    assert_eq!(status, StatusCode::OK);
    let default_count = defaults.as_array().unwrap().len();
    assert!(default_count > 0);

    let custom = json!([{
        "kind": "cpu",
        "group": "Utilization",
        "position": 1,
        "operator": ">",
        "threshold": 80.0,
        "action": "penalty",
        "value": 25.0
    }]);
    let (status, replaced) =
        call(&app, "PUT", "/api/v1/collectors/cpu/rules", Some(custom)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(replaced.as_array().unwrap().len(), 1);

    let (status, reset) = call(&app, "POST", "/api/v1/collectors/cpu/rules/reset", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reset.as_array().unwrap().len(), default_count);
}

#[tokio::test]
async fn rule_with_out_of_range_value_is_rejected() {
    let app = server_with(Vec::new()).await.router();

    let invalid = json!([{
        "kind": "cpu",
        "group": "Utilization",
        "position": 1,
        "operator": ">",
        "threshold": 80.0,
        "action": "penalty",
        "value": 140.0
    }]);
    let (status, _) = call(&app, "PUT", "/api/v1/collectors/cpu/rules", Some(invalid)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

// ---------------------------------------------------------------------------
// Exceptions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn exception_lifecycle() {
    let app = server_with(Vec::new()).await.router();

    let (status, kinds) =
        call(&app, "GET", "/api/v1/collectors/backups/exception-kinds", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(kinds["exception_kinds"]
        .as_array()
        .unwrap()
        .contains(&json!("backups_managed_externally")));

    let (status, created) = call(
        &app,
        "POST",
        "/api/v1/collectors/backups/exceptions",
        Some(json!({
            "server": "SQLPROD01",
            "exception_kind": "backups_managed_externally",
            "reason": "Storage snapshots",
            "created_by": "dba"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_str().unwrap().to_string();

    let (_, listed) = call(&app, "GET", "/api/v1/collectors/backups/exceptions", None).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let uri = format!("/api/v1/exceptions/{}", id);
    let (status, _) = call(&app, "DELETE", &uri, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = call(&app, "DELETE", &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = call(&app, "DELETE", "/api/v1/exceptions/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn exception_with_unsupported_label_is_rejected() {
    let app = server_with(Vec::new()).await.router();

    let (status, _) = call(
        &app,
        "POST",
        "/api/v1/collectors/cpu/exceptions",
        Some(json!({
            "server": "SQLPROD01",
            "exception_kind": "no_full_backup_required",
            "created_by": "dba"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

// ---------------------------------------------------------------------------
// Scores
// ---------------------------------------------------------------------------

#[tokio::test]
async fn consolidation_populates_scores_and_summary() {
    let cpu = ScriptedSource::new(CollectorKind::Cpu);
    cpu.set("SQLPROD01", &[("Utilization", 95.0)]);
    let app = server_with(vec![cpu]).await.router();

    let (status, _) = call(&app, "GET", "/api/v1/scores/SQLPROD01", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    call(&app, "POST", "/api/v1/collectors/cpu/run", None).await;
    wait_until_idle(&app).await;

    let (status, report) = call(&app, "POST", "/api/v1/consolidation/run", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["instances_scored"], 1);

    let (status, score) = call(&app, "GET", "/api/v1/scores/SQLPROD01", None).await;
    assert_eq!(status, StatusCode::OK);
    // Only CPU has a score, so it carries the whole weight
    assert_eq!(score["final_score"], 70.0);
    assert_eq!(score["status"], "warning");

    let (_, scores) = call(&app, "GET", "/api/v1/scores", None).await;
    assert_eq!(scores.as_array().unwrap().len(), 1);

    let (status, summary) = call(&app, "GET", "/api/v1/summary", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["fleet"]["total_instances"], 1);
    assert_eq!(summary["fleet"]["warning_count"], 1);
    assert_eq!(summary["transitions"]["total"], 0);

    let (status, transitions) =
        call(&app, "GET", "/api/v1/transitions?server=SQLPROD01", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(transitions.as_array().unwrap().is_empty());
}
