//! End-to-end tests of the `omix` binary against a stub backend.

use std::collections::HashMap;

use assert_cmd::Command;
use axum::extract::{Path, Query};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use predicates::str::contains;
use serde_json::{json, Value};
use tempfile::TempDir;

fn experiment_json(id: u64) -> Value {
    json!({
        "id": id,
        "name": format!("BRCA run {id}"),
        "type": 1,
        "correlation_method": 3,
        "state": 1,
        "submit_date": "2024-03-01T12:00:00Z",
        "result_final_row_count": 12,
        "tag": {"id": 1, "name": "breast"}
    })
}

async fn list_experiments() -> Json<Value> {
    Json(json!({"count": 2, "results": [experiment_json(7), experiment_json(8)]}))
}

async fn get_experiment(Path(id): Path<u64>) -> Response {
    if id == 404 {
        return StatusCode::NOT_FOUND.into_response();
    }
    Json(experiment_json(id)).into_response()
}

async fn delete_experiment() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn result_rows(Query(query): Query<HashMap<String, String>>) -> Json<Value> {
    let search = query.get("search").cloned().unwrap_or_default();
    let gene = if search.is_empty() { "TP53".to_string() } else { search };
    Json(json!({
        "count": 12,
        "results": [
            {"id": 1, "gene": gene, "gem": "hsa-miR-21", "correlation": 0.91234, "p_value": 0.0005},
            {"id": 2, "gene": "EGFR", "gem": "hsa-miR-155", "correlation": -0.8, "p_value": 0.0}
        ]
    }))
}

async fn mirna_diseases() -> Json<Value> {
    Json(json!([{"id": 1, "mirna": "hsa-miR-21", "disease": "Glioma"}]))
}

/// Serves the stub on its own runtime thread; returns the base URL.
fn spawn_stub() -> String {
    let (tx, rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async move {
            let app = Router::new()
                .route("/api-service/user-experiments", get(list_experiments))
                .route(
                    "/api-service/user-experiments/{id}/",
                    get(get_experiment).delete(delete_experiment),
                )
                .route("/api-service/experiment-result", get(result_rows))
                .route("/api-service/mirna-diseases", get(mirna_diseases));
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            tx.send(listener.local_addr().unwrap()).unwrap();
            axum::serve(listener, app).await.unwrap();
        });
    });
    format!("http://{}", rx.recv().unwrap())
}

fn omix(tmp: &TempDir, base_url: &str) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("omix"));
    cmd.env("OMIX_CONFIG", tmp.path().join("missing.yaml"));
    cmd.env("OMIX_BASE_URL", base_url);
    cmd.env_remove("OMIX_TOKEN");
    cmd.env("RUST_LOG", "warn");
    cmd
}

#[test]
fn test_help_lists_commands() {
    let tmp = TempDir::new().unwrap();
    omix(&tmp, "http://127.0.0.1:1")
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("experiments"))
        .stdout(contains("results"))
        .stdout(contains("details"))
        .stdout(contains("watch"));
}

#[test]
fn test_experiments_table() {
    let tmp = TempDir::new().unwrap();
    let base = spawn_stub();
    omix(&tmp, &base)
        .args(["experiments", "--sort", "-name"])
        .assert()
        .success()
        .stdout(contains("BRCA run 7"))
        .stdout(contains("mirna"))
        .stdout(contains("pearson"))
        .stdout(contains("Page 1 of 1 (2 experiments)"));
}

#[test]
fn test_results_table_formats_p_values() {
    let tmp = TempDir::new().unwrap();
    let base = spawn_stub();
    omix(&tmp, &base)
        .args(["results", "7", "--search", "BRCA1"])
        .assert()
        .success()
        .stdout(contains("BRCA1"))
        .stdout(contains("0.9123"))
        .stdout(contains("p < .001"))
        .stdout(contains("0.0"))
        .stdout(contains("Page 1 of 2 (12 rows)"));

    omix(&tmp, &base)
        .args(["results", "7", "--high-precision"])
        .assert()
        .success()
        .stdout(contains("5.000e-4"));
}

#[test]
fn test_details_panel() {
    let tmp = TempDir::new().unwrap();
    let base = spawn_stub();
    omix(&tmp, &base)
        .args(["details", "7", "TP53", "hsa-miR-21", "--panel", "diseases"])
        .assert()
        .success()
        .stdout(contains("Glioma"));
}

#[test]
fn test_delete_is_dry_run_without_force() {
    let tmp = TempDir::new().unwrap();
    let base = spawn_stub();
    omix(&tmp, &base)
        .args(["delete", "7"])
        .assert()
        .success()
        .stdout(contains("Dry run"));

    omix(&tmp, &base)
        .args(["delete", "7", "--force"])
        .assert()
        .success()
        .stdout(contains("Deleted BRCA run 7"));
}

#[test]
fn test_missing_experiment_shows_alert() {
    let tmp = TempDir::new().unwrap();
    let base = spawn_stub();
    omix(&tmp, &base)
        .args(["results", "404"])
        .assert()
        .failure()
        .stderr(contains("An error has occurred. Please try again later."));
}

#[test]
fn test_config_file_is_read() {
    let tmp = TempDir::new().unwrap();
    let base = spawn_stub();
    let path = tmp.path().join("omix.yaml");
    std::fs::write(&path, format!("base_url: {base}\npage_size: 1\n")).unwrap();

    Command::new(assert_cmd::cargo::cargo_bin!("omix"))
        .env_remove("OMIX_BASE_URL")
        .env("RUST_LOG", "warn")
        .args(["--config", path.to_str().unwrap(), "experiments"])
        .assert()
        .success()
        .stdout(contains("Page 1 of 2 (2 experiments)"));
}

#[test]
fn test_watch_needs_user_id() {
    let tmp = TempDir::new().unwrap();
    omix(&tmp, "http://127.0.0.1:1")
        .arg("watch")
        .assert()
        .failure()
        .stderr(contains("No user id"));
}
