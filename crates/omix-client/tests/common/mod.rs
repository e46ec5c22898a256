//! In-process stub of the analysis backend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

/// A request the stub received.
#[derive(Debug, Clone)]
pub struct Seen {
    pub path: String,
    pub query: HashMap<String, String>,
    pub authorization: Option<String>,
    pub body: Option<Value>,
}

#[derive(Clone, Default)]
pub struct Stub {
    seen: Arc<Mutex<Vec<Seen>>>,
}

impl Stub {
    pub fn seen(&self, path: &str) -> Vec<Seen> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.path == path)
            .cloned()
            .collect()
    }

    fn record(&self, path: &str, query: HashMap<String, String>, headers: &HeaderMap, body: Option<Value>) {
        self.seen.lock().unwrap().push(Seen {
            path: path.to_string(),
            query,
            authorization: headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            body,
        });
    }
}

/// Starts the stub on an ephemeral port. Returns its base URL.
pub async fn spawn_stub() -> (String, Stub) {
    let stub = Stub::default();
    let app = Router::new()
        .route("/api-service/user-experiments", get(list_experiments))
        .route(
            "/api-service/user-experiments/{id}/",
            get(get_experiment).delete(delete_experiment),
        )
        .route("/api-service/stop-experiment", get(stop_experiment))
        .route("/api-service/experiment-result", get(result_rows))
        .route("/api-service/statistical-properties", get(statistical_properties))
        .route("/api-service/correlation-graph", get(correlation_graph))
        .route("/api-service/survival", post(survival))
        .route("/api-service/mirna-diseases", get(mirna_diseases))
        .route("/api-service/mirna-drugs", get(mirna_drugs))
        .with_state(stub.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), stub)
}

pub fn experiment_json(id: u64, kind: u8) -> Value {
    json!({
        "id": id,
        "name": format!("experiment {id}"),
        "description": "stub",
        "type": kind,
        "correlation_method": 1,
        "state": 1,
        "submit_date": "2024-03-01T12:00:00Z",
        "result_final_row_count": 25,
        "tag": {"id": 3, "name": "breast"}
    })
}

fn success(data: Value) -> Json<Value> {
    Json(json!({"status": {"code": 1}, "data": data}))
}

fn failure(internal_code: i32) -> Json<Value> {
    Json(json!({"status": {"code": 2, "internal_code": internal_code, "message": "failed"}}))
}

async fn list_experiments(
    State(stub): State<Stub>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Json<Value> {
    stub.record("/api-service/user-experiments", query, &headers, None);
    Json(json!({"count": 2, "results": [experiment_json(7, 1), experiment_json(8, 2)]}))
}

async fn get_experiment(Path(id): Path<u64>) -> Response {
    if id == 404 {
        return (StatusCode::NOT_FOUND, "Not found.").into_response();
    }
    Json(experiment_json(id, 1)).into_response()
}

async fn delete_experiment(
    State(stub): State<Stub>,
    Path(id): Path<u64>,
    headers: HeaderMap,
) -> StatusCode {
    stub.record(&format!("/api-service/user-experiments/{id}/"), HashMap::new(), &headers, None);
    StatusCode::NO_CONTENT
}

async fn stop_experiment(Query(query): Query<HashMap<String, String>>) -> Json<Value> {
    match query.get("experimentId").map(String::as_str) {
        Some("1") => Json(json!({"status": {"code": 1}})),
        _ => failure(1),
    }
}

/// 25 rows; pages past the end are a 404, like the real paginator.
async fn result_rows(
    State(stub): State<Stub>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let page: u64 = query.get("page").and_then(|p| p.parse().ok()).unwrap_or(1);
    let page_size: u64 = query.get("page_size").and_then(|p| p.parse().ok()).unwrap_or(10);
    let search = query.get("search").cloned().unwrap_or_default();
    stub.record("/api-service/experiment-result", query, &headers, None);

    let total = 25;
    let start = (page - 1) * page_size;
    if start >= total {
        return (StatusCode::NOT_FOUND, Json(json!({"detail": "Invalid page."}))).into_response();
    }
    let results: Vec<Value> = (start..total.min(start + page_size))
        .map(|i| {
            json!({
                "id": i + 1,
                "gene": if search.is_empty() { format!("GENE{i}") } else { search.clone() },
                "gem": "hsa-miR-21",
                "correlation": 0.81234,
                "p_value": 0.0005,
                "adjusted_p_value": 0.002
            })
        })
        .collect();
    Json(json!({"count": total, "results": results})).into_response()
}

async fn statistical_properties(Query(query): Query<HashMap<String, String>>) -> Json<Value> {
    if query.get("gene").map(String::as_str) == Some("MISSING") {
        return failure(2);
    }
    success(json!({
        "gene_mean": 4.2,
        "gem_mean": 0.3,
        "gene_standard_deviation": 1.1,
        "gem_standard_deviation": 0.4,
        "gene_normality_p_value": 0.2,
        "gem_normality_p_value": 0.01,
        "heteroscedasticity_p_value": 0.5,
        "gene_outliers": [{"sample": "S1", "value": 9.9}],
        "common_samples": 120
    }))
}

async fn correlation_graph(Query(_query): Query<HashMap<String, String>>) -> Json<Value> {
    success(json!({
        "gene_values": [1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
        "gem_values": [-1.0, 0.0, 0.0, 1.0, 1.0, 2.0],
        "samples": ["S1", "S2", "S3", "S4", "S5", "S6"]
    }))
}

async fn survival(
    State(stub): State<Stub>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    stub.record("/api-service/survival", HashMap::new(), &headers, Some(body));
    success(json!({
        "groups": [
            {"label": "low", "data": [{"time": 0.0, "probability": 1.0}, {"time": 12.0, "probability": 0.4}]},
            {"label": "high", "data": [{"time": 0.0, "probability": 1.0}, {"time": 30.0, "probability": 0.7}]}
        ],
        "log_rank": {"test_statistic": 4.1, "p_value": 0.04}
    }))
}

async fn mirna_diseases(Query(query): Query<HashMap<String, String>>) -> Json<Value> {
    let mirna = query.get("mirna").cloned().unwrap_or_default();
    Json(json!([
        {"id": 1, "mirna": mirna, "disease": "Breast Neoplasms", "pubmed_id": "123"}
    ]))
}

/// Returns a body that is not JSON.
async fn mirna_drugs() -> &'static str {
    "<html>oops</html>"
}
