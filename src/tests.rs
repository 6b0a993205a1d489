use super::*;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::llm::tests::ScriptedModel;

fn app(model: Option<Arc<dyn ModelClient>>) -> Router {
    let history = Arc::new(HistoryStore::in_memory().unwrap());
    build_router(AppState::new(history, model))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_analyze_name_error() {
    let app = app(None);
    let (status, body) = send(
        &app,
        post_json(
            "/analyze_error",
            json!({"error_message": "NameError: name 'x' is not defined", "language": "python"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let result: AnalysisResult = serde_json::from_value(body).unwrap();
    assert_eq!(result.error_type, "NameError");
    assert_eq!(result.solutions[0].fix, "Define the variable before using it");
    assert_eq!(
        result.concepts,
        vec!["variable scope".to_string(), "variable declaration".to_string()]
    );
    assert_eq!(result.statistics.unwrap().frequency, None);
}

#[tokio::test]
async fn test_analyze_with_context_and_project() {
    let app = app(None);
    let request = json!({
        "error_message": "NameError: name 'totl' is not defined",
        "code_context": "total = 3\nprint(totl)",
        "project_id": "demo",
    });

    send(&app, post_json("/analyze_error", request.clone())).await;
    let (status, body) = send(&app, post_json("/analyze_error", request)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["solutions"][0]["fix"], "Did you mean 'total'? Similar variables found: total");
    assert_eq!(body["solutions"][0]["confidence"], 0.95);
    assert_eq!(body["statistics"]["frequency"], 2);
    assert!(body["statistics"]["last_occurrence"].is_string());
}

#[tokio::test]
async fn test_empty_message_is_bad_request() {
    let app = app(None);
    let (status, body) = send(&app, post_json("/analyze_error", json!({"error_message": "  "}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation");
}

#[tokio::test]
async fn test_unknown_language_is_rejected() {
    let app = app(None);
    let (status, _) = send(
        &app,
        post_json("/analyze_error", json!({"error_message": "boom", "language": "cobol"})),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_unrecognized_error_is_not_found() {
    let app = app(None);
    let (status, body) = send(
        &app,
        post_json("/analyze_error", json!({"error_message": "Segmentation fault"})),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Error pattern not recognized");
}

#[tokio::test]
async fn test_model_enriches_resources() {
    let model = Arc::new(ScriptedModel::new(vec![Ok(
        r#"[{"title": "Dict basics", "description": "Learn dicts", "resource_type": "video"}]"#,
    )]));
    let app = app(Some(model));

    let (status, body) = send(
        &app,
        post_json("/analyze_error", json!({"error_message": "KeyError: 'port'"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["learning_resources"][0]["title"], "Dict basics");
    assert_eq!(body["learning_resources"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_supported_languages() {
    let (status, body) = send(&app(None), get("/supported_languages")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!(["python", "javascript", "java", "csharp"]));
}

#[tokio::test]
async fn test_dashboard_reflects_history() {
    let app = app(None);
    for message in [
        "KeyError: 'a'",
        "KeyError: 'b'",
        "ZeroDivisionError: division by zero",
    ] {
        send(
            &app,
            post_json("/analyze_error", json!({"error_message": message, "project_id": "p1"})),
        )
        .await;
    }

    let (status, body) = send(&app, get("/dashboard?window=day&project_id=p1&limit=1")).await;
    assert_eq!(status, StatusCode::OK);

    let snapshot: DashboardSnapshot = serde_json::from_value(body).unwrap();
    assert_eq!(snapshot.window, TimeWindow::Day);
    assert_eq!(snapshot.total_errors, 3);
    assert_eq!(snapshot.top_errors.len(), 1);
    assert_eq!(snapshot.top_errors[0].error_type, "KeyError");
    assert_eq!(snapshot.top_errors[0].percentage, 66.7);
    assert_eq!(snapshot.project_top_errors.unwrap()[0].count, 2);
    assert_eq!(snapshot.recommendations[0].error_type, "KeyError");
}

#[tokio::test]
async fn test_dashboard_defaults_to_week() {
    let (status, body) = send(&app(None), get("/dashboard")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["window"], "week");
    assert_eq!(body["total_errors"], 0);
    assert!(body.get("project_top_errors").is_none());
}

#[tokio::test]
async fn test_project_history() {
    let app = app(None);
    send(
        &app,
        post_json("/analyze_error", json!({"error_message": "KeyError: 'a'", "project_id": "p1"})),
    )
    .await;
    send(
        &app,
        post_json(
            "/analyze_error",
            json!({"error_message": "IndexError: list index out of range", "project_id": "p1"}),
        ),
    )
    .await;

    let (status, body) = send(&app, get("/history/p1?limit=1")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert_eq!(body["occurrences"][0]["error_type"], "IndexError");
}

#[tokio::test]
async fn test_health_check() {
    let (status, body) = send(&app(None), get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["model_configured"], false);
}

#[tokio::test]
async fn test_cors_preflight() {
    let request = Request::builder()
        .method("OPTIONS")
        .uri("/analyze_error")
        .header("origin", "http://localhost:3000")
        .header("access-control-request-method", "POST")
        .body(Body::empty())
        .unwrap();

    let response = app(None).oneshot(request).await.unwrap();
    assert_eq!(
        response.headers().get("access-control-allow-origin").unwrap(),
        "*"
    );
}

#[tokio::test]
async fn test_json_output_is_pure_json() {
    crate::logging::init();
    let app = app(None);
    let (_, body) = send(
        &app,
        post_json(
            "/analyze_error",
            json!({"error_message": "NameError: name 'x' is not defined"}),
        ),
    )
    .await;
    let result: AnalysisResult = serde_json::from_value(body).unwrap();

    let output = format_result(&result, true).unwrap();
    let parsed: AnalysisResult = serde_json::from_str(&output).unwrap();
    assert_eq!(parsed, result);

    let rendered = format_result(&result, false).unwrap();
    assert!(rendered.contains("NameError"));
}
