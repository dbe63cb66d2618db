//! HTTP routes: greeting, SQL generation and query execution.

use std::path::Path;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use sqlchat_ai::{build_request, SqlGenerator};
use sqlchat_connectors::{QueryExecutor, Row};

use crate::error::ApiError;

/// Application state shared across handlers
pub struct AppState {
    pub generator: Arc<dyn SqlGenerator>,
    pub executor: Arc<dyn QueryExecutor>,
}

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub success: bool,
    pub results: Vec<Row>,
    pub columns: Vec<String>,
}

/// Pull a required non-empty string out of a leniently parsed body.
///
/// An unreadable body is reported exactly like an absent field.
fn required<T>(
    payload: Result<Json<T>, JsonRejection>,
    field: impl FnOnce(T) -> Option<String>,
    name: &'static str,
) -> Result<String, ApiError> {
    let body = match payload {
        Ok(Json(body)) => body,
        Err(rejection) => {
            debug!("Unreadable request body: {}", rejection);
            return Err(ApiError::MissingField(name));
        }
    };
    field(body)
        .filter(|v| !v.is_empty())
        .ok_or(ApiError::MissingField(name))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn health_check() -> &'static str {
    "OK"
}

/// GET /api/hello
async fn hello() -> Json<Value> {
    Json(json!({ "message": "Hello from the server!" }))
}

/// POST /api/chat: turn a question into SQL text.
async fn chat(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let message = required(payload, |r: ChatRequest| r.message, "Message")?;
    info!("Generating SQL for request ({} bytes)", message.len());

    let prompt = build_request(&message);
    let response = state
        .generator
        .generate_sql(&prompt.system, &prompt.user)
        .await?;

    Ok(Json(ChatResponse { response }))
}

/// POST /api/execute-query: run caller-supplied SQL verbatim.
async fn execute_query(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>, ApiError> {
    let query = required(payload, |r: QueryRequest| r.query, "Query")?;

    let result = state.executor.execute_query(&query).await?;
    info!(
        "Query returned {} rows across {} columns",
        result.rows.len(),
        result.columns.len()
    );

    Ok(Json(QueryResponse {
        success: true,
        results: result.rows,
        columns: result.columns,
    }))
}

// ---------------------------------------------------------------------------
// Routers
// ---------------------------------------------------------------------------

/// Build the JSON API router.
pub fn api_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/hello", get(hello))
        .route("/api/chat", post(chat))
        .route("/api/execute-query", post(execute_query))
        .with_state(state)
}

/// Full application: API, front-end page and assets, CORS and request tracing.
pub fn app(state: Arc<AppState>, static_dir: &Path) -> Router {
    api_router(state)
        .route_service("/", ServeFile::new(static_dir.join("index.html")))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use sqlchat_ai::{GenerationError, ANALYSIS_SYSTEM_MESSAGE};
    use sqlchat_connectors::{QueryExecutionError, QueryResult};
    use std::sync::Mutex;
    use tower::ServiceExt;

    #[derive(Default)]
    struct StubGenerator {
        /// `None` makes every call fail.
        reply: Option<String>,
        prompts: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl SqlGenerator for StubGenerator {
        async fn generate_sql(
            &self,
            system_message: &str,
            user_prompt: &str,
        ) -> Result<String, GenerationError> {
            self.prompts
                .lock()
                .unwrap()
                .push((system_message.to_string(), user_prompt.to_string()));
            self.reply
                .clone()
                .ok_or(GenerationError::EmptyResponse("OpenAI"))
        }
    }

    #[derive(Default)]
    struct StubExecutor {
        /// `Err` carries the engine message to fail with.
        reply: Option<Result<QueryResult, String>>,
        queries: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl QueryExecutor for StubExecutor {
        async fn execute_query(&self, sql: &str) -> Result<QueryResult, QueryExecutionError> {
            self.queries.lock().unwrap().push(sql.to_string());
            match self.reply.clone() {
                Some(Ok(result)) => Ok(result),
                Some(Err(message)) => Err(QueryExecutionError::Database(
                    sqlx::Error::Protocol(message),
                )),
                None => Err(QueryExecutionError::NotConfigured(
                    "DATABASE_URL is not set".to_string(),
                )),
            }
        }
    }

    fn router(generator: Arc<StubGenerator>, executor: Arc<StubExecutor>) -> Router {
        api_router(Arc::new(AppState {
            generator,
            executor,
        }))
    }

    fn rows(values: Value) -> Vec<Row> {
        serde_json::from_value(values).unwrap()
    }

    async fn send(app: Router, method: &str, uri: &str, body: Option<&str>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if body.is_some() {
            builder = builder.header("content-type", "application/json");
        }
        let request = builder
            .body(Body::from(body.unwrap_or_default().to_string()))
            .unwrap();

        let resp = app.oneshot(request).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn hello_returns_greeting() {
        let app = router(Default::default(), Default::default());
        let (status, body) = send(app, "GET", "/api/hello", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "message": "Hello from the server!" }));
    }

    #[tokio::test]
    async fn chat_returns_raw_model_text() {
        let generator = Arc::new(StubGenerator {
            reply: Some("SELECT COUNT(*) AS \"value\" FROM egain_visitors".to_string()),
            ..Default::default()
        });
        let app = router(generator.clone(), Default::default());

        let (status, body) = send(
            app,
            "POST",
            "/api/chat",
            Some(r#"{"message": "How many visitors came today?"}"#),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({ "response": "SELECT COUNT(*) AS \"value\" FROM egain_visitors" })
        );

        let prompts = generator.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert_eq!(prompts[0].0, ANALYSIS_SYSTEM_MESSAGE);
        assert!(prompts[0].1.contains("Request: How many visitors came today?"));
        assert!(prompts[0].1.contains("col_name: org_name, dtype: text"));
    }

    #[tokio::test]
    async fn chat_rejects_missing_or_empty_message() {
        for body in [
            Some("{}"),
            Some(r#"{"message": ""}"#),
            Some(r#"{"message": null}"#),
            Some(r#"{"message": 42}"#),
            Some("not json"),
            None,
        ] {
            let generator = Arc::new(StubGenerator::default());
            let app = router(generator.clone(), Default::default());

            let (status, resp) = send(app, "POST", "/api/chat", body).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "body: {:?}", body);
            assert_eq!(resp, json!({ "error": "Message is required" }));
            assert!(generator.prompts.lock().unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn chat_generation_failure_is_500_with_message() {
        let app = router(Default::default(), Default::default());
        let (status, body) = send(app, "POST", "/api/chat", Some(r#"{"message": "hi"}"#)).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "error": "No response from OpenAI" }));
    }

    #[tokio::test]
    async fn execute_query_returns_rows_and_columns() {
        let executor = Arc::new(StubExecutor {
            reply: Some(Ok(QueryResult {
                columns: vec!["org_name".to_string(), "value".to_string()],
                rows: rows(json!([
                    { "org_name": "acme", "value": 12 },
                    { "org_name": "globex", "value": 7 },
                    { "org_name": null, "value": 1 }
                ])),
            })),
            ..Default::default()
        });
        let app = router(Default::default(), executor.clone());

        let sql = r#"SELECT "org_name", COUNT(*) AS "value" FROM egain_visitors GROUP BY 1"#;
        let request = json!({ "query": sql }).to_string();
        let (status, body) = send(app, "POST", "/api/execute-query", Some(&request)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["columns"], json!(["org_name", "value"]));

        let results = body["results"].as_array().unwrap();
        assert_eq!(results.len(), 3);
        for row in results {
            let row = row.as_object().unwrap();
            assert_eq!(row.len(), 2);
            assert!(row.contains_key("org_name") && row.contains_key("value"));
        }

        assert_eq!(*executor.queries.lock().unwrap(), vec![sql.to_string()]);
    }

    #[tokio::test]
    async fn execute_query_select_one() {
        let executor = Arc::new(StubExecutor {
            reply: Some(Ok(QueryResult {
                columns: vec!["value".to_string()],
                rows: rows(json!([{ "value": 1 }])),
            })),
            ..Default::default()
        });
        let app = router(Default::default(), executor);

        let (status, body) = send(
            app,
            "POST",
            "/api/execute-query",
            Some(r#"{"query": "SELECT 1 AS value"}"#),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({ "success": true, "results": [{ "value": 1 }], "columns": ["value"] })
        );
    }

    #[tokio::test]
    async fn execute_query_rejects_missing_query() {
        for body in [Some("{}"), Some(r#"{"query": ""}"#), Some("[1, 2]"), None] {
            let executor = Arc::new(StubExecutor::default());
            let app = router(Default::default(), executor.clone());

            let (status, resp) = send(app, "POST", "/api/execute-query", body).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "body: {:?}", body);
            assert_eq!(resp, json!({ "error": "Query is required" }));
            assert!(executor.queries.lock().unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn execute_query_failure_is_500_with_success_false() {
        let executor = Arc::new(StubExecutor {
            reply: Some(Err(
                "relation \"nonexistent_table\" does not exist".to_string()
            )),
            ..Default::default()
        });
        let app = router(Default::default(), executor);

        let (status, body) = send(
            app,
            "POST",
            "/api/execute-query",
            Some(r#"{"query": "SELECT * FROM nonexistent_table"}"#),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], json!(false));
        assert!(body["error"]
            .as_str()
            .unwrap()
            .contains("relation \"nonexistent_table\" does not exist"));
        assert!(body.get("results").is_none());
    }

    #[tokio::test]
    async fn execute_query_without_database_fails_per_request() {
        let app = router(Default::default(), Default::default());

        for _ in 0..2 {
            let (status, body) = send(
                app.clone(),
                "POST",
                "/api/execute-query",
                Some(r#"{"query": "SELECT 1"}"#),
            )
            .await;
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(
                body,
                json!({ "success": false, "error": "database is not configured: DATABASE_URL is not set" })
            );
        }
    }

    #[tokio::test]
    async fn wrong_method_and_unknown_path() {
        let app = router(Default::default(), Default::default());
        let (status, _) = send(app.clone(), "GET", "/api/chat", None).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);

        let (status, _) = send(app, "GET", "/api/nope", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn app_serves_front_end() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>sqlchat</h1>").unwrap();
        std::fs::create_dir(dir.path().join("js")).unwrap();
        std::fs::write(dir.path().join("js").join("app.js"), "console.log('hi');").unwrap();

        let state = Arc::new(AppState {
            generator: Arc::new(StubGenerator::default()),
            executor: Arc::new(StubExecutor::default()),
        });
        let app = app(state, dir.path());

        for (uri, expected) in [("/", "<h1>sqlchat</h1>"), ("/static/js/app.js", "console.log('hi');")] {
            let resp = app
                .clone()
                .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::OK, "uri: {}", uri);
            let bytes = resp.into_body().collect().await.unwrap().to_bytes();
            assert_eq!(&bytes[..], expected.as_bytes());
        }

        let (status, body) = send(app, "GET", "/api/hello", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Hello from the server!");
    }
}
