//! End-to-end tests of the HTTP surface, driving the router with in-memory adapters.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use api_lib::adapters::MemorySessionStore;
use api_lib::config::{AppSecret, Config};
use api_lib::web::{self, auth::AccessGate, state::AppState};
use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use sql_assistant_core::domain::{CellValue, QueryTable};
use sql_assistant_core::generation::{QueryGenerator, FALLBACK_QUERY};
use sql_assistant_core::ports::{
    PortError, PortResult, QueryExecutionService, TextGenerationService,
};
use tower::ServiceExt;

const PASSWORD: &str = "classroom-secret";

//=========================================================================================
// Test Doubles
//=========================================================================================

#[derive(Default)]
struct RecordingExecutor {
    executed: Mutex<Vec<String>>,
}

impl RecordingExecutor {
    fn last(&self) -> Option<String> {
        self.executed.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl QueryExecutionService for RecordingExecutor {
    async fn execute(&self, sql: &str) -> PortResult<QueryTable> {
        self.executed.lock().unwrap().push(sql.to_string());
        if sql.starts_with("/* slow */") {
            tokio::time::sleep(Duration::from_millis(300)).await;
        }
        if sql.trim() == "SELECT 1;" {
            return Ok(QueryTable {
                columns: vec!["?column?".to_string()],
                rows: vec![vec![CellValue::Int(1)]],
            });
        }
        if sql.starts_with("FAIL") {
            return Err(PortError::Execution(
                "syntax error at or near \"FAIL\"".to_string(),
            ));
        }
        Ok(QueryTable {
            columns: vec!["region".to_string(), "total".to_string()],
            rows: vec![
                vec![CellValue::Text("Europe".into()), CellValue::Float(10.5)],
                vec![CellValue::Text("Asia".into()), CellValue::Null],
            ],
        })
    }
}

struct SlowModel;

#[async_trait]
impl TextGenerationService for SlowModel {
    async fn complete(&self, _system: &str, _prompt: &str) -> PortResult<String> {
        tokio::time::sleep(Duration::from_millis(300)).await;
        Ok("```sql\nSELECT 42;\n```".to_string())
    }
}

struct BrokenModel;

#[async_trait]
impl TextGenerationService for BrokenModel {
    async fn complete(&self, _system: &str, _prompt: &str) -> PortResult<String> {
        Err(PortError::Generation("invalid api key".to_string()))
    }
}

//=========================================================================================
// Harness
//=========================================================================================

fn test_config(ai_assist_enabled: bool) -> Config {
    Config {
        bind_address: "127.0.0.1:0".parse().unwrap(),
        database_url: "postgres://unused".to_string(),
        db_max_connections: 1,
        log_level: tracing::Level::INFO,
        app_secret: AppSecret::Plain(PASSWORD.to_string()),
        ai_assist_enabled,
        openai_api_key: None,
        openai_base_url: None,
        sql_model: "gpt-4o-mini".to_string(),
        sql_temperature: 0.1,
        sql_max_tokens: 800,
        session_idle_minutes: 60,
        cookie_secure: false,
        allowed_origin: None,
    }
}

#[derive(Clone)]
struct Harness {
    app: Router,
    executor: Arc<RecordingExecutor>,
}

fn harness(generator: Option<QueryGenerator>) -> Harness {
    let config = test_config(generator.is_some());
    let executor = Arc::new(RecordingExecutor::default());
    let state = Arc::new(AppState {
        gate: Arc::new(AccessGate::from_secret(&config.app_secret).unwrap()),
        config: Arc::new(config),
        sessions: Arc::new(MemorySessionStore::new()),
        generator,
        executor: executor.clone(),
    });
    Harness {
        app: web::router(state),
        executor,
    }
}

impl Harness {
    async fn send(
        &self,
        method: Method,
        uri: &str,
        cookie: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Option<String>, String) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or_default().to_string());
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, set_cookie, String::from_utf8(bytes.to_vec()).unwrap())
    }

    async fn login(&self) -> String {
        let (status, cookie, _) = self
            .send(Method::POST, "/auth/login", None, Some(json!({ "password": PASSWORD })))
            .await;
        assert_eq!(status, StatusCode::OK);
        cookie.expect("login sets a session cookie")
    }

    async fn json(&self, method: Method, uri: &str, cookie: &str, body: Option<Value>) -> (StatusCode, Value) {
        let (status, _, text) = self.send(method, uri, Some(cookie), body).await;
        let value = serde_json::from_str(&text).unwrap_or(Value::String(text));
        (status, value)
    }
}

//=========================================================================================
// Access Gate
//=========================================================================================

#[tokio::test]
async fn wrong_or_empty_passwords_are_rejected() {
    let h = harness(None);

    let (status, cookie, body) = h
        .send(Method::POST, "/auth/login", None, Some(json!({ "password": "" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(cookie.is_none());
    assert_eq!(body, "Please enter a password");

    let (status, cookie, body) = h
        .send(Method::POST, "/auth/login", None, Some(json!({ "password": "guess" })))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(cookie.is_none());
    assert_eq!(body, "Incorrect password");

    // Failure is not sticky.
    h.login().await;
}

#[tokio::test]
async fn protected_routes_require_a_logged_in_session() {
    let h = harness(None);

    let (status, _, _) = h.send(Method::GET, "/history", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let bogus = format!("session={}", uuid::Uuid::new_v4());
    let (status, _, _) = h.send(Method::GET, "/history", Some(&bogus), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, _) = h
        .send(Method::POST, "/queries/run", None, Some(json!({ "sql": "SELECT 1;" })))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(h.executor.last().is_none());
}

#[tokio::test]
async fn logout_locks_the_session_again() {
    let h = harness(None);
    let cookie = h.login().await;

    let (status, _, _) = h.send(Method::POST, "/auth/logout", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, _) = h.send(Method::GET, "/session", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

//=========================================================================================
// Generation
//=========================================================================================

#[tokio::test]
async fn missing_model_returns_the_fallback_query() {
    let h = harness(Some(QueryGenerator::new(None)));
    let cookie = h.login().await;

    let (status, body) = h
        .json(
            Method::POST,
            "/queries/generate",
            &cookie,
            Some(json!({ "question": "top 5 customers by spending" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sql"], FALLBACK_QUERY);
    assert_eq!(body["source"], "fallback");
    assert_eq!(body["question"], "top 5 customers by spending");

    let (_, session) = h.json(Method::GET, "/session", &cookie, None).await;
    assert_eq!(session["generated_sql"], FALLBACK_QUERY);
    assert_eq!(session["current_question"], "top 5 customers by spending");
}

#[tokio::test]
async fn blank_question_is_rejected() {
    let h = harness(Some(QueryGenerator::new(None)));
    let cookie = h.login().await;

    let (status, body) = h
        .json(Method::POST, "/queries/generate", &cookie, Some(json!({ "question": "   " })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "Please enter a question first.");
}

#[tokio::test]
async fn model_failure_is_reported_as_bad_gateway() {
    let h = harness(Some(QueryGenerator::new(Some(Arc::new(BrokenModel)))));
    let cookie = h.login().await;

    let (status, body) = h
        .json(Method::POST, "/queries/generate", &cookie, Some(json!({ "question": "sales by region" })))
        .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body.as_str().unwrap().contains("invalid api key"));

    let (_, session) = h.json(Method::GET, "/session", &cookie, None).await;
    assert!(session["generated_sql"].is_null());
}

#[tokio::test]
async fn disabled_assistant_still_runs_typed_sql() {
    let h = harness(None);
    let cookie = h.login().await;

    let (status, _) = h
        .json(Method::POST, "/queries/generate", &cookie, Some(json!({ "question": "anything" })))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = h
        .json(Method::POST, "/queries/run", &cookie, Some(json!({ "sql": "SELECT 1;" })))
        .await;
    assert_eq!(status, StatusCode::OK);
}

//=========================================================================================
// Execution & History
//=========================================================================================

#[tokio::test]
async fn select_one_returns_one_cell_and_records_history() {
    let h = harness(None);
    let cookie = h.login().await;

    let (status, body) = h
        .json(Method::POST, "/queries/run", &cookie, Some(json!({ "sql": "SELECT 1;" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["row_count"], 1);
    assert_eq!(body["rows"], json!([[1]]));
    assert_eq!(body["columns"].as_array().unwrap().len(), 1);

    let (_, history) = h.json(Method::GET, "/history", &cookie, None).await;
    assert_eq!(history["total"], 1);
    assert_eq!(history["entries"][0]["number"], 1);
    assert_eq!(history["entries"][0]["sql"], "SELECT 1;");
    assert_eq!(history["entries"][0]["row_count"], 1);
    assert!(history["entries"][0]["question"].is_null());
}

#[tokio::test]
async fn failed_execution_is_reported_and_not_recorded() {
    let h = harness(None);
    let cookie = h.login().await;

    let (status, body) = h
        .json(Method::POST, "/queries/run", &cookie, Some(json!({ "sql": "FAIL TABLE" })))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body, "Error executing query: syntax error at or near \"FAIL\"");

    let (_, history) = h.json(Method::GET, "/history", &cookie, None).await;
    assert_eq!(history["total"], 0);
}

#[tokio::test]
async fn history_shows_five_newest_and_rerun_leaves_it_untouched() {
    let h = harness(Some(QueryGenerator::new(None)));
    let cookie = h.login().await;

    for i in 1..=7 {
        let (status, _) = h
            .json(Method::POST, "/queries/run", &cookie, Some(json!({ "sql": format!("SELECT {i} AS n") })))
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (_, history) = h.json(Method::GET, "/history", &cookie, None).await;
    assert_eq!(history["total"], 7);
    let numbers: Vec<u64> = history["entries"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["number"].as_u64().unwrap())
        .collect();
    assert_eq!(numbers, vec![7, 6, 5, 4, 3]);
    assert_eq!(history["entries"][0]["row_count"], 2);

    let (status, body) = h.json(Method::POST, "/history/2/rerun", &cookie, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["row_count"], 2);
    assert_eq!(h.executor.last().as_deref(), Some("SELECT 2 AS n"));

    let (_, after) = h.json(Method::GET, "/history", &cookie, None).await;
    assert_eq!(after, history);

    let (status, _) = h.json(Method::POST, "/history/99/rerun", &cookie, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn generated_question_is_attached_to_the_history_entry() {
    let h = harness(Some(QueryGenerator::new(None)));
    let cookie = h.login().await;

    h.json(Method::POST, "/queries/generate", &cookie, Some(json!({ "question": "recent orders" })))
        .await;
    h.json(Method::POST, "/queries/run", &cookie, Some(json!({ "sql": "SELECT 1;" })))
        .await;

    let (_, history) = h.json(Method::GET, "/history", &cookie, None).await;
    assert_eq!(history["entries"][0]["question"], "recent orders");
}

#[tokio::test]
async fn clear_history_resets_question_sql_and_history() {
    let h = harness(Some(QueryGenerator::new(None)));
    let cookie = h.login().await;

    h.json(Method::POST, "/queries/generate", &cookie, Some(json!({ "question": "recent orders" })))
        .await;
    h.json(Method::POST, "/queries/run", &cookie, Some(json!({ "sql": "SELECT 1;" })))
        .await;

    let (status, _, _) = h.send(Method::DELETE, "/history", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, session) = h.json(Method::GET, "/session", &cookie, None).await;
    assert!(session["current_question"].is_null());
    assert!(session["generated_sql"].is_null());
    assert_eq!(session["history_len"], 0);
}

#[tokio::test]
async fn sample_query_runs_without_touching_history() {
    let h = harness(None);
    let cookie = h.login().await;

    let (status, _) = h.json(Method::POST, "/queries/sample", &cookie, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(h.executor.last().unwrap().contains("ORDER BY o.orderid"));

    let (_, history) = h.json(Method::GET, "/history", &cookie, None).await;
    assert_eq!(history["total"], 0);
}

#[tokio::test]
async fn sessions_do_not_share_history() {
    let h = harness(None);
    let alice = h.login().await;
    let bob = h.login().await;

    h.json(Method::POST, "/queries/run", &alice, Some(json!({ "sql": "SELECT 1;" })))
        .await;

    let (_, history) = h.json(Method::GET, "/history", &bob, None).await;
    assert_eq!(history["total"], 0);
}

#[tokio::test]
async fn index_page_is_public() {
    let h = harness(None);
    let (status, _, body) = h.send(Method::GET, "/", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("SQL Query Assistant"));
}

//=========================================================================================
// Overlapping Requests
//=========================================================================================

#[tokio::test]
async fn clear_during_generation_is_not_undone() {
    let h = harness(Some(QueryGenerator::new(Some(Arc::new(SlowModel)))));
    let cookie = h.login().await;
    for _ in 0..3 {
        h.json(Method::POST, "/queries/run", &cookie, Some(json!({ "sql": "SELECT 1;" })))
            .await;
    }

    let generating = {
        let (h, cookie) = (h.clone(), cookie.clone());
        tokio::spawn(async move {
            h.json(Method::POST, "/queries/generate", &cookie, Some(json!({ "question": "answer?" })))
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;

    let (status, _, _) = h.send(Method::DELETE, "/history", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, generated) = generating.await.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(generated["sql"], "SELECT 42;");

    let (_, history) = h.json(Method::GET, "/history", &cookie, None).await;
    assert_eq!(history["total"], 0);
}

#[tokio::test]
async fn overlapping_runs_are_both_recorded() {
    let h = harness(None);
    let cookie = h.login().await;

    let slow = {
        let (h, cookie) = (h.clone(), cookie.clone());
        tokio::spawn(async move {
            h.json(Method::POST, "/queries/run", &cookie, Some(json!({ "sql": "/* slow */ SELECT 2" })))
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    let (status, _) = h
        .json(Method::POST, "/queries/run", &cookie, Some(json!({ "sql": "SELECT 1;" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(slow.await.unwrap().0, StatusCode::OK);

    let (_, history) = h.json(Method::GET, "/history", &cookie, None).await;
    assert_eq!(history["total"], 2);
    assert_eq!(history["entries"][0]["sql"], "/* slow */ SELECT 2");
    assert_eq!(history["entries"][1]["sql"], "SELECT 1;");
}

#[tokio::test]
async fn page_explains_a_dropped_session_cookie() {
    let h = harness(None);
    let (_, _, page) = h.send(Method::GET, "/", None, None).await;
    assert!(page.contains("COOKIE_SECURE=false"));
}
