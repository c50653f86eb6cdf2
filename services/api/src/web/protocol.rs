//! services/api/src/web/protocol.rs
//!
//! Defines the JSON payloads exchanged between the browser page and the API server.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sql_assistant_core::domain::{CellValue, HistoryEntry, QuerySource, QueryTable};
use utoipa::ToSchema;

//=========================================================================================
// Requests Sent FROM the Client (Browser) TO the Server
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub password: String,
}

/// A natural-language question to turn into SQL.
#[derive(Deserialize, ToSchema)]
pub struct GenerateRequest {
    pub question: String,
}

/// SQL text to execute, usually the generated query after the user reviewed it.
#[derive(Deserialize, ToSchema)]
pub struct RunRequest {
    pub sql: String,
}

//=========================================================================================
// Responses Sent FROM the Server TO the Client (Browser)
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct LoginResponse {
    pub logged_in: bool,
    pub ai_enabled: bool,
}

#[derive(Serialize, ToSchema)]
pub struct SessionResponse {
    pub logged_in: bool,
    pub ai_enabled: bool,
    pub current_question: Option<String>,
    pub generated_sql: Option<String>,
    pub history_len: usize,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GeneratedBy {
    /// The language model wrote the query.
    Model,
    /// No model is configured; a fixed example query was returned.
    Fallback,
}

impl From<QuerySource> for GeneratedBy {
    fn from(source: QuerySource) -> Self {
        match source {
            QuerySource::Model => GeneratedBy::Model,
            QuerySource::Fallback => GeneratedBy::Fallback,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct GenerateResponse {
    pub question: String,
    pub sql: String,
    pub source: GeneratedBy,
}

/// A result set, rendered as a grid of JSON values.
#[derive(Serialize, ToSchema)]
pub struct QueryResultResponse {
    pub columns: Vec<String>,
    #[schema(value_type = Vec<Vec<Object>>)]
    pub rows: Vec<Vec<Value>>,
    pub row_count: usize,
}

impl From<QueryTable> for QueryResultResponse {
    fn from(table: QueryTable) -> Self {
        let row_count = table.row_count();
        let rows = table
            .rows
            .into_iter()
            .map(|row| row.into_iter().map(cell_to_json).collect())
            .collect();
        Self {
            columns: table.columns,
            rows,
            row_count,
        }
    }
}

fn cell_to_json(cell: CellValue) -> Value {
    match cell {
        CellValue::Null => Value::Null,
        CellValue::Bool(b) => Value::Bool(b),
        CellValue::Int(i) => Value::from(i),
        CellValue::Float(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(f.to_string())),
        CellValue::Text(s) => Value::String(s),
    }
}

#[derive(Serialize, ToSchema)]
pub struct HistoryItem {
    /// 1-based position in the session's chronological history.
    pub number: usize,
    pub question: Option<String>,
    pub sql: String,
    pub row_count: usize,
    pub executed_at: DateTime<Utc>,
}

impl HistoryItem {
    pub fn new(number: usize, entry: &HistoryEntry) -> Self {
        Self {
            number,
            question: entry.question.clone(),
            sql: entry.sql.clone(),
            row_count: entry.row_count,
            executed_at: entry.executed_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct HistoryResponse {
    /// Total number of entries recorded in this session.
    pub total: usize,
    /// The most recent entries, newest first.
    pub entries: Vec<HistoryItem>,
}

#[derive(Serialize, ToSchema)]
pub struct ExampleGroup {
    pub topic: String,
    pub questions: Vec<String>,
}

/// Sample questions shown next to the question box.
pub const EXAMPLE_QUESTIONS: &[(&str, &[&str])] = &[
    (
        "Customers & Orders",
        &[
            "Which customers have placed the most orders?",
            "What are the top 5 customers by total spending?",
            "How many customers do we have by country?",
        ],
    ),
    (
        "Regions & Countries",
        &[
            "What is total sales by region?",
            "Which country has the highest total sales?",
        ],
    ),
    (
        "Products",
        &[
            "What are the best-selling products?",
            "Show total quantity ordered by product category.",
            "Which product category generated the highest sales?",
        ],
    ),
];

pub fn example_groups() -> Vec<ExampleGroup> {
    EXAMPLE_QUESTIONS
        .iter()
        .map(|(topic, questions)| ExampleGroup {
            topic: topic.to_string(),
            questions: questions.iter().map(|q| q.to_string()).collect(),
        })
        .collect()
}
