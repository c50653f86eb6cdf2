//! crates/sql_assistant_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};

/// Number of history entries shown to the user.
pub const HISTORY_DISPLAY_LIMIT: usize = 5;

/// A single successful execution, recorded in the session history.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub question: Option<String>,
    pub sql: String,
    pub row_count: usize,
    pub executed_at: DateTime<Utc>,
}

/// The interaction state of one browser session.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub logged_in: bool,
    pub current_question: Option<String>,
    pub generated_sql: Option<String>,
    pub query_history: Vec<HistoryEntry>,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionContext {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            logged_in: false,
            current_question: None,
            generated_sql: None,
            query_history: Vec::new(),
            created_at: now,
            last_accessed_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.last_accessed_at = Utc::now();
    }

    /// Prepares for a new generation round. A question that differs from the
    /// current one invalidates the previously generated SQL.
    pub fn begin_question(&mut self, question: &str) {
        if self.current_question.as_deref() != Some(question) {
            self.generated_sql = None;
            self.current_question = None;
        }
    }

    pub fn record_generated(&mut self, question: String, sql: String) {
        self.current_question = Some(question);
        self.generated_sql = Some(sql);
    }

    /// Appends a successful execution to the end of the history.
    pub fn record_execution(&mut self, sql: String, row_count: usize) {
        self.query_history.push(HistoryEntry {
            question: self.current_question.clone(),
            sql,
            row_count,
            executed_at: Utc::now(),
        });
    }

    pub fn clear_history(&mut self) {
        self.query_history.clear();
        self.current_question = None;
        self.generated_sql = None;
    }

    /// Returns at most `limit` entries, most recent first, each paired with its
    /// 1-based chronological number.
    pub fn recent_history(&self, limit: usize) -> Vec<(usize, &HistoryEntry)> {
        self.query_history
            .iter()
            .enumerate()
            .rev()
            .take(limit)
            .map(|(idx, entry)| (idx + 1, entry))
            .collect()
    }

    pub fn history_entry(&self, number: usize) -> Option<&HistoryEntry> {
        number
            .checked_sub(1)
            .and_then(|idx| self.query_history.get(idx))
    }
}

/// A single value in a result set.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

/// A materialized result set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl QueryTable {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Where a generated query came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuerySource {
    Model,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedQuery {
    pub sql: String,
    pub source: QuerySource,
}
