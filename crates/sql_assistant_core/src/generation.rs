//! crates/sql_assistant_core/src/generation.rs
//!
//! Turns a natural-language question into a candidate SQL statement: prompt
//! assembly, model invocation through the `TextGenerationService` port, and
//! clean-up of the model's answer.

use std::sync::{Arc, LazyLock};

use regex::Regex;

use crate::domain::{GeneratedQuery, QuerySource};
use crate::ports::{PortError, PortResult, TextGenerationService};

/// Description of the sales database handed to the model with every question.
pub const DATABASE_SCHEMA: &str = r#"Database schema (PostgreSQL):

Tables:
- Region(
    RegionID INTEGER PRIMARY KEY,
    Region   TEXT NOT NULL
  )

- Country(
    CountryID INTEGER PRIMARY KEY,
    Country   TEXT NOT NULL,
    RegionID  INTEGER NOT NULL REFERENCES Region(RegionID)
  )

- Customer(
    CustomerID INTEGER PRIMARY KEY,
    FirstName  TEXT NOT NULL,
    LastName   TEXT NOT NULL,
    Address    TEXT NOT NULL,
    City       TEXT NOT NULL,
    CountryID  INTEGER NOT NULL REFERENCES Country(CountryID)
  )

- ProductCategory(
    ProductCategoryID          INTEGER PRIMARY KEY,
    ProductCategory            TEXT NOT NULL,
    ProductCategoryDescription TEXT NOT NULL
  )

- Product(
    ProductID         INTEGER PRIMARY KEY,
    ProductName       TEXT NOT NULL,
    ProductUnitPrice  REAL    NOT NULL,
    ProductCategoryID INTEGER NOT NULL REFERENCES ProductCategory(ProductCategoryID)
  )

- OrderDetail(
    OrderID         INTEGER PRIMARY KEY,
    CustomerID      INTEGER NOT NULL REFERENCES Customer(CustomerID),
    ProductID       INTEGER NOT NULL REFERENCES Product(ProductID),
    OrderDate       DATE    NOT NULL,
    QuantityOrdered INTEGER NOT NULL
  )

Notes:
- A customer's full name is FirstName || ' ' || LastName
- The sale amount of one order row is ProductUnitPrice * QuantityOrdered
- Typical questions ask for totals by customer, country or region,
  and for counts of orders or products."#;

/// System message sent alongside every prompt.
pub const SYSTEM_INSTRUCTION: &str =
    "You write accurate PostgreSQL queries for a sales database of regions, countries, customers, products and orders.";

const PROMPT_TEMPLATE: &str = r#"You are a PostgreSQL expert. Using the database schema below, write one valid PostgreSQL query that answers the user's question.

{schema}

User question: {question}

Rules:
1. Return only the SQL query, ready to run. No explanation and no comments.
2. Use the exact table and column names from the schema.
3. Join tables where needed (Customer with Country and Region, Product with ProductCategory).
4. If the result could be large, add a LIMIT (100 by default).
5. Give result columns readable aliases with AS."#;

/// Query returned when no language model is configured.
pub const FALLBACK_QUERY: &str = r#"-- AI assistant not configured; showing recent orders instead
SELECT
    o.orderid,
    c.firstname || ' ' || c.lastname AS customer,
    p.productname,
    o.quantityordered,
    o.orderdate
FROM orderdetail o
JOIN customer c ON o.customerid = c.customerid
JOIN product  p ON o.productid = p.productid
ORDER BY o.orderdate DESC
LIMIT 20;"#;

static LANGUAGE_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\A(?:sql|postgresql|postgres|pgsql|psql)\b")
        .expect("language tag pattern is valid")
});

/// Builds the full prompt: instructions, schema and the user's question, verbatim.
pub fn build_prompt(question: &str) -> String {
    PROMPT_TEMPLATE
        .replace("{schema}", DATABASE_SCHEMA)
        .replace("{question}", question)
}

/// Removes a surrounding markdown code fence (and its language tag) from a model answer.
///
/// Text without a leading fence is only trimmed, so applying this twice is the same as
/// applying it once.
pub fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    let Some(body) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    let body = body.strip_suffix("```").unwrap_or(body);
    let body = match LANGUAGE_TAG.find(body) {
        Some(tag) => &body[tag.end()..],
        None => body,
    };
    body.trim().to_string()
}

//=========================================================================================
// QueryGenerator
//=========================================================================================

/// Produces SQL for a question, using a text model when one is configured.
#[derive(Clone)]
pub struct QueryGenerator {
    text_service: Option<Arc<dyn TextGenerationService>>,
}

impl QueryGenerator {
    /// `None` means no model credential is available; every question then yields
    /// [`FALLBACK_QUERY`].
    pub fn new(text_service: Option<Arc<dyn TextGenerationService>>) -> Self {
        Self { text_service }
    }

    pub fn is_model_backed(&self) -> bool {
        self.text_service.is_some()
    }

    pub async fn generate(&self, question: &str) -> PortResult<GeneratedQuery> {
        let Some(service) = &self.text_service else {
            return Ok(GeneratedQuery {
                sql: FALLBACK_QUERY.to_string(),
                source: QuerySource::Fallback,
            });
        };

        let prompt = build_prompt(question);
        let raw = service
            .complete(SYSTEM_INSTRUCTION, &prompt)
            .await
            .map_err(|e| match e {
                PortError::Generation(msg) => PortError::Generation(msg),
                other => PortError::Generation(other.to_string()),
            })?;

        let sql = strip_code_fences(&raw);
        if sql.is_empty() {
            return Err(PortError::Generation(
                "The model returned an empty answer.".to_string(),
            ));
        }

        Ok(GeneratedQuery {
            sql,
            source: QuerySource::Model,
        })
    }
}
