pub mod db;
pub mod session_store;
pub mod sql_llm;

pub use db::PgQueryAdapter;
pub use session_store::MemorySessionStore;
pub use sql_llm::OpenAiSqlAdapter;
