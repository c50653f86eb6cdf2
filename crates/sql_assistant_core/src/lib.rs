pub mod domain;
pub mod generation;
pub mod ports;

pub use domain::{
    CellValue, GeneratedQuery, HistoryEntry, QuerySource, QueryTable, SessionContext,
    HISTORY_DISPLAY_LIMIT,
};
pub use generation::{QueryGenerator, FALLBACK_QUERY};
pub use ports::{
    PortError, PortResult, QueryExecutionService, SessionChange, SessionStore, TextGenerationService,
};
