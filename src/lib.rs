pub mod config;
pub mod db;
pub mod error;
pub mod importer;
pub mod logging;
pub mod models;
pub mod source;
pub mod storage;

pub use db::SqliteStorage;
pub use error::{ImporterError, Result};
pub use importer::{extract_city, CollegeImporter, ImportSummary, RecordOutcome};
pub use models::{College, CollegeArgs, ReplacementUniversity, State};
pub use source::{parse_records, RawRecord, ReqwestFetcher, SourceFetcher, SourceLocation};
pub use storage::{InMemoryStorage, Storage, StorageCounts};
