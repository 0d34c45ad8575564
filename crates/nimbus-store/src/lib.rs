pub mod backend;
pub mod bounding;
pub mod database;
pub mod error;
pub mod history;
pub mod row_helpers;
pub mod schema;

pub use backend::{DocumentBackend, DocumentKey, MemoryBackend, SqliteBackend};
pub use bounding::{bound_history, HistoryLimits};
pub use database::Database;
pub use error::StoreError;
pub use history::HistoryStore;
