pub mod aggregation;
pub mod app;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod storage;
pub mod ui;
pub mod state;

pub use app::router;
pub use config::{Config, StoreKind};
pub use state::AppState;
pub use storage::{JsonFileStore, MemoryStore, ReportStore};
