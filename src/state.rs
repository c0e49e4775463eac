use crate::config::Config;
use crate::storage::ReportStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ReportStore>,
    pub branches: Arc<[String]>,
    pub reps: Arc<[String]>,
}

impl AppState {
    pub fn new(store: Arc<dyn ReportStore>, config: &Config) -> Self {
        Self {
            store,
            branches: config.branches.iter().cloned().collect(),
            reps: config.reps.iter().cloned().collect(),
        }
    }
}
