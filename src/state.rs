use std::sync::Arc;

use crate::db::NewsStore;
use crate::services::pipeline::PipelineManager;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<PipelineManager>,
    pub store: Arc<dyn NewsStore>,
}
