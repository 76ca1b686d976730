use std::sync::Arc;

use pb_compute::ComputeServiceAdapter;

use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub adapter: Arc<ComputeServiceAdapter>,
    pub config: AppConfig,
}
