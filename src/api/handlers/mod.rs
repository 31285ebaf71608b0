pub mod sequence;

use deadpool_postgres::Pool;

use crate::api::middleware::AppError;
use crate::config::Config;
use crate::services::SequenceService;

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub sequences: SequenceService,
    /// Present when the selected family is PostgreSQL, the only engine with a bundled driver
    pub pool: Option<Pool>,
}

impl AppState {
    pub fn postgres_pool(&self) -> Result<&Pool, AppError> {
        self.pool.as_ref().ok_or_else(|| {
            AppError::NotImplemented(format!(
                "No bundled executor for the {} dialect",
                self.sequences.family()
            ))
        })
    }
}
