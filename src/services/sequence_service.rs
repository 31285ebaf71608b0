use crate::api::middleware::AppError;
use crate::models::DatabaseFamily;
use crate::services::database::{DialectSelector, SqlDialect, SqlExecutor};

/// Issues unique, increasing identifiers from named database sequences.
///
/// Values come straight from the engine on every call; nothing is cached or pre-allocated
/// in the process.
#[derive(Clone, Copy)]
pub struct SequenceService {
    dialect: &'static dyn SqlDialect,
}

impl SequenceService {
    pub fn new(dialect: &'static dyn SqlDialect) -> Self {
        Self { dialect }
    }

    /// Service over the process-wide selected dialect
    pub fn from_selector() -> Result<Self, AppError> {
        Ok(Self::new(DialectSelector::active()?))
    }

    pub fn family(&self) -> DatabaseFamily {
        self.dialect.family()
    }

    /// Create the sequence unless it already exists.
    ///
    /// Issued values must only go up, so `increment_by` has to be at least 1.
    pub async fn create_if_not_exists(
        &self,
        tx: &dyn SqlExecutor,
        name: &str,
        start_value: i64,
        increment_by: i64,
    ) -> Result<(), AppError> {
        if increment_by < 1 {
            return Err(AppError::Validation(format!(
                "Sequence {} must increment by at least 1, got {}",
                name, increment_by
            )));
        }
        tracing::debug!(
            "Ensuring sequence {} (start {}, increment {})",
            name,
            start_value,
            increment_by
        );
        self.dialect
            .ensure_sequence(tx, name, start_value, increment_by)
            .await
    }

    /// Next value of the sequence.
    ///
    /// Drawing a value mutates the sequence, so `tx` must be a read-write unit of work.
    pub async fn next_value(&self, tx: &dyn SqlExecutor, name: &str) -> Result<i64, AppError> {
        if tx.is_read_only() {
            return Err(AppError::Transaction(format!(
                "Cannot draw from sequence {} inside a read-only transaction",
                name
            )));
        }
        let value = self.dialect.next_sequence_value(tx, name).await?;
        tracing::debug!("Sequence {} issued {}", name, value);
        Ok(value)
    }
}
