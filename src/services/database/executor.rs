// Parameterized statement execution against the caller's unit of work
use crate::api::middleware::AppError;
use crate::services::query_builder::SqlStatement;

/// A transactional unit of work supplied by the caller.
///
/// Dialects never open, commit or retry transactions themselves; every statement they
/// emit runs through the executor handed to them.
#[async_trait::async_trait]
pub trait SqlExecutor: Send + Sync {
    /// Execute a statement that returns no rows; returns the affected row count
    async fn execute(&self, statement: &SqlStatement) -> Result<u64, AppError>;

    /// Execute a statement and read the first column of the first row as an integer.
    /// Returns `None` when the statement produced no rows.
    async fn query_scalar(&self, statement: &SqlStatement) -> Result<Option<i64>, AppError>;

    /// Whether the unit of work was opened read-only
    fn is_read_only(&self) -> bool {
        false
    }
}
