// SQL dialect strategy
//
// One stateless implementation per supported engine. Each covers the parts of SQL that
// differ between engines for this service: sequence lifecycle and pagination.

use async_trait::async_trait;

use crate::api::middleware::{AppError, DatabaseError};
use crate::models::{DatabaseFamily, Pageable, SortDirection};
use crate::services::database::executor::SqlExecutor;
use crate::services::query_builder::{QueryBuilder, SqlStatement};

/// Parameter name used for the page size by [`SqlDialect::paginate`]
pub const LIMIT_PARAM: &str = "limit";
/// Parameter name used for the row offset by [`SqlDialect::paginate`]
pub const OFFSET_PARAM: &str = "offset";

/// Dialect-specific sequence and pagination syntax
#[async_trait]
pub trait SqlDialect: Send + Sync {
    /// Database family this dialect targets
    fn family(&self) -> DatabaseFamily;

    /// Create the named sequence unless it already exists.
    ///
    /// Safe to call repeatedly. Only the engine's "object already exists" failure is
    /// absorbed; every other error propagates.
    async fn ensure_sequence(
        &self,
        tx: &dyn SqlExecutor,
        name: &str,
        start_value: i64,
        increment_by: i64,
    ) -> Result<(), AppError>;

    /// Draw the next value of the named sequence inside the caller's read-write unit of work
    async fn next_sequence_value(&self, tx: &dyn SqlExecutor, name: &str) -> Result<i64, AppError>;

    /// ORDER BY / skip / take suffix referencing the limit and offset parameters by name.
    ///
    /// `sort_field` is inserted verbatim and must come from an allow list.
    fn pagination_clause(
        &self,
        sort_field: &str,
        direction: SortDirection,
        limit_param: &str,
        offset_param: &str,
    ) -> String;

    /// Whether `err` is this engine's "object already exists" failure
    fn is_already_exists(&self, err: &AppError) -> bool;

    /// Positional placeholder for the `index`-th (1-based) distinct parameter
    fn placeholder(&self, index: usize, name: &str) -> String;

    /// Bind `limit`/`offset` from `pageable` and append this dialect's pagination suffix
    fn paginate(&self, builder: &mut QueryBuilder, pageable: &Pageable) {
        builder
            .bind_parameter(LIMIT_PARAM, pageable.limit())
            .bind_parameter(OFFSET_PARAM, pageable.offset());
        let clause = self.pagination_clause(
            &pageable.sort_field,
            pageable.direction,
            LIMIT_PARAM,
            OFFSET_PARAM,
        );
        builder.append_raw(&clause);
    }
}

/// Probe-then-create sequence creation for engines without `IF NOT EXISTS`.
///
/// A concurrent creator can win between the probe and the create; that failure is
/// reported by the engine as "already exists" and treated as success.
pub(crate) async fn probe_then_create(
    dialect: &dyn SqlDialect,
    tx: &dyn SqlExecutor,
    name: &str,
    probe: SqlStatement,
    create: SqlStatement,
) -> Result<(), AppError> {
    tracing::debug!("Probing for sequence {}: {}", name, probe.text);
    let existing = tx.query_scalar(&probe).await?.unwrap_or(0);
    if existing > 0 {
        tracing::debug!("Sequence {} already exists", name);
        return Ok(());
    }

    create_absorbing_duplicate(dialect, tx, name, create).await
}

/// Run a CREATE SEQUENCE statement, treating "already exists" as success
async fn create_absorbing_duplicate(
    dialect: &dyn SqlDialect,
    tx: &dyn SqlExecutor,
    name: &str,
    create: SqlStatement,
) -> Result<(), AppError> {
    tracing::debug!("Creating sequence {}: {}", name, create.text);
    match tx.execute(&create).await {
        Ok(_) => {
            tracing::info!("Created sequence {} on {}", name, dialect.family());
            Ok(())
        }
        Err(err) if dialect.is_already_exists(&err) => {
            tracing::warn!("Sequence {} was created concurrently: {}", name, err);
            Ok(())
        }
        Err(err) => Err(err),
    }
}

/// Run a next-value statement and require exactly one integer back
pub(crate) async fn fetch_next_value(
    tx: &dyn SqlExecutor,
    name: &str,
    statement: SqlStatement,
) -> Result<i64, AppError> {
    tracing::debug!("Fetching next value of {}: {}", name, statement.text);
    tx.query_scalar(&statement).await?.ok_or_else(|| {
        AppError::Database(DatabaseError::new(format!(
            "Sequence {} returned no value",
            name
        )))
    })
}

/// Split `schema.object` into its parts
pub(crate) fn split_qualified(name: &str) -> (Option<&str>, &str) {
    match name.split_once('.') {
        Some((schema, object)) => (Some(schema), object),
        None => (None, name),
    }
}
