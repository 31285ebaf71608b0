// Process-wide dialect selection
use std::sync::OnceLock;

use crate::api::middleware::AppError;
use crate::models::DatabaseFamily;
use crate::services::database::{OracleDialect, PostgresDialect, SqlDialect, SqlServerDialect};

static POSTGRES: PostgresDialect = PostgresDialect;
static ORACLE: OracleDialect = OracleDialect;
static SQL_SERVER: SqlServerDialect = SqlServerDialect;

static ACTIVE: OnceLock<&'static dyn SqlDialect> = OnceLock::new();

/// Chooses the one dialect used for the lifetime of the process.
///
/// Selection happens once at startup from configuration and is never re-evaluated; the
/// chosen strategy is immutable and shared without synchronization.
pub struct DialectSelector;

impl DialectSelector {
    /// Strategy for a database family, without touching the process-wide selection
    pub fn dialect_for(family: DatabaseFamily) -> &'static dyn SqlDialect {
        match family {
            DatabaseFamily::PostgreSql => &POSTGRES,
            DatabaseFamily::Oracle => &ORACLE,
            DatabaseFamily::SqlServer => &SQL_SERVER,
        }
    }

    /// Parse a configured family name and install its dialect
    pub fn install_from_config(family: &str) -> Result<&'static dyn SqlDialect, AppError> {
        Self::install(family.parse()?)
    }

    /// Install the dialect for `family`.
    ///
    /// Installing the already-selected family again is a no-op; installing a different
    /// one is a configuration error.
    pub fn install(family: DatabaseFamily) -> Result<&'static dyn SqlDialect, AppError> {
        let selected = *ACTIVE.get_or_init(|| {
            tracing::info!("Selected SQL dialect: {}", family);
            Self::dialect_for(family)
        });

        if selected.family() != family {
            return Err(AppError::Configuration(format!(
                "SQL dialect already selected as {}, cannot switch to {}",
                selected.family(),
                family
            )));
        }

        Ok(selected)
    }

    /// The installed dialect
    pub fn active() -> Result<&'static dyn SqlDialect, AppError> {
        ACTIVE.get().copied().ok_or_else(|| {
            AppError::Configuration("No SQL dialect has been selected".to_string())
        })
    }
}
