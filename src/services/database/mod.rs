// Dialect abstraction layer for multi-database support
pub mod dialect;
pub mod executor;
pub mod oracle;
pub mod postgresql;
pub mod selector;
pub mod sqlserver;

#[cfg(test)]
pub(crate) mod testing;

pub use dialect::{SqlDialect, LIMIT_PARAM, OFFSET_PARAM};
pub use executor::SqlExecutor;
pub use oracle::OracleDialect;
pub use postgresql::{PostgresDialect, PostgresExecutor};
pub use selector::DialectSelector;
pub use sqlserver::SqlServerDialect;
