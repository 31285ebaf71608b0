// PostgreSQL dialect and a tokio-postgres executor bound to a caller-owned transaction
use async_trait::async_trait;
use bytes::BytesMut;
use tokio_postgres::types::{to_sql_checked, IsNull, ToSql, Type};
use tokio_postgres::Transaction;

use crate::api::middleware::AppError;
use crate::models::{DatabaseFamily, SortDirection};
use crate::services::database::dialect::{fetch_next_value, SqlDialect};
use crate::services::database::executor::SqlExecutor;
use crate::services::query_builder::{SqlStatement, SqlValue};
use crate::validation::IdentifierValidator;

/// SQLSTATE duplicate_table, raised for an existing relation of any kind
const DUPLICATE_TABLE: &str = "42P07";
/// SQLSTATE unique_violation, raised by concurrent `IF NOT EXISTS` creations racing on pg_class
const UNIQUE_VIOLATION: &str = "23505";

/// Savepoint around the conditional create; a failed statement aborts the enclosing transaction
const ENSURE_SAVEPOINT: &str = "ensure_sequence";

/// PostgreSQL: `CREATE SEQUENCE IF NOT EXISTS`, `nextval()`, `LIMIT/OFFSET`
#[derive(Debug, Default, Clone, Copy)]
pub struct PostgresDialect;

impl PostgresDialect {
    fn create_statement(name: &str, start_value: i64, increment_by: i64) -> SqlStatement {
        SqlStatement::raw(format!(
            "CREATE SEQUENCE IF NOT EXISTS {} START WITH {} INCREMENT BY {}",
            name, start_value, increment_by
        ))
    }

    fn next_value_statement(name: &str) -> SqlStatement {
        SqlStatement::raw(format!("SELECT nextval('{}')", name))
    }
}

#[async_trait]
impl SqlDialect for PostgresDialect {
    fn family(&self) -> DatabaseFamily {
        DatabaseFamily::PostgreSql
    }

    async fn ensure_sequence(
        &self,
        tx: &dyn SqlExecutor,
        name: &str,
        start_value: i64,
        increment_by: i64,
    ) -> Result<(), AppError> {
        let name = IdentifierValidator::validate(name)?;
        let create = Self::create_statement(name, start_value, increment_by);

        tx.execute(&SqlStatement::raw(format!("SAVEPOINT {}", ENSURE_SAVEPOINT)))
            .await?;
        tracing::debug!("Creating sequence {}: {}", name, create.text);
        match tx.execute(&create).await {
            Ok(_) => {
                tx.execute(&SqlStatement::raw(format!("RELEASE SAVEPOINT {}", ENSURE_SAVEPOINT)))
                    .await?;
                tracing::info!("Ensured sequence {} on {}", name, self.family());
                Ok(())
            }
            Err(err) if self.is_already_exists(&err) => {
                // Clears the aborted state so the caller's transaction stays usable
                tx.execute(&SqlStatement::raw(format!(
                    "ROLLBACK TO SAVEPOINT {}",
                    ENSURE_SAVEPOINT
                )))
                .await?;
                tracing::warn!("Sequence {} was created concurrently: {}", name, err);
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    async fn next_sequence_value(&self, tx: &dyn SqlExecutor, name: &str) -> Result<i64, AppError> {
        let name = IdentifierValidator::validate(name)?;
        fetch_next_value(tx, name, Self::next_value_statement(name)).await
    }

    fn pagination_clause(
        &self,
        sort_field: &str,
        direction: SortDirection,
        limit_param: &str,
        offset_param: &str,
    ) -> String {
        format!(
            " ORDER BY {} {} LIMIT :{} OFFSET :{}",
            sort_field,
            direction.as_sql(),
            limit_param,
            offset_param
        )
    }

    fn is_already_exists(&self, err: &AppError) -> bool {
        matches!(err.database_code(), Some(DUPLICATE_TABLE) | Some(UNIQUE_VIOLATION))
    }

    fn placeholder(&self, index: usize, _name: &str) -> String {
        format!("${}", index)
    }
}

impl ToSql for SqlValue {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match self {
            SqlValue::Null => Ok(IsNull::Yes),
            SqlValue::Bool(v) => v.to_sql(ty, out),
            SqlValue::Int(v) => match *ty {
                Type::INT2 => i16::try_from(*v)?.to_sql(ty, out),
                Type::INT4 => i32::try_from(*v)?.to_sql(ty, out),
                _ => v.to_sql(ty, out),
            },
            SqlValue::Float(v) => match *ty {
                Type::FLOAT4 => (*v as f32).to_sql(ty, out),
                _ => v.to_sql(ty, out),
            },
            SqlValue::Text(v) => v.to_sql(ty, out),
            SqlValue::Timestamp(v) => match *ty {
                Type::TIMESTAMP => v.naive_utc().to_sql(ty, out),
                _ => v.to_sql(ty, out),
            },
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

/// Executes statements inside a transaction the caller opened and will commit
pub struct PostgresExecutor<'a> {
    tx: &'a Transaction<'a>,
    read_only: bool,
}

impl<'a> PostgresExecutor<'a> {
    /// Executor over a read-write transaction
    pub fn new(tx: &'a Transaction<'a>) -> Self {
        Self { tx, read_only: false }
    }

    /// Executor over a transaction opened with `READ ONLY`
    pub fn read_only(tx: &'a Transaction<'a>) -> Self {
        Self { tx, read_only: true }
    }

    fn bind(statement: &SqlStatement) -> Result<(String, Vec<&SqlValue>), AppError> {
        statement.to_positional(|index, name| PostgresDialect.placeholder(index, name))
    }
}

#[async_trait]
impl SqlExecutor for PostgresExecutor<'_> {
    async fn execute(&self, statement: &SqlStatement) -> Result<u64, AppError> {
        let (sql, values) = Self::bind(statement)?;
        let params: Vec<&(dyn ToSql + Sync)> =
            values.into_iter().map(|v| v as &(dyn ToSql + Sync)).collect();
        Ok(self.tx.execute(sql.as_str(), &params).await?)
    }

    async fn query_scalar(&self, statement: &SqlStatement) -> Result<Option<i64>, AppError> {
        let (sql, values) = Self::bind(statement)?;
        let params: Vec<&(dyn ToSql + Sync)> =
            values.into_iter().map(|v| v as &(dyn ToSql + Sync)).collect();
        match self.tx.query_opt(sql.as_str(), &params).await? {
            Some(row) => Ok(Some(row.try_get::<_, i64>(0)?)),
            None => Ok(None),
        }
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }
}
