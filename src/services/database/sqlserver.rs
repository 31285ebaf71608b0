// SQL Server dialect (2012+): sys.sequences probe, NEXT VALUE FOR, OFFSET/FETCH paging
use async_trait::async_trait;

use crate::api::middleware::AppError;
use crate::models::{DatabaseFamily, SortDirection};
use crate::services::database::dialect::{
    fetch_next_value, probe_then_create, split_qualified, SqlDialect,
};
use crate::services::database::executor::SqlExecutor;
use crate::services::query_builder::{QueryBuilder, SqlStatement};
use crate::validation::IdentifierValidator;

/// Msg 2714: There is already an object named '...' in the database
const OBJECT_ALREADY_EXISTS: &str = "2714";

#[derive(Debug, Default, Clone, Copy)]
pub struct SqlServerDialect;

impl SqlServerDialect {
    fn probe_statement(name: &str) -> SqlStatement {
        let (schema, object) = split_qualified(name);
        let mut builder = QueryBuilder::new("SELECT COUNT_BIG(*) FROM sys.sequences");
        builder
            .append_criterion("name = :sequence_name")
            .bind_parameter("sequence_name", object);
        if let Some(schema) = schema {
            builder
                .append_criterion("SCHEMA_NAME(schema_id) = :sequence_schema")
                .bind_parameter("sequence_schema", schema);
        }
        builder.build()
    }

    fn create_statement(name: &str, start_value: i64, increment_by: i64) -> SqlStatement {
        SqlStatement::raw(format!(
            "CREATE SEQUENCE {} AS BIGINT START WITH {} INCREMENT BY {}",
            name, start_value, increment_by
        ))
    }

    fn next_value_statement(name: &str) -> SqlStatement {
        SqlStatement::raw(format!("SELECT NEXT VALUE FOR {}", name))
    }
}

#[async_trait]
impl SqlDialect for SqlServerDialect {
    fn family(&self) -> DatabaseFamily {
        DatabaseFamily::SqlServer
    }

    async fn ensure_sequence(
        &self,
        tx: &dyn SqlExecutor,
        name: &str,
        start_value: i64,
        increment_by: i64,
    ) -> Result<(), AppError> {
        let name = IdentifierValidator::validate(name)?;
        probe_then_create(
            self,
            tx,
            name,
            Self::probe_statement(name),
            Self::create_statement(name, start_value, increment_by),
        )
        .await
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
            " ORDER BY {} {} OFFSET :{} ROWS FETCH NEXT :{} ROWS ONLY",
            sort_field,
            direction.as_sql(),
            offset_param,
            limit_param
        )
    }

    fn is_already_exists(&self, err: &AppError) -> bool {
        err.database_code() == Some(OBJECT_ALREADY_EXISTS)
    }

    fn placeholder(&self, index: usize, _name: &str) -> String {
        format!("@P{}", index)
    }
}
