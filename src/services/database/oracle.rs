// Oracle dialect (12c+): data-dictionary probe before CREATE SEQUENCE, OFFSET/FETCH paging
use async_trait::async_trait;

use crate::api::middleware::AppError;
use crate::models::{DatabaseFamily, SortDirection};
use crate::services::database::dialect::{
    fetch_next_value, probe_then_create, split_qualified, SqlDialect,
};
use crate::services::database::executor::SqlExecutor;
use crate::services::query_builder::{QueryBuilder, SqlStatement};
use crate::validation::IdentifierValidator;

/// ORA-00955: name is already used by an existing object
const NAME_ALREADY_USED: &str = "ORA-00955";

#[derive(Debug, Default, Clone, Copy)]
pub struct OracleDialect;

impl OracleDialect {
    /// Unquoted Oracle identifiers are stored upper-case in the data dictionary
    fn probe_statement(name: &str) -> SqlStatement {
        match split_qualified(name) {
            (Some(owner), object) => {
                let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM all_sequences");
                builder
                    .append_criterion("sequence_owner = :sequence_owner")
                    .bind_parameter("sequence_owner", owner.to_uppercase())
                    .append_criterion("sequence_name = :sequence_name")
                    .bind_parameter("sequence_name", object.to_uppercase());
                builder.build()
            }
            (None, object) => {
                let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM user_sequences");
                builder
                    .append_criterion("sequence_name = :sequence_name")
                    .bind_parameter("sequence_name", object.to_uppercase());
                builder.build()
            }
        }
    }

    fn create_statement(name: &str, start_value: i64, increment_by: i64) -> SqlStatement {
        SqlStatement::raw(format!(
            "CREATE SEQUENCE {} START WITH {} INCREMENT BY {}",
            name, start_value, increment_by
        ))
    }

    fn next_value_statement(name: &str) -> SqlStatement {
        SqlStatement::raw(format!("SELECT {}.NEXTVAL FROM DUAL", name))
    }
}

#[async_trait]
impl SqlDialect for OracleDialect {
    fn family(&self) -> DatabaseFamily {
        DatabaseFamily::Oracle
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
        // Drivers report either the full "ORA-00955" or the bare error number
        match err.database_code() {
            Some(code) => {
                code.eq_ignore_ascii_case(NAME_ALREADY_USED)
                    || code.trim_start_matches('0') == "955"
            }
            None => false,
        }
    }

    fn placeholder(&self, _index: usize, name: &str) -> String {
        format!(":{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::middleware::DatabaseError;
    use crate::models::Pageable;
    use crate::services::database::testing::SimulatedStore;
    use crate::services::query_builder::SqlValue;

    #[test]
    fn test_pagination_clause_uses_offset_fetch() {
        let clause = OracleDialect.pagination_clause("last_name", SortDirection::Ascending, "lim", "off");
        assert_eq!(clause, " ORDER BY last_name ASC OFFSET :off ROWS FETCH NEXT :lim ROWS ONLY");
    }

    #[test]
    fn test_paginate_keeps_named_placeholders() {
        let mut builder = QueryBuilder::new("SELECT * FROM subject");
        OracleDialect.paginate(&mut builder, &Pageable::new(1, 20, "id", SortDirection::Descending));
        let statement = builder.build();
        assert_eq!(statement.parameter("offset"), Some(&SqlValue::Int(0)));
        assert_eq!(statement.parameter("limit"), Some(&SqlValue::Int(20)));

        let (sql, _) = statement
            .to_positional(|i, n| OracleDialect.placeholder(i, n))
            .unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM subject ORDER BY id DESC OFFSET :offset ROWS FETCH NEXT :limit ROWS ONLY"
        );
    }

    #[test]
    fn test_probe_statement_uppercases_names() {
        let probe = OracleDialect::probe_statement("visit_seq");
        assert_eq!(
            probe.text,
            "SELECT COUNT(*) FROM user_sequences WHERE sequence_name = :sequence_name"
        );
        assert_eq!(
            probe.parameter("sequence_name"),
            Some(&SqlValue::Text("VISIT_SEQ".to_string()))
        );

        let qualified = OracleDialect::probe_statement("clinical.visit_seq");
        assert!(qualified.text.contains("all_sequences"));
        assert_eq!(
            qualified.parameter("sequence_owner"),
            Some(&SqlValue::Text("CLINICAL".to_string()))
        );
    }

    #[test]
    fn test_already_exists_codes() {
        let full = AppError::Database(DatabaseError::with_code("ORA-00955", "name is already used"));
        let bare = AppError::Database(DatabaseError::with_code("955", "name is already used"));
        let other = AppError::Database(DatabaseError::with_code("ORA-01031", "insufficient privileges"));
        assert!(OracleDialect.is_already_exists(&full));
        assert!(OracleDialect.is_already_exists(&bare));
        assert!(!OracleDialect.is_already_exists(&other));
    }

    #[tokio::test]
    async fn test_ensure_sequence_probes_before_creating() {
        let store = SimulatedStore::new(DatabaseFamily::Oracle);
        OracleDialect.ensure_sequence(&store, "visit_seq", 1, 1).await.unwrap();
        OracleDialect.ensure_sequence(&store, "visit_seq", 1, 1).await.unwrap();

        let executed = store.executed_sql();
        assert_eq!(executed.len(), 3, "probe, create, probe: {:?}", executed);
        assert!(executed[0].contains("user_sequences"));
        assert_eq!(executed[1], "CREATE SEQUENCE visit_seq START WITH 1 INCREMENT BY 1");
        assert!(executed[2].contains("user_sequences"));
    }

    #[tokio::test]
    async fn test_create_race_is_absorbed() {
        let store = SimulatedStore::new(DatabaseFamily::Oracle);
        OracleDialect.ensure_sequence(&store, "visit_seq", 1, 1).await.unwrap();

        // Another session created the sequence after our probe returned zero
        store.hide_from_probe(true);
        OracleDialect.ensure_sequence(&store, "visit_seq", 1, 1).await.unwrap();

        assert_eq!(OracleDialect.next_sequence_value(&store, "visit_seq").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_other_create_failures_propagate() {
        let store = SimulatedStore::new(DatabaseFamily::Oracle);
        store.fail_on_create(DatabaseError::with_code("ORA-01031", "insufficient privileges"));
        let err = OracleDialect.ensure_sequence(&store, "visit_seq", 1, 1).await.unwrap_err();
        assert_eq!(err.database_code(), Some("ORA-01031"));
    }

    #[tokio::test]
    async fn test_next_value_statement() {
        let store = SimulatedStore::new(DatabaseFamily::Oracle);
        OracleDialect.ensure_sequence(&store, "visit_seq", 10, 10).await.unwrap();
        assert_eq!(OracleDialect.next_sequence_value(&store, "visit_seq").await.unwrap(), 10);
        assert_eq!(OracleDialect.next_sequence_value(&store, "visit_seq").await.unwrap(), 20);
        assert_eq!(store.executed_sql().last().unwrap(), "SELECT visit_seq.NEXTVAL FROM DUAL");
    }
}
