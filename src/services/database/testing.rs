// In-memory stand-in for a backing store, for unit tests.
//
// Understands the sequence DDL, probe and next-value statements the three dialects emit,
// records every statement, and can inject failures. Optionally models PostgreSQL's
// aborted-transaction state and savepoints.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::api::middleware::{AppError, DatabaseError};
use crate::models::DatabaseFamily;
use crate::services::database::executor::SqlExecutor;
use crate::services::query_builder::{SqlStatement, SqlValue};

#[derive(Debug, Clone, Copy)]
struct SequenceState {
    next: i64,
    increment: i64,
}

pub struct SimulatedStore {
    family: DatabaseFamily,
    sequences: Mutex<HashMap<String, SequenceState>>,
    executed: Mutex<Vec<SqlStatement>>,
    fail_next: Mutex<Option<DatabaseError>>,
    fail_on_create: Mutex<Option<DatabaseError>>,
    hide_from_probe: AtomicBool,
    read_only: bool,
    abort_on_error: bool,
    aborted: AtomicBool,
    savepoints: Mutex<Vec<String>>,
}

impl SimulatedStore {
    pub fn new(family: DatabaseFamily) -> Self {
        Self {
            family,
            sequences: Mutex::new(HashMap::new()),
            executed: Mutex::new(Vec::new()),
            fail_next: Mutex::new(None),
            fail_on_create: Mutex::new(None),
            hide_from_probe: AtomicBool::new(false),
            read_only: false,
            abort_on_error: false,
            aborted: AtomicBool::new(false),
            savepoints: Mutex::new(Vec::new()),
        }
    }

    /// A store where any failed statement aborts the transaction: every later statement
    /// fails with 25P02 until the transaction rolls back to a savepoint taken earlier
    pub fn aborting(family: DatabaseFamily) -> Self {
        Self {
            abort_on_error: true,
            ..Self::new(family)
        }
    }

    pub fn read_only(family: DatabaseFamily) -> Self {
        Self {
            read_only: true,
            ..Self::new(family)
        }
    }

    /// Fail the next statement of any kind
    pub fn fail_next(&self, err: DatabaseError) {
        *self.fail_next.lock().unwrap() = Some(err);
    }

    /// Fail the next CREATE SEQUENCE statement
    pub fn fail_on_create(&self, err: DatabaseError) {
        *self.fail_on_create.lock().unwrap() = Some(err);
    }

    /// Make existence probes report zero sequences, as if another session created one
    /// between our probe and our create
    pub fn hide_from_probe(&self, hide: bool) {
        self.hide_from_probe.store(hide, Ordering::SeqCst);
    }

    pub fn executed_sql(&self) -> Vec<String> {
        self.executed
            .lock()
            .unwrap()
            .iter()
            .map(|s| s.text.clone())
            .collect()
    }

    fn already_exists(&self, name: &str) -> AppError {
        let code = match self.family {
            DatabaseFamily::PostgreSql => "42P07",
            DatabaseFamily::Oracle => "ORA-00955",
            DatabaseFamily::SqlServer => "2714",
        };
        AppError::Database(DatabaseError::with_code(code, format!("{} already exists", name)))
    }

    fn missing(&self, name: &str) -> AppError {
        let code = match self.family {
            DatabaseFamily::PostgreSql => "42P01",
            DatabaseFamily::Oracle => "ORA-02289",
            DatabaseFamily::SqlServer => "208",
        };
        AppError::Database(DatabaseError::with_code(code, format!("{} does not exist", name)))
    }

    fn record(&self, statement: &SqlStatement) -> Result<(), AppError> {
        self.executed.lock().unwrap().push(statement.clone());
        if let Some(err) = self.fail_next.lock().unwrap().take() {
            return Err(AppError::Database(err));
        }
        if self.aborted.load(Ordering::SeqCst)
            && !statement.text.starts_with("ROLLBACK TO SAVEPOINT ")
        {
            return Err(AppError::Database(DatabaseError::with_code(
                "25P02",
                "current transaction is aborted, commands ignored until end of transaction block",
            )));
        }
        Ok(())
    }

    fn track<T>(&self, result: Result<T, AppError>) -> Result<T, AppError> {
        if result.is_err() && self.abort_on_error {
            self.aborted.store(true, Ordering::SeqCst);
        }
        result
    }

    fn savepoint(&self, text: &str) -> Result<u64, AppError> {
        let mut savepoints = self.savepoints.lock().unwrap();
        if let Some(name) = text.strip_prefix("ROLLBACK TO SAVEPOINT ") {
            let position = savepoints.iter().rposition(|s| s == name).ok_or_else(|| {
                AppError::Database(DatabaseError::with_code("3B001", format!("savepoint {} does not exist", name)))
            })?;
            savepoints.truncate(position + 1);
            self.aborted.store(false, Ordering::SeqCst);
        } else if let Some(name) = text.strip_prefix("RELEASE SAVEPOINT ") {
            let position = savepoints.iter().rposition(|s| s == name).ok_or_else(|| {
                AppError::Database(DatabaseError::with_code("3B001", format!("savepoint {} does not exist", name)))
            })?;
            savepoints.truncate(position);
        } else if let Some(name) = text.strip_prefix("SAVEPOINT ") {
            savepoints.push(name.to_string());
        }
        Ok(0)
    }

    /// Whether the transaction is currently in the aborted state
    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    fn create(&self, text: &str) -> Result<u64, AppError> {
        if let Some(err) = self.fail_on_create.lock().unwrap().take() {
            return Err(AppError::Database(err));
        }

        let rest = text.trim_start_matches("CREATE SEQUENCE ");
        let (conditional, rest) = match rest.strip_prefix("IF NOT EXISTS ") {
            Some(rest) => (true, rest),
            None => (false, rest),
        };
        let tokens: Vec<&str> = rest.split_whitespace().collect();
        let name = tokens[0].to_lowercase();
        let start = value_after(&tokens, "WITH").unwrap_or(1);
        let increment = value_after(&tokens, "BY").unwrap_or(1);

        let mut sequences = self.sequences.lock().unwrap();
        if sequences.contains_key(&name) {
            return if conditional {
                Ok(0)
            } else {
                Err(self.already_exists(&name))
            };
        }
        sequences.insert(name, SequenceState { next: start, increment });
        Ok(0)
    }

    fn next_value(&self, text: &str) -> Result<Option<i64>, AppError> {
        let raw_name = if let Some(rest) = text.strip_prefix("SELECT nextval('") {
            rest.trim_end_matches("')")
        } else if let Some(rest) = text.strip_prefix("SELECT NEXT VALUE FOR ") {
            rest
        } else {
            text.trim_start_matches("SELECT ")
                .trim_end_matches(".NEXTVAL FROM DUAL")
        };
        let name = raw_name.to_lowercase();

        let mut sequences = self.sequences.lock().unwrap();
        match sequences.get_mut(&name) {
            Some(state) => {
                let value = state.next;
                state.next += state.increment;
                Ok(Some(value))
            }
            None => Err(self.missing(&name)),
        }
    }

    fn probe(&self, statement: &SqlStatement) -> Result<Option<i64>, AppError> {
        if self.hide_from_probe.load(Ordering::SeqCst) {
            return Ok(Some(0));
        }
        let name = match statement.parameter("sequence_name") {
            Some(SqlValue::Text(name)) => name.to_lowercase(),
            _ => return Ok(Some(0)),
        };
        let sequences = self.sequences.lock().unwrap();
        let found = sequences
            .keys()
            .any(|key| key == &name || key.rsplit('.').next() == Some(name.as_str()));
        Ok(Some(i64::from(found)))
    }
}

fn value_after(tokens: &[&str], keyword: &str) -> Option<i64> {
    tokens
        .iter()
        .position(|t| *t == keyword)
        .and_then(|i| tokens.get(i + 1))
        .and_then(|v| v.parse().ok())
}

#[async_trait::async_trait]
impl SqlExecutor for SimulatedStore {
    async fn execute(&self, statement: &SqlStatement) -> Result<u64, AppError> {
        let result = self.record(statement).and_then(|_| {
            let text = statement.text.as_str();
            if text.starts_with("CREATE SEQUENCE") {
                self.create(text)
            } else if text.contains("SAVEPOINT ") {
                self.savepoint(text)
            } else {
                Ok(0)
            }
        });
        self.track(result)
    }

    async fn query_scalar(&self, statement: &SqlStatement) -> Result<Option<i64>, AppError> {
        let result = self.record(statement).and_then(|_| {
            let text = statement.text.as_str();
            if text.contains("sequences") {
                self.probe(statement)
            } else if text.contains("nextval(") || text.contains("NEXT VALUE FOR") || text.contains(".NEXTVAL") {
                self.next_value(text)
            } else {
                Ok(None)
            }
        });
        self.track(result)
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }
}
