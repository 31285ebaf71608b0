// Query Builder
//
// Accumulates a parameterized, dialect-neutral SQL fragment. Parameters are referenced
// in the text as `:name` and rewritten into the driver's placeholder syntax only when
// the statement is executed.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::api::middleware::AppError;

/// Value bound to a named query parameter
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::Int(i64::from(v))
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Int(v)
    }
}

impl From<u32> for SqlValue {
    fn from(v: u32) -> Self {
        SqlValue::Int(i64::from(v))
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Float(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(v: DateTime<Utc>) -> Self {
        SqlValue::Timestamp(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

/// Finalized `{text, parameters}` pair, ready for a parameterized-query executor
#[derive(Debug, Clone, PartialEq)]
pub struct SqlStatement {
    pub text: String,
    pub parameters: HashMap<String, SqlValue>,
}

impl SqlStatement {
    /// Statement without parameters
    pub fn raw(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            parameters: HashMap::new(),
        }
    }

    pub fn parameter(&self, name: &str) -> Option<&SqlValue> {
        self.parameters.get(name)
    }

    /// Rewrite `:name` references into positional placeholders.
    ///
    /// `placeholder` receives the 1-based position and the parameter name. A name used
    /// more than once keeps its first position. `::` casts and single-quoted literals are
    /// copied through unchanged.
    pub fn to_positional<F>(&self, placeholder: F) -> Result<(String, Vec<&SqlValue>), AppError>
    where
        F: Fn(usize, &str) -> String,
    {
        let mut text = String::with_capacity(self.text.len());
        let mut ordered: Vec<&SqlValue> = Vec::new();
        let mut positions: HashMap<&str, usize> = HashMap::new();

        let source = self.text.as_str();
        let bytes = source.as_bytes();
        let mut copied = 0;
        let mut in_literal = false;
        let mut i = 0;

        // Only ASCII bytes are matched, so every slice boundary is a char boundary
        while i < bytes.len() {
            let c = bytes[i];
            if in_literal {
                if c == b'\'' {
                    in_literal = false;
                }
                i += 1;
                continue;
            }
            match c {
                b'\'' => {
                    in_literal = true;
                    i += 1;
                }
                b':' if bytes.get(i + 1) == Some(&b':') => {
                    i += 2;
                }
                b':' if bytes
                    .get(i + 1)
                    .is_some_and(|n| n.is_ascii_alphabetic() || *n == b'_') =>
                {
                    let start = i + 1;
                    let mut end = start;
                    while end < bytes.len() && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_') {
                        end += 1;
                    }
                    let name = &source[start..end];
                    let value = self.parameters.get(name).ok_or_else(|| {
                        AppError::Validation(format!("Parameter '{}' is referenced but not bound", name))
                    })?;
                    let position = match positions.get(name) {
                        Some(position) => *position,
                        None => {
                            ordered.push(value);
                            positions.insert(name, ordered.len());
                            ordered.len()
                        }
                    };
                    text.push_str(&source[copied..i]);
                    text.push_str(&placeholder(position, name));
                    copied = end;
                    i = end;
                }
                _ => {
                    i += 1;
                }
            }
        }
        text.push_str(&source[copied..]);

        Ok((text, ordered))
    }
}

/// Incremental SQL builder: criteria, raw suffixes and named parameters
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    text: String,
    parameters: HashMap<String, SqlValue>,
    has_criteria: bool,
}

impl QueryBuilder {
    /// Start from a base statement such as `SELECT ... FROM patient`
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            text: base.into(),
            parameters: HashMap::new(),
            has_criteria: false,
        }
    }

    /// Append a filter condition; the first one opens the WHERE clause, later ones are
    /// joined with AND.
    pub fn append_criterion(&mut self, fragment: &str) -> &mut Self {
        if self.has_criteria {
            self.text.push_str(" AND ");
        } else {
            self.text.push_str(" WHERE ");
            self.has_criteria = true;
        }
        self.text.push_str(fragment);
        self
    }

    /// Append text verbatim (ordering, pagination); never opens or extends the WHERE clause
    pub fn append_raw(&mut self, fragment: &str) -> &mut Self {
        self.text.push_str(fragment);
        self
    }

    /// Bind a named parameter; rebinding a name replaces the earlier value
    pub fn bind_parameter(&mut self, name: impl Into<String>, value: impl Into<SqlValue>) -> &mut Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    pub fn has_parameters(&self) -> bool {
        !self.parameters.is_empty()
    }

    pub fn has_criteria(&self) -> bool {
        self.has_criteria
    }

    pub fn sql(&self) -> &str {
        &self.text
    }

    pub fn parameters(&self) -> &HashMap<String, SqlValue> {
        &self.parameters
    }

    /// Finish the fragment
    pub fn build(self) -> SqlStatement {
        SqlStatement {
            text: self.text,
            parameters: self.parameters,
        }
    }
}
