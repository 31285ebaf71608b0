// Pageable specification for paginated read queries

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::api::middleware::AppError;

/// Sort direction of a paginated query
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum SortDirection {
    #[default]
    #[serde(rename = "asc", alias = "ASC", alias = "ascending")]
    Ascending,
    #[serde(rename = "desc", alias = "DESC", alias = "descending")]
    Descending,
}

impl SortDirection {
    /// SQL keyword for this direction
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Ascending => "ASC",
            SortDirection::Descending => "DESC",
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// One page of a result set: `{page, size, sort_field, direction}`.
///
/// Pages are 1-based; page 1 starts at offset 0.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Pageable {
    pub page: u32,
    pub size: u32,
    pub sort_field: String,
    #[serde(default)]
    pub direction: SortDirection,
}

impl Pageable {
    pub fn new(page: u32, size: u32, sort_field: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            page,
            size,
            sort_field: sort_field.into(),
            direction,
        }
    }

    /// Number of rows to skip
    pub fn offset(&self) -> i64 {
        (i64::from(self.page.max(1)) - 1) * i64::from(self.size)
    }

    /// Number of rows to take
    pub fn limit(&self) -> i64 {
        i64::from(self.size)
    }

    /// Check page bounds and that the sort field is one of `allowed_columns`.
    ///
    /// The sort field ends up verbatim in the ORDER BY clause, so callers must run this
    /// before handing the pageable to a dialect.
    pub fn validate(&self, allowed_columns: &[&str]) -> Result<(), AppError> {
        if self.page < 1 {
            return Err(AppError::Validation("Page must be at least 1".to_string()));
        }
        if self.size < 1 {
            return Err(AppError::Validation("Page size must be at least 1".to_string()));
        }
        if !allowed_columns.iter().any(|c| *c == self.sort_field) {
            return Err(AppError::Validation(format!(
                "Sorting by '{}' is not allowed",
                self.sort_field
            )));
        }
        Ok(())
    }
}
