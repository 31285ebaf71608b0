use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::api::middleware::AppError;

/// Database engine families with a supported SQL dialect
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseFamily {
    /// PostgreSQL
    #[serde(alias = "postgres")]
    PostgreSql,
    /// Oracle Database 12c or later
    Oracle,
    /// Microsoft SQL Server 2012 or later
    #[serde(alias = "mssql")]
    SqlServer,
}

impl DatabaseFamily {
    /// Get the string representation of the database family
    pub fn as_str(&self) -> &'static str {
        match self {
            DatabaseFamily::PostgreSql => "postgresql",
            DatabaseFamily::Oracle => "oracle",
            DatabaseFamily::SqlServer => "sqlserver",
        }
    }
}

impl FromStr for DatabaseFamily {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "postgresql" | "postgres" => Ok(DatabaseFamily::PostgreSql),
            "oracle" => Ok(DatabaseFamily::Oracle),
            "sqlserver" | "mssql" => Ok(DatabaseFamily::SqlServer),
            _ => Err(AppError::Configuration(format!(
                "Unsupported database family: {}",
                s
            ))),
        }
    }
}

impl fmt::Display for DatabaseFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
