//! SQL dialects supported by the script tools.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::{Result, ScriptError};
use crate::grammar::{Grammar, POSTGRES_GRAMMAR, SQL_SERVER_GRAMMAR};
use crate::validate::{PostgresValidator, ScriptValidator, SqlServerValidator};

/// SQL syntax variant governing statement termination and identifier syntax.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum Dialect {
    /// PostgreSQL: statements end with `;`.
    #[default]
    Postgres,
    /// Microsoft SQL Server: statements end with `;` or a `GO` batch separator.
    SqlServer,
}

impl Dialect {
    /// Name of the per-dialect subdirectory holding a module's scripts.
    pub fn directory_name(self) -> &'static str {
        match self {
            Dialect::Postgres => "postgresql",
            Dialect::SqlServer => "sqlserver",
        }
    }

    /// The compiled statement grammar for this dialect.
    pub fn grammar(self) -> &'static Grammar {
        match self {
            Dialect::Postgres => &*POSTGRES_GRAMMAR,
            Dialect::SqlServer => &*SQL_SERVER_GRAMMAR,
        }
    }

    /// The advisory script validator for this dialect.
    pub fn validator(self) -> &'static dyn ScriptValidator {
        match self {
            Dialect::Postgres => &PostgresValidator,
            Dialect::SqlServer => &SqlServerValidator,
        }
    }
}

impl FromStr for Dialect {
    type Err = ScriptError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Dialect::Postgres),
            "sqlserver" | "sql_server" | "mssql" => Ok(Dialect::SqlServer),
            _ => Err(ScriptError::ConfigError(format!(
                "Invalid dialect '{}'. Use 'postgres' or 'sqlserver'.",
                s
            ))),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::Postgres => write!(f, "postgres"),
            Dialect::SqlServer => write!(f, "sqlserver"),
        }
    }
}
