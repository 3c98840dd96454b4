//! Error types for script maintenance operations.

use thiserror::Error;

/// All error types that dbscripts operations can produce.
#[derive(Error, Debug)]
pub enum ScriptError {
    /// Invalid or missing configuration (TOML parse errors, unknown dialect, etc.).
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A filesystem I/O operation failed (reading scripts, writing output, etc.).
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// A script filename could not be parsed as `<schema>-<from>-<to>.sql`.
    #[error("Script name error: {0}")]
    ScriptNameError(String),

    /// A version string could not be parsed.
    #[error("Invalid version '{0}'. Expected a number such as 1.05")]
    InvalidVersion(String),

    /// The requested schema has no scripts in any configured module.
    #[error("Schema '{name}' not found. Available: {available}")]
    SchemaNotFound { name: String, available: String },

    /// The requested version range selects no scripts for the schema.
    #[error("No scripts to consolidate for schema '{schema}' between {from} and {to}")]
    NothingToConsolidate {
        schema: String,
        from: String,
        to: String,
    },

    /// A version control operation failed.
    #[error("Version control error: {0}")]
    VcsError(String),

    /// Strict checking found scripts with warnings.
    #[error("{count} script(s) with warnings: {details}")]
    ValidationFailed { count: usize, details: String },
}

/// Convenience type alias for `Result<T, ScriptError>`.
pub type Result<T> = std::result::Result<T, ScriptError>;
