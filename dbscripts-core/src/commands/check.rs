//! Run the dialect's advisory validator over every script.

use serde::Serialize;

use crate::dialect::Dialect;
use crate::error::{Result, ScriptError};
use crate::script::SqlScript;

/// A single validator warning.
#[derive(Debug, Clone, Serialize)]
pub struct CheckIssue {
    pub module: String,
    pub script: String,
    pub message: String,
}

/// Aggregate check report.
#[derive(Debug, Serialize)]
pub struct CheckReport {
    pub issues: Vec<CheckIssue>,
    pub files_checked: usize,
    /// Number of scripts with at least one warning.
    pub files_with_warnings: usize,
}

/// Execute the check command. In strict mode any warning is an error.
pub fn execute(scripts: &[SqlScript], dialect: Dialect, strict: bool) -> Result<CheckReport> {
    let validator = dialect.validator();
    let mut issues = Vec::new();
    let mut files_with_warnings = 0;

    for script in scripts {
        let warnings = validator.warnings(&script.contents);
        if warnings.is_empty() {
            continue;
        }
        files_with_warnings += 1;
        issues.extend(warnings.into_iter().map(|message| CheckIssue {
            module: script.module.clone(),
            script: script.filename.clone(),
            message,
        }));
    }

    if strict && !issues.is_empty() {
        let details = issues
            .iter()
            .map(|i| format!("{}: {}", i.script, i.message))
            .collect::<Vec<_>>()
            .join("; ");
        return Err(ScriptError::ValidationFailed {
            count: files_with_warnings,
            details,
        });
    }

    Ok(CheckReport {
        issues,
        files_checked: scripts.len(),
        files_with_warnings,
    })
}
