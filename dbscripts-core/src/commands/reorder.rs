//! Reorder one script, or every script, by table.

use std::path::Path;

use serde::Serialize;

use crate::dialect::Dialect;
use crate::error::{Result, ScriptError};
use crate::reorder::ScriptReorderer;
use crate::script::{parse_script_filename, SqlScript};

/// Result of reordering a single script.
#[derive(Debug, Serialize)]
pub struct ReorderReport {
    pub path: String,
    pub schema: String,
    /// Reordered text, plain SQL or HTML.
    pub output: String,
    /// Whether reordering changed more than whitespace.
    pub changed: bool,
    pub written: bool,
}

/// Result of reordering every script.
#[derive(Debug, Serialize)]
pub struct ReorderAllReport {
    pub scripts_checked: usize,
    /// Filenames whose statement order changes.
    pub changed: Vec<String>,
    pub written: usize,
}

/// Execute the reorder command on one file.
///
/// The schema defaults to the one in the script's filename.
pub fn execute(
    path: &Path,
    schema: Option<&str>,
    dialect: Dialect,
    as_html: bool,
    write: bool,
) -> Result<ReorderReport> {
    if as_html && write {
        return Err(ScriptError::ConfigError(
            "--html output cannot be written back to a script".to_string(),
        ));
    }

    let schema = match schema {
        Some(s) => s.to_string(),
        None => {
            let filename = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
            parse_script_filename(filename)
                .map(|(schema, _, _)| schema)
                .map_err(|_| {
                    ScriptError::ScriptNameError(format!(
                        "Cannot infer the schema of '{}'; pass --schema",
                        path.display()
                    ))
                })?
        }
    };

    let contents = std::fs::read_to_string(path)?;
    let reorderer = ScriptReorderer::new(&contents, &schema, dialect);
    let plain = reorderer.reorder(false);
    let changed = !same_text(&contents, &plain);

    let written = write && changed;
    if written {
        std::fs::write(path, &plain)?;
        log::info!("Rewrote reordered script; path={}", path.display());
    }

    let output = if as_html {
        reorderer.reorder(true)
    } else {
        plain
    };

    Ok(ReorderReport {
        path: path.display().to_string(),
        schema,
        output,
        changed,
        written,
    })
}

/// Reorder every script, reporting (and optionally rewriting) those that change.
pub fn execute_all(scripts: &[SqlScript], dialect: Dialect, write: bool) -> Result<ReorderAllReport> {
    let mut changed = Vec::new();
    let mut written = 0;

    for script in scripts {
        let reordered = ScriptReorderer::new(&script.contents, &script.schema, dialect).reorder(false);
        if same_text(&script.contents, &reordered) {
            continue;
        }
        log::debug!("Script order changes; script={}", script.filename);
        changed.push(script.filename.clone());

        if write {
            if let Some(ref path) = script.path {
                std::fs::write(path, &reordered)?;
                log::info!("Rewrote reordered script; path={}", path.display());
                written += 1;
            }
        }
    }

    Ok(ReorderAllReport {
        scripts_checked: scripts.len(),
        changed,
        written,
    })
}

/// Compare ignoring whitespace layout.
fn same_text(a: &str, b: &str) -> bool {
    a.split_whitespace().eq(b.split_whitespace())
}
