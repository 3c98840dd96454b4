//! Find schemas that need consolidation and consolidate one of them.

use serde::Serialize;

use crate::consolidate::{CommitReport, ConsolidatedScript, ScriptConsolidator};
use crate::dialect::Dialect;
use crate::error::{Result, ScriptError};
use crate::script::{group_by_schema, SqlScript, Version};
use crate::vcs::VersionControl;

/// A module schema whose scripts in the range can be merged.
#[derive(Debug, Serialize)]
pub struct ConsolidationCandidate {
    pub module: String,
    pub schema: String,
    /// Name of the script the chain would be merged into.
    pub filename: String,
    pub scripts: Vec<String>,
}

/// Schemas needing consolidation within a version range.
#[derive(Debug, Serialize)]
pub struct ConsolidateReport {
    pub from: Version,
    pub to: Version,
    pub candidates: Vec<ConsolidationCandidate>,
}

/// A consolidated schema, and what was committed if anything.
#[derive(Debug, Serialize)]
pub struct ConsolidateSchemaReport {
    pub module: String,
    pub script: ConsolidatedScript,
    pub commit: Option<CommitReport>,
}

/// List every module schema with two or more scripts to merge in `[from, to]`.
pub fn execute(
    scripts: &[SqlScript],
    dialect: Dialect,
    from: Version,
    to: Version,
) -> Result<ConsolidateReport> {
    let mut candidates = Vec::new();

    for ((module, schema), group) in group_by_schema(scripts) {
        let consolidator = ScriptConsolidator::new(schema, dialect, group, from, to);
        if !consolidator.needs_consolidation() {
            continue;
        }
        if let Some(filename) = consolidator.filename() {
            candidates.push(ConsolidationCandidate {
                module: module.to_string(),
                schema: schema.to_string(),
                filename,
                scripts: consolidator
                    .scripts()
                    .iter()
                    .map(|s| s.filename.clone())
                    .collect(),
            });
        }
    }

    Ok(ConsolidateReport {
        from,
        to,
        candidates,
    })
}

/// Consolidate one schema. With a version control backend the result is
/// written next to the original scripts and the originals are deleted.
pub fn execute_schema(
    scripts: &[SqlScript],
    dialect: Dialect,
    schema: &str,
    from: Version,
    to: Version,
    commit_with: Option<&dyn VersionControl>,
) -> Result<ConsolidateSchemaReport> {
    let groups = group_by_schema(scripts);
    let matching: Vec<_> = groups
        .iter()
        .filter(|((_, s), _)| s.eq_ignore_ascii_case(schema))
        .collect();

    if matching.is_empty() {
        let mut available: Vec<&str> = groups.keys().map(|(_, s)| *s).collect();
        available.sort_unstable();
        available.dedup();
        return Err(ScriptError::SchemaNotFound {
            name: schema.to_string(),
            available: available.join(", "),
        });
    }

    // The first module with a non-empty chain wins.
    let (module, consolidator) = matching
        .iter()
        .map(|((module, s), group)| {
            (
                *module,
                ScriptConsolidator::new(s, dialect, group.iter().copied(), from, to),
            )
        })
        .find(|(_, c)| !c.scripts().is_empty())
        .ok_or_else(|| ScriptError::NothingToConsolidate {
            schema: schema.to_string(),
            from: from.to_string(),
            to: to.to_string(),
        })?;

    let script = consolidator.build()?;

    let commit = match commit_with {
        Some(vcs) => {
            let directory = script
                .source_paths
                .first()
                .and_then(|p| p.parent())
                .ok_or_else(|| {
                    ScriptError::ConfigError(format!(
                        "Scripts for schema '{}' were not loaded from disk",
                        schema
                    ))
                })?
                .to_path_buf();
            Some(script.commit(&directory, vcs)?)
        }
        None => None,
    };

    Ok(ConsolidateSchemaReport {
        module: module.to_string(),
        script,
        commit,
    })
}
