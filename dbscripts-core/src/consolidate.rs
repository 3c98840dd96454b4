//! Merges a chain of incremental scripts into a single script.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex_lite::Regex;
use serde::Serialize;

use crate::dialect::Dialect;
use crate::error::{Result, ScriptError};
use crate::script::{SqlScript, Version};
use crate::selector::recommended_scripts;
use crate::vcs::VersionControl;

/// A leading block comment, with the whitespace after it.
static LEADING_BLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\A\s*(/\*.*?\*/)\s*").unwrap());

static LICENSE_WORDS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)copyright|licen[cs]e").unwrap());

/// Split a script into its leading license block (if any) and the rest.
pub fn split_license(contents: &str) -> (Option<&str>, &str) {
    if let Some(caps) = LEADING_BLOCK_RE.captures(contents) {
        if let (Some(all), Some(block)) = (caps.get(0), caps.get(1)) {
            if LICENSE_WORDS_RE.is_match(block.as_str()) {
                return (Some(block.as_str()), &contents[all.end()..]);
            }
        }
    }
    (None, contents)
}

fn banner(script: &SqlScript) -> String {
    format!("/* {} */\n", script.filename)
}

/// Selects and merges the scripts of one schema within a version range.
pub struct ScriptConsolidator<'a> {
    schema: String,
    dialect: Dialect,
    scripts: Vec<&'a SqlScript>,
    target_from: Version,
    target_to: Version,
}

impl<'a> ScriptConsolidator<'a> {
    /// Build a consolidator over the recommended chain from `from` towards `to`.
    ///
    /// Scripts of other schemas are ignored.
    pub fn new<I>(schema: &str, dialect: Dialect, scripts: I, from: Version, to: Version) -> Self
    where
        I: IntoIterator<Item = &'a SqlScript>,
    {
        let candidates = scripts.into_iter().filter(|s| s.schema == schema);
        ScriptConsolidator {
            schema: schema.to_string(),
            dialect,
            scripts: recommended_scripts(candidates, from, to),
            target_from: from,
            target_to: to,
        }
    }

    /// The chain of scripts that will be merged, in upgrade order.
    pub fn scripts(&self) -> &[&'a SqlScript] {
        &self.scripts
    }

    /// A single script (or none) is already consolidated.
    pub fn needs_consolidation(&self) -> bool {
        self.scripts.len() > 1
    }

    pub fn actual_from(&self) -> Option<Version> {
        self.scripts.first().map(|s| s.from_version)
    }

    pub fn actual_to(&self) -> Option<Version> {
        self.scripts.last().map(|s| s.to_version)
    }

    /// `{schema}-{from}-{to}.sql` for the chain's actual version range.
    pub fn filename(&self) -> Option<String> {
        match (self.actual_from(), self.actual_to()) {
            (Some(from), Some(to)) => Some(format!("{}-{}-{}.sql", self.schema, from, to)),
            _ => None,
        }
    }

    /// Concatenate the chain, keeping only the first script's license block.
    pub fn consolidated_script(&self) -> String {
        let mut out = String::new();

        for (i, script) in self.scripts.iter().enumerate() {
            let (license, body) = split_license(&script.contents);
            if i == 0 {
                if let Some(license) = license {
                    out.push_str(license);
                    out.push_str("\n\n");
                }
                if !script.incremental && !script.from_version.is_zero() {
                    out.push_str(&banner(script));
                }
            } else {
                out.push_str("\n\n");
                if !script.incremental {
                    out.push_str(&banner(script));
                }
            }
            out.push_str(body.trim());
        }

        if !out.is_empty() {
            out.push('\n');
        }
        out
    }

    /// Advisory warnings for a consolidated script.
    pub fn warnings(&self, consolidated: &str) -> Vec<String> {
        self.dialect.validator().warnings(consolidated)
    }

    /// Produce the consolidated script with its filename and warnings.
    pub fn build(&self) -> Result<ConsolidatedScript> {
        let filename = self.filename().ok_or_else(|| ScriptError::NothingToConsolidate {
            schema: self.schema.clone(),
            from: self.target_from.to_string(),
            to: self.target_to.to_string(),
        })?;

        let contents = self.consolidated_script();
        let warnings = self.warnings(&contents);
        for warning in &warnings {
            log::warn!("Consolidated script warning; file={}, warning={}", filename, warning);
        }

        Ok(ConsolidatedScript {
            schema: self.schema.clone(),
            filename,
            from_version: self.actual_from().unwrap_or(self.target_from),
            to_version: self.actual_to().unwrap_or(self.target_to),
            sources: self.scripts.iter().map(|s| s.filename.clone()).collect(),
            source_paths: self.scripts.iter().filter_map(|s| s.path.clone()).collect(),
            contents,
            warnings,
        })
    }
}

/// The merged script, ready to display or commit.
#[derive(Debug, Clone, Serialize)]
pub struct ConsolidatedScript {
    pub schema: String,
    pub filename: String,
    pub from_version: Version,
    pub to_version: Version,
    /// Filenames of the merged scripts, in upgrade order.
    pub sources: Vec<String>,
    #[serde(skip)]
    pub source_paths: Vec<PathBuf>,
    pub contents: String,
    pub warnings: Vec<String>,
}

/// A source script that could not be deleted after a commit.
#[derive(Debug, Clone, Serialize)]
pub struct DeleteFailure {
    pub path: String,
    pub error: String,
}

/// Outcome of committing a consolidated script.
#[derive(Debug, Clone, Serialize)]
pub struct CommitReport {
    pub written: String,
    pub deleted: Vec<String>,
    pub failed: Vec<DeleteFailure>,
}

impl ConsolidatedScript {
    /// Write the script into `directory`, then delete the merged sources.
    ///
    /// A failed write is an error. Failed deletes are collected in the report
    /// and leave the new file in place.
    pub fn commit(&self, directory: &Path, vcs: &dyn VersionControl) -> Result<CommitReport> {
        let target = directory.join(&self.filename);
        std::fs::write(&target, &self.contents)?;
        log::info!("Wrote consolidated script; path={}", target.display());

        let mut deleted = Vec::new();
        let mut failed = Vec::new();
        for source in &self.source_paths {
            if *source == target {
                continue;
            }
            match vcs.delete(source) {
                Ok(()) => deleted.push(source.display().to_string()),
                Err(e) => {
                    log::warn!(
                        "Failed to delete consolidated source; path={}, vcs={}, error={}",
                        source.display(),
                        vcs.name(),
                        e
                    );
                    failed.push(DeleteFailure {
                        path: source.display().to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        Ok(CommitReport {
            written: target.display().to_string(),
            deleted,
            failed,
        })
    }
}
