//! Maintenance tooling for versioned SQL migration scripts.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use dbscripts_core::config::{CliOverrides, DbScriptsConfig};
//! use dbscripts_core::{DbScripts, Version};
//!
//! # fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = DbScriptsConfig::load(None, &CliOverrides::default())?;
//! let tools = DbScripts::new(config);
//! let report = tools.consolidation_candidates(Version::parse("1.00")?, Version::parse("1.10")?)?;
//! println!("{} schema(s) need consolidation", report.candidates.len());
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - [`config`]: Configuration loading (TOML, env vars, CLI overrides)
//! - [`script`]: Script filenames, versions and directory scanning
//! - [`dialect`]: Postgres / SQL Server dialect selection
//! - [`grammar`]: Ordered regex statement grammars per dialect
//! - [`reorder`]: Groups a script's statements by table
//! - [`selector`]: Version-range chains, orphaned and unreachable scripts
//! - [`consolidate`]: Merges a chain of scripts into one
//! - [`validate`]: Advisory per-dialect script warnings
//! - [`vcs`]: Version control deletion backends
//! - [`commands`]: Individual command implementations
//! - [`error`]: Error types

pub mod commands;
pub mod config;
pub mod consolidate;
pub mod dialect;
pub mod error;
pub mod grammar;
pub mod reorder;
pub mod script;
pub mod selector;
pub mod validate;
pub mod vcs;

use std::path::Path;

use config::DbScriptsConfig;
use error::Result;

pub use commands::check::CheckReport;
pub use commands::consolidate::{ConsolidateReport, ConsolidateSchemaReport};
pub use commands::list::ListReport;
pub use commands::orphans::OrphansReport;
pub use commands::reorder::{ReorderAllReport, ReorderReport};
pub use commands::unreachable::UnreachableReport;
pub use config::CliOverrides;
pub use dialect::Dialect;
pub use reorder::ScriptReorderer;
pub use script::{SqlScript, Version};

/// Main entry point for the dbscripts library.
///
/// Create a `DbScripts` instance with a config and use its methods to run
/// commands programmatically. Every method rescans the module directories.
pub struct DbScripts {
    pub config: DbScriptsConfig,
}

impl DbScripts {
    pub fn new(config: DbScriptsConfig) -> Self {
        Self { config }
    }

    /// Scan every configured module for scripts.
    pub fn scripts(&self) -> Result<Vec<SqlScript>> {
        script::scan_modules(&self.config.modules, self.config.scripts.dialect)
    }

    /// List scripts and per-schema summaries.
    pub fn list(&self) -> Result<ListReport> {
        commands::list::execute(&self.config.modules, self.config.scripts.dialect)
    }

    /// Reorder one script file.
    pub fn reorder(
        &self,
        path: &Path,
        schema: Option<&str>,
        as_html: bool,
        write: bool,
    ) -> Result<ReorderReport> {
        commands::reorder::execute(path, schema, self.config.scripts.dialect, as_html, write)
    }

    /// Reorder every script in every module.
    pub fn reorder_all(&self, write: bool) -> Result<ReorderAllReport> {
        let scripts = self.scripts()?;
        commands::reorder::execute_all(&scripts, self.config.scripts.dialect, write)
    }

    /// Schemas with two or more scripts to merge in `[from, to]`.
    pub fn consolidation_candidates(&self, from: Version, to: Version) -> Result<ConsolidateReport> {
        let scripts = self.scripts()?;
        commands::consolidate::execute(&scripts, self.config.scripts.dialect, from, to)
    }

    /// Consolidate one schema, committing through the configured VCS if `commit`.
    pub fn consolidate(
        &self,
        schema: &str,
        from: Version,
        to: Version,
        commit: bool,
    ) -> Result<ConsolidateSchemaReport> {
        let scripts = self.scripts()?;
        let vcs = self.config.scripts.vcs.backend();
        commands::consolidate::execute_schema(
            &scripts,
            self.config.scripts.dialect,
            schema,
            from,
            to,
            commit.then_some(vcs.as_ref()),
        )
    }

    /// Orphaned scripts and their successors.
    pub fn orphans(&self) -> Result<OrphansReport> {
        let scripts = self.scripts()?;
        commands::orphans::execute(&scripts)
    }

    /// Scripts unreachable from the configured checkpoints when upgrading to `to`.
    pub fn unreachable(&self, to: Version) -> Result<UnreachableReport> {
        let scripts = self.scripts()?;
        commands::unreachable::execute(&scripts, to, &self.config.scripts.checkpoints)
    }

    /// Run the dialect validator over every script.
    pub fn check(&self, strict: bool) -> Result<CheckReport> {
        let scripts = self.scripts()?;
        commands::check::execute(&scripts, self.config.scripts.dialect, strict)
    }
}
