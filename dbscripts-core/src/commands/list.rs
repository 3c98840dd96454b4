//! List the scripts of every configured module.

use serde::Serialize;

use crate::config::ModuleConfig;
use crate::dialect::Dialect;
use crate::error::Result;
use crate::script::{group_by_schema, scan_modules, SqlScript, Version};

/// Summary of one module schema.
#[derive(Debug, Serialize)]
pub struct SchemaSummary {
    pub module: String,
    pub schema: String,
    pub script_count: usize,
    pub incremental_count: usize,
    /// Highest `to_version` of any script.
    pub latest_version: Version,
}

/// Scripts found across all modules.
#[derive(Debug, Serialize)]
pub struct ListReport {
    /// All scripts, sorted by schema and version.
    pub scripts: Vec<SqlScript>,
    pub schemas: Vec<SchemaSummary>,
}

/// Execute the list command.
pub fn execute(modules: &[ModuleConfig], dialect: Dialect) -> Result<ListReport> {
    let scripts = scan_modules(modules, dialect)?;

    let schemas = group_by_schema(&scripts)
        .into_iter()
        .map(|((module, schema), group)| SchemaSummary {
            module: module.to_string(),
            schema: schema.to_string(),
            script_count: group.len(),
            incremental_count: group.iter().filter(|s| s.incremental).count(),
            latest_version: group
                .iter()
                .map(|s| s.to_version)
                .max()
                .unwrap_or_default(),
        })
        .collect();

    Ok(ListReport { scripts, schemas })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_list_summarizes_schemas() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("ext-0.00-1.00.sql"), "").unwrap();
        fs::write(dir.path().join("ext-1.00-1.01.sql"), "").unwrap();
        fs::write(dir.path().join("core-0.00-2.10.sql"), "").unwrap();

        let modules = vec![ModuleConfig {
            name: "m".to_string(),
            directory: dir.path().to_path_buf(),
        }];
        let report = execute(&modules, Dialect::Postgres).unwrap();

        assert_eq!(report.scripts.len(), 3);
        assert_eq!(report.schemas.len(), 2);
        let ext = report.schemas.iter().find(|s| s.schema == "ext").unwrap();
        assert_eq!(ext.script_count, 2);
        assert_eq!(ext.incremental_count, 1);
        assert_eq!(ext.latest_version.to_string(), "1.01");
    }
}
