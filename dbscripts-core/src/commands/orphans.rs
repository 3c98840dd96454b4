//! Report scripts that the selection policy can never choose.

use serde::Serialize;

use crate::error::Result;
use crate::script::SqlScript;
use crate::selector::orphaned_scripts;

/// An orphaned script and the script that supersedes it.
#[derive(Debug, Serialize)]
pub struct OrphanEntry {
    pub module: String,
    pub schema: String,
    pub orphan: String,
    pub successor: String,
}

/// All orphaned scripts.
#[derive(Debug, Serialize)]
pub struct OrphansReport {
    pub scripts_checked: usize,
    pub orphans: Vec<OrphanEntry>,
}

/// Execute the orphans command.
pub fn execute(scripts: &[SqlScript]) -> Result<OrphansReport> {
    let orphans = orphaned_scripts(scripts)
        .into_iter()
        .map(|o| OrphanEntry {
            module: o.orphan.module.clone(),
            schema: o.orphan.schema.clone(),
            orphan: o.orphan.filename.clone(),
            successor: o.successor.filename.clone(),
        })
        .collect();

    Ok(OrphansReport {
        scripts_checked: scripts.len(),
        orphans,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orphans_report() {
        let scripts: Vec<SqlScript> = ["ext-1.00-1.10.sql", "ext-1.00-1.20.sql"]
            .iter()
            .map(|n| SqlScript::new("m", n, "").unwrap())
            .collect();
        let report = execute(&scripts).unwrap();
        assert_eq!(report.orphans.len(), 1);
        assert_eq!(report.orphans[0].orphan, "ext-1.00-1.10.sql");
        assert_eq!(report.orphans[0].successor, "ext-1.00-1.20.sql");
    }
}
