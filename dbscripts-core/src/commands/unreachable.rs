//! Report scripts no upgrade path will ever run, batched by release.

use serde::Serialize;

use crate::error::Result;
use crate::script::{SqlScript, Version};
use crate::selector::{batch_by_release, unreachable_scripts};

/// Unreachable scripts of one schema and release.
#[derive(Debug, Serialize)]
pub struct UnreachableBatch {
    pub module: String,
    pub schema: String,
    pub release: Version,
    pub scripts: Vec<String>,
}

/// Unreachable scripts for a target version.
#[derive(Debug, Serialize)]
pub struct UnreachableReport {
    pub to: Version,
    /// Starting versions considered, `0.00` included.
    pub checkpoints: Vec<Version>,
    pub batches: Vec<UnreachableBatch>,
    pub total: usize,
}

/// Execute the unreachable command.
pub fn execute(
    scripts: &[SqlScript],
    to: Version,
    checkpoints: &[Version],
) -> Result<UnreachableReport> {
    let unreachable = unreachable_scripts(scripts, to, checkpoints);
    let total = unreachable.len();

    let batches = batch_by_release(&unreachable)
        .into_iter()
        .map(|b| UnreachableBatch {
            release: b.release_version(),
            module: b.module,
            schema: b.schema,
            scripts: b.scripts.iter().map(|s| s.filename.clone()).collect(),
        })
        .collect();

    let mut all_checkpoints = vec![Version::ZERO];
    all_checkpoints.extend(checkpoints.iter().copied().filter(|c| !c.is_zero()));
    all_checkpoints.sort();

    Ok(UnreachableReport {
        to,
        checkpoints: all_checkpoints,
        batches,
        total,
    })
}
