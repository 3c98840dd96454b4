//! Version-range script selection.
//!
//! Each script is an edge `from_version -> to_version`. A chain is walked
//! greedily from a starting version, always taking the script that reaches
//! furthest without passing the target.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use crate::script::{group_by_schema, SqlScript, Version};

/// Select the chain of scripts that upgrades a schema from `from` towards `to`.
///
/// Only scripts inside `[from, to]` are considered. For every starting version
/// the script with the highest `to_version` wins. The walk stops when no
/// script starts at the current version, so the chain may end before `to`.
pub fn recommended_scripts<'a, I>(scripts: I, from: Version, to: Version) -> Vec<&'a SqlScript>
where
    I: IntoIterator<Item = &'a SqlScript>,
{
    let mut best: BTreeMap<Version, &'a SqlScript> = BTreeMap::new();
    for script in scripts {
        if script.from_version < from
            || script.to_version > to
            || script.to_version <= script.from_version
        {
            continue;
        }
        best.entry(script.from_version)
            .and_modify(|current| {
                if script.to_version > current.to_version {
                    *current = script;
                }
            })
            .or_insert(script);
    }

    let mut chain = Vec::new();
    let mut frontier = from;
    while let Some(script) = best.get(&frontier) {
        chain.push(*script);
        frontier = script.to_version;
    }
    chain
}

/// A script that can never be selected, and the script that always wins over it.
#[derive(Debug, Clone, Serialize)]
pub struct OrphanedScript<'a> {
    pub orphan: &'a SqlScript,
    pub successor: &'a SqlScript,
}

/// Find scripts superseded by another script starting at the same version.
pub fn orphaned_scripts(scripts: &[SqlScript]) -> Vec<OrphanedScript<'_>> {
    let mut sorted: Vec<&SqlScript> = scripts.iter().collect();
    sorted.sort_by(|a, b| (a.module.as_str(), a).cmp(&(b.module.as_str(), b)));

    sorted
        .windows(2)
        .filter(|pair| {
            pair[0].module == pair[1].module
                && pair[0].schema == pair[1].schema
                && pair[0].from_version == pair[1].from_version
                && pair[0].to_version < pair[1].to_version
        })
        .map(|pair| OrphanedScript {
            orphan: pair[0],
            successor: pair[1],
        })
        .collect()
}

/// Find scripts that no upgrade path starting at a checkpoint will ever run.
///
/// `0.0` is always treated as a checkpoint. Results follow the scripts'
/// natural order.
pub fn unreachable_scripts<'a>(
    scripts: &'a [SqlScript],
    to: Version,
    checkpoints: &[Version],
) -> Vec<&'a SqlScript> {
    let mut starts: Vec<Version> = checkpoints.to_vec();
    if !starts.contains(&Version::ZERO) {
        starts.push(Version::ZERO);
    }

    let mut unreachable = Vec::new();
    for ((module, schema), group) in group_by_schema(scripts) {
        let reachable: HashSet<&SqlScript> = starts
            .iter()
            .flat_map(|start| recommended_scripts(group.iter().copied(), *start, to))
            .collect();

        let before = unreachable.len();
        unreachable.extend(group.into_iter().filter(|s| !reachable.contains(s)));
        if unreachable.len() > before {
            log::debug!(
                "Unreachable scripts found; module={}, schema={}, count={}",
                module,
                schema,
                unreachable.len() - before
            );
        }
    }

    unreachable.sort();
    unreachable
}

/// Scripts of one schema sharing a release (`floor(from_version * 10)`).
#[derive(Debug, Clone, Serialize)]
pub struct ReleaseBatch<'a> {
    pub module: String,
    pub schema: String,
    pub release: i64,
    pub scripts: Vec<&'a SqlScript>,
}

impl ReleaseBatch<'_> {
    /// Release as a version, e.g. `1.10` for release 11.
    pub fn release_version(&self) -> Version {
        Version::from_f64(self.release as f64 / 10.0)
    }
}

/// Group consecutive scripts of the same module and schema by release.
pub fn batch_by_release<'a>(scripts: &[&'a SqlScript]) -> Vec<ReleaseBatch<'a>> {
    let mut batches: Vec<ReleaseBatch<'a>> = Vec::new();
    for &script in scripts {
        let release = script.from_version.release();
        match batches.last_mut() {
            Some(batch)
                if batch.module == script.module
                    && batch.schema == script.schema
                    && batch.release == release =>
            {
                batch.scripts.push(script);
            }
            _ => batches.push(ReleaseBatch {
                module: script.module.clone(),
                schema: script.schema.clone(),
                release,
                scripts: vec![script],
            }),
        }
    }
    batches
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    fn scripts(names: &[&str]) -> Vec<SqlScript> {
        let mut scripts: Vec<SqlScript> = names
            .iter()
            .map(|n| SqlScript::new("m", n, "").unwrap())
            .collect();
        scripts.sort();
        scripts
    }

    fn names<'a>(scripts: &[&'a SqlScript]) -> Vec<&'a str> {
        scripts.iter().map(|s| s.filename.as_str()).collect()
    }

    #[test]
    fn test_recommended_chain() {
        let all = scripts(&[
            "ext-1.00-1.01.sql",
            "ext-1.01-1.02.sql",
            "ext-1.02-1.03.sql",
            "ext-1.03-1.10.sql",
        ]);
        let chain = recommended_scripts(&all, v("1.00"), v("1.03"));
        assert_eq!(
            names(&chain),
            vec!["ext-1.00-1.01.sql", "ext-1.01-1.02.sql", "ext-1.02-1.03.sql"]
        );
    }

    #[test]
    fn test_recommended_prefers_longest_jump() {
        let all = scripts(&[
            "ext-1.00-1.01.sql",
            "ext-1.00-1.05.sql",
            "ext-1.01-1.05.sql",
            "ext-1.05-1.10.sql",
        ]);
        let chain = recommended_scripts(&all, v("1.00"), v("1.10"));
        assert_eq!(names(&chain), vec!["ext-1.00-1.05.sql", "ext-1.05-1.10.sql"]);
    }

    #[test]
    fn test_recommended_stops_at_gap() {
        let all = scripts(&["ext-1.00-1.01.sql", "ext-1.02-1.03.sql"]);
        let chain = recommended_scripts(&all, v("1.00"), v("1.10"));
        assert_eq!(names(&chain), vec!["ext-1.00-1.01.sql"]);
    }

    #[test]
    fn test_recommended_excludes_scripts_past_target() {
        let all = scripts(&["ext-1.00-1.20.sql", "ext-1.00-1.05.sql"]);
        let chain = recommended_scripts(&all, v("1.00"), v("1.10"));
        assert_eq!(names(&chain), vec!["ext-1.00-1.05.sql"]);
    }

    #[test]
    fn test_recommended_empty() {
        let none: Vec<SqlScript> = Vec::new();
        assert!(recommended_scripts(&none, v("0.00"), v("1.00")).is_empty());
    }

    #[test]
    fn test_orphaned_scripts() {
        let all = scripts(&["ext-1.00-1.10.sql", "ext-1.00-1.20.sql", "ext-1.20-1.30.sql"]);
        let orphans = orphaned_scripts(&all);
        assert_eq!(orphans.len(), 1);
        assert_eq!(orphans[0].orphan.filename, "ext-1.00-1.10.sql");
        assert_eq!(orphans[0].successor.filename, "ext-1.00-1.20.sql");
    }

    #[test]
    fn test_orphans_need_same_schema() {
        let all = scripts(&["a-1.00-1.10.sql", "b-1.00-1.20.sql"]);
        assert!(orphaned_scripts(&all).is_empty());
    }

    #[test]
    fn test_unreachable_scripts() {
        let all = scripts(&[
            "ext-0.00-1.00.sql",
            "ext-1.00-1.10.sql",
            "ext-1.00-1.05.sql",
            "ext-1.05-1.10.sql",
            "ext-1.10-1.20.sql",
            "ext-1.15-1.20.sql",
        ]);
        let unreachable = unreachable_scripts(&all, v("1.20"), &[]);
        assert_eq!(
            names(&unreachable),
            vec!["ext-1.00-1.05.sql", "ext-1.05-1.10.sql", "ext-1.15-1.20.sql"]
        );
    }

    #[test]
    fn test_checkpoints_make_scripts_reachable() {
        let all = scripts(&[
            "ext-0.00-1.10.sql",
            "ext-1.00-1.05.sql",
            "ext-1.05-1.10.sql",
            "ext-1.10-1.20.sql",
        ]);
        let unreachable = unreachable_scripts(&all, v("1.20"), &[v("1.00")]);
        assert!(unreachable.is_empty());
    }

    #[test]
    fn test_batch_by_release() {
        let all = scripts(&[
            "ext-1.00-1.01.sql",
            "ext-1.05-1.06.sql",
            "ext-1.10-1.11.sql",
            "other-1.10-1.11.sql",
        ]);
        let refs: Vec<&SqlScript> = all.iter().collect();
        let batches = batch_by_release(&refs);
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].release, 10);
        assert_eq!(batches[0].scripts.len(), 2);
        assert_eq!(batches[0].release_version().to_string(), "1.00");
        assert_eq!(batches[1].release, 11);
        assert_eq!(batches[2].schema, "other");
    }
}
