//! Integration tests for dbscripts-core.
//!
//! Builds throwaway module directories and drives the public API end to end.
//!
//! Run with: cargo test --test integration_test

use std::fs;
use std::path::Path;

use tempfile::TempDir;

use dbscripts_core::config::{DbScriptsConfig, ModuleConfig, ScriptSettings};
use dbscripts_core::consolidate::ScriptConsolidator;
use dbscripts_core::error::ScriptError;
use dbscripts_core::reorder::{ScriptReorderer, ENDING_SEPARATOR};
use dbscripts_core::selector::{orphaned_scripts, recommended_scripts};
use dbscripts_core::vcs::VcsKind;
use dbscripts_core::{DbScripts, Dialect, SqlScript, Version};

const COPYRIGHT: &str = "/*\n * Copyright (c) 2024 Example Corp\n *\n * Licensed under the Apache License, Version 2.0\n */";

fn v(s: &str) -> Version {
    Version::parse(s).unwrap()
}

fn write_scripts(dir: &Path, scripts: &[(&str, &str)]) {
    fs::create_dir_all(dir).unwrap();
    for (name, body) in scripts {
        fs::write(dir.join(name), body).unwrap();
    }
}

fn tools(dir: &Path, module: &str) -> DbScripts {
    DbScripts::new(DbScriptsConfig {
        scripts: ScriptSettings {
            dialect: Dialect::Postgres,
            checkpoints: vec![],
            vcs: VcsKind::None,
        },
        modules: vec![ModuleConfig {
            name: module.to_string(),
            directory: dir.to_path_buf(),
        }],
    })
}

#[test]
fn test_study_script_groups_by_table() {
    let sql = "CREATE TABLE study.Foo (x int);\nINSERT INTO study.Foo (x) VALUES (1);\nDROP TABLE study.Bar;";
    let parsed = ScriptReorderer::new(sql, "study", Dialect::Postgres).parse();

    assert_eq!(parsed.buckets().len(), 1);
    let bucket = &parsed.buckets()[0];
    assert_eq!(bucket.keys().collect::<Vec<_>>(), vec!["study.foo", "study.bar"]);

    let foo = bucket.statements("study.foo");
    assert_eq!(foo.len(), 2);
    assert!(foo[0].sql().starts_with("CREATE TABLE study.Foo"));
    assert!(foo[1].sql().starts_with("INSERT INTO study.Foo"));
    assert_eq!(bucket.statements("study.bar").len(), 1);
}

#[test]
fn test_rename_isolates_history() {
    let sql = "CREATE TABLE A (x int);\n\
               ALTER TABLE A RENAME TO B;\n\
               INSERT INTO B (x) VALUES (1);\n\
               CREATE TABLE b2 (y int);\n";
    let parsed = ScriptReorderer::new(sql, "s", Dialect::Postgres).parse();

    assert_eq!(parsed.buckets().len(), 2);
    assert_eq!(parsed.buckets()[0].keys().collect::<Vec<_>>(), vec!["s.a"]);
    let after = &parsed.buckets()[1];
    assert_eq!(after.keys().collect::<Vec<_>>(), vec!["s.b", "s.b2"]);
    assert!(after.statements("s.b")[1].sql().starts_with("INSERT INTO B"));

    let out = parsed.render(false);
    assert!(out.find("CREATE TABLE A").unwrap() < out.find("RENAME TO B").unwrap());
    assert!(out.find("RENAME TO B").unwrap() < out.find("INSERT INTO B").unwrap());
}

#[test]
fn test_foreign_key_follows_referenced_table() {
    let sql = "CREATE TABLE A (id int);\n\
               CREATE TABLE B (id int);\n\
               ALTER TABLE A ADD CONSTRAINT FK_A_B FOREIGN KEY (id) REFERENCES B (id);\n\
               ALTER TABLE A ADD COLUMN extra int;\n";
    let out = ScriptReorderer::new(sql, "s", Dialect::Postgres).reorder(false);
    assert_eq!(
        out,
        "CREATE TABLE A (id int);\nALTER TABLE A ADD COLUMN extra int;\n\n\
         CREATE TABLE B (id int);\nALTER TABLE A ADD CONSTRAINT FK_A_B FOREIGN KEY (id) REFERENCES B (id);\n"
    );
}

#[test]
fn test_reorder_fixed_point_and_no_loss() {
    let sql = format!(
        "{}\n\
         CREATE TABLE s.t1 (x int);\n\
         CREATE FUNCTION s.touch() RETURNS trigger AS $$\nBEGIN\n  RETURN NEW;\nEND;\n$$ LANGUAGE plpgsql;\n\
         CREATE TABLE s.t2 (y int);\n\
         -- backfill t1\n\
         UPDATE s.t1 SET x = 0 WHERE x IS NULL;\n\
         CREATE TRIGGER t1_touch BEFORE UPDATE ON s.t1 FOR EACH ROW EXECUTE PROCEDURE s.touch();\n\
         something odd here\n\
         CREATE INDEX ix_t2_y ON s.t2 (y);\n",
        COPYRIGHT
    );

    let first = ScriptReorderer::new(&sql, "s", Dialect::Postgres).reorder(false);
    let second = ScriptReorderer::new(&first, "s", Dialect::Postgres).reorder(false);
    assert_eq!(first, second);

    let mut original: Vec<char> = sql.chars().filter(|c| !c.is_whitespace()).collect();
    let mut reordered: Vec<char> = first
        .replace(ENDING_SEPARATOR, "")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    original.sort_unstable();
    reordered.sort_unstable();
    assert_eq!(original, reordered);

    assert!(first.starts_with(COPYRIGHT));
    assert!(first.contains("something odd here"));
}

#[test]
fn test_sql_server_script() {
    let sql = "CREATE TABLE study.Foo (RowId INT IDENTITY(1,1), Name NVARCHAR(100))\nGO\n\
               CREATE PROCEDURE study.Touch AS\nBEGIN\n  UPDATE study.Foo SET Name = Name;\nEND\nGO\n\
               CREATE TABLE study.Bar (Id INT)\nGO\n\
               ALTER TABLE study.Foo ADD Extra INT\nGO\n";
    let parsed = ScriptReorderer::new(sql, "study", Dialect::SqlServer).parse();

    let bucket = &parsed.buckets()[0];
    assert_eq!(bucket.keys().collect::<Vec<_>>(), vec!["study.foo", "study.bar"]);
    assert_eq!(bucket.statements("study.foo").len(), 2);
    assert_eq!(parsed.ending_statements().len(), 1);
    assert!(parsed.ending_statements()[0].starts_with("CREATE PROCEDURE"));
}

#[test]
fn test_orphan_detection() {
    let scripts = vec![
        SqlScript::new("m", "ext-1.00-1.10.sql", "").unwrap(),
        SqlScript::new("m", "ext-1.00-1.20.sql", "").unwrap(),
    ];
    let orphans = orphaned_scripts(&scripts);
    assert_eq!(orphans.len(), 1);
    assert_eq!(orphans[0].orphan.to_version, v("1.10"));
    assert_eq!(orphans[0].successor.to_version, v("1.20"));
}

#[test]
fn test_ext_consolidation_batch() {
    let scripts = vec![
        SqlScript::new("m", "ext-1.00-1.05.sql", "CREATE TABLE ext.a (x int);").unwrap(),
        SqlScript::new("m", "ext-1.05-1.10.sql", "DROP TABLE ext.b;").unwrap(),
    ];
    let chain = recommended_scripts(&scripts, v("1.00"), v("1.10"));
    assert_eq!(chain.len(), 2);
    assert_eq!(chain[0].to_version, chain[1].from_version);

    let consolidator =
        ScriptConsolidator::new("ext", Dialect::Postgres, &scripts, v("1.00"), v("1.10"));
    assert_eq!(consolidator.filename().as_deref(), Some("ext-1.00-1.10.sql"));
}

#[test]
fn test_license_appears_once() {
    let scripts: Vec<SqlScript> = [
        ("ext-1.00-1.01.sql", "CREATE TABLE ext.a (x int);"),
        ("ext-1.01-1.02.sql", "CREATE TABLE ext.b (x int);"),
        ("ext-1.02-1.03.sql", "CREATE TABLE ext.c (x int);"),
    ]
    .iter()
    .map(|(name, body)| SqlScript::new("m", name, format!("{}\n\n{}\n", COPYRIGHT, body)).unwrap())
    .collect();

    let merged = ScriptConsolidator::new("ext", Dialect::Postgres, &scripts, v("1.00"), v("1.03"))
        .build()
        .unwrap();
    assert_eq!(merged.contents.matches(COPYRIGHT).count(), 1);
    assert!(merged.contents.starts_with(COPYRIGHT));
    assert!(merged.warnings.is_empty());
}

#[test]
fn test_end_to_end_consolidate_and_commit() {
    let dir = TempDir::new().unwrap();
    let scripts_dir = dir.path().join("ext").join("postgresql");
    write_scripts(
        &scripts_dir,
        &[
            ("ext-0.00-1.00.sql", "CREATE SCHEMA ext;\n"),
            ("ext-1.00-1.01.sql", "CREATE TABLE ext.a (x int);\n"),
            ("ext-1.01-1.02.sql", "ALTER TABLE ext.a ADD COLUMN y int;\n"),
            ("ext-1.02-1.10.sql", "DROP TABLE ext.old;\n"),
        ],
    );
    let tools = tools(&dir.path().join("ext"), "ext");

    let candidates = tools.consolidation_candidates(v("1.00"), v("1.10")).unwrap();
    assert_eq!(candidates.candidates.len(), 1);
    assert_eq!(candidates.candidates[0].filename, "ext-1.00-1.10.sql");
    assert_eq!(candidates.candidates[0].scripts.len(), 3);

    let report = tools.consolidate("ext", v("1.00"), v("1.10"), true).unwrap();
    let commit = report.commit.unwrap();
    assert_eq!(commit.deleted.len(), 3);
    assert!(commit.failed.is_empty());

    let remaining: Vec<String> = tools
        .list()
        .unwrap()
        .scripts
        .into_iter()
        .map(|s| s.filename)
        .collect();
    assert_eq!(remaining, vec!["ext-0.00-1.00.sql", "ext-1.00-1.10.sql"]);

    let merged = fs::read_to_string(scripts_dir.join("ext-1.00-1.10.sql")).unwrap();
    assert_eq!(
        merged,
        "CREATE TABLE ext.a (x int);\n\nALTER TABLE ext.a ADD COLUMN y int;\n\nDROP TABLE ext.old;\n"
    );
}

#[test]
fn test_end_to_end_unreachable_and_orphans() {
    let dir = TempDir::new().unwrap();
    write_scripts(
        dir.path(),
        &[
            ("core-0.00-2.00.sql", "CREATE SCHEMA core;\n"),
            ("core-2.00-2.10.sql", "CREATE TABLE core.a (x int);\n"),
            ("core-2.00-2.05.sql", "CREATE TABLE core.a (x int);\n"),
            ("core-2.05-2.10.sql", "ALTER TABLE core.a ADD COLUMN y int;\n"),
        ],
    );
    let mut tools = tools(dir.path(), "core");

    let orphans = tools.orphans().unwrap();
    assert_eq!(orphans.orphans.len(), 1);
    assert_eq!(orphans.orphans[0].orphan, "core-2.00-2.05.sql");

    let unreachable = tools.unreachable(v("2.10")).unwrap();
    assert_eq!(unreachable.total, 2);
    assert_eq!(unreachable.batches.len(), 1);
    assert_eq!(unreachable.batches[0].release, v("2.00"));

    tools.config.scripts.checkpoints = vec![v("2.05")];
    let unreachable = tools.unreachable(v("2.10")).unwrap();
    assert_eq!(unreachable.total, 1);
}

#[test]
fn test_end_to_end_reorder_all_and_check() {
    let dir = TempDir::new().unwrap();
    write_scripts(
        dir.path(),
        &[
            (
                "study-1.00-1.01.sql",
                "CREATE TABLE a (x int);\nCREATE TABLE b (y int);\nALTER TABLE a ADD COLUMN z int;\n",
            ),
            ("study-1.01-1.02.sql", "BEGIN;\nDROP TABLE c;\n"),
        ],
    );
    let tools = tools(dir.path(), "study");

    let check = tools.check(false).unwrap();
    assert_eq!(check.files_with_warnings, 1);
    assert!(matches!(
        tools.check(true),
        Err(ScriptError::ValidationFailed { .. })
    ));

    let report = tools.reorder_all(true).unwrap();
    assert_eq!(report.changed, vec!["study-1.00-1.01.sql"]);
    assert_eq!(report.written, 1);
    assert!(tools.reorder_all(false).unwrap().changed.is_empty());
}

#[test]
fn test_unknown_schema_lists_available() {
    let dir = TempDir::new().unwrap();
    write_scripts(dir.path(), &[("ext-1.00-1.01.sql", "SELECT 1;\n")]);
    let tools = tools(dir.path(), "ext");

    match tools.consolidate("nope", v("1.00"), v("1.10"), false) {
        Err(ScriptError::SchemaNotFound { name, available }) => {
            assert_eq!(name, "nope");
            assert_eq!(available, "ext");
        }
        other => panic!("expected SchemaNotFound, got {:?}", other.map(|r| r.script.filename)),
    }
}
