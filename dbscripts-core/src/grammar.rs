//! Dialect grammars: ordered tables of SQL statement patterns.
//!
//! Each rule is an anchored regex with named captures (`table`, and
//! optionally `schema`, `table2`, `schema2`) plus a classification. Rules are
//! tried in order and the first match wins, so specific rules come before
//! the generic `ALTER TABLE` catch-all.

use std::sync::LazyLock;

use regex_lite::{Captures, Regex};

use crate::dialect::Dialect;

pub(crate) static POSTGRES_GRAMMAR: LazyLock<Grammar> =
    LazyLock::new(|| Grammar::new(Dialect::Postgres));

pub(crate) static SQL_SERVER_GRAMMAR: LazyLock<Grammar> =
    LazyLock::new(|| Grammar::new(Dialect::SqlServer));

/// Whether a rule identifies the table a statement acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternType {
    /// Statement is grouped under its table.
    Table,
    /// Statement is kept verbatim in the ending section.
    NonTable,
}

/// What a matched statement does to its table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Other,
    AlterRows,
    InsertRows,
    /// Renames `table` to `table2`; later statements see a different table.
    RenameTable,
}

/// One grammar rule.
#[derive(Debug)]
pub struct SqlPattern {
    name: &'static str,
    regex: Regex,
    pattern_type: PatternType,
    operation: Operation,
}

impl SqlPattern {
    fn new(
        name: &'static str,
        body: &str,
        pattern_type: PatternType,
        operation: Operation,
    ) -> Self {
        let regex = Regex::new(&format!(r"(?ims)\A(?:{})", body))
            .unwrap_or_else(|e| panic!("invalid grammar rule '{}': {}", name, e));
        SqlPattern {
            name,
            regex,
            pattern_type,
            operation,
        }
    }

    fn table(name: &'static str, body: &str, operation: Operation) -> Self {
        SqlPattern::new(name, body, PatternType::Table, operation)
    }

    fn non_table(name: &'static str, body: &str) -> Self {
        SqlPattern::new(name, body, PatternType::NonTable, Operation::Other)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// Match the rule at the very start of `text` (a prefix match, never a scan).
    pub fn looking_at<'h>(&self, text: &'h str) -> Option<Captures<'h>> {
        self.regex.captures(text)
    }
}

/// Leading `[schema.]table` of a Postgres `table_column_seq` sequence name.
/// The table part stops at the first underscore; a closing quote is left to
/// the rest of the rule.
const SEQUENCE_TABLE: &str = r#"(?:"?(?P<schema>\w+)"?\.)?"?(?P<table>[a-z0-9]+)"#;

/// Regex fragments that differ between dialects.
struct Fragments {
    /// `[schema.]table` with `schema`/`table` captures.
    table: &'static str,
    /// Same as `table`, capturing `schema2`/`table2`.
    table2: &'static str,
    /// Statement terminator, including trailing whitespace.
    ending: &'static str,
    /// Terminator accepted after `INSERT ... VALUES (...)`.
    values_ending: &'static str,
}

impl Fragments {
    fn for_dialect(dialect: Dialect) -> Self {
        match dialect {
            Dialect::Postgres => Fragments {
                table: r#"(?:"?(?P<schema>\w+)"?\.)?"?(?P<table>\w+)"?"#,
                table2: r#"(?:"?(?P<schema2>\w+)"?\.)?"?(?P<table2>\w+)"?"#,
                ending: r";(?:[ \t]*--[^\n]*)?\s*",
                values_ending: r"\s*;(?:[ \t]*--[^\n]*)?\s*",
            },
            Dialect::SqlServer => Fragments {
                // `#` allows temp tables
                table: r"(?:\[?(?P<schema>\w+)\]?\.)?\[?(?P<table>[#]?\w+)\]?",
                table2: r"(?:\[?(?P<schema2>\w+)\]?\.)?\[?(?P<table2>[#]?\w+)\]?",
                // `\r?` before `$` accepts CRLF line endings
                ending: r"(?:;[ \t]*(?:--[^\n]*)?(?:\s*^[ \t]*GO[ \t]*\r?$)?|\s*^[ \t]*GO[ \t]*\r?$)\s*",
                values_ending: r"\s*(?:;[ \t]*(?:--[^\n]*)?(?:\s*^[ \t]*GO[ \t]*\r?$)?|[ \t]*\r?$(?:\s*^[ \t]*GO[ \t]*\r?$)?)\s*",
            },
        }
    }
}

/// The ordered rule set for one dialect.
#[derive(Debug)]
pub struct Grammar {
    dialect: Dialect,
    /// Table rules first, then non-table rules, each in priority order.
    patterns: Vec<SqlPattern>,
}

impl Grammar {
    /// Compile the grammar for a dialect. Prefer [`Dialect::grammar`], which
    /// compiles each grammar once per process.
    pub fn new(dialect: Dialect) -> Self {
        let f = Fragments::for_dialect(dialect);
        let (t, t2, e) = (f.table, f.table2, f.ending);

        let mut table_patterns = vec![
            SqlPattern::table(
                "insert_values",
                &format!(
                    r"INSERT\s+INTO\s+{t}\s*\([^)]*\)\s*VALUES\s*\([^)]*\){}",
                    f.values_ending
                ),
                Operation::InsertRows,
            ),
            SqlPattern::table(
                "insert_select",
                &format!(r"INSERT\s+INTO\s+{t}\s*\([^)]*\)\s*SELECT\s.*?{e}"),
                Operation::InsertRows,
            ),
            SqlPattern::table(
                "insert",
                &format!(r"INSERT\s+INTO\s+{t}.*?{e}"),
                Operation::InsertRows,
            ),
            SqlPattern::table(
                "update",
                &format!(r"UPDATE\s+(?:ONLY\s+)?{t}\s+SET\s.*?{e}"),
                Operation::AlterRows,
            ),
            SqlPattern::table(
                "delete",
                &format!(r"DELETE\s+(?:FROM\s+)?(?:ONLY\s+)?{t}.*?{e}"),
                Operation::AlterRows,
            ),
            SqlPattern::table(
                "truncate",
                &format!(r"TRUNCATE\s+(?:TABLE\s+)?(?:ONLY\s+)?{t}.*?{e}"),
                Operation::AlterRows,
            ),
            SqlPattern::table(
                "create_index",
                &format!(
                    r#"CREATE\s+(?:UNIQUE\s+)?(?:(?:NON)?CLUSTERED\s+)?INDEX\s+(?:CONCURRENTLY\s+)?(?:IF\s+NOT\s+EXISTS\s+)?["\[]?\w+["\]]?\s+ON\s+(?:ONLY\s+)?{t}.*?{e}"#
                ),
                Operation::Other,
            ),
            SqlPattern::table(
                "create_table",
                &format!(
                    r"CREATE\s+(?:(?:GLOBAL\s+|LOCAL\s+)?TEMP(?:ORARY)?\s+|UNLOGGED\s+)?TABLE\s+(?:IF\s+NOT\s+EXISTS\s+)?{t}.*?{e}"
                ),
                Operation::Other,
            ),
            SqlPattern::table(
                "drop_table",
                &format!(r"DROP\s+TABLE\s+(?:IF\s+EXISTS\s+)?{t}.*?{e}"),
                Operation::Other,
            ),
        ];

        match dialect {
            Dialect::Postgres => {
                table_patterns.push(SqlPattern::table(
                    "drop_if_exists",
                    &format!(
                        r"SELECT\s+core\.fn_dropifexists\s*\(\s*'(?P<table>\w+)'\s*,\s*'(?P<schema>\w+)'.*?\)\s*{e}"
                    ),
                    Operation::Other,
                ));
                table_patterns.push(SqlPattern::table(
                    "rename_table",
                    &format!(
                        r"ALTER\s+TABLE\s+(?:IF\s+EXISTS\s+)?(?:ONLY\s+)?{t}\s+RENAME\s+TO\s+{t2}\s*{e}"
                    ),
                    Operation::RenameTable,
                ));
                table_patterns.push(SqlPattern::table(
                    "sequence",
                    &format!(
                        r"(?:CREATE|ALTER|DROP)\s+SEQUENCE\s+(?:IF\s+(?:NOT\s+)?EXISTS\s+)?{}_.*?{e}",
                        SEQUENCE_TABLE
                    ),
                    Operation::Other,
                ));
                table_patterns.push(SqlPattern::table(
                    "comment_on_table",
                    &format!(r"COMMENT\s+ON\s+TABLE\s+{t}\s+IS\s.*?{e}"),
                    Operation::Other,
                ));
                table_patterns.push(SqlPattern::table(
                    "comment_on_column",
                    &format!(r#"COMMENT\s+ON\s+COLUMN\s+{t}\."?\w+"?\s+IS\s.*?{e}"#),
                    Operation::Other,
                ));
            }
            Dialect::SqlServer => {
                table_patterns.push(SqlPattern::table(
                    "drop_if_exists",
                    &format!(
                        r"EXEC(?:UTE)?\s+core\.fn_dropifexists\s+'(?P<table>\w+)'\s*,\s*'(?P<schema>\w+)'.*?{e}"
                    ),
                    Operation::Other,
                ));
                table_patterns.push(SqlPattern::table(
                    "rename_table",
                    &format!(
                        r"(?:EXEC(?:UTE)?\s+)?sp_rename\s+(?:@objname\s*=\s*)?'{t}'\s*,\s*(?:@newname\s*=\s*)?'{t2}'\s*(?:,\s*(?:@objtype\s*=\s*)?'OBJECT'\s*)?{e}"
                    ),
                    Operation::RenameTable,
                ));
                table_patterns.push(SqlPattern::table(
                    "rename_column",
                    &format!(
                        r"(?:EXEC(?:UTE)?\s+)?sp_rename\s+(?:@objname\s*=\s*)?'{t}\.\w+'.*?{e}"
                    ),
                    Operation::Other,
                ));
                table_patterns.push(SqlPattern::table(
                    "drop_index_on",
                    &format!(r"DROP\s+INDEX\s+(?:IF\s+EXISTS\s+)?\[?\w+\]?\s+ON\s+{t}.*?{e}"),
                    Operation::Other,
                ));
                table_patterns.push(SqlPattern::table(
                    "drop_index_dotted",
                    &format!(r"DROP\s+INDEX\s+{t}\.\[?\w+\]?.*?{e}"),
                    Operation::Other,
                ));
            }
        }

        table_patterns.push(SqlPattern::table(
            "foreign_key",
            &format!(
                r#"ALTER\s+TABLE\s+(?:ONLY\s+)?{t}\s+ADD\s+(?:CONSTRAINT\s+["\[]?\w+["\]]?\s+)?FOREIGN\s+KEY\s*\([^)]*\)\s*REFERENCES\s+{t2}.*?{e}"#
            ),
            Operation::Other,
        ));
        table_patterns.push(SqlPattern::table(
            "alter_table",
            &format!(r"ALTER\s+TABLE\s+(?:IF\s+EXISTS\s+)?(?:ONLY\s+)?{t}.*?{e}"),
            Operation::Other,
        ));

        let mut patterns = table_patterns;
        patterns.extend(match dialect {
            Dialect::Postgres => vec![
                SqlPattern::non_table(
                    "routine",
                    &format!(
                        r"CREATE\s+(?:OR\s+REPLACE\s+)?(?:FUNCTION|PROCEDURE)\s[^;]*?\$\w*\$.*?\$\w*\$.*?{e}"
                    ),
                ),
                SqlPattern::non_table(
                    "routine_quoted",
                    &format!(r"CREATE\s+(?:OR\s+REPLACE\s+)?(?:FUNCTION|PROCEDURE)\s[^$]*?{e}"),
                ),
                SqlPattern::non_table(
                    "do_block",
                    &format!(r"DO\s[^;]*?\$\w*\$.*?\$\w*\$.*?{e}"),
                ),
                SqlPattern::non_table(
                    "trigger",
                    &format!(r"CREATE\s+(?:OR\s+REPLACE\s+)?(?:CONSTRAINT\s+)?TRIGGER\s.*?{e}"),
                ),
                SqlPattern::non_table(
                    "view",
                    &format!(r"CREATE\s+(?:OR\s+REPLACE\s+)?(?:MATERIALIZED\s+)?VIEW\s.*?{e}"),
                ),
                SqlPattern::non_table(
                    "drop_object",
                    &format!(
                        r"DROP\s+(?:MATERIALIZED\s+VIEW|VIEW|FUNCTION|PROCEDURE|TRIGGER|TYPE|INDEX|SCHEMA|AGGREGATE|DOMAIN)\s.*?{e}"
                    ),
                ),
                SqlPattern::non_table(
                    "create_object",
                    &format!(r"CREATE\s+(?:SCHEMA|TYPE|AGGREGATE|EXTENSION|DOMAIN)\s.*?{e}"),
                ),
                SqlPattern::non_table(
                    "other",
                    &format!(r"(?:SELECT|GRANT|REVOKE|SET|ANALYZE|VACUUM|CLUSTER)\s.*?{e}"),
                ),
            ],
            Dialect::SqlServer => vec![
                SqlPattern::non_table(
                    "routine",
                    r"(?:CREATE|ALTER)\s+(?:PROCEDURE|PROC|FUNCTION|TRIGGER|VIEW)\s.*?^[ \t]*GO[ \t]*\r?$\s*",
                ),
                SqlPattern::non_table(
                    "drop_object",
                    &format!(
                        r"DROP\s+(?:PROCEDURE|PROC|FUNCTION|TRIGGER|VIEW|TYPE|SCHEMA|STATISTICS|SYNONYM)\s.*?{e}"
                    ),
                ),
                SqlPattern::non_table(
                    "create_object",
                    &format!(r"CREATE\s+(?:SCHEMA|TYPE|SYNONYM)\s.*?{e}"),
                ),
                SqlPattern::non_table(
                    "other",
                    &format!(r"(?:EXEC(?:UTE)?|GRANT|REVOKE|SELECT|SET|DECLARE|PRINT)\s.*?{e}"),
                ),
            ],
        });

        Grammar { dialect, patterns }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Rules of one kind in priority order.
    pub fn patterns(&self, pattern_type: PatternType) -> impl Iterator<Item = &SqlPattern> {
        self.patterns
            .iter()
            .filter(move |p| p.pattern_type == pattern_type)
    }

    fn first_match<'g, 'h>(
        &'g self,
        pattern_type: PatternType,
        text: &'h str,
    ) -> Option<(&'g SqlPattern, Captures<'h>)> {
        self.patterns(pattern_type)
            .find_map(|p| p.looking_at(text).map(|caps| (p, caps)))
    }

    /// First table rule matching at the start of `text`.
    pub fn match_table<'g, 'h>(&'g self, text: &'h str) -> Option<(&'g SqlPattern, Captures<'h>)> {
        self.first_match(PatternType::Table, text)
    }

    /// First non-table rule matching at the start of `text`. Callers try
    /// [`Grammar::match_table`] first.
    pub fn match_non_table<'g, 'h>(
        &'g self,
        text: &'h str,
    ) -> Option<(&'g SqlPattern, Captures<'h>)> {
        self.first_match(PatternType::NonTable, text)
    }
}
