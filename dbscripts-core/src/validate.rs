//! Advisory, dialect-specific checks run over script text.
//!
//! Warnings never block an operation; they are surfaced next to its output.

use std::sync::LazyLock;

use regex_lite::Regex;

/// Produces human-readable warnings for a script.
pub trait ScriptValidator: Sync {
    fn warnings(&self, sql: &str) -> Vec<String>;
}

static PG_TRANSACTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^[ \t]*(BEGIN|START\s+TRANSACTION|COMMIT|ROLLBACK)[ \t]*;").unwrap()
});

static PG_SEARCH_PATH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)^[ \t]*SET\s+search_path\b").unwrap());

static MSSQL_TRANSACTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?im)^[ \t]*(BEGIN\s+TRAN(?:SACTION)?|COMMIT(?:\s+TRAN(?:SACTION)?)?|ROLLBACK(?:\s+TRAN(?:SACTION)?)?)[ \t]*;?[ \t]*\r?$",
    )
    .unwrap()
});

static MSSQL_USE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)^[ \t]*USE\s+\[?\w+\]?").unwrap());

/// PostgreSQL script checks.
pub struct PostgresValidator;

impl ScriptValidator for PostgresValidator {
    fn warnings(&self, sql: &str) -> Vec<String> {
        let mut warnings = Vec::new();

        for m in PG_TRANSACTION_RE.find_iter(sql) {
            warnings.push(format!(
                "Line {}: explicit transaction control '{}'; scripts already run inside a transaction",
                line_at(sql, m.start()),
                m.as_str().trim()
            ));
        }

        for m in PG_SEARCH_PATH_RE.find_iter(sql) {
            warnings.push(format!(
                "Line {}: SET search_path changes name resolution for the rest of the upgrade; qualify names with their schema instead",
                line_at(sql, m.start())
            ));
        }

        if let Some(last) = last_statement_line(sql) {
            if !last.ends_with(';') {
                warnings.push(format!(
                    "Script does not end with a statement terminator: '{}'",
                    last
                ));
            }
        }

        warnings
    }
}

/// SQL Server script checks.
pub struct SqlServerValidator;

impl ScriptValidator for SqlServerValidator {
    fn warnings(&self, sql: &str) -> Vec<String> {
        let mut warnings = Vec::new();

        for m in MSSQL_TRANSACTION_RE.find_iter(sql) {
            warnings.push(format!(
                "Line {}: explicit transaction control '{}'; scripts already run inside a transaction",
                line_at(sql, m.start()),
                m.as_str().trim()
            ));
        }

        for m in MSSQL_USE_RE.find_iter(sql) {
            warnings.push(format!(
                "Line {}: '{}' switches databases; scripts must run against the current database",
                line_at(sql, m.start()),
                m.as_str().trim()
            ));
        }

        if let Some(last) = last_statement_line(sql) {
            if !last.ends_with(';') && !last.eq_ignore_ascii_case("GO") {
                warnings.push(format!(
                    "Script does not end with a statement terminator or GO: '{}'",
                    last
                ));
            }
        }

        warnings
    }
}

/// 1-based line number of a byte offset.
fn line_at(sql: &str, offset: usize) -> usize {
    sql[..offset.min(sql.len())].matches('\n').count() + 1
}

/// Last line that is neither blank nor a comment.
fn last_statement_line(sql: &str) -> Option<&str> {
    sql.lines().map(str::trim).rev().find(|l| {
        !l.is_empty() && !l.starts_with("--") && !(l.starts_with("/*") && l.ends_with("*/"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_postgres_script() {
        let sql = "CREATE TABLE a (x int);\n-- trailing comment\n";
        assert!(PostgresValidator.warnings(sql).is_empty());
    }

    #[test]
    fn test_postgres_transaction_control() {
        let sql = "BEGIN;\nCREATE TABLE a (x int);\nCOMMIT;\n";
        let warnings = PostgresValidator.warnings(sql);
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].starts_with("Line 1:"));
        assert!(warnings[1].starts_with("Line 3:"));
    }

    #[test]
    fn test_postgres_function_begin_is_not_transaction_control() {
        let sql = "CREATE FUNCTION f() RETURNS void AS $$\nBEGIN\n  NULL;\nEND;\n$$ LANGUAGE plpgsql;\n";
        assert!(PostgresValidator.warnings(sql).is_empty());
    }

    #[test]
    fn test_postgres_search_path() {
        let warnings = PostgresValidator.warnings("SET search_path TO study;\n");
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("search_path"));
    }

    #[test]
    fn test_missing_terminator() {
        let warnings = PostgresValidator.warnings("CREATE TABLE a (x int)\n");
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("terminator"));
    }

    #[test]
    fn test_sql_server_go_terminator_accepted() {
        let sql = "CREATE TABLE a (x INT)\nGO\n";
        assert!(SqlServerValidator.warnings(sql).is_empty());
    }

    #[test]
    fn test_sql_server_use_and_transactions() {
        let sql = "USE labkey\nGO\nBEGIN TRANSACTION\nCREATE TABLE a (x INT)\nCOMMIT TRANSACTION\nGO\n";
        let warnings = SqlServerValidator.warnings(sql);
        assert_eq!(warnings.len(), 3);
        assert!(warnings.iter().any(|w| w.contains("USE labkey")));
    }

    #[test]
    fn test_empty_script_has_no_warnings() {
        assert!(PostgresValidator.warnings("").is_empty());
        assert!(SqlServerValidator.warnings("  \n").is_empty());
    }

    #[test]
    fn test_sql_server_crlf_transaction_control() {
        let sql = "BEGIN TRAN\r\nDROP TABLE s.a;\r\nCOMMIT\r\nGO\r\n";
        let warnings = SqlServerValidator.warnings(sql);
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].starts_with("Line 1:"));
        assert!(warnings[1].starts_with("Line 3:"));
    }
}
