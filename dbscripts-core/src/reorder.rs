//! Regroups the statements of a SQL script by the table they act on.
//!
//! The scan is a single forward pass over the script with an explicit cursor.
//! Each step consumes leading comments, then tries the dialect's table rules,
//! then its non-table rules, and finally falls back to consuming a single
//! character. Nothing is ever dropped: text no rule recognizes ends up in the
//! trailing section of the output.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex_lite::{Captures, Regex};
use serde::Serialize;

use crate::dialect::Dialect;
use crate::grammar::{Grammar, Operation, SqlPattern};

/// Marker line written between the grouped statements and the statements that
/// could not be associated with a table. Dropped when a script is re-parsed.
pub const ENDING_SEPARATOR: &str =
    "-- ========== Statements not associated with a table ==========";

/// Whitespace and any run of block or line comments.
static LEADING_COMMENTS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\A(?:\s*(?:/\*.*?\*/|--[^\n]*))*\s*").unwrap()
});

/// One recognized statement, with the comments that preceded it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Statement {
    /// Schema-qualified table name as written; `None` for the initial section.
    table: Option<String>,
    sql: String,
}

impl Statement {
    pub fn table(&self) -> Option<&str> {
        self.table.as_deref()
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }
}

/// Statements keyed by lower-cased table name, in first-reference order.
#[derive(Debug, Default, Clone, Serialize)]
pub struct StatementBucket {
    keys: Vec<String>,
    statements: HashMap<String, Vec<Statement>>,
}

impl StatementBucket {
    /// Index of `key` in first-reference order, or -1 if not referenced yet.
    pub fn position(&self, key: &str) -> isize {
        self.keys
            .iter()
            .position(|k| k == key)
            .map_or(-1, |i| i as isize)
    }

    fn push(&mut self, key: String, statement: Statement) {
        if !self.statements.contains_key(&key) {
            self.keys.push(key.clone());
        }
        self.statements.entry(key).or_default().push(statement);
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }

    pub fn statements(&self, key: &str) -> &[Statement] {
        self.statements.get(key).map_or(&[], Vec::as_slice)
    }

    /// `(key, statements)` pairs in first-reference order.
    pub fn groups(&self) -> impl Iterator<Item = (&str, &[Statement])> {
        self.keys.iter().map(|k| (k.as_str(), self.statements(k)))
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Result of parsing a script: table buckets plus the trailing statements.
#[derive(Debug, Clone, Serialize)]
pub struct ReorderedScript {
    buckets: Vec<StatementBucket>,
    ending_statements: Vec<String>,
}

impl ReorderedScript {
    /// Buckets in chronological order; a new one starts at every table rename.
    pub fn buckets(&self) -> &[StatementBucket] {
        &self.buckets
    }

    /// Non-table statements and unrecognized text, in the order produced.
    pub fn ending_statements(&self) -> &[String] {
        &self.ending_statements
    }

    fn statements(&self) -> impl Iterator<Item = (usize, &Statement)> {
        self.buckets
            .iter()
            .flat_map(|b| b.groups())
            .enumerate()
            .flat_map(|(group, (_, statements))| statements.iter().map(move |s| (group, s)))
    }

    /// Render the reordered script as plain SQL or as an HTML table.
    pub fn render(&self, as_html: bool) -> String {
        if as_html {
            self.render_html()
        } else {
            self.render_text()
        }
    }

    fn render_text(&self) -> String {
        let mut out = String::new();
        let mut last_group = None;

        for (group, statement) in self.statements() {
            if last_group.is_some_and(|g| g != group) {
                out.push('\n');
            }
            last_group = Some(group);
            out.push_str(statement.sql.trim_end());
            out.push('\n');
        }

        if !self.ending_statements.is_empty() {
            if last_group.is_some() {
                out.push('\n');
            }
            out.push_str(ENDING_SEPARATOR);
            out.push_str("\n\n");
            for (i, sql) in self.ending_statements.iter().enumerate() {
                if i > 0 {
                    out.push('\n');
                }
                out.push_str(sql.trim_end());
                out.push('\n');
            }
        }

        out
    }

    fn render_html(&self) -> String {
        let mut out = String::from("<table class=\"reordered-script\">\n");
        let mut row = 0;

        for (_, statement) in self.statements() {
            out.push_str(&html_row(row, &highlight_table(statement)));
            row += 1;
        }

        if !self.ending_statements.is_empty() {
            out.push_str(&format!(
                "<tr class=\"separator\"><td><pre>{}</pre></td></tr>\n",
                escape_html(ENDING_SEPARATOR)
            ));
            for sql in &self.ending_statements {
                out.push_str(&html_row(row, &escape_html(sql.trim_end())));
                row += 1;
            }
        }

        out.push_str("</table>\n");
        out
    }
}

fn html_row(row: usize, body: &str) -> String {
    let class = if row % 2 == 0 { "row-even" } else { "row-odd" };
    format!("<tr class=\"{}\"><td><pre>{}</pre></td></tr>\n", class, body)
}

/// Escape a statement, bolding the first occurrence of its table name.
///
/// The qualified name is tried first, then the bare table name.
fn highlight_table(statement: &Statement) -> String {
    let sql = statement.sql.trim_end();
    let Some(table) = statement.table.as_deref() else {
        return escape_html(sql);
    };

    let bare = table.rsplit('.').next().unwrap_or(table);
    let haystack = sql.to_ascii_lowercase();
    let found = [table, bare].iter().find_map(|name| {
        find_identifier(&haystack, &name.to_ascii_lowercase())
            .map(|start| (start, start + name.len()))
    });

    match found {
        Some((start, end)) => format!(
            "{}<b>{}</b>{}",
            escape_html(&sql[..start]),
            escape_html(&sql[start..end]),
            escape_html(&sql[end..])
        ),
        None => escape_html(sql),
    }
}

/// First occurrence of `needle` not embedded in a longer identifier.
fn find_identifier(haystack: &str, needle: &str) -> Option<usize> {
    let is_ident = |c: char| c.is_alphanumeric() || c == '_';
    haystack.match_indices(needle).map(|(i, _)| i).find(|&i| {
        let before = haystack[..i].chars().next_back();
        let after = haystack[i + needle.len()..].chars().next();
        !before.is_some_and(is_ident) && !after.is_some_and(is_ident)
    })
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Reorders one script for a schema and dialect.
pub struct ScriptReorderer<'a> {
    contents: &'a str,
    schema: String,
    grammar: &'static Grammar,
}

impl<'a> ScriptReorderer<'a> {
    pub fn new(contents: &'a str, schema: &str, dialect: Dialect) -> Self {
        ScriptReorderer {
            contents,
            schema: schema.to_string(),
            grammar: dialect.grammar(),
        }
    }

    /// Reorder the script, returning SQL text or an HTML table.
    pub fn reorder(&self, as_html: bool) -> String {
        self.parse().render(as_html)
    }

    /// Scan the script into table buckets and trailing statements.
    pub fn parse(&self) -> ReorderedScript {
        let text = self.contents;
        let mut cursor = 0;
        let mut buckets = vec![StatementBucket::default()];
        let mut ending_statements = Vec::new();
        let mut unknown = String::new();
        let mut initial_flushed = false;

        while cursor < text.len() {
            let comments_len = LEADING_COMMENTS_RE
                .find(&text[cursor..])
                .map_or(0, |m| m.end());
            let comments = strip_separator(&text[cursor..cursor + comments_len]);
            cursor += comments_len;
            let rest = &text[cursor..];

            if rest.is_empty() {
                unknown.push_str(&comments);
                break;
            }

            if let Some((pattern, caps)) = self.grammar.match_table(rest) {
                let matched = caps.get(0).map_or("", |m| m.as_str());

                if !initial_flushed {
                    if !unknown.trim().is_empty() {
                        log::debug!(
                            "Keeping initial section; schema={}, length={}",
                            self.schema,
                            unknown.len()
                        );
                        buckets[0].push(
                            String::new(),
                            Statement {
                                table: None,
                                sql: std::mem::take(&mut unknown),
                            },
                        );
                    }
                    unknown.clear();
                    initial_flushed = true;
                } else {
                    self.flush_unknown(&mut unknown, &mut ending_statements);
                }

                let (table, key) = self.resolve_table(pattern, &caps, &mut buckets);
                log::debug!("Matched statement; rule={}, table={}", pattern.name(), table);

                let mut sql = comments.trim_start().to_string();
                sql.push_str(matched);
                if let Some(bucket) = buckets.last_mut() {
                    bucket.push(
                        key,
                        Statement {
                            table: Some(table),
                            sql,
                        },
                    );
                }
                cursor += matched.len();
            } else if let Some((pattern, caps)) = self.grammar.match_non_table(rest) {
                let matched = caps.get(0).map_or("", |m| m.as_str());
                self.flush_unknown(&mut unknown, &mut ending_statements);
                log::debug!("Matched non-table statement; rule={}", pattern.name());

                let mut sql = comments.trim_start().to_string();
                sql.push_str(matched);
                ending_statements.push(sql);
                cursor += matched.len();
            } else {
                let c = rest.chars().next().unwrap_or(' ');
                unknown.push_str(&comments);
                unknown.push(c);
                cursor += c.len_utf8();
            }
        }

        self.flush_unknown(&mut unknown, &mut ending_statements);

        ReorderedScript {
            buckets,
            ending_statements,
        }
    }

    /// Move accumulated unrecognized text into the ending statements as one block.
    fn flush_unknown(&self, unknown: &mut String, ending_statements: &mut Vec<String>) {
        if unknown.trim().is_empty() {
            unknown.clear();
            return;
        }
        let block = std::mem::take(unknown);
        log::debug!(
            "Unrecognized SQL kept in ending section; schema={}, text={}",
            self.schema,
            block.trim()
        );
        ending_statements.push(block.trim_start().to_string());
    }

    /// Qualified table name and grouping key for a table-rule match.
    ///
    /// Opens a new bucket for renames.
    fn resolve_table(
        &self,
        pattern: &SqlPattern,
        caps: &Captures<'_>,
        buckets: &mut Vec<StatementBucket>,
    ) -> (String, String) {
        let schema = caps.name("schema").map(|m| m.as_str());
        let table = caps
            .name("table")
            .map(|m| qualify(m.as_str(), schema, &self.schema))
            .unwrap_or_else(|| panic!("grammar rule '{}' has no table capture", pattern.name()));
        // A rename keeps the table in its schema; any other unqualified
        // `table2` is in the current schema.
        let is_rename = pattern.operation() == Operation::RenameTable;
        let table2 = caps.name("table2").map(|m| {
            let schema2 = caps
                .name("schema2")
                .map(|m| m.as_str())
                .or(schema.filter(|_| is_rename));
            qualify(m.as_str(), schema2, &self.schema)
        });

        if is_rename {
            let new_name = table2.unwrap_or_else(|| {
                panic!("rename rule '{}' has no table2 capture", pattern.name())
            });
            buckets.push(StatementBucket::default());
            let key = new_name.to_lowercase();
            return (new_name, key);
        }

        let key = table.to_lowercase();
        if let Some(table2) = table2 {
            let key2 = table2.to_lowercase();
            let later = buckets
                .last()
                .is_some_and(|b| b.position(&key2) > b.position(&key));
            if later {
                return (table2, key2);
            }
        }
        (table, key)
    }
}

fn qualify(table: &str, schema: Option<&str>, current_schema: &str) -> String {
    if table.contains('.') {
        return table.to_string();
    }
    format!("{}.{}", schema.unwrap_or(current_schema), table)
}

/// Remove our own separator marker from a run of comments.
fn strip_separator(comments: &str) -> String {
    if !comments.contains(ENDING_SEPARATOR) {
        return comments.to_string();
    }
    comments
        .split_inclusive('\n')
        .filter(|line| line.trim() != ENDING_SEPARATOR)
        .collect()
}
