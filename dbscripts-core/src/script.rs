//! SQL script model: versions, filename parsing and script directory scanning.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::config::ModuleConfig;
use crate::dialect::Dialect;
use crate::error::{Result, ScriptError};

/// A schema version such as `1.05` or `19.10`.
///
/// Stored as an integer number of thousandths so versions compare, hash
/// and format exactly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    thousandths: i64,
}

impl Version {
    /// Version `0.00`, the start of every bootstrap script.
    pub const ZERO: Version = Version { thousandths: 0 };

    /// Convert from a floating point version, rounding to thousandths.
    pub fn from_f64(value: f64) -> Self {
        Version {
            thousandths: (value * 1000.0).round() as i64,
        }
    }

    pub fn as_f64(&self) -> f64 {
        self.thousandths as f64 / 1000.0
    }

    /// The release this version belongs to, i.e. `floor(version * 10)`.
    pub fn release(&self) -> i64 {
        self.thousandths.div_euclid(100)
    }

    /// Whether the version sits exactly on a 0.1 release boundary.
    pub fn is_release_boundary(&self) -> bool {
        self.thousandths.rem_euclid(100) == 0
    }

    pub fn is_zero(&self) -> bool {
        self.thousandths == 0
    }

    /// Parse a version string like `1`, `1.1`, `1.05` or `1.005`.
    pub fn parse(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let (whole, fraction) = trimmed.split_once('.').unwrap_or((trimmed, ""));

        if whole.is_empty()
            || !whole.bytes().all(|b| b.is_ascii_digit())
            || fraction.len() > 3
            || !fraction.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(ScriptError::InvalidVersion(s.to_string()));
        }

        let whole: i64 = whole
            .parse()
            .map_err(|_| ScriptError::InvalidVersion(s.to_string()))?;
        let mut padded = fraction.to_string();
        while padded.len() < 3 {
            padded.push('0');
        }
        let fraction: i64 = padded
            .parse()
            .map_err(|_| ScriptError::InvalidVersion(s.to_string()))?;

        Ok(Version {
            thousandths: whole * 1000 + fraction,
        })
    }
}

impl FromStr for Version {
    type Err = ScriptError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Version::parse(s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.thousandths.div_euclid(1000);
        let fraction = self.thousandths.rem_euclid(1000);
        if fraction % 10 == 0 {
            write!(f, "{}.{:02}", whole, fraction / 10)
        } else {
            write!(f, "{}.{:03}", whole, fraction)
        }
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_f64())
    }
}

/// One SQL migration script belonging to a module and schema.
#[derive(Debug, Clone, Serialize)]
pub struct SqlScript {
    /// Module that owns the script directory.
    pub module: String,
    /// Schema the script upgrades.
    pub schema: String,
    /// Filename, e.g. `study-1.00-1.10.sql`.
    pub filename: String,
    pub from_version: Version,
    pub to_version: Version,
    /// Whether the script is a minor (sub-0.1) step rather than a baseline script.
    pub incremental: bool,
    /// Location on disk, if the script was loaded from a directory.
    #[serde(skip)]
    pub path: Option<PathBuf>,
    #[serde(skip)]
    pub contents: String,
}

impl SqlScript {
    /// Build a script from its filename and contents.
    pub fn new(module: &str, filename: &str, contents: impl Into<String>) -> Result<Self> {
        let (schema, from_version, to_version) = parse_script_filename(filename)?;
        Ok(SqlScript {
            module: module.to_string(),
            schema,
            filename: filename.to_string(),
            from_version,
            to_version,
            incremental: is_incremental(from_version, to_version),
            path: None,
            contents: contents.into(),
        })
    }

    /// Read a script file from disk.
    pub fn load(module: &str, path: &Path) -> Result<Self> {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                ScriptError::ScriptNameError(format!("Invalid script path '{}'", path.display()))
            })?;
        let contents = std::fs::read_to_string(path)?;
        let mut script = SqlScript::new(module, filename, contents)?;
        script.path = Some(path.to_path_buf());
        Ok(script)
    }

    fn sort_key(&self) -> (&str, Version, Version, &str, &str) {
        (
            &self.schema,
            self.from_version,
            self.to_version,
            &self.filename,
            &self.module,
        )
    }
}

// Scripts are identified by metadata, never by contents.
impl PartialEq for SqlScript {
    fn eq(&self, other: &Self) -> bool {
        self.sort_key() == other.sort_key()
    }
}

impl Eq for SqlScript {}

impl Hash for SqlScript {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.sort_key().hash(state);
    }
}

impl PartialOrd for SqlScript {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SqlScript {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl fmt::Display for SqlScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.filename)
    }
}

/// A script is incremental unless both ends sit on release boundaries.
pub fn is_incremental(from: Version, to: Version) -> bool {
    !from.is_release_boundary() || !to.is_release_boundary()
}

/// Parse a script filename of the form `<schema>-<from>-<to>.sql`.
///
/// Returns `(schema, from_version, to_version)`.
pub fn parse_script_filename(filename: &str) -> Result<(String, Version, Version)> {
    let stem = filename
        .strip_suffix(".sql")
        .or_else(|| filename.strip_suffix(".SQL"))
        .ok_or_else(|| {
            ScriptError::ScriptNameError(format!("'{}' is not a .sql file", filename))
        })?;

    let mut parts = stem.rsplitn(3, '-');
    let (to, from, schema) = match (parts.next(), parts.next(), parts.next()) {
        (Some(to), Some(from), Some(schema)) if !schema.is_empty() => (to, from, schema),
        _ => {
            return Err(ScriptError::ScriptNameError(format!(
                "'{}' does not match <schema>-<from>-<to>.sql",
                filename
            )))
        }
    };

    let from_version = Version::parse(from)
        .map_err(|_| ScriptError::ScriptNameError(format!("Bad from version in '{}'", filename)))?;
    let to_version = Version::parse(to)
        .map_err(|_| ScriptError::ScriptNameError(format!("Bad to version in '{}'", filename)))?;

    if to_version <= from_version {
        return Err(ScriptError::ScriptNameError(format!(
            "'{}' does not move the schema forward ({} -> {})",
            filename, from_version, to_version
        )));
    }

    Ok((schema.to_string(), from_version, to_version))
}

/// Resolve the directory holding a module's scripts for a dialect.
///
/// Prefers a dialect subdirectory (`postgresql/`, `sqlserver/`) when present.
pub fn script_directory(directory: &Path, dialect: Dialect) -> PathBuf {
    let dialect_dir = directory.join(dialect.directory_name());
    if dialect_dir.is_dir() {
        dialect_dir
    } else {
        directory.to_path_buf()
    }
}

/// Scan one module directory for scripts, sorted by schema and version.
///
/// A missing directory yields no scripts.
pub fn scan_scripts(module: &str, directory: &Path, dialect: Dialect) -> Result<Vec<SqlScript>> {
    let dir = script_directory(directory, dialect);
    if !dir.is_dir() {
        log::debug!(
            "Script directory not found, skipping; module={}, path={}",
            module,
            dir.display()
        );
        return Ok(Vec::new());
    }

    let mut scripts = Vec::new();
    for entry in std::fs::read_dir(&dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let is_sql = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("sql"));
        if !is_sql {
            continue;
        }
        match SqlScript::load(module, &path) {
            Ok(script) => scripts.push(script),
            Err(ScriptError::ScriptNameError(reason)) => {
                log::debug!("Skipping file; path={}, reason={}", path.display(), reason);
            }
            Err(e) => return Err(e),
        }
    }

    scripts.sort();
    Ok(scripts)
}

/// Scan every configured module.
pub fn scan_modules(modules: &[ModuleConfig], dialect: Dialect) -> Result<Vec<SqlScript>> {
    let mut scripts = Vec::new();
    for module in modules {
        scripts.extend(scan_scripts(&module.name, &module.directory, dialect)?);
    }
    scripts.sort();
    Ok(scripts)
}

/// Group scripts by `(module, schema)`, preserving the scripts' order within each group.
pub fn group_by_schema(scripts: &[SqlScript]) -> BTreeMap<(&str, &str), Vec<&SqlScript>> {
    let mut groups: BTreeMap<(&str, &str), Vec<&SqlScript>> = BTreeMap::new();
    for script in scripts {
        groups
            .entry((script.module.as_str(), script.schema.as_str()))
            .or_default()
            .push(script);
    }
    groups
}
