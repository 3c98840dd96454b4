//! Configuration loading and resolution.
//!
//! Supports TOML config files, environment variables, and CLI overrides
//! with a defined priority order (CLI > env > TOML > defaults).

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::dialect::Dialect;
use crate::error::{Result, ScriptError};
use crate::script::Version;
use crate::vcs::VcsKind;

/// Default config file, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "dbscripts.toml";

/// Helper macro to apply an optional owned value directly to a target field.
///
/// Replaces: `if let Some(v) = $opt { $target = v; }`
macro_rules! apply_option {
    ($opt:expr => $target:expr) => {
        if let Some(v) = $opt {
            $target = v;
        }
    };
}

/// Helper macro to clone a borrowed optional value directly to a target field.
///
/// Replaces: `if let Some(ref v) = $opt { $target = v.clone(); }`
macro_rules! apply_option_clone {
    ($opt:expr => $target:expr) => {
        if let Some(ref v) = $opt {
            $target = v.clone();
        }
    };
}

/// Top-level configuration for dbscripts.
#[derive(Debug, Clone)]
pub struct DbScriptsConfig {
    /// Script handling settings (dialect, checkpoints, version control).
    pub scripts: ScriptSettings,
    /// Modules whose script directories are scanned, in configuration order.
    pub modules: Vec<ModuleConfig>,
}

impl Default for DbScriptsConfig {
    fn default() -> Self {
        Self {
            scripts: ScriptSettings::default(),
            modules: vec![ModuleConfig {
                name: "default".to_string(),
                directory: PathBuf::from("dbscripts"),
            }],
        }
    }
}

/// Script handling settings.
#[derive(Debug, Clone, Default)]
pub struct ScriptSettings {
    /// SQL dialect of the scripts; selects the grammar and validator.
    pub dialect: Dialect,
    /// Versions that upgrades are known to start from. `0.00` is always implied.
    pub checkpoints: Vec<Version>,
    /// Backend used to delete scripts after consolidation.
    pub vcs: VcsKind,
}

/// A module and the directory holding its scripts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleConfig {
    pub name: String,
    pub directory: PathBuf,
}

// ── TOML deserialization structs ──

#[derive(Deserialize, Default)]
struct TomlConfig {
    scripts: Option<TomlScriptSettings>,
    modules: Option<Vec<TomlModuleConfig>>,
}

#[derive(Deserialize, Default)]
struct TomlScriptSettings {
    dialect: Option<String>,
    checkpoints: Option<Vec<f64>>,
    vcs: Option<String>,
}

#[derive(Deserialize, Default)]
struct TomlModuleConfig {
    name: Option<String>,
    directory: Option<String>,
}

/// CLI overrides that take highest priority.
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    /// Override the SQL dialect.
    pub dialect: Option<String>,
    /// Override the version control backend.
    pub vcs: Option<String>,
    /// Override the unreachable-script checkpoints.
    pub checkpoints: Option<Vec<Version>>,
    /// Replace the configured modules.
    pub modules: Option<Vec<ModuleConfig>>,
}

impl DbScriptsConfig {
    /// Load configuration with the following priority (highest wins):
    /// 1. CLI arguments
    /// 2. Environment variables
    /// 3. TOML config file
    /// 4. Built-in defaults
    pub fn load(config_path: Option<&str>, overrides: &CliOverrides) -> Result<Self> {
        let mut config = DbScriptsConfig::default();

        // Layer 3: TOML config file
        let toml_path = config_path.unwrap_or(DEFAULT_CONFIG_FILE);
        if let Ok(content) = std::fs::read_to_string(toml_path) {
            let toml_config: TomlConfig = toml::from_str(&content).map_err(|e| {
                ScriptError::ConfigError(format!(
                    "Failed to parse config file '{}': {}",
                    toml_path, e
                ))
            })?;
            let base = Path::new(toml_path).parent().unwrap_or(Path::new(""));
            config.apply_toml(toml_config, base)?;
            log::debug!("Loaded config file; path={}", toml_path);
        } else if config_path.is_some() {
            // If explicitly specified, error if not found
            return Err(ScriptError::ConfigError(format!(
                "Config file '{}' not found",
                toml_path
            )));
        }

        // Layer 2: Environment variables
        config.apply_env()?;

        // Layer 1: CLI overrides
        config.apply_cli(overrides)?;

        if config.modules.is_empty() {
            return Err(ScriptError::ConfigError(
                "No modules configured. Add a [[modules]] entry or set DBSCRIPTS_MODULE_DIRS"
                    .to_string(),
            ));
        }

        Ok(config)
    }

    /// Module directories in the TOML file are relative to the file itself.
    fn apply_toml(&mut self, toml: TomlConfig, base: &Path) -> Result<()> {
        if let Some(s) = toml.scripts {
            if let Some(v) = s.dialect {
                self.scripts.dialect = v.parse()?;
            }
            let checkpoints: Option<Vec<Version>> = s
                .checkpoints
                .map(|v| v.into_iter().map(Version::from_f64).collect());
            apply_option!(checkpoints => self.scripts.checkpoints);
            if let Some(v) = s.vcs {
                self.scripts.vcs = v.parse()?;
            }
        }

        if let Some(modules) = toml.modules {
            let mut configured = Vec::new();
            for m in modules {
                let directory = m.directory.ok_or_else(|| {
                    ScriptError::ConfigError(format!(
                        "Module '{}' has no directory",
                        m.name.as_deref().unwrap_or("?")
                    ))
                })?;
                let directory = base.join(directory);
                let name = m.name.unwrap_or_else(|| module_name_from_dir(&directory));
                configured.push(ModuleConfig { name, directory });
            }
            self.modules = configured;
        }

        Ok(())
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(v) = std::env::var("DBSCRIPTS_DIALECT") {
            self.scripts.dialect = v.parse()?;
        }
        if let Ok(v) = std::env::var("DBSCRIPTS_VCS") {
            self.scripts.vcs = v.parse()?;
        }
        if let Ok(v) = std::env::var("DBSCRIPTS_CHECKPOINTS") {
            self.scripts.checkpoints = parse_checkpoints(&v)?;
        }
        if let Ok(v) = std::env::var("DBSCRIPTS_MODULE_DIRS") {
            self.modules = v
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(parse_module_spec)
                .collect::<Result<Vec<_>>>()?;
        }
        Ok(())
    }

    fn apply_cli(&mut self, overrides: &CliOverrides) -> Result<()> {
        if let Some(ref v) = overrides.dialect {
            self.scripts.dialect = v.parse()?;
        }
        if let Some(ref v) = overrides.vcs {
            self.scripts.vcs = v.parse()?;
        }
        apply_option_clone!(overrides.checkpoints => self.scripts.checkpoints);
        apply_option_clone!(overrides.modules => self.modules);
        Ok(())
    }
}

/// Parse a comma separated list of versions, e.g. `2.0, 8.1`.
pub fn parse_checkpoints(value: &str) -> Result<Vec<Version>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(Version::parse)
        .collect()
}

/// Parse a `name=directory` module spec. A bare directory is named after its
/// last path component.
pub fn parse_module_spec(spec: &str) -> Result<ModuleConfig> {
    let spec = spec.trim();
    let (name, directory) = match spec.split_once('=') {
        Some((name, dir)) => (Some(name.trim()), dir.trim()),
        None => (None, spec),
    };
    if directory.is_empty() {
        return Err(ScriptError::ConfigError(format!(
            "Invalid module '{}'. Use name=directory",
            spec
        )));
    }
    let directory = PathBuf::from(directory);
    let name = name.filter(|n| !n.is_empty()).map(str::to_string);
    Ok(ModuleConfig {
        name: name.unwrap_or_else(|| module_name_from_dir(&directory)),
        directory,
    })
}

fn module_name_from_dir(directory: &Path) -> String {
    directory
        .components()
        .rev()
        .filter_map(|c| c.as_os_str().to_str())
        .find(|c| !matches!(*c, "dbscripts" | "postgresql" | "sqlserver" | "." | ".."))
        .unwrap_or("default")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = DbScriptsConfig::default();
        assert_eq!(config.scripts.dialect, Dialect::Postgres);
        assert_eq!(config.scripts.vcs, VcsKind::Git);
        assert!(config.scripts.checkpoints.is_empty());
        assert_eq!(config.modules.len(), 1);
        assert_eq!(config.modules[0].directory, PathBuf::from("dbscripts"));
    }

    #[test]
    fn test_toml_parsing() {
        let toml_str = r#"
[scripts]
dialect = "sqlserver"
checkpoints = [2.0, 8.1]
vcs = "none"

[[modules]]
name = "core"
directory = "modules/core/dbscripts"

[[modules]]
directory = "modules/study/dbscripts"
"#;

        let toml_config: TomlConfig = toml::from_str(toml_str).unwrap();
        let mut config = DbScriptsConfig::default();
        config.apply_toml(toml_config, Path::new("/repo")).unwrap();

        assert_eq!(config.scripts.dialect, Dialect::SqlServer);
        assert_eq!(config.scripts.vcs, VcsKind::None);
        assert_eq!(
            config.scripts.checkpoints,
            vec![Version::parse("2.0").unwrap(), Version::parse("8.1").unwrap()]
        );
        assert_eq!(config.modules.len(), 2);
        assert_eq!(config.modules[0].name, "core");
        assert_eq!(
            config.modules[0].directory,
            PathBuf::from("/repo/modules/core/dbscripts")
        );
        assert_eq!(config.modules[1].name, "study");
    }

    #[test]
    fn test_toml_invalid_dialect() {
        let toml_config: TomlConfig = toml::from_str("[scripts]\ndialect = \"oracle\"\n").unwrap();
        let mut config = DbScriptsConfig::default();
        let result = config.apply_toml(toml_config, Path::new(""));
        assert!(matches!(result, Err(ScriptError::ConfigError(_))));
    }

    #[test]
    fn test_toml_module_without_directory() {
        let toml_config: TomlConfig = toml::from_str("[[modules]]\nname = \"core\"\n").unwrap();
        let mut config = DbScriptsConfig::default();
        assert!(config.apply_toml(toml_config, Path::new("")).is_err());
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = DbScriptsConfig::default();
        let overrides = CliOverrides {
            dialect: Some("mssql".to_string()),
            vcs: Some("none".to_string()),
            checkpoints: Some(vec![Version::parse("9.1").unwrap()]),
            modules: Some(vec![ModuleConfig {
                name: "ext".to_string(),
                directory: PathBuf::from("ext/dbscripts"),
            }]),
        };

        config.apply_cli(&overrides).unwrap();

        assert_eq!(config.scripts.dialect, Dialect::SqlServer);
        assert_eq!(config.scripts.vcs, VcsKind::None);
        assert_eq!(config.scripts.checkpoints.len(), 1);
        let ext = config.modules.iter().find(|m| m.name == "ext").unwrap();
        assert_eq!(ext.directory, PathBuf::from("ext/dbscripts"));
        assert!(!config.modules.iter().any(|m| m.name == "default"));
    }

    #[test]
    fn test_load_explicit_missing_file() {
        let result = DbScriptsConfig::load(
            Some("/nonexistent/dbscripts.toml"),
            &CliOverrides::default(),
        );
        assert!(matches!(result, Err(ScriptError::ConfigError(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dbscripts.toml");
        std::fs::write(
            &path,
            "[scripts]\ncheckpoints = [1.0]\n\n[[modules]]\nname = \"ext\"\ndirectory = \"ext\"\n",
        )
        .unwrap();

        let config = DbScriptsConfig::load(path.to_str(), &CliOverrides::default()).unwrap();
        assert_eq!(config.modules[0].directory, dir.path().join("ext"));
    }

    #[test]
    fn test_parse_module_spec() {
        let module = parse_module_spec("core=server/modules/core/dbscripts").unwrap();
        assert_eq!(module.name, "core");
        assert_eq!(module.directory, PathBuf::from("server/modules/core/dbscripts"));

        let module = parse_module_spec("server/modules/study/dbscripts/postgresql").unwrap();
        assert_eq!(module.name, "study");

        assert!(parse_module_spec("core=").is_err());
    }

    #[test]
    fn test_parse_checkpoints() {
        let checkpoints = parse_checkpoints("2.0, 8.10,").unwrap();
        assert_eq!(checkpoints.len(), 2);
        assert_eq!(checkpoints[1].to_string(), "8.10");
        assert!(parse_checkpoints("2.0,x").is_err());
    }
}
