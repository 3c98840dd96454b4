//! Version control collaborator used to delete consolidated scripts.

use std::fmt;
use std::path::Path;
use std::process::Command;
use std::str::FromStr;

use serde::Serialize;

use crate::error::{Result, ScriptError};

/// Removes files through a version control system.
pub trait VersionControl {
    /// Delete a tracked file from the working tree and the index.
    fn delete(&self, path: &Path) -> Result<()>;

    fn name(&self) -> &'static str;
}

/// Deletes files with `git rm`, run from the file's directory.
pub struct Git;

impl VersionControl for Git {
    fn delete(&self, path: &Path) -> Result<()> {
        let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
        let file = path.file_name().ok_or_else(|| {
            ScriptError::VcsError(format!("'{}' is not a file", path.display()))
        })?;

        let mut command = Command::new("git");
        command.args(["rm", "--quiet", "--"]).arg(file);
        if let Some(dir) = dir {
            command.current_dir(dir);
        }

        let output = command
            .output()
            .map_err(|e| ScriptError::VcsError(format!("Failed to run git: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ScriptError::VcsError(format!(
                "git rm {} failed: {}",
                path.display(),
                stderr.trim()
            )));
        }

        log::info!("Deleted script from git; path={}", path.display());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "git"
    }
}

/// Deletes files directly, for script directories outside version control.
pub struct NoVcs;

impl VersionControl for NoVcs {
    fn delete(&self, path: &Path) -> Result<()> {
        std::fs::remove_file(path)?;
        log::info!("Deleted script; path={}", path.display());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "none"
    }
}

/// Configured version control backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VcsKind {
    #[default]
    Git,
    None,
}

impl VcsKind {
    pub fn backend(self) -> Box<dyn VersionControl> {
        match self {
            VcsKind::Git => Box::new(Git),
            VcsKind::None => Box::new(NoVcs),
        }
    }
}

impl FromStr for VcsKind {
    type Err = ScriptError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "git" => Ok(VcsKind::Git),
            "none" | "fs" | "" => Ok(VcsKind::None),
            _ => Err(ScriptError::ConfigError(format!(
                "Invalid vcs '{}'. Use 'git' or 'none'.",
                s
            ))),
        }
    }
}

impl fmt::Display for VcsKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VcsKind::Git => write!(f, "git"),
            VcsKind::None => write!(f, "none"),
        }
    }
}
