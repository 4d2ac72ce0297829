//! Project configuration (JSON)

use crate::error::{Error, Result};
use crate::registry::{Domain, DomainFiles};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Default configuration file name, looked up in the project directory
pub const CONFIG_FILE_NAME: &str = "rvsync.json";

/// Everything a run needs to know about a project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Directory holding the record files
    pub project_dir: PathBuf,
    /// File pair bound to each domain
    pub domains: BTreeMap<Domain, DomainFiles>,
    /// Process domains in parallel
    pub parallel: bool,
    /// Optional log file, in addition to the console
    pub log_file: Option<PathBuf>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self::for_project(".")
    }
}

impl ProjectConfig {
    /// Default configuration for a project directory
    pub fn for_project(project_dir: impl Into<PathBuf>) -> Self {
        Self {
            project_dir: project_dir.into(),
            domains: Domain::ALL
                .into_iter()
                .map(|d| (d, d.default_files()))
                .collect(),
            parallel: false,
            log_file: None,
        }
    }

    /// Load a configuration file.
    ///
    /// A relative `project_dir` is taken relative to the file's directory.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| Error::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let mut config: ProjectConfig = serde_json::from_str(&content).map_err(|e| Error::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        if config.project_dir.is_relative() {
            if let Some(parent) = path.parent() {
                config.project_dir = parent.join(&config.project_dir);
            }
        }

        config.validate(path)?;
        Ok(config)
    }

    /// Load `rvsync.json` from the project directory if present, defaults otherwise
    pub fn discover<P: AsRef<Path>>(project_dir: P) -> Result<Self> {
        let project_dir = project_dir.as_ref();
        let path = project_dir.join(CONFIG_FILE_NAME);
        if path.is_file() {
            Self::load(path)
        } else {
            Ok(Self::for_project(project_dir))
        }
    }

    /// Save the configuration to JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Reject bindings that cannot work
    pub fn validate(&self, path: &Path) -> Result<()> {
        let invalid = |message: String| Error::Config {
            path: path.to_path_buf(),
            message,
        };

        for (domain, files) in &self.domains {
            if files.source.as_os_str().is_empty() || files.target.as_os_str().is_empty() {
                return Err(invalid(format!("domain {} has an empty file name", domain)));
            }
            if files.source == files.target {
                return Err(invalid(format!(
                    "domain {} uses '{}' as both source and target",
                    domain,
                    files.source.display()
                )));
            }
        }
        Ok(())
    }
}
