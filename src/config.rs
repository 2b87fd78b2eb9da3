//! Settings for repositories and the CLI.
//!
//! Precedence: explicit values (CLI flags) > environment (`DOCTABLES_*`) > config files > defaults.
//! Config files are searched in order: the explicit path, `$DOCTABLES_CONFIG`, `./doctables.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::errors::DbError;

pub const CONFIG_FILE_NAME: &str = "doctables.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TablesConfig {
    /// Forwarded to every `find` as `FindOptions::timeout_ms`.
    pub query_timeout_ms: Option<u64>,
    /// Collection used by the CLI when `--collection` is omitted.
    pub default_collection: Option<String>,
    pub log_dir: Option<PathBuf>,
    /// error|warn|info|debug|trace
    pub log_level: Option<String>,
    /// Rolled log files to keep.
    pub log_retention: Option<usize>,
    /// Write `devlog!` bench lines to `dev.log` next to `app.log`.
    pub devlog: Option<bool>,
}

impl TablesConfig {
    /// # Errors
    /// Returns an error if the text is not valid TOML for this structure.
    pub fn from_toml_str(s: &str) -> Result<Self, DbError> {
        Ok(toml::from_str(s)?)
    }

    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, DbError> {
        let s = std::fs::read_to_string(path)
            .map_err(|e| DbError::Io(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&s)
    }

    /// Settings present in the environment, looked up through `lookup`.
    pub fn from_env_with(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            query_timeout_ms: lookup("DOCTABLES_QUERY_TIMEOUT_MS").and_then(|s| s.parse().ok()),
            default_collection: lookup("DOCTABLES_DEFAULT_COLLECTION"),
            log_dir: lookup("DOCTABLES_LOG_DIR").map(PathBuf::from),
            log_level: lookup("DOCTABLES_LOG_LEVEL"),
            log_retention: lookup("DOCTABLES_LOG_RETENTION").and_then(|s| s.parse().ok()),
            devlog: lookup("DOCTABLES_DEVLOG").map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes")),
        }
    }

    /// Fills every unset field from `other`; fields already set win.
    pub fn fill_from(&mut self, other: Self) {
        if self.query_timeout_ms.is_none() {
            self.query_timeout_ms = other.query_timeout_ms;
        }
        if self.default_collection.is_none() {
            self.default_collection = other.default_collection;
        }
        if self.log_dir.is_none() {
            self.log_dir = other.log_dir;
        }
        if self.log_level.is_none() {
            self.log_level = other.log_level;
        }
        if self.log_retention.is_none() {
            self.log_retention = other.log_retention;
        }
        if self.devlog.is_none() {
            self.devlog = other.devlog;
        }
    }

    /// Loads from the process environment and the standard config file locations.
    ///
    /// # Errors
    /// Returns an error if the explicit file is missing or any existing file fails to parse.
    pub fn load(explicit: Option<&Path>) -> Result<Self, DbError> {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::load_with(explicit, |k| std::env::var(k).ok(), &cwd)
    }

    /// [`TablesConfig::load`] with an injectable environment and working directory.
    ///
    /// # Errors
    /// See [`TablesConfig::load`].
    pub fn load_with(
        explicit: Option<&Path>,
        lookup: impl Fn(&str) -> Option<String>,
        cwd: &Path,
    ) -> Result<Self, DbError> {
        let mut cfg = Self::from_env_with(&lookup);
        if let Some(p) = explicit {
            cfg.fill_from(Self::from_file(p)?);
        }
        let mut implicit = Vec::new();
        if let Some(p) = lookup("DOCTABLES_CONFIG") {
            implicit.push(PathBuf::from(p));
        }
        implicit.push(cwd.join(CONFIG_FILE_NAME));
        for p in implicit {
            if p.exists() {
                log::debug!("reading config {}", p.display());
                cfg.fill_from(Self::from_file(&p)?);
            }
        }
        Ok(cfg)
    }

    /// Applies the logging settings through [`crate::logger::configure_logging`].
    ///
    /// # Errors
    /// Returns an error if the log directory is unusable or a logger is already installed.
    pub fn init_logging(&self) -> Result<(), Box<dyn std::error::Error>> {
        crate::logger::configure_logging(
            self.log_dir.as_deref(),
            self.log_level.as_deref(),
            self.log_retention,
            self.devlog.unwrap_or(false),
        )
    }
}
