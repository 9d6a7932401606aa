use crate::error::Error;
use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::Deserialize;
use std::env;

pub const DEFAULT_RECOVERY_DIR: &str = "Resurrected Files";
pub const DEFAULT_WORKERS: usize = 12;

/// Which filesystem search service answers "where else is a file with this name".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchBackend {
    /// macOS Spotlight via `mdfind`.
    Spotlight,
    /// Parallel walk of `search_roots`, indexed by file name.
    Index,
}

impl Default for SearchBackend {
    fn default() -> Self {
        if cfg!(target_os = "macos") {
            SearchBackend::Spotlight
        } else {
            SearchBackend::Index
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub recovery_dir: String,
    pub workers: usize,
    pub symlink: bool,
    pub in_place: bool,
    pub debug: bool,
    pub search_backend: SearchBackend,
    pub search_roots: Vec<String>,
    pub ignore_patterns: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            recovery_dir: DEFAULT_RECOVERY_DIR.to_string(),
            workers: DEFAULT_WORKERS,
            symlink: false,
            in_place: true,
            debug: flag_check(env::var("DEBUG").ok().as_deref()),
            search_backend: SearchBackend::default(),
            search_roots: Vec::new(),
            ignore_patterns: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<(), Error> {
        if self.workers == 0 {
            return Err(Error::InvalidConfig(
                "workers must be at least 1".to_string(),
            ));
        }
        if !is_plain_file_name(&self.recovery_dir) {
            return Err(Error::InvalidConfig(format!(
                "recovery_dir must be a single directory name, got '{}'",
                self.recovery_dir
            )));
        }
        if self.search_backend == SearchBackend::Index && self.search_roots.is_empty() {
            return Err(Error::InvalidConfig(
                "search_backend 'index' needs at least one entry in search_roots".to_string(),
            ));
        }
        Ok(())
    }
}

/// Load `Config.toml` (optional) layered with `RESURRECT_*` environment variables.
pub fn load_configuration() -> Result<AppConfig, ConfigError> {
    let builder = Config::builder()
        .add_source(ConfigFile::with_name("Config").required(false))
        .add_source(
            Environment::with_prefix("RESURRECT")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("search_roots")
                .with_list_parse_key("ignore_patterns"),
        )
        .build()?;
    builder.try_deserialize::<AppConfig>()
}

/// Truthy values accepted for the `DEBUG` switch.
pub fn flag_check(value: Option<&str>) -> bool {
    matches!(value, Some("1" | "True" | "TRUE" | "true"))
}

/// True when `name` is a single non-empty path component (no separators, not `.`/`..`).
pub fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\')
        && !name.contains('\0')
}
