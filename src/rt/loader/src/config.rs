//! Loader configuration, read from a TOML file at start-up.
//!
//! ```toml
//! autorun = "Clock"
//! heap_trace = "main"
//! games_dir = "/ext/apps/Games"
//! main_menu = ["Clock", "/ext/apps/Tools/weather.fap", "Apps", "Settings"]
//!
//! [[external]]
//! name = "Weather"
//! path = "/ext/apps/Tools/weather.fap"
//! ```
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::{registry::AppDescriptor, LoaderError};

/// Menu entry that opens the applications browser.
pub const DEFAULT_APPLICATIONS_NAME: &str = "Apps";
/// Directory searched for the fallback games.
pub const DEFAULT_GAMES_DIR: &str = "/ext/apps/Games";

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoaderConfig {
    /// Application started once the system-start hooks have run.
    pub autorun: Option<String>,
    pub heap_trace: HeapTraceMode,
    /// Name that opens the applications browser instead of starting an application.
    pub applications_name: String,
    pub games_dir: PathBuf,
    /// Aliases for file-backed applications.
    pub external: Vec<ExternalAppConfig>,
    /// Lines of the main menu, each a file path or an application name.
    pub main_menu: Vec<String>,
    /// Lines of the games menu, each a file path.
    pub games_menu: Vec<String>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            autorun: None,
            heap_trace: HeapTraceMode::default(),
            applications_name: DEFAULT_APPLICATIONS_NAME.to_string(),
            games_dir: PathBuf::from(DEFAULT_GAMES_DIR),
            external: Vec::new(),
            main_menu: Vec::new(),
            games_menu: Vec::new(),
        }
    }
}

impl LoaderConfig {
    pub fn from_toml(text: &str) -> Result<Self, LoaderError> {
        Ok(toml_edit::de::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, LoaderError> {
        let text = std::fs::read_to_string(path).map_err(|err| LoaderError::Io {
            path: path.to_path_buf(),
            err,
        })?;
        Self::from_toml(&text)
    }

    /// Descriptors for the configured external aliases.
    pub fn external_apps(&self) -> Vec<AppDescriptor> {
        self.external
            .iter()
            .map(|ext| AppDescriptor::external(ext.name.as_str(), ext.path.clone()))
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ExternalAppConfig {
    pub name: String,
    pub path: PathBuf,
}

/// Which application threads get heap tracing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeapTraceMode {
    #[default]
    None,
    Main,
    Tree,
    All,
}

impl HeapTraceMode {
    /// Any mode other than `none` traces application threads.
    pub fn traces_apps(self) -> bool {
        self != HeapTraceMode::None
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn empty_config_is_default() {
        let config = LoaderConfig::from_toml("").unwrap();
        assert_eq!(config, LoaderConfig::default());
        assert_eq!(config.applications_name, "Apps");
        assert!(!config.heap_trace.traces_apps());
    }

    #[test]
    fn full_config() {
        let config = LoaderConfig::from_toml(
            r#"
autorun = "Clock"
heap_trace = "tree"
main_menu = ["Clock", "Apps"]

[[external]]
name = "Weather"
path = "/ext/apps/Tools/weather.fap"
"#,
        )
        .unwrap();
        assert_eq!(config.autorun.as_deref(), Some("Clock"));
        assert_eq!(config.heap_trace, HeapTraceMode::Tree);
        assert_eq!(config.main_menu, ["Clock", "Apps"]);

        let ext = config.external_apps();
        assert_eq!(ext.len(), 1);
        assert_eq!(ext[0].name(), "Weather");
        assert_eq!(
            ext[0].path(),
            Some(Path::new("/ext/apps/Tools/weather.fap"))
        );
    }

    #[test]
    fn unknown_key_rejected() {
        let err = LoaderConfig::from_toml("autostart = \"Clock\"").unwrap_err();
        assert!(matches!(err, LoaderError::Config { .. }));
    }

    #[test]
    fn bad_heap_trace_mode() {
        assert!(LoaderConfig::from_toml("heap_trace = \"sometimes\"").is_err());
    }

    #[test]
    fn missing_file() {
        let err = LoaderConfig::load(Path::new("/nonexistent/loader.toml")).unwrap_err();
        assert!(matches!(err, LoaderError::Io { .. }));
    }
}
