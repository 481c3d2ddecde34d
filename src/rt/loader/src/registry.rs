//! The application registry: what can be started, and what the menus show.
//!
//! The registry is built once before the loader serves requests and is read-only afterwards, so
//! the loader shares it between threads behind an `Arc` without locking.
use std::path::{Path, PathBuf};

use loader_api::{AppEntry, AppFlags};
use tracing::{debug, warn};

use crate::{config::LoaderConfig, storage::Storage};

/// Default stack for built-in applications.
pub const DEFAULT_STACK_SIZE: usize = 2048;
/// Legacy spelling of the applications browser entry in menu files.
pub const LEGACY_APPLICATIONS_NAME: &str = "Applications";
pub const SETTINGS_NAME: &str = "Settings";
pub const CFW_SETTINGS_NAME: &str = "CFW Settings";
/// Games offered when the games menu has fewer than two entries.
pub const FALLBACK_GAMES: [&str; 2] = ["dice.fap", "snake.fap"];
/// Most games picked up from the games directory when no games menu is configured.
pub const MAX_LISTED_GAMES: usize = 128;

/// Groups of built-in applications. Lookups search the groups in declaration order, so a main
/// application shadows a settings application of the same name.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AppCategory {
    #[default]
    Main,
    Settings,
    System,
    Debug,
}

impl AppCategory {
    pub const SEARCH_ORDER: [AppCategory; 4] = [
        AppCategory::Main,
        AppCategory::Settings,
        AppCategory::System,
        AppCategory::Debug,
    ];
}

/// Where an application's code comes from.
#[derive(Clone, Debug)]
pub enum AppSource {
    /// Linked into the firmware.
    Entry(AppEntry),
    /// A relocatable module on storage.
    Path(PathBuf),
}

#[derive(Clone, Debug)]
pub struct AppDescriptor {
    name: String,
    source: AppSource,
    stack_size: usize,
    flags: AppFlags,
    app_id: String,
    category: AppCategory,
}

impl AppDescriptor {
    /// A built-in application. The app ID defaults to the lowercased name.
    pub fn internal(name: impl Into<String>, entry: AppEntry) -> Self {
        let name = name.into();
        Self {
            app_id: name.to_lowercase().replace(' ', "_"),
            name,
            source: AppSource::Entry(entry),
            stack_size: DEFAULT_STACK_SIZE,
            flags: AppFlags::empty(),
            category: AppCategory::Main,
        }
    }

    /// An alias for a file-backed application. The app ID is the file stem.
    pub fn external(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            name: name.into(),
            app_id: file_stem(&path),
            source: AppSource::Path(path),
            stack_size: 0,
            flags: AppFlags::empty(),
            category: AppCategory::Main,
        }
    }

    pub fn with_stack_size(mut self, stack_size: usize) -> Self {
        self.stack_size = stack_size;
        self
    }

    pub fn with_flags(mut self, flags: AppFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_app_id(mut self, app_id: impl Into<String>) -> Self {
        self.app_id = app_id.into();
        self
    }

    pub fn with_category(mut self, category: AppCategory) -> Self {
        self.category = category;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &AppSource {
        &self.source
    }

    pub fn entry(&self) -> Option<AppEntry> {
        match self.source {
            AppSource::Entry(entry) => Some(entry),
            AppSource::Path(_) => None,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.source {
            AppSource::Entry(_) => None,
            AppSource::Path(path) => Some(path),
        }
    }

    pub fn stack_size(&self) -> usize {
        self.stack_size
    }

    pub fn flags(&self) -> AppFlags {
        self.flags
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn category(&self) -> AppCategory {
        self.category
    }
}

/// One line of a menu: what to show, and the name to pass to `start`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MenuApp {
    pub label: String,
    pub target: String,
}

impl MenuApp {
    fn new(label: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            target: target.into(),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Registry {
    internal: Vec<AppDescriptor>,
    external: Vec<AppDescriptor>,
    main_menu: Vec<MenuApp>,
    games_menu: Vec<MenuApp>,
}

impl Registry {
    /// Create a registry from built-in applications. Descriptors without an entry function are
    /// ignored here; register them with [Registry::with_external].
    pub fn new(internal: impl IntoIterator<Item = AppDescriptor>) -> Self {
        let internal = internal
            .into_iter()
            .filter(|app| {
                let ok = app.entry().is_some();
                if !ok {
                    warn!("{} has no entry point, not registered as built-in", app.name);
                }
                ok
            })
            .collect();
        Self {
            internal,
            ..Default::default()
        }
    }

    pub fn with_external(mut self, external: impl IntoIterator<Item = AppDescriptor>) -> Self {
        self.external.extend(external.into_iter().filter(|app| {
            let ok = app.path().is_some();
            if !ok {
                warn!("{} has no path, not registered as external", app.name);
            }
            ok
        }));
        self
    }

    /// Build the menu lists from the configured menu lines. Must be called after all
    /// applications are registered, since lines resolve against them.
    pub fn with_menus(mut self, config: &LoaderConfig, storage: &dyn Storage) -> Self {
        self.main_menu = self.resolve_main_menu(config, storage);
        self.games_menu = self.resolve_games_menu(config, storage);
        debug!(
            "menus: {} main entries, {} games",
            self.main_menu.len(),
            self.games_menu.len()
        );
        self
    }

    pub fn find_internal(&self, name: &str) -> Option<&AppDescriptor> {
        AppCategory::SEARCH_ORDER.iter().find_map(|category| {
            self.internal
                .iter()
                .find(|app| app.category == *category && app.name == name)
        })
    }

    /// Path of the external application registered under `name`.
    pub fn find_external(&self, name: &str) -> Option<&Path> {
        self.external
            .iter()
            .find(|app| app.name == name)
            .and_then(AppDescriptor::path)
    }

    pub fn internal_apps(&self) -> impl Iterator<Item = &AppDescriptor> {
        self.internal.iter()
    }

    pub fn external_apps(&self) -> impl Iterator<Item = &AppDescriptor> {
        self.external.iter()
    }

    pub fn list_main_menu_apps(&self) -> &[MenuApp] {
        &self.main_menu
    }

    pub fn list_games_menu_apps(&self) -> &[MenuApp] {
        &self.games_menu
    }

    /// Menu lines used when none are configured: the applications browser, every main built-in
    /// application, every external alias, then settings.
    fn default_main_menu_lines(&self, config: &LoaderConfig) -> Vec<String> {
        let main_apps = self
            .internal
            .iter()
            .filter(|app| app.category == AppCategory::Main);
        std::iter::once(config.applications_name.clone())
            .chain(main_apps.map(|app| app.name.clone()))
            .chain(self.external.iter().map(|app| app.name.clone()))
            .chain(std::iter::once(SETTINGS_NAME.to_string()))
            .collect()
    }

    fn resolve_main_menu(&self, config: &LoaderConfig, storage: &dyn Storage) -> Vec<MenuApp> {
        let defaults;
        let lines = if config.main_menu.is_empty() {
            defaults = self.default_main_menu_lines(config);
            &defaults
        } else {
            &config.main_menu
        };
        let mut menu: Vec<MenuApp> = lines
            .iter()
            .filter_map(|line| {
                let line = line.trim();
                let entry = self.resolve_main_menu_line(line, config, storage);
                if entry.is_none() && !line.is_empty() {
                    warn!("main menu: skipping unknown entry \"{}\"", line);
                }
                entry
            })
            .collect();

        if menu.len() < 2 {
            if self.find_external(CFW_SETTINGS_NAME).is_some() {
                menu.push(MenuApp::new(CFW_SETTINGS_NAME, CFW_SETTINGS_NAME));
            }
            menu.push(MenuApp::new(SETTINGS_NAME, SETTINGS_NAME));
        }
        menu
    }

    fn resolve_main_menu_line(
        &self,
        line: &str,
        config: &LoaderConfig,
        storage: &dyn Storage,
    ) -> Option<MenuApp> {
        if line.is_empty() {
            return None;
        }
        if storage.exists(Path::new(line)) {
            return Some(MenuApp::new(file_stem(Path::new(line)), line));
        }
        if self.find_internal(line).is_some() || self.find_external(line).is_some() {
            return Some(MenuApp::new(line, line));
        }
        if line == config.applications_name || line == LEGACY_APPLICATIONS_NAME {
            return Some(MenuApp::new(
                config.applications_name.as_str(),
                config.applications_name.as_str(),
            ));
        }
        (line == SETTINGS_NAME).then(|| MenuApp::new(SETTINGS_NAME, SETTINGS_NAME))
    }

    fn resolve_games_menu(&self, config: &LoaderConfig, storage: &dyn Storage) -> Vec<MenuApp> {
        if config.games_menu.is_empty() {
            return Self::games_from_dir(config, storage);
        }
        let mut menu: Vec<MenuApp> = config
            .games_menu
            .iter()
            .map(|line| line.trim())
            .filter(|line| !line.is_empty())
            .filter_map(|line| {
                let path = Path::new(line);
                if storage.exists(path) {
                    Some(MenuApp::new(file_stem(path), line))
                } else {
                    warn!("games menu: {} does not exist", line);
                    None
                }
            })
            .collect();

        Self::add_fallback_games(&mut menu, config, storage);
        menu
    }

    /// Every `.fap` file in the games directory.
    fn games_from_dir(config: &LoaderConfig, storage: &dyn Storage) -> Vec<MenuApp> {
        let mut menu: Vec<MenuApp> = storage
            .list_dir(&config.games_dir)
            .into_iter()
            .filter(|path| path.extension().is_some_and(|ext| ext == "fap"))
            .take(MAX_LISTED_GAMES)
            .map(|path| MenuApp::new(file_stem(&path), path.to_string_lossy()))
            .collect();
        Self::add_fallback_games(&mut menu, config, storage);
        menu
    }

    fn add_fallback_games(menu: &mut Vec<MenuApp>, config: &LoaderConfig, storage: &dyn Storage) {
        if menu.len() >= 2 {
            return;
        }
        for game in FALLBACK_GAMES {
            let path = config.games_dir.join(game);
            let target = path.to_string_lossy();
            if storage.exists(&path) && !menu.iter().any(|entry| entry.target == target) {
                menu.push(MenuApp::new(file_stem(&path), target));
            }
        }
    }
}

/// File name without directories or extension.
pub(crate) fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}
