use std::sync::{
    mpsc::{self, Receiver, Sender},
    Arc,
};

use fwapi::SymbolResolver;
use loader_api::{LoaderEvent, LoaderStatus};
use miette::Diagnostic;
use static_assertions::assert_impl_all;
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    config::LoaderConfig,
    module::{ModuleLoader, NoModuleLoader},
    power::{Insomnia, PowerControl},
    registry::{MenuApp, Registry},
    storage::{HostStorage, Storage},
    ui::{HeadlessUi, LoaderUi},
    LoaderError,
};

mod actor;
mod pubsub;
mod request;
mod start;
pub mod stat;
pub mod thread;

use actor::{Collaborators, LoaderActor};
use pubsub::PubSub;
pub use request::CloseHook;
use request::{oneshot, Reply, Request};
use stat::LoaderStats;

/// `unlock` was called without a matching successful `lock`.
#[derive(Clone, Debug, Error, Diagnostic, PartialEq, Eq)]
#[error("loader unlocked while {state}")]
#[diagnostic(help("every unlock must pair with a lock that returned true"))]
pub struct LockMisuse {
    state: &'static str,
}

/// State shared between the loader thread and its handles. Immutable apart from the subscriber
/// list.
pub(crate) struct Shared {
    pub registry: Registry,
    pub events: PubSub<LoaderEvent>,
    pub ui: Arc<dyn LoaderUi>,
}

/// A handle to the loader. Cheap to clone; every clone talks to the same loader thread.
#[derive(Clone)]
pub struct Loader {
    queue: Sender<Request>,
    shared: Arc<Shared>,
}

assert_impl_all!(Loader: Send, Sync, Clone);

impl Loader {
    pub fn builder(registry: Registry, api: Arc<dyn SymbolResolver>) -> LoaderBuilder {
        LoaderBuilder::new(registry, api)
    }

    /// Send a request and wait for its reply.
    fn call<T>(&self, make: impl FnOnce(Reply<T>) -> Request) -> Result<T, LoaderError> {
        let (reply, wait) = oneshot();
        self.queue
            .send(make(reply))
            .map_err(|_| LoaderError::Disconnected)?;
        wait.recv().map_err(|_| LoaderError::Disconnected)
    }

    fn post(&self, req: Request) {
        if self.queue.send(req).is_err() {
            warn!("loader is not running, request dropped");
        }
    }

    /// Start an application by name, alias, or file path. Blocks until the loader has either
    /// started it or decided why not.
    pub fn start(&self, name: &str, args: Option<&str>) -> LoaderStatus {
        self.call(|reply| Request::StartByName {
            name: name.to_string(),
            args: args.map(str::to_string),
            reply,
        })
        .unwrap_or_else(|e| LoaderStatus::internal(e.to_string()))
    }

    /// Like [Loader::start], but tell the user about failures through the UI.
    pub fn start_with_gui_error(&self, name: &str, args: Option<&str>) -> LoaderStatus {
        let status = self.start(name, args);
        match &status {
            LoaderStatus::ErrorUnknownApp { .. }
                if self.shared.registry.find_external(name).is_some() =>
            {
                self.shared
                    .ui
                    .show_error("Update needed", "Update firmware\nto run this app");
            }
            LoaderStatus::ErrorUnknownApp { .. } | LoaderStatus::ErrorInternal { .. } => {
                self.shared
                    .ui
                    .show_error("Error", &shorten_error(&status.to_string()));
            }
            _ => {}
        }
        status
    }

    /// Reserve the slot so that no application can start. Returns false if the slot is taken.
    pub fn lock(&self) -> bool {
        self.call(|reply| Request::Lock { reply }).unwrap_or(false)
    }

    /// Release a lock taken with [Loader::lock].
    ///
    /// # Panics
    /// Panics if the loader is not locked. The loader itself is unaffected.
    pub fn unlock(&self) {
        match self.call(|reply| Request::Unlock { reply }) {
            Ok(Ok(())) => {}
            Ok(Err(misuse)) => panic!("{}", misuse),
            Err(e) => warn!("unlock: {}", e),
        }
    }

    /// Is the slot taken, by an application or a lock?
    pub fn is_locked(&self) -> bool {
        self.call(|reply| Request::IsLocked { reply })
            .unwrap_or(true)
    }

    pub fn show_menu(&self) {
        self.post(Request::ShowMenu);
    }

    pub fn show_games_menu(&self) {
        self.post(Request::ShowGamesMenu);
    }

    /// Ask the running application to exit. Returns false if no application is running.
    pub fn signal_exit(&self) -> bool {
        self.call(|reply| Request::SignalExit { reply })
            .unwrap_or_else(|e| {
                warn!("signal exit: {}", e);
                false
            })
    }

    pub fn stat(&self) -> Result<LoaderStats, LoaderError> {
        self.call(|reply| Request::Stat { reply })
    }

    /// Receive every lifecycle event published from now on.
    pub fn subscribe(&self) -> Receiver<LoaderEvent> {
        self.shared.events.subscribe()
    }

    pub fn registry(&self) -> &Registry {
        &self.shared.registry
    }

    pub fn list_main_menu_apps(&self) -> &[MenuApp] {
        self.shared.registry.list_main_menu_apps()
    }

    pub fn list_games_menu_apps(&self) -> &[MenuApp] {
        self.shared.registry.list_games_menu_apps()
    }
}

/// Fit an error message on a small screen.
fn shorten_error(message: &str) -> String {
    message
        .replacen("/ext/apps/", "", 1)
        .replacen(", ", "\n", 1)
        .replacen(": ", "\n", 1)
}

type StartHook = Box<dyn FnOnce() + Send>;

/// Configures and spawns the loader thread.
pub struct LoaderBuilder {
    registry: Registry,
    api: Arc<dyn SymbolResolver>,
    modules: Arc<dyn ModuleLoader>,
    storage: Arc<dyn Storage>,
    power: Arc<dyn PowerControl>,
    ui: Arc<dyn LoaderUi>,
    config: LoaderConfig,
    hooks: Vec<StartHook>,
}

impl LoaderBuilder {
    /// A builder with host defaults: no module loading, host storage, a counting insomnia
    /// holder and a headless UI.
    pub fn new(registry: Registry, api: Arc<dyn SymbolResolver>) -> Self {
        Self {
            registry,
            api,
            modules: Arc::new(NoModuleLoader),
            storage: Arc::new(HostStorage::new()),
            power: Arc::new(Insomnia::new()),
            ui: Arc::new(HeadlessUi::default()),
            config: LoaderConfig::default(),
            hooks: Vec::new(),
        }
    }

    pub fn modules(mut self, modules: Arc<dyn ModuleLoader>) -> Self {
        self.modules = modules;
        self
    }

    pub fn storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = storage;
        self
    }

    pub fn power(mut self, power: Arc<dyn PowerControl>) -> Self {
        self.power = power;
        self
    }

    pub fn ui(mut self, ui: Arc<dyn LoaderUi>) -> Self {
        self.ui = ui;
        self
    }

    /// Use the trace mode, sentinel name and autorun app from `config`. Menus and aliases are
    /// part of the registry and are not taken from here.
    pub fn config(mut self, config: LoaderConfig) -> Self {
        self.config = config;
        self
    }

    /// Run `hook` on the loader thread before it serves any request. Hooks run in the order they
    /// were added, before the autorun application starts.
    pub fn on_system_start(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.hooks.push(Box::new(hook));
        self
    }

    pub fn spawn(self) -> Result<Loader, LoaderError> {
        let (send, recv) = mpsc::channel();
        let shared = Arc::new(Shared {
            registry: self.registry,
            events: PubSub::default(),
            ui: self.ui,
        });
        let actor = LoaderActor::new(
            shared.clone(),
            Collaborators {
                api: self.api,
                modules: self.modules,
                storage: self.storage,
                power: self.power,
            },
            send.clone(),
            self.config.heap_trace,
            self.config.applications_name,
        );
        let hooks = self.hooks;
        let autorun = self.config.autorun;

        std::thread::Builder::new()
            .name("loader".into())
            .spawn(move || {
                let mut actor = actor;
                if !hooks.is_empty() {
                    info!("running {} system start hooks", hooks.len());
                }
                for hook in hooks {
                    hook();
                }
                if let Some(name) = autorun {
                    info!("autorun: {}", name);
                    // Failures are logged by start_by_name.
                    let _ = actor.start_by_name(&name, None);
                }
                actor.run(recv)
            })
            .map_err(LoaderError::SpawnActor)?;

        Ok(Loader {
            queue: send,
            shared,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn shorten() {
        assert_eq!(
            shorten_error("Preload failed /ext/apps/Tools/x.fap: bad header"),
            "Preload failed Tools/x.fap\nbad header"
        );
        assert_eq!(
            shorten_error("Load failed, /ext/apps/x.fap: unresolved symbol: foo"),
            "Load failed\nx.fap\nunresolved symbol: foo"
        );
    }

    #[test]
    fn lock_misuse_message() {
        let misuse = LockMisuse { state: "empty" };
        assert_eq!(misuse.to_string(), "loader unlocked while empty");
    }
}
