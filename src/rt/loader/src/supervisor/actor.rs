//! The loader's thread and the state it owns.
use std::{
    sync::{
        mpsc::{Receiver, Sender},
        Arc,
    },
    time::Instant,
};

use fwapi::SymbolResolver;
use loader_api::{ExitSignal, LoaderEvent};
use tracing::{debug, error, info, warn};

use super::{
    request::{CloseHook, Request},
    thread::AppThread,
    LockMisuse, Shared,
};
use crate::{
    config::HeapTraceMode,
    module::{AppModule, ModuleLoader},
    power::PowerControl,
    storage::Storage,
    ui::{MenuKind, MenuView},
};

/// Name reported as the slot occupant while the loader is locked.
pub(crate) const LOCK_HOLDER_NAME: &str = "Loader lock";

/// The single application slot.
pub(crate) enum Slot {
    Empty,
    Running(RunningApp),
    /// Held by a lock; no application may start.
    Reserved,
}

impl Slot {
    /// Name of whatever blocks a start, if anything.
    pub(super) fn occupant(&self) -> Option<&str> {
        match self {
            Slot::Empty => None,
            Slot::Running(app) => Some(&app.name),
            Slot::Reserved => Some(LOCK_HOLDER_NAME),
        }
    }

    pub(super) fn describe(&self) -> &'static str {
        match self {
            Slot::Empty => "empty",
            Slot::Running(_) => "running an application",
            Slot::Reserved => "locked",
        }
    }
}

/// Everything held on behalf of the running application. Released in `app_closed`.
pub(crate) struct RunningApp {
    pub name: String,
    pub args: Option<Arc<str>>,
    pub thread: AppThread,
    pub insomniac: bool,
    /// Present for file-backed applications. Freed after the thread is joined.
    pub module: Option<Box<dyn AppModule>>,
    pub exit: Arc<ExitSignal>,
    pub started: Instant,
}

pub(crate) struct Collaborators {
    pub api: Arc<dyn SymbolResolver>,
    pub modules: Arc<dyn ModuleLoader>,
    pub storage: Arc<dyn Storage>,
    pub power: Arc<dyn PowerControl>,
}

pub(crate) struct LoaderActor {
    pub(super) slot: Slot,
    pub(super) menu: Option<Box<dyn MenuView>>,
    pub(super) applications: Option<Box<dyn MenuView>>,
    pub(super) shared: Arc<Shared>,
    pub(super) with: Collaborators,
    /// Our own queue, for application threads and menus to post back to.
    pub(super) queue: Sender<Request>,
    pub(super) heap_trace: HeapTraceMode,
    pub(super) applications_name: String,
    pub(super) apps_started: u64,
    pub(super) failed_starts: u64,
}

impl LoaderActor {
    pub(super) fn new(
        shared: Arc<Shared>,
        with: Collaborators,
        queue: Sender<Request>,
        heap_trace: HeapTraceMode,
        applications_name: String,
    ) -> Self {
        Self {
            slot: Slot::Empty,
            menu: None,
            applications: None,
            shared,
            with,
            queue,
            heap_trace,
            applications_name,
            apps_started: 0,
            failed_starts: 0,
        }
    }

    /// Serve requests. The actor keeps a sender to its own queue, so in practice this never
    /// returns.
    pub(super) fn run(mut self, recv: Receiver<Request>) {
        while let Ok(req) = recv.recv() {
            debug!("loader request: {:?}", req);
            self.handle(req);
        }
        info!("loader queue closed, exiting");
    }

    fn handle(&mut self, req: Request) {
        // A caller that gave up waiting has dropped its receiver; the reply is simply lost.
        match req {
            Request::StartByName { name, args, reply } => {
                let status = self.start_by_name(&name, args.as_deref());
                let _ = reply.send(status);
            }
            Request::AppClosed => self.app_closed(),
            Request::ShowMenu => self.show_menu(MenuKind::Main),
            Request::ShowGamesMenu => self.show_menu(MenuKind::Games),
            Request::MenuClosed => {
                if self.menu.take().is_none() {
                    warn!("menu closed, but no menu was open");
                }
            }
            Request::ApplicationsClosed => {
                if self.applications.take().is_none() {
                    warn!("applications browser closed, but it was not open");
                }
            }
            Request::Lock { reply } => {
                let _ = reply.send(self.lock());
            }
            Request::Unlock { reply } => {
                let _ = reply.send(self.unlock());
            }
            Request::IsLocked { reply } => {
                let _ = reply.send(self.slot.occupant().is_some());
            }
            Request::SignalExit { reply } => {
                let _ = reply.send(self.signal_exit());
            }
            Request::Stat { reply } => {
                let _ = reply.send(self.stat());
            }
        }
    }

    fn lock(&mut self) -> bool {
        if let Slot::Empty = self.slot {
            self.slot = Slot::Reserved;
            true
        } else {
            false
        }
    }

    fn unlock(&mut self) -> Result<(), LockMisuse> {
        match self.slot {
            Slot::Reserved => {
                self.slot = Slot::Empty;
                Ok(())
            }
            ref other => {
                error!("unlock while {}", other.describe());
                Err(LockMisuse {
                    state: other.describe(),
                })
            }
        }
    }

    fn signal_exit(&mut self) -> bool {
        match &self.slot {
            Slot::Running(app) => {
                info!("asking {} to exit", app.name);
                app.exit.raise();
                true
            }
            _ => false,
        }
    }

    fn show_menu(&mut self, kind: MenuKind) {
        if self.menu.is_none() {
            let hook = CloseHook::menu(self.queue.clone());
            self.menu = Some(self.shared.ui.open_menu(kind, hook));
        }
    }

    pub(super) fn show_applications(&mut self) {
        if self.applications.is_none() {
            let hook = CloseHook::applications(self.queue.clone());
            self.applications = Some(self.shared.ui.open_applications(hook));
        }
    }

    fn app_closed(&mut self) {
        let app = match std::mem::replace(&mut self.slot, Slot::Empty) {
            Slot::Running(app) => app,
            other => {
                error!("application closed while {}", other.describe());
                self.slot = other;
                return;
            }
        };
        let RunningApp {
            name,
            args,
            mut thread,
            insomniac,
            module,
            ..
        } = app;

        match thread.join() {
            Some(code) => info!("application {} returned: {}", name, code),
            None => warn!("application {} was never started", name),
        }
        drop(args);
        if insomniac {
            self.with.power.insomnia_exit();
        }
        drop(thread);
        // The module's code may only go away once nothing can run it.
        drop(module);

        info!("application {} stopped", name);
        self.shared.events.publish(LoaderEvent::ApplicationStopped);
    }
}
