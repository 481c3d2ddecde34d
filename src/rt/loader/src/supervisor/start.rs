//! Starting applications.
use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Instant,
};

use loader_api::{AppContext, AppFlags, ExitSignal, LoaderEvent, LoaderStatus};
use tracing::{error, info, warn};

use super::{
    actor::{LoaderActor, RunningApp, Slot},
    request::Request,
    thread::{AppThread, ThreadState},
};
use crate::{
    module::{AppModule, PreloadError},
    registry::{file_stem, AppDescriptor},
    ui::MismatchChoice,
};

/// Empty arguments are never passed to an application.
fn owned_args(args: Option<&str>) -> Option<Arc<str>> {
    args.filter(|args| !args.is_empty()).map(Arc::from)
}

impl LoaderActor {
    pub(super) fn start_by_name(&mut self, name: &str, args: Option<&str>) -> LoaderStatus {
        let status = self.try_start(name, args);
        match &status {
            LoaderStatus::Ok => {}
            LoaderStatus::ErrorAppStarted { .. } => warn!("cannot start {}: {}", name, status),
            _ => {
                error!("failed to start {}: {}", name, status);
                self.failed_starts += 1;
            }
        }
        status
    }

    fn try_start(&mut self, name: &str, args: Option<&str>) -> LoaderStatus {
        if let Some(occupant) = self.slot.occupant() {
            return LoaderStatus::ErrorAppStarted {
                blocking_app_name: occupant.to_string(),
            };
        }

        let shared = self.shared.clone();
        if let Some(app) = shared.registry.find_internal(name) {
            return self.start_internal(app, args);
        }

        if name == self.applications_name {
            self.show_applications();
            return LoaderStatus::Ok;
        }

        let path = shared
            .registry
            .find_external(name)
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(name));
        if self.with.storage.exists(&path) {
            return match self.start_external(&path, args, false) {
                LoaderStatus::ErrorApiMismatch => self.start_external(&path, args, true),
                status => status,
            };
        }

        LoaderStatus::ErrorUnknownApp {
            name: name.to_string(),
        }
    }

    fn start_internal(&mut self, app: &AppDescriptor, args: Option<&str>) -> LoaderStatus {
        let Some(entry) = app.entry() else {
            return LoaderStatus::internal(format!("{} has no entry point", app.name()));
        };
        info!("starting {}", app.name());
        let mut thread = AppThread::new(app.name(), app.stack_size(), entry);
        thread.set_app_id(app.app_id());
        self.start_thread(thread, app.flags(), owned_args(args), None)
    }

    /// Load and start a file-backed application. With `ignore_mismatch`, an API mismatch is
    /// logged and loading continues.
    fn start_external(
        &mut self,
        path: &Path,
        args: Option<&str>,
        ignore_mismatch: bool,
    ) -> LoaderStatus {
        info!("loading {}", path.display());
        let load_start = Instant::now();
        let mut module = self.with.modules.alloc();

        match module.preload(path, self.with.api.api_version()) {
            Ok(()) => {}
            Err(e @ PreloadError::ApiMismatch { .. }) if ignore_mismatch => {
                warn!("{}: {}, loading anyway", path.display(), e);
            }
            Err(e @ PreloadError::ApiMismatch { .. }) => {
                warn!("{}: {}", path.display(), e);
                drop(module);
                return match self.shared.ui.confirm_api_mismatch() {
                    MismatchChoice::Continue => LoaderStatus::ErrorApiMismatch,
                    MismatchChoice::Abort => LoaderStatus::ErrorApiMismatchExit,
                };
            }
            Err(e) => {
                return LoaderStatus::internal(format!("Preload failed {}: {}", path.display(), e))
            }
        }

        if let Err(e) = module.map_to_memory(&*self.with.api) {
            return LoaderStatus::internal(format!("Load failed, {}: {}", path.display(), e));
        }
        info!(
            "loaded {} in {}ms",
            path.display(),
            load_start.elapsed().as_millis()
        );

        let args = owned_args(args);
        let mut thread = module.alloc_thread(args.as_deref());
        thread.set_app_id(file_stem(path));
        self.start_thread(thread, AppFlags::empty(), args, Some(module))
    }

    /// Common tail of every start: hook up the thread, run it, and take the slot.
    fn start_thread(
        &mut self,
        mut thread: AppThread,
        flags: AppFlags,
        args: Option<Arc<str>>,
        module: Option<Box<dyn AppModule>>,
    ) -> LoaderStatus {
        thread.set_heap_trace(
            self.heap_trace.traces_apps() || flags.contains(AppFlags::REQUIRES_HEAP_TRACE),
        );

        let queue = self.queue.clone();
        let shared = self.shared.clone();
        thread.set_state_callback(Arc::new(move |state| match state {
            ThreadState::Running => shared.events.publish(LoaderEvent::ApplicationStarted),
            ThreadState::Stopped => {
                if queue.send(Request::AppClosed).is_err() {
                    warn!("loader gone, application close not delivered");
                }
            }
        }));

        let exit = Arc::new(ExitSignal::new());
        let ctx = AppContext::new(thread.app_id(), args.clone(), exit.clone());
        if let Err(e) = thread.start(ctx) {
            return LoaderStatus::internal(format!(
                "Failed to start thread for {}: {}",
                thread.name(),
                e
            ));
        }

        let insomniac = !flags.contains(AppFlags::INSOMNIA_SAFE);
        if insomniac {
            self.with.power.insomnia_enter();
        }
        self.apps_started += 1;
        self.slot = Slot::Running(RunningApp {
            name: thread.name().to_string(),
            args,
            thread,
            insomniac,
            module,
            exit,
            started: Instant::now(),
        });
        LoaderStatus::Ok
    }
}
