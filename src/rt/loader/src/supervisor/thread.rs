//! Application threads.
use std::{
    fmt,
    panic::{catch_unwind, AssertUnwindSafe},
    sync::Arc,
    thread::JoinHandle,
};

use loader_api::AppContext;

/// Host threads need more room than a device application asks for; requested stacks are raised
/// to at least this.
pub const MIN_STACK_SIZE: usize = 256 * 1024;
/// Stack minimum alignment.
pub const STACK_SIZE_MIN_ALIGN: usize = 0x1000;
/// Return code reported for an application that panicked.
pub const PANIC_RETURN_CODE: i32 = -1;

type AppMain = Box<dyn FnOnce(AppContext) -> i32 + Send>;
pub(crate) type StateCallback = Arc<dyn Fn(ThreadState) + Send + Sync>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ThreadState {
    /// The thread has started and is about to enter the application.
    Running,
    /// The application returned (or panicked). Nothing of the application runs after this.
    Stopped,
}

/// A thread that runs one application. Created unstarted; the loader starts it, and joins it
/// once it reports [ThreadState::Stopped].
pub struct AppThread {
    name: String,
    app_id: String,
    stack_size: usize,
    heap_trace: bool,
    main: Option<AppMain>,
    state_cb: Option<StateCallback>,
    handle: Option<JoinHandle<i32>>,
}

impl fmt::Debug for AppThread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppThread")
            .field("name", &self.name)
            .field("app_id", &self.app_id)
            .field("stack_size", &self.stack_size)
            .field("heap_trace", &self.heap_trace)
            .field("started", &self.handle.is_some())
            .finish()
    }
}

impl AppThread {
    pub fn new(
        name: impl Into<String>,
        stack_size: usize,
        main: impl FnOnce(AppContext) -> i32 + Send + 'static,
    ) -> Self {
        let name = name.into();
        Self {
            app_id: name.clone(),
            name,
            stack_size: stack_size
                .max(MIN_STACK_SIZE)
                .checked_next_multiple_of(STACK_SIZE_MIN_ALIGN)
                .unwrap_or(usize::MAX & !(STACK_SIZE_MIN_ALIGN - 1)),
            heap_trace: false,
            main: Some(Box::new(main)),
            state_cb: None,
            handle: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn set_app_id(&mut self, app_id: impl Into<String>) {
        self.app_id = app_id.into();
    }

    /// Stack size the thread will get, after rounding.
    pub fn stack_size(&self) -> usize {
        self.stack_size
    }

    pub fn heap_trace(&self) -> bool {
        self.heap_trace
    }

    pub(crate) fn set_heap_trace(&mut self, heap_trace: bool) {
        self.heap_trace = heap_trace;
    }

    pub(crate) fn set_state_callback(&mut self, cb: StateCallback) {
        self.state_cb = Some(cb);
    }

    /// Spawn the OS thread. The state callback sees [ThreadState::Running] before the application
    /// is entered and [ThreadState::Stopped] after it returns, even if it panics.
    pub(crate) fn start(&mut self, ctx: AppContext) -> std::io::Result<()> {
        let Some(main) = self.main.take() else {
            return Err(std::io::Error::other("thread already started"));
        };
        let state_cb = self.state_cb.clone();
        let name = self.name.clone();
        let heap_trace = self.heap_trace;
        let handle = std::thread::Builder::new()
            .name(self.name.clone())
            .stack_size(self.stack_size)
            .spawn(move || {
                if heap_trace {
                    tracing::debug!("heap tracing enabled for {}", name);
                }
                if let Some(cb) = &state_cb {
                    cb(ThreadState::Running);
                }
                let code = match catch_unwind(AssertUnwindSafe(|| main(ctx))) {
                    Ok(code) => code,
                    Err(_) => {
                        tracing::error!("application {} panicked", name);
                        PANIC_RETURN_CODE
                    }
                };
                if let Some(cb) = &state_cb {
                    cb(ThreadState::Stopped);
                }
                code
            })?;
        self.handle = Some(handle);
        Ok(())
    }

    pub fn is_started(&self) -> bool {
        self.handle.is_some()
    }

    /// Wait for the thread to finish and return the application's exit code. Returns None if the
    /// thread was never started.
    pub(crate) fn join(&mut self) -> Option<i32> {
        let handle = self.handle.take()?;
        // The application body cannot unwind past catch_unwind, so only a panicking state
        // callback ends up here.
        Some(handle.join().unwrap_or(PANIC_RETURN_CODE))
    }
}
