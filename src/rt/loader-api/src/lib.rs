//! Types shared between the application loader, the applications it runs, and the menus that
//! list them. Applications only need this crate: they receive an [AppContext] and return an exit
//! code.

use std::{fmt, sync::Arc, time::Duration};

use parking_lot::{Condvar, Mutex};
use static_assertions::assert_impl_all;

bitflags::bitflags! {
    /// Properties of an application that affect how the loader starts it.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct AppFlags: u32 {
        /// The application tolerates low-power mode, so the loader does not hold insomnia while it
        /// runs.
        const INSOMNIA_SAFE = 1;
        /// Always trace the application's heap, regardless of the configured trace mode.
        const REQUIRES_HEAP_TRACE = 2;
    }
}

/// Entry point of a built-in application.
pub type AppEntry = fn(AppContext) -> i32;

/// Result of a start request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoaderStatus {
    Ok,
    /// Another application (or a lock holder) occupies the slot.
    ErrorAppStarted { blocking_app_name: String },
    /// The name matched no application and no file.
    ErrorUnknownApp { name: String },
    /// Loading failed. The message says why.
    ErrorInternal { message: String },
    /// The module was built for a different API version and the user chose to continue.
    ErrorApiMismatch,
    /// The module was built for a different API version and the user chose not to continue.
    ErrorApiMismatchExit,
}

impl LoaderStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, LoaderStatus::Ok)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        LoaderStatus::ErrorInternal {
            message: message.into(),
        }
    }
}

impl fmt::Display for LoaderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoaderStatus::Ok => write!(f, "App started"),
            LoaderStatus::ErrorAppStarted { blocking_app_name } => write!(
                f,
                "Loader is locked, please close the \"{}\" first",
                blocking_app_name
            ),
            LoaderStatus::ErrorUnknownApp { name } => {
                write!(f, "Application \"{}\" not found", name)
            }
            LoaderStatus::ErrorInternal { message } => write!(f, "{}", message),
            LoaderStatus::ErrorApiMismatch | LoaderStatus::ErrorApiMismatchExit => {
                write!(f, "API Mismatch")
            }
        }
    }
}

/// Lifecycle notifications published by the loader.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LoaderEvent {
    ApplicationStarted,
    ApplicationStopped,
}

/// A one-way flag an application can wait on, raised when the loader asks it to exit.
#[derive(Default, Debug)]
pub struct ExitSignal {
    raised: Mutex<bool>,
    cond: Condvar,
}

impl ExitSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the signal, waking all waiters.
    pub fn raise(&self) {
        *self.raised.lock() = true;
        self.cond.notify_all();
    }

    pub fn is_raised(&self) -> bool {
        *self.raised.lock()
    }

    /// Block until the signal is raised.
    pub fn wait(&self) {
        let mut raised = self.raised.lock();
        while !*raised {
            self.cond.wait(&mut raised);
        }
    }

    /// Block until the signal is raised or the timeout passes. Returns true if raised.
    pub fn wait_for(&self, timeout: Duration) -> bool {
        let mut raised = self.raised.lock();
        if !*raised {
            self.cond.wait_for(&mut raised, timeout);
        }
        *raised
    }
}

/// Everything an application receives from the loader when it starts.
#[derive(Clone, Debug)]
pub struct AppContext {
    app_id: Arc<str>,
    args: Option<Arc<str>>,
    exit: Arc<ExitSignal>,
}

assert_impl_all!(AppContext: Send, Sync);

impl AppContext {
    pub fn new(app_id: impl Into<Arc<str>>, args: Option<Arc<str>>, exit: Arc<ExitSignal>) -> Self {
        Self {
            app_id: app_id.into(),
            args,
            exit,
        }
    }

    /// The application ID the loader assigned.
    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    /// Arguments passed to the start request. Empty arguments are never passed.
    pub fn args(&self) -> Option<&str> {
        self.args.as_deref()
    }

    /// Has the loader asked this application to exit?
    pub fn should_exit(&self) -> bool {
        self.exit.is_raised()
    }

    /// Block until the loader asks this application to exit.
    pub fn wait_exit(&self) {
        self.exit.wait()
    }

    /// Sleep for up to `timeout`, returning early (with true) if asked to exit.
    pub fn sleep_or_exit(&self, timeout: Duration) -> bool {
        self.exit.wait_for(timeout)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn status_messages() {
        assert_eq!(LoaderStatus::Ok.to_string(), "App started");
        assert_eq!(
            LoaderStatus::ErrorAppStarted {
                blocking_app_name: "Clock".into()
            }
            .to_string(),
            "Loader is locked, please close the \"Clock\" first"
        );
        assert_eq!(
            LoaderStatus::ErrorUnknownApp { name: "Nope".into() }.to_string(),
            "Application \"Nope\" not found"
        );
        assert_eq!(LoaderStatus::internal("boom").to_string(), "boom");
        assert_eq!(LoaderStatus::ErrorApiMismatchExit.to_string(), "API Mismatch");
    }

    #[test]
    fn exit_signal_wakes_waiter() {
        let signal = Arc::new(ExitSignal::new());
        let ctx = AppContext::new("test", Some("arg".into()), signal.clone());
        assert_eq!(ctx.args(), Some("arg"));
        assert!(!ctx.sleep_or_exit(Duration::from_millis(1)));

        let waiter = std::thread::spawn(move || {
            ctx.wait_exit();
            ctx.should_exit()
        });
        signal.raise();
        assert!(waiter.join().unwrap());
    }
}
