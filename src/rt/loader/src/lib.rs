//! The application loader.
//!
//! The loader owns the single foreground application slot of the device. At most one
//! application runs at a time; starting another while the slot is taken fails with
//! [LoaderStatus::ErrorAppStarted] and leaves the running application alone.
//!
//! All loader state is owned by one actor thread that handles requests one at a time from a
//! queue. The [Loader] handle, which any thread may clone and use, turns each operation into a
//! request carrying a one-shot reply channel, and blocks until the actor answers. Because the
//! "is the slot free" check and the transition happen inside a single request, concurrent
//! starts are totally ordered and only the first one wins.
//!
//! Applications come from the [registry::Registry]: either built in (an entry function) or
//! backed by a file that a [module::ModuleLoader] maps into memory, resolving its imports
//! against the firmware API ([fwapi::SymbolResolver]). Each application runs on its own
//! thread. When that thread finishes, it enqueues a close request; the actor then joins it and
//! releases everything the application held.

mod error;
pub use error::*;

pub mod config;
pub mod module;
pub mod power;
pub mod registry;
pub mod storage;
mod supervisor;
pub mod ui;

pub use loader_api::{AppContext, AppEntry, AppFlags, LoaderEvent, LoaderStatus};
pub use supervisor::{
    stat::{LoaderStats, RunningAppStats, SlotStats},
    thread::{AppThread, ThreadState},
    CloseHook, Loader, LoaderBuilder, LockMisuse,
};
