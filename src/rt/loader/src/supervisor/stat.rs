use std::time::Duration;

use super::actor::{LoaderActor, Slot};

/// A snapshot of the loader's state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoaderStats {
    pub slot: SlotStats,
    pub menu_open: bool,
    pub applications_open: bool,
    /// Applications started since boot.
    pub apps_started: u64,
    /// Start requests that failed for any reason other than the slot being taken.
    pub failed_starts: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlotStats {
    NoApp,
    Running(RunningAppStats),
    Reserved,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunningAppStats {
    pub name: String,
    pub app_id: String,
    pub file_backed: bool,
    pub insomnia_held: bool,
    pub heap_trace: bool,
    pub has_args: bool,
    pub uptime: Duration,
}

impl LoaderActor {
    pub(super) fn stat(&self) -> LoaderStats {
        let slot = match &self.slot {
            Slot::Empty => SlotStats::NoApp,
            Slot::Reserved => SlotStats::Reserved,
            Slot::Running(app) => SlotStats::Running(RunningAppStats {
                name: app.name.clone(),
                app_id: app.thread.app_id().to_string(),
                file_backed: app.module.is_some(),
                insomnia_held: app.insomniac,
                heap_trace: app.thread.heap_trace(),
                has_args: app.args.is_some(),
                uptime: app.started.elapsed(),
            }),
        };
        LoaderStats {
            slot,
            menu_open: self.menu.is_some(),
            applications_open: self.applications.is_some(),
            apps_started: self.apps_started,
            failed_starts: self.failed_starts,
        }
    }
}
