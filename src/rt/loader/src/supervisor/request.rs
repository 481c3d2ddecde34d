use std::{
    fmt,
    sync::mpsc::{sync_channel, Receiver, Sender, SyncSender},
};

use loader_api::LoaderStatus;

use super::{stat::LoaderStats, LockMisuse};

pub(crate) type Reply<T> = SyncSender<T>;

/// A reply channel with room for exactly one answer, so the loader never blocks replying.
pub(crate) fn oneshot<T>() -> (Reply<T>, Receiver<T>) {
    sync_channel(1)
}

pub(crate) enum Request {
    StartByName {
        name: String,
        args: Option<String>,
        reply: Reply<LoaderStatus>,
    },
    /// Sent by an application thread once the application has returned.
    AppClosed,
    ShowMenu,
    ShowGamesMenu,
    MenuClosed,
    ApplicationsClosed,
    Lock {
        reply: Reply<bool>,
    },
    Unlock {
        reply: Reply<Result<(), LockMisuse>>,
    },
    IsLocked {
        reply: Reply<bool>,
    },
    SignalExit {
        reply: Reply<bool>,
    },
    Stat {
        reply: Reply<LoaderStats>,
    },
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Request::StartByName { name, args, .. } => f
                .debug_struct("StartByName")
                .field("name", name)
                .field("args", args)
                .finish(),
            Request::AppClosed => write!(f, "AppClosed"),
            Request::ShowMenu => write!(f, "ShowMenu"),
            Request::ShowGamesMenu => write!(f, "ShowGamesMenu"),
            Request::MenuClosed => write!(f, "MenuClosed"),
            Request::ApplicationsClosed => write!(f, "ApplicationsClosed"),
            Request::Lock { .. } => write!(f, "Lock"),
            Request::Unlock { .. } => write!(f, "Unlock"),
            Request::IsLocked { .. } => write!(f, "IsLocked"),
            Request::SignalExit { .. } => write!(f, "SignalExit"),
            Request::Stat { .. } => write!(f, "Stat"),
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum CloseKind {
    Menu,
    Applications,
}

/// Handed to the UI with every menu it opens. Calling [CloseHook::close] tells the loader the
/// user closed that menu.
#[derive(Clone)]
pub struct CloseHook {
    queue: Sender<Request>,
    kind: CloseKind,
}

impl fmt::Debug for CloseHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloseHook").field("kind", &self.kind).finish()
    }
}

impl CloseHook {
    pub(crate) fn menu(queue: Sender<Request>) -> Self {
        Self {
            queue,
            kind: CloseKind::Menu,
        }
    }

    pub(crate) fn applications(queue: Sender<Request>) -> Self {
        Self {
            queue,
            kind: CloseKind::Applications,
        }
    }

    pub fn close(&self) {
        let req = match self.kind {
            CloseKind::Menu => Request::MenuClosed,
            CloseKind::Applications => Request::ApplicationsClosed,
        };
        if self.queue.send(req).is_err() {
            tracing::warn!("loader gone, dropping {:?} close", self.kind);
        }
    }
}
