//! Dialogs and menus the loader shows.
use tracing::{info, warn};

use crate::CloseHook;

/// The user's answer to an API mismatch warning.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum MismatchChoice {
    /// Load the module anyway.
    Continue,
    #[default]
    Abort,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MenuKind {
    Main,
    Games,
}

/// An open menu or browser. Dropping the view closes it.
pub trait MenuView: Send {}

/// User interface collaborator of the loader.
///
/// Dialog methods are called on the loader's thread, or on the caller's thread for
/// [crate::Loader::start_with_gui_error], and may block until the user answers. Menu views are
/// owned by the loader; when the user closes one, the UI calls [CloseHook::close] and the loader
/// drops the view on its own thread.
pub trait LoaderUi: Send + Sync {
    fn confirm_api_mismatch(&self) -> MismatchChoice;

    /// Best effort; failures to display are not reported.
    fn show_error(&self, header: &str, text: &str);

    fn open_menu(&self, kind: MenuKind, on_close: CloseHook) -> Box<dyn MenuView>;

    fn open_applications(&self, on_close: CloseHook) -> Box<dyn MenuView>;
}

/// A UI with no display: errors go to the log, mismatches get a fixed answer, and menus never
/// close on their own.
#[derive(Clone, Copy, Debug, Default)]
pub struct HeadlessUi {
    mismatch: MismatchChoice,
}

impl HeadlessUi {
    pub fn new(mismatch: MismatchChoice) -> Self {
        Self { mismatch }
    }
}

struct HeadlessView;

impl MenuView for HeadlessView {}

impl LoaderUi for HeadlessUi {
    fn confirm_api_mismatch(&self) -> MismatchChoice {
        warn!("API mismatch, answering {:?}", self.mismatch);
        self.mismatch
    }

    fn show_error(&self, header: &str, text: &str) {
        warn!("{}: {}", header, text.replace('\n', " "));
    }

    fn open_menu(&self, kind: MenuKind, _on_close: CloseHook) -> Box<dyn MenuView> {
        info!("{:?} menu opened", kind);
        Box::new(HeadlessView)
    }

    fn open_applications(&self, _on_close: CloseHook) -> Box<dyn MenuView> {
        info!("applications browser opened");
        Box::new(HeadlessView)
    }
}
