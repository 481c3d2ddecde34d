//! The seam between the loader and whatever maps file-backed applications into memory.
//!
//! A [ModuleLoader] hands out empty [AppModule] handles. The loader drives each handle through
//! `preload` (read and validate the file), `map_to_memory` (place it and resolve its imports
//! against the firmware API), and finally `alloc_thread`. A handle is dropped exactly once: right
//! away if any step fails, or after the application's thread has been joined.
use std::path::Path;

use fwapi::{ApiVersion, SymbolResolver, Unresolved};
use miette::Diagnostic;
use thiserror::Error;

use crate::AppThread;

#[derive(Debug, Error, Diagnostic)]
pub enum PreloadError {
    /// The module was built against an API the firmware does not provide. This is the only
    /// preload failure the user may choose to ignore.
    #[error("API version mismatch: module needs {module}, firmware has {firmware}")]
    ApiMismatch {
        module: ApiVersion,
        firmware: ApiVersion,
    },
    #[error("invalid file: {0}")]
    InvalidFile(String),
    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Error, Diagnostic)]
pub enum LoadError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Unresolved(#[from] Unresolved),
    #[error("out of memory")]
    OutOfMemory,
    #[error("{0}")]
    Other(String),
}

/// Creates module handles.
pub trait ModuleLoader: Send + Sync {
    fn alloc(&self) -> Box<dyn AppModule>;
}

/// One file-backed application, from loading until it is freed.
pub trait AppModule: Send {
    /// Read and validate the file at `path`. `firmware` is the API version imports will be
    /// resolved against.
    fn preload(&mut self, path: &Path, firmware: ApiVersion) -> Result<(), PreloadError>;

    /// Map the module and resolve every undefined symbol through `resolver`, once per symbol.
    fn map_to_memory(&mut self, resolver: &dyn SymbolResolver) -> Result<(), LoadError>;

    /// A runnable, not yet started, thread for the module's entry point.
    fn alloc_thread(&mut self, args: Option<&str>) -> AppThread;
}

/// Resolve each name in order, stopping at the first one the resolver does not know.
pub fn resolve_imports<'a>(
    resolver: &dyn SymbolResolver,
    names: impl IntoIterator<Item = &'a str>,
) -> Result<Vec<fwapi::SymbolAddr>, LoadError> {
    names
        .into_iter()
        .map(|name| resolver.resolve(name).map_err(LoadError::from))
        .collect()
}

/// A module loader for firmware images without file-backed application support. Every preload
/// fails.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoModuleLoader;

impl ModuleLoader for NoModuleLoader {
    fn alloc(&self) -> Box<dyn AppModule> {
        Box::new(NoModule)
    }
}

struct NoModule;

impl AppModule for NoModule {
    fn preload(&mut self, _path: &Path, _firmware: ApiVersion) -> Result<(), PreloadError> {
        Err(PreloadError::Other(
            "this firmware cannot load application files".to_string(),
        ))
    }

    fn map_to_memory(&mut self, _resolver: &dyn SymbolResolver) -> Result<(), LoadError> {
        Err(LoadError::Other("module was never preloaded".to_string()))
    }

    fn alloc_thread(&mut self, _args: Option<&str>) -> AppThread {
        AppThread::new("unloaded", 0, |_| -1)
    }
}
