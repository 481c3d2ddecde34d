//! Errors for setting up and talking to the loader.
use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum LoaderError {
    #[error("failed to read loader config {path}")]
    Io {
        path: PathBuf,
        #[source]
        err: std::io::Error,
    },
    #[error("invalid loader config: {err}")]
    #[diagnostic(help("see LoaderConfig for the accepted keys"))]
    Config {
        #[from]
        err: toml_edit::de::Error,
    },
    #[error("failed to spawn the loader thread")]
    SpawnActor(#[source] std::io::Error),
    #[error("the loader thread is not running")]
    Disconnected,
}
