use std::{path::PathBuf, sync::Arc};

use clap::Parser;
use loader::{
    config::LoaderConfig,
    registry::Registry,
    storage::{HostStorage, Storage},
    ui::MismatchChoice,
    Loader, LoaderEvent,
};
use miette::IntoDiagnostic;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

mod api;
mod apps;
mod console;

#[derive(clap::Parser, Clone, Debug)]
#[clap(name = "loader-srv", version = "0.1", about = "Application loader with a command shell", long_about = None)]
struct Cli {
    /// Loader configuration file (TOML).
    #[clap(long, short)]
    config: Option<PathBuf>,
    #[clap(long, default_value_t = Level::INFO)]
    log_level: Level,
    /// Application to start at boot, overriding the configuration.
    #[clap(long)]
    autorun: Option<String>,
    /// Host directory that device paths such as /ext/apps are resolved under.
    #[clap(long)]
    storage_root: Option<PathBuf>,
    /// Load apps built for a different API version without asking.
    #[clap(long)]
    ignore_api_mismatch: bool,
}

fn main() -> miette::Result<()> {
    let cli = Cli::parse();
    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).into_diagnostic()?;
    miette::set_hook(Box::new(|_| {
        Box::new(miette::NarratableReportHandler::new().with_cause_chain())
    }))?;

    let mut config = match &cli.config {
        Some(path) => LoaderConfig::load(path)?,
        None => LoaderConfig::default(),
    };
    if cli.autorun.is_some() {
        config.autorun = cli.autorun.clone();
    }

    let storage: Arc<dyn Storage> = match &cli.storage_root {
        Some(root) => Arc::new(HostStorage::with_root(root)),
        None => Arc::new(HostStorage::new()),
    };
    let registry = Registry::new(apps::builtin_apps())
        .with_external(config.external_apps())
        .with_menus(&config, storage.as_ref());

    let mismatch = if cli.ignore_api_mismatch {
        MismatchChoice::Continue
    } else {
        MismatchChoice::Abort
    };
    let ui = Arc::new(console::ConsoleUi::new(
        mismatch,
        registry.list_main_menu_apps(),
        registry.list_games_menu_apps(),
    ));

    let api = api::firmware_api()?;
    info!("firmware API {}", api::FIRMWARE_API_VERSION);

    let loader = Loader::builder(registry, Arc::new(api))
        .storage(storage)
        .ui(ui.clone())
        .config(config)
        .on_system_start(|| info!("system start"))
        .spawn()?;
    api::set_loader(loader.clone());

    let events = loader.subscribe();
    std::thread::Builder::new()
        .name("loader-events".into())
        .spawn(move || {
            for event in events {
                match event {
                    LoaderEvent::ApplicationStarted => info!("application started"),
                    LoaderEvent::ApplicationStopped => info!("application stopped"),
                }
            }
        })
        .into_diagnostic()?;

    console::run_shell(&loader, &ui)?;

    let stopped = loader.subscribe();
    if loader.signal_exit() {
        info!("waiting for the running application to exit");
        let _ = stopped
            .iter()
            .find(|event| *event == LoaderEvent::ApplicationStopped);
    }
    Ok(())
}
