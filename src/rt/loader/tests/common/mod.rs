#![allow(dead_code)]

use std::{
    collections::{HashMap, HashSet},
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicUsize, Ordering},
        mpsc::Receiver,
        Arc,
    },
    time::Duration,
};

use fwapi::{api_table, ApiInterface, ApiVersion, SymbolResolver};
use loader::{
    config::LoaderConfig,
    module::{resolve_imports, AppModule, LoadError, ModuleLoader, PreloadError},
    power::Insomnia,
    registry::{AppCategory, AppDescriptor, Registry},
    storage::Storage,
    ui::{LoaderUi, MenuKind, MenuView, MismatchChoice},
    AppContext, AppFlags, AppThread, CloseHook, Loader, LoaderEvent,
};
use parking_lot::Mutex;

pub const FIRMWARE_API: ApiVersion = ApiVersion::new(1, 3);

pub static API: ApiInterface = ApiInterface::new(
    FIRMWARE_API,
    api_table! {
        "furi_delay_ms" => 0x1000,
        "furi_get_tick" => 0x1010,
        "loader_lock" => 0x2000,
        "loader_unlock" => 0x2010,
    },
);

pub const WEATHER_PATH: &str = "/ext/apps/Tools/weather.fap";
pub const OLD_API_PATH: &str = "/ext/apps/old.fap";
pub const BROKEN_PATH: &str = "/ext/apps/broken.fap";
pub const GARBAGE_PATH: &str = "/ext/apps/garbage.fap";

pub fn setup_logging() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub fn wait_app(ctx: AppContext) -> i32 {
    ctx.wait_exit();
    0
}

pub fn quick_app(_ctx: AppContext) -> i32 {
    7
}

pub fn panicking_app(_ctx: AppContext) -> i32 {
    panic!("application bug")
}

pub struct FakeStorage(HashSet<PathBuf>);

impl FakeStorage {
    pub fn new(files: &[&str]) -> Self {
        Self(files.iter().map(PathBuf::from).collect())
    }
}

impl Storage for FakeStorage {
    fn exists(&self, path: &Path) -> bool {
        self.0.contains(path)
    }
}

/// What a fake module file contains.
#[derive(Clone)]
pub struct ModuleSpec {
    pub api: ApiVersion,
    pub imports: Vec<&'static str>,
}

/// Hands out fake modules and counts how many are alive.
#[derive(Default)]
pub struct MockModuleLoader {
    files: HashMap<PathBuf, ModuleSpec>,
    live: Arc<AtomicUsize>,
}

impl MockModuleLoader {
    pub fn with_file(mut self, path: &str, spec: ModuleSpec) -> Self {
        self.files.insert(PathBuf::from(path), spec);
        self
    }

    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

impl ModuleLoader for MockModuleLoader {
    fn alloc(&self) -> Box<dyn AppModule> {
        self.live.fetch_add(1, Ordering::SeqCst);
        Box::new(MockModule {
            files: self.files.clone(),
            live: self.live.clone(),
            loaded: None,
        })
    }
}

struct MockModule {
    files: HashMap<PathBuf, ModuleSpec>,
    live: Arc<AtomicUsize>,
    loaded: Option<(PathBuf, ModuleSpec)>,
}

impl Drop for MockModule {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

impl AppModule for MockModule {
    fn preload(&mut self, path: &Path, firmware: ApiVersion) -> Result<(), PreloadError> {
        let spec = self
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| PreloadError::InvalidFile("bad header".to_string()))?;
        let module = spec.api;
        self.loaded = Some((path.to_path_buf(), spec));
        if firmware.accepts(module) {
            Ok(())
        } else {
            Err(PreloadError::ApiMismatch { module, firmware })
        }
    }

    fn map_to_memory(&mut self, resolver: &dyn SymbolResolver) -> Result<(), LoadError> {
        let (_, spec) = self
            .loaded
            .as_ref()
            .ok_or_else(|| LoadError::Other("not preloaded".to_string()))?;
        resolve_imports(resolver, spec.imports.iter().copied()).map(|_| ())
    }

    fn alloc_thread(&mut self, _args: Option<&str>) -> AppThread {
        let name = self
            .loaded
            .as_ref()
            .and_then(|(path, _)| path.file_stem())
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        AppThread::new(name, 4096, wait_app)
    }
}

/// Records everything the loader shows.
pub struct TestUi {
    mismatch: MismatchChoice,
    pub errors: Mutex<Vec<(String, String)>>,
    pub menus: Mutex<Vec<(MenuKind, CloseHook)>>,
    pub browsers: Mutex<Vec<CloseHook>>,
    pub mismatch_prompts: AtomicUsize,
}

impl TestUi {
    pub fn new(mismatch: MismatchChoice) -> Self {
        Self {
            mismatch,
            errors: Mutex::new(Vec::new()),
            menus: Mutex::new(Vec::new()),
            browsers: Mutex::new(Vec::new()),
            mismatch_prompts: AtomicUsize::new(0),
        }
    }
}

struct TestView;

impl MenuView for TestView {}

impl LoaderUi for TestUi {
    fn confirm_api_mismatch(&self) -> MismatchChoice {
        self.mismatch_prompts.fetch_add(1, Ordering::SeqCst);
        self.mismatch
    }

    fn show_error(&self, header: &str, text: &str) {
        self.errors.lock().push((header.to_string(), text.to_string()));
    }

    fn open_menu(&self, kind: MenuKind, on_close: CloseHook) -> Box<dyn MenuView> {
        self.menus.lock().push((kind, on_close));
        Box::new(TestView)
    }

    fn open_applications(&self, on_close: CloseHook) -> Box<dyn MenuView> {
        self.browsers.lock().push(on_close);
        Box::new(TestView)
    }
}

pub fn registry() -> Registry {
    Registry::new([
        AppDescriptor::internal("A", wait_app),
        AppDescriptor::internal("B", wait_app),
        AppDescriptor::internal("X", wait_app),
        AppDescriptor::internal("Y", wait_app),
        AppDescriptor::internal("Quick", quick_app),
        AppDescriptor::internal("Panic", panicking_app),
        AppDescriptor::internal("Safe", wait_app).with_flags(AppFlags::INSOMNIA_SAFE),
        AppDescriptor::internal("Traced", wait_app)
            .with_flags(AppFlags::REQUIRES_HEAP_TRACE)
            .with_category(AppCategory::Debug),
    ])
    .with_external([
        AppDescriptor::external("Weather", WEATHER_PATH),
        AppDescriptor::external("Gone", "/ext/apps/gone.fap"),
    ])
}

pub struct Harness {
    pub loader: Loader,
    pub events: Receiver<LoaderEvent>,
    pub ui: Arc<TestUi>,
    pub modules: Arc<MockModuleLoader>,
    pub power: Arc<Insomnia>,
}

pub fn harness_with(config: LoaderConfig, mismatch: MismatchChoice) -> Harness {
    setup_logging();
    let ui = Arc::new(TestUi::new(mismatch));
    let power = Arc::new(Insomnia::new());
    let modules = Arc::new(
        MockModuleLoader::default()
            .with_file(
                WEATHER_PATH,
                ModuleSpec {
                    api: ApiVersion::new(1, 2),
                    imports: vec!["furi_delay_ms", "furi_get_tick"],
                },
            )
            .with_file(
                OLD_API_PATH,
                ModuleSpec {
                    api: ApiVersion::new(0, 9),
                    imports: vec!["furi_delay_ms"],
                },
            )
            .with_file(
                BROKEN_PATH,
                ModuleSpec {
                    api: FIRMWARE_API,
                    imports: vec!["furi_delay_ms", "furi_hal_nope"],
                },
            ),
    );
    let storage = FakeStorage::new(&[WEATHER_PATH, OLD_API_PATH, BROKEN_PATH, GARBAGE_PATH]);

    let loader = Loader::builder(registry(), Arc::new(API.clone()))
        .modules(modules.clone())
        .storage(Arc::new(storage))
        .power(power.clone())
        .ui(ui.clone())
        .config(config)
        .spawn()
        .expect("spawn loader");
    let events = loader.subscribe();
    Harness {
        loader,
        events,
        ui,
        modules,
        power,
    }
}

pub fn harness() -> Harness {
    harness_with(LoaderConfig::default(), MismatchChoice::Abort)
}

impl Harness {
    /// Wait for the next occurrence of `event`, skipping others.
    pub fn wait_event(&self, event: LoaderEvent) {
        loop {
            let got = self
                .events
                .recv_timeout(Duration::from_secs(5))
                .expect("timed out waiting for loader event");
            if got == event {
                return;
            }
        }
    }

    /// Ask the running application to exit and wait until the loader has released it.
    pub fn close_running(&self) {
        assert!(self.loader.signal_exit());
        self.wait_event(LoaderEvent::ApplicationStopped);
    }
}
