//! The firmware API exported to file-backed applications.
//!
//! Applications link against these functions by name. The table is built at start-up from the
//! real function addresses, so a name collision is reported as an error instead of failing the
//! build.
use std::{sync::OnceLock, time::Instant};

use fwapi::{ApiInterface, ApiTableError, ApiVersion, SymbolAddr, SymbolTable};
use loader::Loader;

pub const FIRMWARE_API_VERSION: ApiVersion = ApiVersion::new(1, 0);

static LOADER: OnceLock<Loader> = OnceLock::new();
static BOOT: OnceLock<Instant> = OnceLock::new();

/// Make `loader` reachable from the exported functions. Only the first call has an effect.
pub fn set_loader(loader: Loader) {
    if LOADER.set(loader).is_err() {
        tracing::warn!("firmware API loader handle set twice");
    }
}

fn get_loader() -> Option<&'static Loader> {
    LOADER.get()
}

pub extern "C" fn furi_get_tick() -> u32 {
    BOOT.get_or_init(Instant::now).elapsed().as_millis() as u32
}

pub extern "C" fn furi_delay_ms(ms: u32) {
    std::thread::sleep(std::time::Duration::from_millis(ms.into()));
}

pub extern "C" fn loader_lock() -> bool {
    get_loader().is_some_and(Loader::lock)
}

pub extern "C" fn loader_unlock() {
    if let Some(loader) = get_loader() {
        loader.unlock();
    }
}

pub extern "C" fn loader_is_locked() -> bool {
    get_loader().is_none_or(Loader::is_locked)
}

pub extern "C" fn loader_show_menu() {
    if let Some(loader) = get_loader() {
        loader.show_menu();
    }
}

fn exports() -> [(&'static str, SymbolAddr); 6] {
    [
        ("furi_get_tick", furi_get_tick as SymbolAddr),
        ("furi_delay_ms", furi_delay_ms as SymbolAddr),
        ("loader_lock", loader_lock as SymbolAddr),
        ("loader_unlock", loader_unlock as SymbolAddr),
        ("loader_is_locked", loader_is_locked as SymbolAddr),
        ("loader_show_menu", loader_show_menu as SymbolAddr),
    ]
}

pub fn firmware_api() -> Result<ApiInterface, ApiTableError> {
    BOOT.get_or_init(Instant::now);
    let table = SymbolTable::build(exports())?;
    tracing::debug!(
        "firmware API {} exports {} symbols",
        FIRMWARE_API_VERSION,
        table.len()
    );
    Ok(ApiInterface::new(FIRMWARE_API_VERSION, table))
}

#[cfg(test)]
mod test {
    use fwapi::SymbolResolver;

    use super::*;

    #[test]
    fn every_export_resolves() {
        let api = firmware_api().unwrap();
        assert!(fwapi::table::is_strictly_sorted(api.table().entries()));
        for (name, addr) in exports() {
            assert_eq!(api.resolve(name), Ok(addr));
        }
        assert!(api.resolve("__definitely_not_present__").is_err());
    }

    #[test]
    fn no_loader_reports_locked() {
        // Before the loader exists nothing can start, so the slot counts as taken.
        if LOADER.get().is_none() {
            assert!(loader_is_locked());
            assert!(!loader_lock());
        }
    }
}
