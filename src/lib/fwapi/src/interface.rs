//! The versioned API interface handed to module loaders.
use std::fmt;

use static_assertions::assert_impl_all;
use tracing::trace;

use crate::{gnu_hash, SymbolAddr, SymbolTable, Unresolved};

/// Version of the firmware API. Minor bumps only add symbols; major bumps break existing ones.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ApiVersion {
    pub major: u16,
    pub minor: u16,
}

impl ApiVersion {
    pub const fn new(major: u16, minor: u16) -> Self {
        Self { major, minor }
    }

    /// Can a module built against `required` run on firmware exposing `self`? The major
    /// versions must match, and the firmware must be at least as new as the module.
    pub const fn accepts(&self, required: ApiVersion) -> bool {
        self.major == required.major && required.minor <= self.minor
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Resolves the undefined references of a module being linked. Module loaders call this once
/// per undefined symbol, possibly from several loads at once.
pub trait SymbolResolver: Send + Sync {
    /// The API version the resolver exposes.
    fn api_version(&self) -> ApiVersion;

    /// Look up the address of an exported symbol.
    fn resolve(&self, name: &str) -> Result<SymbolAddr, Unresolved>;
}

/// The firmware API: a version plus the exported symbol table.
#[derive(Clone, Debug)]
pub struct ApiInterface {
    version: ApiVersion,
    table: SymbolTable,
}

assert_impl_all!(ApiInterface: Send, Sync);

impl ApiInterface {
    pub const fn new(version: ApiVersion, table: SymbolTable) -> Self {
        Self { version, table }
    }

    pub fn table(&self) -> &SymbolTable {
        &self.table
    }
}

impl SymbolResolver for ApiInterface {
    fn api_version(&self) -> ApiVersion {
        self.version
    }

    // A hash hit is trusted without comparing names; see the crate docs.
    fn resolve(&self, name: &str) -> Result<SymbolAddr, Unresolved> {
        let hash = gnu_hash(name);
        match self.table.lookup(hash) {
            Some(addr) => {
                trace!("resolved {} ({:#010x}) to {:#x}", name, hash, addr);
                Ok(addr)
            }
            None => {
                trace!("failed to resolve {} ({:#010x})", name, hash);
                Err(Unresolved::new(name))
            }
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use super::*;
    use crate::api_table;

    static API: ApiInterface = ApiInterface::new(
        ApiVersion::new(3, 2),
        api_table! {
            "furi_delay_ms" => 0x0800_1000,
            "furi_get_tick" => 0x0800_1040,
            "loader_lock" => 0x0800_2000,
            "loader_unlock" => 0x0800_2010,
        },
    );

    #[test]
    fn resolve_known() {
        assert_eq!(API.resolve("furi_delay_ms"), Ok(0x0800_1000));
        assert_eq!(API.resolve("loader_unlock"), Ok(0x0800_2010));
    }

    #[test]
    fn resolve_every_entry() {
        for entry in API.table().entries() {
            assert_eq!(API.table().lookup(entry.hash), Some(entry.address));
        }
    }

    #[test]
    fn resolve_unknown() {
        assert_eq!(
            API.resolve("__definitely_not_present__"),
            Err(Unresolved::new("__definitely_not_present__"))
        );
    }

    #[test]
    fn hash_hit_is_trusted() {
        // "ab" and "bA" collide; only "ab" is exported, and "bA" resolves to it.
        let api = ApiInterface::new(
            ApiVersion::new(1, 0),
            SymbolTable::build([("ab", 0x42)]).unwrap(),
        );
        assert_eq!(api.resolve("bA"), Ok(0x42));
    }

    #[test]
    fn concurrent_resolve() {
        let api: Arc<dyn SymbolResolver> = Arc::new(API.clone());
        let threads: Vec<_> = (0..4)
            .map(|_| {
                let api = api.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        assert_eq!(api.resolve("furi_get_tick"), Ok(0x0800_1040));
                        assert!(api.resolve("nope").is_err());
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
    }

    #[test]
    fn version_compat() {
        let fw = ApiVersion::new(3, 2);
        assert!(fw.accepts(ApiVersion::new(3, 0)));
        assert!(fw.accepts(ApiVersion::new(3, 2)));
        assert!(!fw.accepts(ApiVersion::new(3, 3)));
        assert!(!fw.accepts(ApiVersion::new(2, 0)));
        assert!(!fw.accepts(ApiVersion::new(4, 0)));
        assert_eq!(fw.to_string(), "3.2");
    }
}
