//! The sorted `(hash, address)` table.
use std::borrow::Cow;

use itertools::Itertools;

use crate::{gnu_hash, ApiTableError};

/// An address exported to loadable applications. Pointer-width, so 32 bits on the device.
pub type SymbolAddr = usize;

/// One exported symbol: the hash of its name, and its address.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(C)]
pub struct SymbolEntry {
    pub hash: u32,
    pub address: SymbolAddr,
}

impl SymbolEntry {
    const EMPTY: SymbolEntry = SymbolEntry {
        hash: 0,
        address: 0,
    };

    pub const fn new(name: &str, address: SymbolAddr) -> Self {
        Self {
            hash: gnu_hash(name),
            address,
        }
    }
}

/// An immutable table of exported symbols, sorted ascending by hash with no two entries sharing
/// a hash.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SymbolTable {
    entries: Cow<'static, [SymbolEntry]>,
}

impl SymbolTable {
    /// Wrap a table produced at build time. Panics (at compile time, when used in a const
    /// context) if the entries are not strictly sorted by hash.
    pub const fn from_sorted(entries: &'static [SymbolEntry]) -> Self {
        assert!(
            is_strictly_sorted(entries),
            "symbol table is not strictly sorted by hash"
        );
        Self {
            entries: Cow::Borrowed(entries),
        }
    }

    /// Build a table at start-up from `(name, address)` pairs. Fails if any two names share a
    /// hash (including a name listed twice), naming both.
    pub fn build<'a, I>(symbols: I) -> Result<Self, ApiTableError>
    where
        I: IntoIterator<Item = (&'a str, SymbolAddr)>,
    {
        let named = symbols
            .into_iter()
            .map(|(name, address)| (gnu_hash(name), name, address))
            .sorted_by_key(|(hash, _, _)| *hash)
            .collect_vec();

        if let Some((a, b)) = named.iter().tuple_windows().find(|(a, b)| a.0 == b.0) {
            return Err(ApiTableError::HashCollision {
                hash: a.0,
                first: a.1.to_string(),
                second: b.1.to_string(),
            });
        }

        tracing::debug!("built firmware API table with {} symbols", named.len());
        Ok(Self {
            entries: Cow::Owned(
                named
                    .into_iter()
                    .map(|(hash, _, address)| SymbolEntry { hash, address })
                    .collect(),
            ),
        })
    }

    /// Find the address paired with a hash.
    pub fn lookup(&self, hash: u32) -> Option<SymbolAddr> {
        self.entries
            .binary_search_by_key(&hash, |entry| entry.hash)
            .ok()
            .map(|idx| self.entries[idx].address)
    }

    pub fn entries(&self) -> &[SymbolEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Check that entries are sorted ascending by hash with no repeats.
pub const fn is_strictly_sorted(entries: &[SymbolEntry]) -> bool {
    let mut i = 1;
    while i < entries.len() {
        if entries[i - 1].hash >= entries[i].hash {
            return false;
        }
        i += 1;
    }
    true
}

/// Hash and sort `(name, address)` pairs at compile time. Panics on a hash collision, which
/// turns into a build failure when evaluated in a const context. Used by [crate::api_table!].
pub const fn sort_entries<const N: usize>(
    symbols: [(&'static str, SymbolAddr); N],
) -> [SymbolEntry; N] {
    let mut out = [SymbolEntry::EMPTY; N];
    let mut i = 0;
    while i < N {
        out[i] = SymbolEntry::new(symbols[i].0, symbols[i].1);
        i += 1;
    }

    // Insertion sort; tables are small and this runs once, in the compiler.
    let mut i = 1;
    while i < N {
        let mut j = i;
        while j > 0 && out[j - 1].hash > out[j].hash {
            let tmp = out[j - 1];
            out[j - 1] = out[j];
            out[j] = tmp;
            j -= 1;
        }
        i += 1;
    }

    let mut i = 1;
    while i < N {
        if out[i - 1].hash == out[i].hash {
            panic!("two exported symbols share a hash");
        }
        i += 1;
    }
    out
}

/// Build a [SymbolTable] at compile time.
///
/// ```
/// use fwapi::{api_table, SymbolTable};
///
/// static TABLE: SymbolTable = api_table! {
///     "furi_delay_ms" => 0x0800_1000,
///     "furi_get_tick" => 0x0800_1040,
/// };
/// assert_eq!(TABLE.len(), 2);
/// ```
#[macro_export]
macro_rules! api_table {
    ($($name:expr => $addr:expr),* $(,)?) => {{
        const ENTRIES: &[$crate::SymbolEntry] =
            &$crate::table::sort_entries([$(($name, $addr)),*]);
        $crate::SymbolTable::from_sorted(ENTRIES)
    }};
}

#[cfg(test)]
mod test {
    use super::*;

    static TABLE: SymbolTable = crate::api_table! {
        "malloc" => 0x100,
        "free" => 0x104,
        "furi_delay_ms" => 0x108,
        "furi_thread_alloc_ex" => 0x10c,
        "loader_start" => 0x110,
    };

    #[test]
    fn build_time_table_is_sorted() {
        assert_eq!(TABLE.len(), 5);
        assert!(is_strictly_sorted(TABLE.entries()));
    }

    #[test]
    fn lookup_every_entry() {
        for (name, addr) in [
            ("malloc", 0x100),
            ("free", 0x104),
            ("furi_delay_ms", 0x108),
            ("furi_thread_alloc_ex", 0x10c),
            ("loader_start", 0x110),
        ] {
            assert_eq!(TABLE.lookup(gnu_hash(name)), Some(addr), "{}", name);
        }
    }

    #[test]
    fn lookup_missing() {
        assert_eq!(TABLE.lookup(gnu_hash("__definitely_not_present__")), None);
    }

    #[test]
    fn runtime_build_matches_build_time() {
        let built = SymbolTable::build([
            ("loader_start", 0x110),
            ("free", 0x104),
            ("furi_thread_alloc_ex", 0x10c),
            ("malloc", 0x100),
            ("furi_delay_ms", 0x108),
        ])
        .unwrap();
        assert_eq!(built.entries(), TABLE.entries());
    }

    #[test]
    fn duplicate_name_is_rejected() {
        let err = SymbolTable::build([("malloc", 1), ("free", 2), ("malloc", 3)]).unwrap_err();
        assert_eq!(
            err,
            ApiTableError::HashCollision {
                hash: gnu_hash("malloc"),
                first: "malloc".into(),
                second: "malloc".into(),
            }
        );
    }

    #[test]
    fn distinct_names_with_same_hash_are_rejected() {
        // 33 * 'a' + 'b' == 33 * 'b' + 'A'
        assert_eq!(gnu_hash("ab"), gnu_hash("bA"));
        let err = SymbolTable::build([("ab", 1), ("bA", 2)]).unwrap_err();
        match err {
            ApiTableError::HashCollision { first, second, .. } => {
                let mut names = [first, second];
                names.sort();
                assert_eq!(names, ["ab".to_string(), "bA".to_string()]);
            }
        }
    }

    #[test]
    fn empty_table() {
        let table = SymbolTable::build(std::iter::empty()).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.lookup(gnu_hash("")), None);
    }
}
