//! The firmware API surface that loadable applications link against.
//!
//! A loadable application is a relocatable binary with undefined references to firmware
//! functions. When the module loader maps it into memory, each of those references has to be
//! turned into an address. We do not carry the symbol names in the firmware image. Instead, the
//! firmware exports a single table of `(hash, address)` pairs, sorted by hash, and the resolver
//! hashes the requested name and binary-searches the table.
//!
//! The pieces are:
//!   1. [hash::gnu_hash], the name hasher. It is a `const fn`, so the same code hashes names
//!      when the table is generated at build time and when names are looked up at runtime.
//!   2. [table::SymbolTable], the sorted table. It can be generated at build time with
//!      [api_table!] (a hash collision is a compile error), or at start-up with
//!      [table::SymbolTable::build] (a hash collision is an [ApiTableError]).
//!   3. [interface::ApiInterface], which pairs a table with the firmware API version, and
//!      implements [interface::SymbolResolver], the seam module loaders call through.
//!
//! # Hash-only matching
//! A lookup that finds the requested hash returns the paired address without comparing names,
//! since the names are not stored. Two names in the table can never collide (construction
//! rejects that), but a name that is *not* in the table can still hash to the same value as one
//! that is, and it will resolve to that entry's address.

pub mod error;
pub mod hash;
pub mod interface;
pub mod table;

pub use error::*;
pub use hash::gnu_hash;
pub use interface::{ApiInterface, ApiVersion, SymbolResolver};
pub use table::{SymbolAddr, SymbolEntry, SymbolTable};
