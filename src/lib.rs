//! densedb — a compact, column-typed, fixed-schema row store over
//! memory-mapped files.
//!
//! Each table is one file: a big-endian metadata header describing the
//! schema, followed by a bit-dense payload of fixed-width rows with no
//! byte-padding between fields. [`Database`] owns a bounded cache of open
//! [`Table`]s; [`Table`] exposes field access by name through [`Accessor`].

// Exposed only under `--cfg fuzzing` (set by `cargo fuzz`) so the fuzz target
// can drive it directly; otherwise a private implementation detail of `Table`.
#[cfg(fuzzing)]
pub mod bitcursor;
#[cfg(not(fuzzing))]
mod bitcursor;

pub mod config;
pub mod database;
pub mod error;
pub mod header;
pub mod table;

// ─────────────────────────────────────────────────────────────────────────────
// Public surface
// ─────────────────────────────────────────────────────────────────────────────

/// The single error type returned by every fallible operation in this crate.
pub use error::DbError;

/// A directory of table files plus a bounded cache of open mappings.
pub use database::{Database, TableHandle};

/// A single declared column: a name and a width in bits.
pub use header::Field;
/// The decoded, immutable shape of a table.
pub use header::Schema;
/// A `(bit_offset, bit_size)` pair identifying a field within a row.
pub use header::Accessor;

/// An open table: a file descriptor, a memory-mapped region, and a decoded schema.
pub use table::Table;
