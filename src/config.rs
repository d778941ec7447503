// config.rs — compile-time configuration constants.

// Soft cap on simultaneously mapped tables, used by `Database::new` when the
// caller passes 0. Can be overridden per-database at construction time.
pub const DEFAULT_MAX_OPEN_TABLES: usize = 16;

// Permission bits applied to a table file created via `Table::create`.
// rw for owner and group, none for other.
pub const TABLE_FILE_MODE: u32 = 0o660;
