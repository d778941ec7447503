//! A directory of tables, cached behind a soft capacity bound.
//!
//! `Database` is the only owner of each cached [`Table`]; callers receive a
//! [`TableHandle`] that shares the cached `Rc<Table>` and bumps its
//! refcount. Closing a handle decrements the refcount but never unmaps —
//! eviction happens lazily, on the next `open` that needs room.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::config::DEFAULT_MAX_OPEN_TABLES;
use crate::error::DbError;
use crate::header::Field;
use crate::table::Table;

struct CacheEntry {
    table: Rc<Table>,
    refcount: usize,
}

/// A live reference to a cached table. Must be returned to the owning
/// [`Database`] via [`Database::close`]; dropping it without closing leaves
/// the entry's refcount incremented.
pub struct TableHandle {
    table: Rc<Table>,
}

impl TableHandle {
    pub fn table(&self) -> &Table {
        &self.table
    }
}

impl std::ops::Deref for TableHandle {
    type Target = Table;

    fn deref(&self) -> &Table {
        &self.table
    }
}

/// A directory of table files plus a bounded cache of open mappings.
pub struct Database {
    storage_path: PathBuf,
    max_open: usize,
    cache: HashMap<String, CacheEntry>,
}

fn validate_table_name(name: &str) -> Result<(), DbError> {
    if name.is_empty() {
        return Err(DbError::InvalidArgument("table name must not be empty".into()));
    }
    if name.contains('/') || name.contains('\\') {
        return Err(DbError::InvalidArgument(format!(
            "table name {name:?} must not contain a path separator"
        )));
    }
    Ok(())
}

impl Database {
    /// Opens (without creating) `storage_path` as the directory holding this
    /// database's table files. `max_open` is the soft cap on simultaneously
    /// mapped tables (§4.4); it is never enforced at the expense of a live
    /// reference.
    pub fn new(storage_path: impl Into<PathBuf>, max_open: usize) -> Result<Database, DbError> {
        let storage_path = storage_path.into();
        if !storage_path.is_dir() {
            return Err(DbError::InvalidArgument(format!(
                "storage path {} is not a directory",
                storage_path.display()
            )));
        }
        Ok(Database {
            storage_path,
            max_open: if max_open == 0 { DEFAULT_MAX_OPEN_TABLES } else { max_open },
            cache: HashMap::new(),
        })
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.storage_path.join(name)
    }

    /// Evicts unreferenced entries until fewer than `max_open` remain, or
    /// until no more can be evicted. Returns without error either way —
    /// exceeding `max_open` when every entry is referenced is a documented
    /// soft-bound divergence, not a failure.
    fn evict_to_make_room(&mut self) {
        if self.cache.len() < self.max_open {
            return;
        }
        let victims: Vec<String> = self
            .cache
            .iter()
            .filter(|(_, e)| e.refcount == 0)
            .map(|(name, _)| name.clone())
            .take(self.cache.len() + 1 - self.max_open)
            .collect();
        for name in victims {
            self.cache.remove(&name);
            if self.cache.len() < self.max_open {
                break;
            }
        }
    }

    /// Creates a new table named `name` with the given schema and row count,
    /// writes its header and zero-filled payload to disk, then opens it
    /// through the cache like any other table.
    pub fn create(&mut self, name: &str, fields: Vec<Field>, rows: u32) -> Result<TableHandle, DbError> {
        validate_table_name(name)?;
        if self.cache.contains_key(name) {
            return Err(DbError::InvalidArgument(format!(
                "table {name:?} is already open"
            )));
        }
        self.evict_to_make_room();

        let path = self.path_for(name);
        let table = Table::create(&path, fields, rows)?;
        self.insert_fresh(name.to_string(), table)
    }

    /// Opens an existing table named `name`, sharing the cached mapping if
    /// one is already open, or mapping the file fresh otherwise (possibly
    /// evicting unreferenced entries first).
    pub fn open(&mut self, name: &str) -> Result<TableHandle, DbError> {
        validate_table_name(name)?;

        if let Some(entry) = self.cache.get_mut(name) {
            entry.refcount += 1;
            return Ok(TableHandle { table: Rc::clone(&entry.table) });
        }

        self.evict_to_make_room();

        let path = self.path_for(name);
        let table = Table::open(&path)?;
        self.insert_fresh(name.to_string(), table)
    }

    fn insert_fresh(&mut self, name: String, table: Table) -> Result<TableHandle, DbError> {
        let table = Rc::new(table);
        self.cache.insert(name, CacheEntry { table: Rc::clone(&table), refcount: 1 });
        Ok(TableHandle { table })
    }

    /// Decrements the refcount of the cached entry backing `handle`. Does not
    /// unmap; the mapping is retained until eviction or [`Database::destroy`].
    pub fn close(&mut self, handle: TableHandle) -> Result<(), DbError> {
        let name = handle.table.name().to_string();
        drop(handle);
        if let Some(entry) = self.cache.get_mut(&name) {
            if entry.refcount > 0 {
                entry.refcount -= 1;
            }
        }
        Ok(())
    }

    /// Destroys the database: every cached entry must be unreferenced
    /// (surfaced as `InvalidArgument` otherwise), each is dropped (unmapping
    /// and closing its file descriptor), and the cache is emptied.
    pub fn destroy(mut self) -> Result<(), DbError> {
        if let Some(name) = self.cache.iter().find(|(_, e)| e.refcount > 0).map(|(n, _)| n.clone()) {
            return Err(DbError::InvalidArgument(format!(
                "cannot destroy database while table {name:?} is still referenced"
            )));
        }
        self.cache.clear();
        Ok(())
    }

    pub fn storage_path(&self) -> &Path {
        &self.storage_path
    }
}
