//! An open table: a file descriptor, a memory-mapped region, and a decoded
//! schema.
//!
//! `Table` owns the mapping for as long as any handle referencing it through
//! [`crate::database::Database`] is alive. Multiple handles share one `Table`
//! via `Rc`; the mapping itself is wrapped in a `RefCell` so `get`/`set` can
//! take `&self` while still mutating the mapped bytes in place.

use std::cell::RefCell;
use std::fs::{File, OpenOptions};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::path::Path;

use memmap2::MmapMut;
use nix::sys::stat::fstat;

use crate::bitcursor;
use crate::config::TABLE_FILE_MODE;
use crate::error::DbError;
use crate::header::{self, Accessor, Field, Schema};

#[inline]
fn round_up_to_8(n: u64) -> u64 {
    (n + 7) / 8 * 8
}

fn io_err(e: nix::Error) -> DbError {
    DbError::Io(std::io::Error::from_raw_os_error(e as i32))
}

/// An open table backing file: header metadata plus a mutable byte mapping.
pub struct Table {
    name: String,
    file: File,
    mapping: RefCell<MmapMut>,
    schema: Schema,
    rows: u32,
}

impl Table {
    /// Computes the total file size (header + payload, rounded up to 8 bytes)
    /// for a table with `schema` and `rows` rows.
    fn file_len(schema: &Schema, rows: u32) -> u64 {
        let payload_bytes = schema.row_size_bits as u64 / 8 * rows as u64;
        round_up_to_8(schema.header_size_bytes as u64 + payload_bytes)
    }

    /// Creates a new backing file at `path`: writes the header, truncates the
    /// file to its full size, then opens and maps it. The payload region is
    /// zero-initialized by truncation.
    pub fn create(path: &Path, fields: Vec<Field>, rows: u32) -> Result<Table, DbError> {
        let schema = Schema::new(fields)?;
        let header = header::encode(&schema.fields, rows);

        {
            let mut file = OpenOptions::new()
                .create(true)
                .truncate(true)
                .read(true)
                .write(true)
                .mode(TABLE_FILE_MODE)
                .open(path)?;
            use std::io::Write as _;
            file.write_all(&header)?;
            let total_len = Self::file_len(&schema, rows);
            file.set_len(total_len)?;
            file.sync_all()?;
        }

        Self::open(path)
    }

    /// Opens an existing backing file at `path`, decoding its header and
    /// mapping its full extent.
    pub fn open(path: &Path) -> Result<Table, DbError> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;

        // Confirm the file has at least one byte to map; mmap of a zero-length
        // file fails, and a truncated-before-header file is a format error
        // rather than an I/O error once we try to decode it below.
        let stat = fstat(file.as_raw_fd()).map_err(io_err)?;
        if stat.st_size == 0 {
            return Err(DbError::Format("table file is empty".into()));
        }

        let mapping = unsafe { MmapMut::map_mut(&file)? };
        let (schema, rows) = header::decode(&mapping)?;

        let name = path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(Table {
            name,
            file,
            mapping: RefCell::new(mapping),
            schema,
            rows,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn get_accessor(&self, field_name: &str) -> Result<Accessor, DbError> {
        self.schema.accessor(field_name)
    }

    /// Byte offset of row `row`'s first bit, and a bound check that `acc`
    /// stays within that row.
    fn row_span(&self, row: u32, acc: Accessor) -> Result<usize, DbError> {
        if row >= self.rows {
            return Err(DbError::InvalidArgument(format!(
                "row {row} out of range (table has {} rows)",
                self.rows
            )));
        }
        if acc.offset as u64 + acc.size as u64 > self.schema.row_size_bits as u64 {
            return Err(DbError::InvalidArgument(format!(
                "accessor offset={} size={} exceeds row_size_bits={}",
                acc.offset, acc.size, self.schema.row_size_bits
            )));
        }
        let row_start_bytes =
            self.schema.header_size_bytes as u64 + row as u64 * self.schema.row_size_bits as u64 / 8;
        Ok(row_start_bytes as usize)
    }

    pub fn get(&self, row: u32, acc: Accessor, out: &mut [u8]) -> Result<(), DbError> {
        let row_start = self.row_span(row, acc)?;
        let needed = bitcursor::stride_bytes(acc.size as usize);
        if out.len() < needed {
            return Err(DbError::InvalidArgument(format!(
                "out buffer is {} bytes, need at least {needed}",
                out.len()
            )));
        }
        let mapping = self.mapping.borrow();
        bitcursor::read(&mapping, acc.size as usize, row_start * 8 + acc.offset as usize, out);
        Ok(())
    }

    pub fn set(&self, row: u32, acc: Accessor, input: &[u8]) -> Result<(), DbError> {
        let row_start = self.row_span(row, acc)?;
        let needed = bitcursor::stride_bytes(acc.size as usize);
        if input.len() < needed {
            return Err(DbError::InvalidArgument(format!(
                "input buffer is {} bytes, need at least {needed}",
                input.len()
            )));
        }
        let mut mapping = self.mapping.borrow_mut();
        bitcursor::write(&mut mapping, acc.size as usize, row_start * 8 + acc.offset as usize, input);
        Ok(())
    }

    pub fn get_int(&self, row: u32, acc: Accessor) -> Result<u64, DbError> {
        if acc.size > 64 {
            return Err(DbError::InvalidArgument(format!(
                "get_int: accessor size {} exceeds 64 bits",
                acc.size
            )));
        }
        let mut buf = [0u8; 8];
        self.get(row, acc, &mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }

    pub fn set_int(&self, row: u32, acc: Accessor, value: u64) -> Result<(), DbError> {
        if acc.size > 64 {
            return Err(DbError::InvalidArgument(format!(
                "set_int: accessor size {} exceeds 64 bits",
                acc.size
            )));
        }
        let masked = if acc.size == 64 {
            value
        } else {
            value & ((1u64 << acc.size) - 1)
        };
        self.set(row, acc, &masked.to_le_bytes())
    }

    /// Flushes the entire mapping to the backing file, with cache
    /// invalidation semantics (`MmapMut::flush`, i.e. `msync(MS_SYNC)`).
    pub fn sync(&self) -> Result<(), DbError> {
        self.mapping.borrow().flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn fields(pairs: &[(&str, u32)]) -> Vec<Field> {
        pairs.iter().map(|(n, s)| Field::new(*n, *s)).collect()
    }

    #[test]
    fn single_row_single_field_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t1");
        let table = Table::create(&path, fields(&[("a", 4)]), 1).unwrap();

        let acc = table.get_accessor("a").unwrap();
        table.set_int(0, acc, 13).unwrap();
        assert_eq!(table.get_int(0, acc).unwrap(), 13);

        assert_eq!(std::fs::metadata(&path).unwrap().len(), 24);
    }

    #[test]
    fn sub_byte_fields_straddling_a_byte_boundary() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t1");
        let table = Table::create(&path, fields(&[("x", 3), ("y", 3), ("z", 3)]), 1).unwrap();

        let x = table.get_accessor("x").unwrap();
        let y = table.get_accessor("y").unwrap();
        let z = table.get_accessor("z").unwrap();

        table.set_int(0, x, 5).unwrap();
        table.set_int(0, y, 2).unwrap();
        table.set_int(0, z, 7).unwrap();

        assert_eq!(table.get_int(0, x).unwrap(), 5);
        assert_eq!(table.get_int(0, y).unwrap(), 2);
        assert_eq!(table.get_int(0, z).unwrap(), 7);
    }

    #[test]
    fn word_straddling_field_leaves_padding_untouched() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t1");
        let table = Table::create(&path, fields(&[("pad", 60), ("big", 20)]), 1).unwrap();

        let pad = table.get_accessor("pad").unwrap();
        let big = table.get_accessor("big").unwrap();

        table.set_int(0, pad, 0).unwrap();
        table.set_int(0, big, 0xABCDE).unwrap();

        assert_eq!(table.get_int(0, big).unwrap(), 0xABCDE);
        assert_eq!(table.get_int(0, pad).unwrap(), 0);
    }

    #[test]
    fn wide_raw_field_round_trips_a_string() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t1");
        let table = Table::create(
            &path,
            fields(&[
                ("bar", 4),
                ("foo", 8 * 27),
                ("baz", 4),
                ("bop", 3),
                ("bip", 2),
                ("bip2", 2),
            ]),
            4,
        )
        .unwrap();

        let foo = table.get_accessor("foo").unwrap();
        let mut text = b"There's no place like home\0".to_vec();
        text.resize(bitcursor::stride_bytes(27 * 8), 0);

        table.set(2, foo, &text).unwrap();
        let mut out = vec![0u8; bitcursor::stride_bytes(27 * 8)];
        table.get(2, foo, &mut out).unwrap();

        assert_eq!(&out[..27], &text[..27]);
    }

    #[test]
    fn out_of_range_row_is_rejected_without_touching_the_mapping() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t1");
        let table = Table::create(&path, fields(&[("a", 4)]), 2).unwrap();
        let acc = table.get_accessor("a").unwrap();

        let err = table.set_int(5, acc, 1).unwrap_err();
        assert!(matches!(err, DbError::InvalidArgument(_)));
    }

    #[test]
    fn get_int_rejects_accessors_wider_than_64_bits() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t1");
        let table = Table::create(&path, fields(&[("wide", 96)]), 1).unwrap();
        let acc = table.get_accessor("wide").unwrap();

        assert!(matches!(table.get_int(0, acc), Err(DbError::InvalidArgument(_))));
        assert!(matches!(table.set_int(0, acc, 1), Err(DbError::InvalidArgument(_))));
    }

    #[test]
    fn unknown_field_is_not_found() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t1");
        let table = Table::create(&path, fields(&[("a", 4)]), 1).unwrap();
        assert!(matches!(table.get_accessor("nope"), Err(DbError::NotFound(_))));
    }

    #[test]
    fn reopen_recovers_written_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t1");
        {
            let table = Table::create(&path, fields(&[("v", 16)]), 3).unwrap();
            let acc = table.get_accessor("v").unwrap();
            table.set_int(1, acc, 4242).unwrap();
            table.sync().unwrap();
        }
        {
            let table = Table::open(&path).unwrap();
            let acc = table.get_accessor("v").unwrap();
            assert_eq!(table.get_int(1, acc).unwrap(), 4242);
            assert_eq!(table.rows(), 3);
        }
    }
}
