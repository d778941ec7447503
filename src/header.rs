//! Field/schema types and the on-disk header codec.
//!
//! Layout (big-endian metadata, byte-exact):
//!
//! ```text
//! offset 0  : u32 BE   header_size_bytes
//! offset 4  : u32 BE   n_fields
//! offset 8  : u32 BE   rows
//! offset 12 : for each field, in declaration order:
//!               bytes  NUL-terminated field name (ASCII)
//!               u32 BE field size in bits
//! ```
//!
//! `header_size_bytes` is `12 + Σ (name.len() + 1 + 4)`. Field *values* are
//! little-endian (handled by [`crate::table::Table::get_int`]/`set_int`); only
//! this metadata prefix is big-endian.

use crate::error::DbError;

/// One declared column: a name and a width in bits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub size: u32,
}

impl Field {
    pub fn new(name: impl Into<String>, size: u32) -> Self {
        Field { name: name.into(), size }
    }
}

/// The decoded, immutable shape of a table: its fields in declaration order
/// plus the two sizes derived from them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    pub fields: Vec<Field>,
    /// `round_up(Σ field.size, 8)`.
    pub row_size_bits: u32,
    /// Byte length of the header prefix that precedes the payload.
    pub header_size_bytes: u32,
}

/// A `(bit_offset, bit_size)` pair identifying a field within any row of a
/// schema. Freely copyable; does not borrow from the `Schema` it was derived
/// from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Accessor {
    pub offset: u32,
    pub size: u32,
}

#[inline]
fn round_up_to_8(bits: u32) -> u32 {
    (bits + 7) / 8 * 8
}

fn validate_field_name(name: &str) -> Result<(), DbError> {
    if name.is_empty() {
        return Err(DbError::InvalidArgument("field name must not be empty".into()));
    }
    if name.bytes().any(|b| b == 0) {
        return Err(DbError::InvalidArgument(format!(
            "field name {name:?} must not contain a NUL byte"
        )));
    }
    if !name.is_ascii() || name.bytes().any(|b| b < 0x20 || b == 0x7f) {
        return Err(DbError::InvalidArgument(format!(
            "field name {name:?} must be printable ASCII"
        )));
    }
    Ok(())
}

impl Schema {
    /// Validates `fields` and derives `row_size_bits`/`header_size_bytes`.
    /// Does not touch any file.
    pub fn new(fields: Vec<Field>) -> Result<Schema, DbError> {
        if fields.is_empty() {
            return Err(DbError::InvalidArgument("a table needs at least one field".into()));
        }

        let mut header_size_bytes: u32 = 12;
        let mut row_size_bits: u32 = 0;
        for (i, field) in fields.iter().enumerate() {
            validate_field_name(&field.name)?;
            if fields[..i].iter().any(|f| f.name == field.name) {
                return Err(DbError::InvalidArgument(format!(
                    "duplicate field name {:?}",
                    field.name
                )));
            }
            if field.size == 0 {
                return Err(DbError::InvalidArgument(format!(
                    "field {:?} must have a non-zero size",
                    field.name
                )));
            }
            header_size_bytes += field.name.len() as u32 + 1 + 4;
            row_size_bits += field.size;
        }
        row_size_bits = round_up_to_8(row_size_bits);

        Ok(Schema { fields, row_size_bits, header_size_bytes })
    }

    /// Looks up a field by name and returns its `(offset, size)` within a row.
    pub fn accessor(&self, field_name: &str) -> Result<Accessor, DbError> {
        let mut offset = 0u32;
        for field in &self.fields {
            if field.name == field_name {
                return Ok(Accessor { offset, size: field.size });
            }
            offset += field.size;
        }
        Err(DbError::NotFound(field_name.to_string()))
    }
}

/// Encodes `(fields, rows)` into the header byte layout described above.
pub fn encode(fields: &[Field], rows: u32) -> Vec<u8> {
    let mut header_size: u32 = 12;
    for field in fields {
        header_size += field.name.len() as u32 + 1 + 4;
    }

    let mut buf = Vec::with_capacity(header_size as usize);
    buf.extend_from_slice(&header_size.to_be_bytes());
    buf.extend_from_slice(&(fields.len() as u32).to_be_bytes());
    buf.extend_from_slice(&rows.to_be_bytes());
    for field in fields {
        buf.extend_from_slice(field.name.as_bytes());
        buf.push(0);
        buf.extend_from_slice(&field.size.to_be_bytes());
    }
    buf
}

/// Decodes a header from the start of `bytes`, returning the schema and the
/// declared row count. `bytes` may be longer than the header (e.g. the whole
/// mapped file); only the header prefix is consumed.
pub fn decode(bytes: &[u8]) -> Result<(Schema, u32), DbError> {
    let read_u32_be = |at: usize| -> Result<u32, DbError> {
        bytes
            .get(at..at + 4)
            .map(|s| u32::from_be_bytes(s.try_into().unwrap()))
            .ok_or_else(|| DbError::Format("header truncated before the leading 12-byte prefix".into()))
    };

    let header_size_bytes = read_u32_be(0)?;
    let n_fields = read_u32_be(4)?;
    let rows = read_u32_be(8)?;

    if n_fields == 0 {
        return Err(DbError::Format("n_fields must be at least 1".into()));
    }

    let mut cursor = 12usize;
    let mut fields = Vec::with_capacity(n_fields as usize);
    for _ in 0..n_fields {
        let name_end = bytes[cursor..]
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| DbError::Format("field name is not NUL-terminated".into()))?;
        let name = std::str::from_utf8(&bytes[cursor..cursor + name_end])
            .map_err(|_| DbError::Format("field name is not valid UTF-8".into()))?
            .to_string();
        cursor += name_end + 1;

        let size = bytes
            .get(cursor..cursor + 4)
            .map(|s| u32::from_be_bytes(s.try_into().unwrap()))
            .ok_or_else(|| DbError::Format("header truncated inside a field-size record".into()))?;
        cursor += 4;

        if size == 0 {
            return Err(DbError::Format(format!("field {name:?} has a zero size")));
        }
        fields.push(Field::new(name, size));
    }

    if cursor as u32 != header_size_bytes {
        return Err(DbError::Format(format!(
            "decoded cursor {cursor} does not match declared header_size_bytes {header_size_bytes}"
        )));
    }

    let row_size_bits = round_up_to_8(fields.iter().map(|f| f.size).sum());
    Ok((
        Schema { fields, row_size_bits, header_size_bytes },
        rows,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, u32)]) -> Vec<Field> {
        pairs.iter().map(|(n, s)| Field::new(*n, *s)).collect()
    }

    #[test]
    fn schema_round_trip_preserves_names_sizes_rows_and_header_size() {
        let original = fields(&[("bar", 4), ("foo", 216), ("baz", 4)]);
        let encoded = encode(&original, 42);
        let (schema, rows) = decode(&encoded).unwrap();

        assert_eq!(rows, 42);
        assert_eq!(schema.fields, original);
        assert_eq!(schema.header_size_bytes, encoded.len() as u32);
    }

    #[test]
    fn header_size_formula() {
        // 12 + ("a\0"=2 + 4) + ("bb\0"=3 + 4) = 12 + 6 + 7 = 25
        let s = Schema::new(fields(&[("a", 1), ("bb", 2)])).unwrap();
        assert_eq!(s.header_size_bytes, 25);
    }

    #[test]
    fn row_size_rounds_up_to_a_byte() {
        let s = Schema::new(fields(&[("x", 3), ("y", 3), ("z", 3)])).unwrap();
        assert_eq!(s.row_size_bits, 16);
    }

    #[test]
    fn accessor_offset_law() {
        let s = Schema::new(fields(&[("a", 4), ("b", 8), ("c", 2)])).unwrap();
        assert_eq!(s.accessor("a").unwrap().offset, 0);
        assert_eq!(s.accessor("b").unwrap().offset, 4);
        assert_eq!(s.accessor("c").unwrap().offset, 12);
    }

    #[test]
    fn accessor_unknown_field_is_not_found() {
        let s = Schema::new(fields(&[("a", 4)])).unwrap();
        assert!(matches!(s.accessor("nope"), Err(DbError::NotFound(_))));
    }

    #[test]
    fn decode_rejects_zero_fields() {
        let mut bytes = vec![];
        bytes.extend_from_slice(&12u32.to_be_bytes());
        bytes.extend_from_slice(&0u32.to_be_bytes());
        bytes.extend_from_slice(&0u32.to_be_bytes());
        assert!(matches!(decode(&bytes), Err(DbError::Format(_))));
    }

    #[test]
    fn decode_rejects_unterminated_name() {
        let mut bytes = vec![];
        bytes.extend_from_slice(&99u32.to_be_bytes());
        bytes.extend_from_slice(&1u32.to_be_bytes());
        bytes.extend_from_slice(&0u32.to_be_bytes());
        bytes.extend_from_slice(b"nonul"); // no trailing NUL
        assert!(matches!(decode(&bytes), Err(DbError::Format(_))));
    }

    #[test]
    fn decode_rejects_cursor_mismatch() {
        // header_size_bytes deliberately wrong (should be 12 + 2 + 4 = 18)
        let mut bytes = vec![];
        bytes.extend_from_slice(&99u32.to_be_bytes());
        bytes.extend_from_slice(&1u32.to_be_bytes());
        bytes.extend_from_slice(&0u32.to_be_bytes());
        bytes.extend_from_slice(b"a\0");
        bytes.extend_from_slice(&4u32.to_be_bytes());
        assert!(matches!(decode(&bytes), Err(DbError::Format(_))));
    }

    #[test]
    fn decode_rejects_zero_size_field() {
        let mut bytes = vec![];
        bytes.extend_from_slice(&18u32.to_be_bytes());
        bytes.extend_from_slice(&1u32.to_be_bytes());
        bytes.extend_from_slice(&0u32.to_be_bytes());
        bytes.extend_from_slice(b"a\0");
        bytes.extend_from_slice(&0u32.to_be_bytes());
        assert!(matches!(decode(&bytes), Err(DbError::Format(_))));
    }

    #[test]
    fn schema_new_rejects_duplicate_names() {
        let err = Schema::new(fields(&[("a", 1), ("a", 2)])).unwrap_err();
        assert!(matches!(err, DbError::InvalidArgument(_)));
    }

    #[test]
    fn schema_new_rejects_empty_field_list() {
        assert!(Schema::new(vec![]).is_err());
    }
}
