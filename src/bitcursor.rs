//! Unaligned bit-run read/write over a byte region, one 64-bit word at a time.
//!
//! [`read`] and [`write`] treat `region` as a sequence of native-endian 64-bit
//! words. A run of `bit_size` bits starting at `bit_offset` may span any number
//! of words; each covered word is touched at most twice (once for its own bits,
//! once to pick up or deposit the carry into/from the next word). Extraction is
//! shift-and-mask; deposit is mask-and-merge, so bits outside the target run
//! are left untouched even when they share a word with it.
//!
//! Caller buffers (`out_buffer`/`in_buffer`) are a sequence of 8-byte strides:
//! each pass through the loop below consumes or produces exactly one 8-byte
//! stride, zero-extended past the bits actually transferred in a final partial
//! stride. A buffer for an `n`-bit run must therefore be at least
//! `stride_bytes(n)` bytes long.
//!
//! This module has no knowledge of rows, fields, or files — it is pure
//! in-memory bit manipulation, reused by [`crate::table::Table`] for every
//! field access.

/// Number of whole 8-byte strides needed to hold `bit_size` bits, rounding the
/// final stride up to a full 8 bytes.
#[inline]
pub fn stride_bytes(bit_size: usize) -> usize {
    (bit_size + 63) / 64 * 8
}

#[inline]
fn mask(bits: u32) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

#[inline]
fn read_word(region: &[u8], word_idx: usize) -> u64 {
    let start = word_idx * 8;
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&region[start..start + 8]);
    u64::from_ne_bytes(buf)
}

#[inline]
fn write_word(region: &mut [u8], word_idx: usize, value: u64) {
    let start = word_idx * 8;
    region[start..start + 8].copy_from_slice(&value.to_ne_bytes());
}

/// Reads `bit_size` bits starting at `bit_offset` (in bits) within `region`
/// into `out`. `out` must be at least `stride_bytes(bit_size)` bytes.
///
/// Panics if the run would read past the end of `region` or if `out` is too
/// short; `Table` is responsible for proving the run is in-range before
/// calling this.
pub fn read(region: &[u8], bit_size: usize, bit_offset: usize, out: &mut [u8]) {
    let mut word_idx = bit_offset / 64;
    let mut offset = (bit_offset % 64) as u32;
    let mut remaining = bit_size as i64;
    let mut out_pos = 0usize;

    while remaining > 0 {
        let inner = remaining.min(64 - offset as i64) as u32;
        let mem_bytes = ((remaining.min(64)) as u64 + 7) as usize / 8;

        let mut val = (read_word(region, word_idx) >> offset) & mask(inner);
        word_idx += 1;

        if offset > 0 && remaining > inner as i64 {
            let carry_bits = (offset as i64).min(remaining - inner as i64) as u32;
            let carry = read_word(region, word_idx) & mask(carry_bits);
            val |= carry << (64 - offset);
        } else {
            offset = 0;
        }

        out[out_pos..out_pos + mem_bytes].copy_from_slice(&val.to_ne_bytes()[..mem_bytes]);
        out_pos += 8;
        remaining -= 64;
    }
}

/// Writes `bit_size` bits from `input` into `region` starting at `bit_offset`
/// (in bits). Only the targeted bits are modified; surrounding bits within the
/// same words are preserved. `input` must be at least `stride_bytes(bit_size)`
/// bytes.
///
/// Panics if the run would write past the end of `region` or if `input` is
/// too short; `Table` is responsible for proving the run is in-range before
/// calling this.
pub fn write(region: &mut [u8], bit_size: usize, bit_offset: usize, input: &[u8]) {
    let mut word_idx = bit_offset / 64;
    let mut offset = (bit_offset % 64) as u32;
    let mut remaining = bit_size as i64;
    let mut in_pos = 0usize;

    while remaining > 0 {
        let inner = remaining.min(64 - offset as i64) as u32;
        let mem_bytes = ((remaining.min(64)) as u64 + 7) as usize / 8;

        let mut buf = [0u8; 8];
        buf[..mem_bytes].copy_from_slice(&input[in_pos..in_pos + mem_bytes]);
        let val = u64::from_ne_bytes(buf);

        let existing = read_word(region, word_idx);
        let m = mask(inner) << offset;
        write_word(region, word_idx, (existing & !m) | ((val << offset) & m));
        word_idx += 1;

        if offset > 0 && remaining > inner as i64 {
            let carry_bits = (offset as i64).min(remaining - inner as i64) as u32;
            let carry = (val >> (64 - offset)) & mask(carry_bits);
            let existing_next = read_word(region, word_idx);
            let m2 = mask(carry_bits);
            write_word(region, word_idx, (existing_next & !m2) | carry);
        } else {
            offset = 0;
        }

        in_pos += 8;
        remaining -= 64;
    }
}
