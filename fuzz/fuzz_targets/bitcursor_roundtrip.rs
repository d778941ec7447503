#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // First two bytes pick bit_size/bit_offset; the rest is the write pattern.
    if data.len() < 2 {
        return;
    }
    let bit_size = (data[0] as usize % 256) + 1;
    let bit_offset = data[1] as usize % 256;
    let bytes = &data[2..];

    let stride = densedb::bitcursor::stride_bytes(bit_size);
    if bytes.len() < stride {
        return;
    }
    let pattern = &bytes[..stride];

    let region_bytes = ((bit_offset + bit_size) / 64 + 2) * 8;
    let mut region = vec![0u8; region_bytes];

    densedb::bitcursor::write(&mut region, bit_size, bit_offset, pattern);
    let mut out = vec![0u8; stride];
    densedb::bitcursor::read(&region, bit_size, bit_offset, &mut out);

    let full_bytes = bit_size / 8;
    assert_eq!(out[..full_bytes], pattern[..full_bytes]);
    let rem_bits = bit_size % 8;
    if rem_bits != 0 {
        let mask = (1u8 << rem_bits) - 1;
        assert_eq!(out[full_bytes] & mask, pattern[full_bytes] & mask);
    }
});
