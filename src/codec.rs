//! Conversion between unsigned integers and fixed-width big-endian byte sequences.
//!
//! Every integer that ends up in a header or body file goes through these two functions.
//! The width is chosen by the caller (see [`crate::capacity::Layout`]) and never exceeds
//! eight bytes.

/// The largest width (in bytes) that can be encoded or decoded.
pub const MAX_WIDTH: usize = 8;

/// Reads `width` bytes starting at `offset` in `buffer` as an unsigned big-endian integer.
///
/// # Panics
/// Panics if `width` exceeds [`MAX_WIDTH`] or if `buffer` is too short.
pub fn bytes_to_uint(buffer: &[u8], offset: usize, width: usize) -> u64 {
    assert!(width <= MAX_WIDTH, "cannot decode integer of width {width}");
    buffer[offset..offset + width]
        .iter()
        .fold(0u64, |acc, &byte| (acc << 8) | u64::from(byte))
}

/// Writes `value` into `buffer` at `offset` using exactly `width` big-endian bytes.
///
/// Bits of `value` that do not fit into `width` bytes are discarded, callers are expected
/// to make sure that `value < 256^width`, which is checked in debug builds.
///
/// # Panics
/// Panics if `width` exceeds [`MAX_WIDTH`] or if `buffer` is too short.
pub fn uint_to_bytes(value: u64, width: usize, buffer: &mut [u8], offset: usize) {
    assert!(width <= MAX_WIDTH, "cannot encode integer of width {width}");
    debug_assert!(
        width == MAX_WIDTH || value >> (8 * width) == 0,
        "{value} does not fit into {width} bytes"
    );
    let be = value.to_be_bytes();
    buffer[offset..offset + width].copy_from_slice(&be[MAX_WIDTH - width..]);
    debug_assert_eq!(bytes_to_uint(buffer, offset, width), value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn encodes_big_endian() {
        let mut buf = [0u8; 6];
        uint_to_bytes(0x0102_0304, 4, &mut buf, 1);
        assert_eq!(buf, [0, 1, 2, 3, 4, 0]);
        assert_eq!(bytes_to_uint(&buf, 1, 4), 0x0102_0304);
        assert_eq!(bytes_to_uint(&buf, 0, 2), 1);
    }

    #[test]
    fn full_width_has_no_sign_ambiguity() {
        let mut buf = [0u8; 8];
        uint_to_bytes(u64::MAX, 8, &mut buf, 0);
        assert_eq!(buf, [0xFF; 8]);
        assert_eq!(bytes_to_uint(&buf, 0, 8), u64::MAX);

        uint_to_bytes(0x80, 1, &mut buf, 0);
        assert_eq!(bytes_to_uint(&buf, 0, 1), 128);
    }

    #[test]
    fn zero_width_is_zero() {
        let buf = [0xAAu8; 2];
        assert_eq!(bytes_to_uint(&buf, 1, 0), 0);
    }

    proptest! {
        #[test]
        fn prop_roundtrip_within_width(width in 1usize..=8, raw in any::<u64>()) {
            let value = if width == 8 { raw } else { raw & ((1u64 << (8 * width)) - 1) };
            let mut buf = vec![0u8; width + 3];
            uint_to_bytes(value, width, &mut buf, 3);
            prop_assert_eq!(bytes_to_uint(&buf, 3, width), value);
            prop_assert_eq!(&buf[..3], &[0u8, 0, 0]);
        }
    }
}
