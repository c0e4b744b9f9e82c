//! Base-128 variable length integers and the zig-zag mapping for signed values.
//!
//! Each byte carries seven payload bits, least significant group first. The high
//! bit is set on every byte except the last one.

/// Maximum encoded size of a `u32`.
pub const MAX_U32_BYTES: usize = 5;

/// Maximum encoded size of a `u64`.
pub const MAX_U64_BYTES: usize = 10;

/// Appends `value` to `out`.
pub fn encode_u64(out: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        out.push((value & 0x7f) as u8 | 0x80);
        value >>= 7;
    }
    out.push((value & 0x7f) as u8);
}

/// Appends `value` to `out`.
pub fn encode_u32(out: &mut Vec<u8>, value: u32) {
    encode_u64(out, u64::from(value));
}

/// Number of bytes `value` occupies once encoded.
pub fn encoded_len(value: u64) -> usize {
    let mut v = value;
    let mut size = 1usize;
    while v >= 0x80 {
        size += 1;
        v >>= 7;
    }
    size
}

/// Decodes a `u64` from the front of `bytes`, returning the value and the
/// number of bytes consumed.
///
/// Returns `None` when the input ends before a terminating byte or when the
/// encoding does not fit in 64 bits.
pub fn decode_u64(bytes: &[u8]) -> Option<(u64, usize)> {
    let mut value = 0u64;
    for (i, &b) in bytes.iter().take(MAX_U64_BYTES).enumerate() {
        let payload = u64::from(b & 0x7f);
        if i == MAX_U64_BYTES - 1 && payload > 1 {
            return None;
        }
        value |= payload << (7 * i);
        if b & 0x80 == 0 {
            return Some((value, i + 1));
        }
    }
    None
}

/// Decodes a `u32` from the front of `bytes`. See [`decode_u64`].
pub fn decode_u32(bytes: &[u8]) -> Option<(u32, usize)> {
    let limit = bytes.len().min(MAX_U32_BYTES);
    let (value, used) = decode_u64(&bytes[..limit])?;
    let value = u32::try_from(value).ok()?;
    Some((value, used))
}

/// Maps small magnitude signed values onto small unsigned values.
pub fn zigzag_encode(value: i32) -> u32 {
    let bits = value as u32;
    if value < 0 {
        (!bits << 1) | 1
    } else {
        bits << 1
    }
}

/// Inverse of [`zigzag_encode`].
pub fn zigzag_decode(value: u32) -> i32 {
    if value & 1 == 1 {
        !(value >> 1) as i32
    } else {
        (value >> 1) as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_sizes() {
        let cases: [(u64, usize); 6] = [
            (0, 1),
            (127, 1),
            (128, 2),
            (16_383, 2),
            (16_384, 3),
            (u64::from(u32::MAX), 5),
        ];
        for (value, expected) in cases {
            let mut buf = Vec::new();
            encode_u64(&mut buf, value);
            assert_eq!(buf.len(), expected, "size of {value}");
            assert_eq!(encoded_len(value), expected, "encoded_len of {value}");
            assert_eq!(decode_u64(&buf), Some((value, expected)));
        }
    }

    #[test]
    fn u32_roundtrip() {
        for v in [0, 1, 300, 65_535, u32::MAX] {
            let mut buf = Vec::new();
            encode_u32(&mut buf, v);
            assert_eq!(decode_u32(&buf), Some((v, buf.len())));
        }
    }

    #[test]
    fn u64_extremes() {
        let mut buf = Vec::new();
        encode_u64(&mut buf, u64::MAX);
        assert_eq!(buf.len(), MAX_U64_BYTES);
        assert_eq!(decode_u64(&buf), Some((u64::MAX, MAX_U64_BYTES)));
    }

    #[test]
    fn truncated_input_fails() {
        assert_eq!(decode_u64(&[]), None);
        assert_eq!(decode_u64(&[0x80, 0x80]), None);
        assert_eq!(decode_u32(&[0xff, 0xff, 0xff, 0xff]), None);
    }

    #[test]
    fn u32_rejects_wide_values() {
        let mut buf = Vec::new();
        encode_u64(&mut buf, u64::from(u32::MAX) + 1);
        assert_eq!(decode_u32(&buf), None);
    }

    #[test]
    fn rejects_overflow_in_tenth_byte() {
        let buf = [0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x02];
        assert_eq!(decode_u64(&buf), None);
    }

    #[test]
    fn zigzag_mapping() {
        assert_eq!(zigzag_encode(0), 0);
        assert_eq!(zigzag_encode(-1), 1);
        assert_eq!(zigzag_encode(1), 2);
        assert_eq!(zigzag_encode(-2), 3);
        assert_eq!(zigzag_encode(i32::MAX), u32::MAX - 1);
        assert_eq!(zigzag_encode(i32::MIN), u32::MAX);
        for v in [0, 1, -1, 63, -64, i32::MIN, i32::MAX] {
            assert_eq!(zigzag_decode(zigzag_encode(v)), v);
        }
    }
}
