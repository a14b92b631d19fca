//! Numeric conversions shared by the schema and model crates.
//!
//! Covers the two fixed-point encodings used by model fields, little-endian
//! access to variable-width integers inside record buffers, and the 16-byte
//! record padding rule.

/// Records are laid out on multiples of this many bytes.
pub const TAG_ALIGNMENT: usize = 16;

/// Filler byte used for record padding.
pub const PAD_BYTE: u8 = 0xAA;

/// Largest float accepted by [`float_to_fixed16`].
pub const FIXED16_MAX: f32 = 32.0;

const FIXED16_SCALE: f32 = 2048.0;

/// Decode a fixed8 value: `[0, 255]` maps onto `[-1.0, 1.0]`.
pub fn fixed8_to_float(value: u8) -> f32 {
    (f32::from(value) / 255.0) * 2.0 - 1.0
}

/// Encode a float as fixed8, clamping to `[-1.0, 1.0]`.
pub fn float_to_fixed8(value: f32) -> u8 {
    let value = if value.is_nan() { 0.0 } else { value.clamp(-1.0, 1.0) };
    let scaled = ((f64::from(value) + 1.0) / 2.0 * 255.0).round();
    scaled.clamp(0.0, 255.0) as u8
}

/// Decode a fixed16 value: `v / 2048`.
pub fn fixed16_to_float(value: u16) -> f32 {
    f32::from(value) / FIXED16_SCALE
}

/// Encode a float in `[0.0, 32.0]` as fixed16, clamped to `[0, 0xFFFF]`.
pub fn float_to_fixed16(value: f32) -> u16 {
    let value = if value.is_nan() { 0.0 } else { value.clamp(0.0, FIXED16_MAX) };
    let scaled = (f64::from(value) * f64::from(FIXED16_SCALE)).round();
    scaled.clamp(0.0, f64::from(u16::MAX)) as u16
}

/// Read a little-endian unsigned integer of 1, 2, 4 or 8 bytes.
pub fn read_uint(data: &[u8], offset: usize, size: usize) -> Option<u64> {
    if !matches!(size, 1 | 2 | 4 | 8) {
        return None;
    }
    let bytes = data.get(offset..offset.checked_add(size)?)?;
    let mut buf = [0u8; 8];
    buf[..size].copy_from_slice(bytes);
    Some(u64::from_le_bytes(buf))
}

/// Write a little-endian unsigned integer of 1, 2, 4 or 8 bytes.
///
/// Returns `None` if the range is out of bounds or the value does not fit.
pub fn write_uint(data: &mut [u8], offset: usize, size: usize, value: u64) -> Option<()> {
    if !matches!(size, 1 | 2 | 4 | 8) || !fits_width(value, size) {
        return None;
    }
    let end = offset.checked_add(size)?;
    let dst = data.get_mut(offset..end)?;
    dst.copy_from_slice(&value.to_le_bytes()[..size]);
    Some(())
}

/// Read a little-endian `u32`.
pub fn read_u32(data: &[u8], offset: usize) -> Option<u32> {
    let bytes = data.get(offset..offset.checked_add(4)?)?;
    Some(u32::from_le_bytes(bytes.try_into().ok()?))
}

/// Write a little-endian `u32`.
pub fn write_u32(data: &mut [u8], offset: usize, value: u32) -> Option<()> {
    let dst = data.get_mut(offset..offset.checked_add(4)?)?;
    dst.copy_from_slice(&value.to_le_bytes());
    Some(())
}

/// Whether `value` is representable in `size` bytes.
pub fn fits_width(value: u64, size: usize) -> bool {
    size >= 8 || value >> (size * 8) == 0
}

/// Padding after `len` content bytes, always at least one filler byte step.
///
/// String records are re-encoded with this rule; empty content still gets a
/// full step of filler.
pub fn step_padding(len: usize) -> usize {
    len.div_ceil(TAG_ALIGNMENT).max(1) * TAG_ALIGNMENT - len
}

/// Padding needed to bring `len` up to the next record boundary.
pub fn align_padding(len: usize) -> usize {
    (TAG_ALIGNMENT - len % TAG_ALIGNMENT) % TAG_ALIGNMENT
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn fixed8_endpoints() {
        assert_eq!(fixed8_to_float(0), -1.0);
        assert_eq!(fixed8_to_float(255), 1.0);
        assert_eq!(float_to_fixed8(-5.0), 0);
        assert_eq!(float_to_fixed8(5.0), 255);
    }

    #[test]
    fn fixed16_clamps() {
        assert_eq!(fixed16_to_float(2048), 1.0);
        assert_eq!(float_to_fixed16(1.0), 2048);
        assert_eq!(float_to_fixed16(-1.0), 0);
        assert_eq!(float_to_fixed16(32.0), u16::MAX);
        assert_eq!(float_to_fixed16(100.0), u16::MAX);
        assert_eq!(float_to_fixed16(f32::NAN), 0);
    }

    #[test]
    fn uint_access() {
        let mut buf = [0u8; 8];
        write_uint(&mut buf, 2, 2, 0xBEEF).unwrap();
        assert_eq!(read_uint(&buf, 2, 2), Some(0xBEEF));
        assert_eq!(buf[2], 0xEF);
        assert!(write_uint(&mut buf, 0, 1, 0x100).is_none());
        assert!(write_uint(&mut buf, 6, 4, 1).is_none());
        assert_eq!(read_uint(&buf, 0, 3), None);
        assert_eq!(read_u32(&buf, 5), None);
    }

    #[test]
    fn padding_rules() {
        assert_eq!(step_padding(4), 12);
        assert_eq!(step_padding(16), 0);
        assert_eq!(step_padding(17), 15);
        assert_eq!(step_padding(0), 16);
        assert_eq!(align_padding(24), 8);
        assert_eq!(align_padding(32), 0);
        assert_eq!(align_padding(0), 0);
    }

    proptest! {
        #[test]
        fn fixed8_round_trip(v in any::<u8>()) {
            prop_assert_eq!(float_to_fixed8(fixed8_to_float(v)), v);
        }

        #[test]
        fn fixed16_round_trip(v in any::<u16>()) {
            prop_assert_eq!(float_to_fixed16(fixed16_to_float(v)), v);
        }

        #[test]
        fn fixed16_inverse_within_precision(f in 0.0f32..31.99) {
            let back = fixed16_to_float(float_to_fixed16(f));
            prop_assert!((back - f).abs() <= 0.5 / 2048.0 + f32::EPSILON * 32.0);
        }
    }
}
