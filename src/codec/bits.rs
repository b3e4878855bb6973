//! Width helpers shared by the key and data codecs.
//!
//! Byte arrays are big-endian and exactly `ceil(width / 8)` bytes long. The
//! unused high bits of the first byte are masked off rather than rejected.

use crate::error::{Result, TdiError};

pub(crate) fn byte_len(width: usize) -> usize {
    width.div_ceil(8)
}

/// Fails when `value` needs more than `width` bits.
pub(crate) fn check_scalar(value: u64, width: usize) -> Result<()> {
    if width < 64 && value >> width != 0 {
        return Err(TdiError::invalid_argument(format!(
            "value {value:#x} exceeds field width of {width} bits"
        )));
    }
    Ok(())
}

/// Fails when `value` does not fit a two's complement field of `width` bits.
pub(crate) fn check_signed(value: i64, width: usize) -> Result<()> {
    if width == 0 || width >= 64 {
        return Ok(());
    }
    let min = -(1i64 << (width - 1));
    let max = (1i64 << (width - 1)) - 1;
    if value < min || value > max {
        return Err(TdiError::invalid_argument(format!(
            "value {value} exceeds signed field width of {width} bits"
        )));
    }
    Ok(())
}

/// Copy of `bytes` with the partial top byte masked to `width`.
pub(crate) fn normalize_bytes(bytes: &[u8], width: usize) -> Result<Vec<u8>> {
    let expected = byte_len(width);
    if bytes.len() != expected {
        return Err(TdiError::invalid_argument(format!(
            "expected {expected} bytes for a {width} bit field, got {}",
            bytes.len()
        )));
    }
    let mut out = bytes.to_vec();
    let spare = width % 8;
    if spare != 0 {
        if let Some(first) = out.first_mut() {
            *first &= (1u8 << spare) - 1;
        }
    }
    Ok(out)
}

pub(crate) fn scalar_to_bytes(value: u64, width: usize) -> Vec<u8> {
    let len = byte_len(width);
    let raw = value.to_be_bytes();
    if len >= raw.len() {
        let mut out = vec![0u8; len - raw.len()];
        out.extend_from_slice(&raw);
        out
    } else {
        raw[raw.len() - len..].to_vec()
    }
}

/// Big-endian bytes to a scalar; fails if a set bit lies beyond 64 bits.
pub(crate) fn bytes_to_scalar(bytes: &[u8]) -> Result<u64> {
    let split = bytes.len().saturating_sub(8);
    let (high, low) = bytes.split_at(split);
    if high.iter().any(|b| *b != 0) {
        return Err(TdiError::invalid_argument(
            "value does not fit in 64 bits; read it as a byte array",
        ));
    }
    Ok(low.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn width_boundary() {
        assert!(check_scalar((1 << 9) - 1, 9).is_ok());
        assert!(check_scalar(1 << 9, 9).is_err());
        assert!(check_scalar(u64::MAX, 64).is_ok());
    }

    #[test]
    fn signed_boundary() {
        assert!(check_signed(127, 8).is_ok());
        assert!(check_signed(-128, 8).is_ok());
        assert!(check_signed(128, 8).is_err());
        assert!(check_signed(-129, 8).is_err());
    }

    #[test]
    fn top_byte_is_masked() {
        assert_eq!(normalize_bytes(&[0xff, 0xff], 9).unwrap(), vec![0x01, 0xff]);
        assert_eq!(normalize_bytes(&[0xab, 0xcd], 16).unwrap(), vec![0xab, 0xcd]);
        assert!(normalize_bytes(&[0x01], 9).is_err());
        assert!(normalize_bytes(&[0x00, 0x01, 0x02], 9).is_err());
    }

    #[test]
    fn scalar_byte_conversion() {
        assert_eq!(scalar_to_bytes(0x0a000001, 32), vec![0x0a, 0x00, 0x00, 0x01]);
        assert_eq!(scalar_to_bytes(0x1ff, 9), vec![0x01, 0xff]);
        assert_eq!(scalar_to_bytes(1, 128).len(), 16);
        assert_eq!(bytes_to_scalar(&[0x01, 0xff]).unwrap(), 0x1ff);
        let mut wide = vec![0u8; 16];
        wide[15] = 7;
        assert_eq!(bytes_to_scalar(&wide).unwrap(), 7);
        wide[0] = 1;
        assert!(bytes_to_scalar(&wide).is_err());
    }
}
