//! Fixed-width analog payloads.
//!
//! Every analog reading (`MR`, each point of `SC1`) is a signed 32-bit
//! little-endian count; one count is 1e-16 A.

use crate::error::RgaError;

/// Bytes per analog frame.
pub const FRAME_LEN: usize = 4;

/// Hardware scale factor of the electrometer.
pub const AMPERES_PER_COUNT: f64 = 1e-16;

/// Decode a raw frame into its signed count.
pub fn decode_counts(bytes: &[u8]) -> Result<i32, RgaError> {
    let raw: [u8; FRAME_LEN] = bytes.try_into().map_err(|_| {
        RgaError::Decode(format!(
            "analog frame must be {FRAME_LEN} bytes, got {}",
            bytes.len()
        ))
    })?;
    Ok(i32::from_le_bytes(raw))
}

/// Decode a raw frame into a current in Amperes.
pub fn decode(bytes: &[u8]) -> Result<f64, RgaError> {
    decode_counts(bytes).map(|c| f64::from(c) * AMPERES_PER_COUNT)
}

pub fn encode_counts(counts: i32) -> [u8; FRAME_LEN] {
    counts.to_le_bytes()
}

/// Encode a current, rounding to the nearest count and saturating at the i32 range.
pub fn encode(amps: f64) -> [u8; FRAME_LEN] {
    let counts = (amps / AMPERES_PER_COUNT)
        .round()
        .clamp(f64::from(i32::MIN), f64::from(i32::MAX)) as i32;
    encode_counts(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn decodes_hundred_counts() {
        let amps = decode(&[0x64, 0x00, 0x00, 0x00]).unwrap();
        assert!((amps - 1.0e-14).abs() < 1e-28);
    }

    #[test]
    fn decodes_negative_counts() {
        assert_eq!(decode_counts(&[0xFF, 0xFF, 0xFF, 0xFF]).unwrap(), -1);
        assert_eq!(decode_counts(&[0x00, 0x00, 0x00, 0x80]).unwrap(), i32::MIN);
    }

    #[rstest]
    #[case(&[])]
    #[case(&[0x01, 0x02, 0x03])]
    #[case(&[0x01, 0x02, 0x03, 0x04, 0x05])]
    fn wrong_length_is_a_decode_error(#[case] bytes: &[u8]) {
        match decode(bytes) {
            Err(RgaError::Decode(msg)) => assert!(msg.contains(&bytes.len().to_string())),
            other => panic!("expected decode error, got {other:?}"),
        }
    }

    #[test]
    fn encode_saturates() {
        assert_eq!(encode(1.0), encode_counts(i32::MAX));
        assert_eq!(encode(-1.0), encode_counts(i32::MIN));
    }
}
