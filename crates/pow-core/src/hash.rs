//! SHA256 helpers and hash display conventions.
//!
//! Hashes are kept in internal (little-endian) byte order. Explorers and
//! chain parameter files print them reversed, which is what the `display`
//! helpers produce and accept.

use sha2::{Digest, Sha256};

use crate::error::{PowError, PowResult};

/// SHA256(SHA256(data)), used for header ids, txids and merkle nodes.
#[inline]
pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Sha256::digest(Sha256::digest(data)));
    out
}

#[inline]
pub fn reverse_bytes(bytes: &[u8; 32]) -> [u8; 32] {
    let mut reversed = *bytes;
    reversed.reverse();
    reversed
}

/// Hex in display order, the way block explorers print hashes.
pub fn hash_to_display_hex(hash: &[u8; 32]) -> String {
    hex::encode(reverse_bytes(hash))
}

/// Parse a display-order hex hash back into internal order.
pub fn hash_from_display_hex(display: &str) -> PowResult<[u8; 32]> {
    let bytes = hex::decode(display.trim_start_matches("0x"))
        .map_err(|e| PowError::InvalidParameters(format!("bad hash hex {:?}: {}", display, e)))?;
    let bytes: [u8; 32] = bytes.try_into().map_err(|b: Vec<u8>| {
        PowError::InvalidParameters(format!("hash {:?} is {} bytes, expected 32", display, b.len()))
    })?;
    Ok(reverse_bytes(&bytes))
}

/// Leading zero bits of the displayed hash, i.e. trailing zero bits of the
/// internal bytes.
pub fn count_leading_zeros(hash: &[u8; 32]) -> u32 {
    let mut zeros = 0u32;
    for byte in hash.iter().rev() {
        if *byte != 0 {
            return zeros + byte.leading_zeros();
        }
        zeros += 8;
    }
    zeros
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_double_sha256() {
        let hash = double_sha256(b"hello");
        assert_eq!(
            hex::encode(hash),
            "9595c9df90075148eb06860365df33584b75bff782a510c6cd4883a419833d50"
        );
    }

    #[test]
    fn test_display_hex_round_trip() {
        let display = "12a765e31ffd4059bada1e25190f6e98c99d9714d334efa41a195a7e7e04bfe2";
        let internal = hash_from_display_hex(display).unwrap();
        assert_eq!(internal[0], 0xe2);
        assert_eq!(internal[31], 0x12);
        assert_eq!(hash_to_display_hex(&internal), display);

        assert!(hash_from_display_hex("12a765").is_err());
        assert!(hash_from_display_hex("zz").is_err());
    }

    #[test]
    fn test_count_leading_zeros() {
        assert_eq!(count_leading_zeros(&[0x00; 32]), 256);

        let mut hash = [0xFF; 32];
        hash[31] = 0x00;
        hash[30] = 0x00;
        hash[29] = 0x0F;
        assert_eq!(count_leading_zeros(&hash), 20);
    }
}
