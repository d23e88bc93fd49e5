//! CRC-32 as the controller computes it.
//!
//! This is the reflected CRC-32 (polynomial `0xEDB88320`, register seeded with
//! `0xFFFFFFFF`) but WITHOUT the final inversion that the common "finished"
//! CRC-32 applies. The stored checksum is the raw register value.
//!
//! Since the only difference from the standard checksum is the final XOR, the
//! fast path runs `crc32fast` and inverts its result. [`crc32_bitwise`] keeps
//! the byte-at-a-time definition around as the reference.

/// Reflected CRC-32 polynomial.
pub const POLYNOMIAL: u32 = 0xEDB8_8320;

/// Initial register value.
pub const INITIAL: u32 = 0xFFFF_FFFF;

/// Compute the device CRC of `bytes`.
pub fn crc32(bytes: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(bytes);
    !hasher.finalize()
}

/// Bit-at-a-time reference implementation of [`crc32`].
pub fn crc32_bitwise(bytes: &[u8]) -> u32 {
    let mut register = INITIAL;

    for &byte in bytes {
        register ^= byte as u32;
        for _ in 0..8 {
            if register & 1 != 0 {
                register = (register >> 1) ^ POLYNOMIAL;
            } else {
                register >>= 1;
            }
        }
    }

    register
}
