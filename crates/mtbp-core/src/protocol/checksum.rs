//! CRC-16 frame checksum.
//!
//! Parameters: polynomial `0x1021`, initial register `0xFFFF`, no input or
//! output reflection, no final XOR.  Terminal firmware labels this
//! "CRC-16-CCITT (XMODEM)"; with the `0xFFFF` seed its check value for
//! `b"123456789"` is `0x29B1`.

const POLYNOMIAL: u16 = 0x1021;
const INITIAL: u16 = 0xFFFF;

/// Computes the CRC-16 of `data`.
///
/// # Examples
///
/// ```rust
/// use mtbp_core::protocol::checksum::crc16;
///
/// assert_eq!(crc16(b"123456789"), 0x29B1);
/// ```
pub fn crc16(data: &[u8]) -> u16 {
    Crc16::new().update(data).finish()
}

/// Incremental CRC-16 over several non-contiguous slices.
///
/// The frame checksum covers the header *minus* its checksum field followed by
/// the payload; feeding both slices in turn avoids copying them into one
/// buffer first.
#[derive(Debug, Clone, Copy)]
pub struct Crc16 {
    register: u16,
}

impl Crc16 {
    /// Starts a new computation with the `0xFFFF` seed.
    pub fn new() -> Self {
        Self { register: INITIAL }
    }

    /// Feeds `data` into the register.
    pub fn update(mut self, data: &[u8]) -> Self {
        for &byte in data {
            self.register ^= u16::from(byte) << 8;
            for _ in 0..8 {
                if self.register & 0x8000 != 0 {
                    self.register = (self.register << 1) ^ POLYNOMIAL;
                } else {
                    self.register <<= 1;
                }
            }
        }
        self
    }

    /// Returns the checksum of everything fed so far.
    pub fn finish(self) -> u16 {
        self.register
    }
}

impl Default for Crc16 {
    fn default() -> Self {
        Self::new()
    }
}
