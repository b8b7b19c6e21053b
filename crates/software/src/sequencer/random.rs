const TAPS: u32 = 0x00D7_D7D7;

/// A 24-bit Galois-style shift register which fills random motions.
///
/// Each draw shifts the register right one bit; when a one falls out, every byte is XORed with `0xD7`. The low byte is
/// the result. The sequence is fixed from power-up, so random motions replay identically after a restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lfsr(u32);

impl Default for Lfsr {
    fn default() -> Self {
        Self(TAPS)
    }
}

impl Lfsr {
    /// Returns the next byte.
    pub fn next_byte(&mut self) -> u8 {
        let carry = self.0 & 0x01;
        self.0 >>= 1;
        if carry == 0x01 {
            self.0 ^= TAPS;
        }
        self.0 as u8
    }
}
