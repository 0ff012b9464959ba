//! Frequency to block/fnum conversion.
//!
//! The chip expresses pitch as an 11-bit frequency number within an octave
//! block. The scale factor `144 * 2^20 / 7669857` comes from the chip's
//! clock (7.67 MHz) and the 144-cycle sample period; the extra division by
//! 8 rebases the result so the smallest representable pitch sits in block 2.
//! Values that overflow 11 bits are halved into higher blocks.

/// Highest value an 11-bit frequency number can hold, plus one.
const FNUM_LIMIT: u16 = 2048;

/// Starting block for the rebased frequency number.
const BASE_BLOCK: u8 = 2;

/// Master clock in Hz.
const CLOCK_HZ: f64 = 7_669_857.0;

/// A pitch as the chip sees it: an octave block and a frequency number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteValue {
    pub block: u8,
    pub fnum: u16,
}

impl NoteValue {
    /// Pack into the 14-bit wire layout: block in bits 13-11, fnum below.
    pub fn pack(&self) -> u16 {
        (u16::from(self.block & 0x7) << 11) | (self.fnum & 0x7FF)
    }

    /// Decode a packed block/fnum pair.
    pub fn unpack(raw: u16) -> Self {
        Self {
            block: ((raw >> 11) & 0x7) as u8,
            fnum: raw & 0x7FF,
        }
    }

    /// The frequency this value actually produces, in Hz.
    pub fn approx_hz(&self) -> f64 {
        let scaled = f64::from(self.fnum) * f64::from(1u32 << (self.block - BASE_BLOCK));
        scaled * 8.0 * CLOCK_HZ / (144.0 * f64::from(1u32 << 20))
    }
}

/// Convert a frequency in Hz to its block/fnum representation.
///
/// A4 (440 Hz) comes out as block 2, fnum 1082.
pub fn frequency_to_note(frequency_hz: u16) -> NoteValue {
    let raw = 144.0 * f64::from(frequency_hz) * f64::from(1u32 << 20) / CLOCK_HZ;
    let mut fnum = (raw / 8.0) as u16;
    let mut block = BASE_BLOCK;
    while fnum >= FNUM_LIMIT {
        fnum /= 2;
        block += 1;
    }
    NoteValue { block, fnum }
}
