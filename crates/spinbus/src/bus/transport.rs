//! Raw bit transport: one byte out, one return bit in per clock pulse.
//!
//! Every transmit drives the 8 data lines, pulses the clock and samples the
//! serial return line once. The sampled bit is shifted into a rolling 16-bit
//! window, independent of any command framing; 8 consecutive transmits
//! correspond to exactly one completed return byte, extracted by the caller
//! from the window.

use std::time::Duration;

use crate::bus::port::BusPort;

/// Minimum hold time for each clock phase.
pub const CLOCK_PULSE: Duration = Duration::from_nanos(40);

/// Reset line assertion time.
pub const RESET_ASSERT: Duration = Duration::from_micros(10);

/// Settle time after the reset line is released.
pub const RESET_SETTLE: Duration = Duration::from_micros(20);

/// Bit-level transport over a [`BusPort`].
///
/// Keeps the rolling 16-bit window of the last sampled return bits and the
/// byte-boundary counters (`bits_read`, `last_byte`, `prev_byte`). The window
/// always reflects exactly the last 16 wire bits; the counters only change
/// when the caller accounts for a framed bit via [`complete_bit`].
///
/// [`complete_bit`]: BitTransport::complete_bit
#[derive(Debug)]
pub struct BitTransport<P: BusPort> {
    port: P,
    window: u16,
    bits_read: u8,
    last_byte: u8,
    prev_byte: u8,
}

impl<P: BusPort> BitTransport<P> {
    pub fn new(port: P) -> Self {
        Self {
            port,
            window: 0,
            bits_read: 0,
            last_byte: 0,
            prev_byte: 0,
        }
    }

    /// Transmit one byte and sample one return bit.
    ///
    /// Drives the data lines, pulses the clock (assert, hold, deassert) and
    /// samples the return line. The sampled bit is shifted into the rolling
    /// window and also returned. Does not touch the byte-boundary counters.
    pub fn write_bits(&mut self, data: u8) -> bool {
        self.port.drive_data(data);
        self.port.delay(CLOCK_PULSE);
        self.port.set_clock(true);
        self.port.delay(CLOCK_PULSE);
        self.port.set_clock(false);

        let bit = self.port.read_return();
        self.window <<= 1;
        self.window |= bit as u16;
        bit
    }

    /// Account for one framed bit; returns the completed byte on every 8th call.
    ///
    /// When a byte completes, `prev_byte`/`last_byte` are refreshed from the
    /// window and the bit counter restarts.
    pub fn complete_bit(&mut self) -> Option<u8> {
        self.bits_read += 1;
        if self.bits_read < 8 {
            return None;
        }
        self.bits_read = 0;
        self.prev_byte = (self.window >> 8) as u8;
        self.last_byte = (self.window & 0xFF) as u8;
        Some(self.last_byte)
    }

    /// Pulse the device reset line and clear the byte counters.
    pub fn reset_device(&mut self) {
        self.port.set_reset(true);
        self.port.delay(RESET_ASSERT);
        self.port.set_reset(false);
        self.port.delay(RESET_SETTLE);
        self.bits_read = 0;
        self.last_byte = 0;
        self.prev_byte = 0;
    }

    /// Restore the counters to the known-aligned idle state.
    ///
    /// Called after the sync pattern was observed: the last two return bytes
    /// are idle bytes and the next sampled bit starts a fresh byte.
    pub fn mark_aligned(&mut self) {
        self.last_byte = crate::bus::IDLE_BYTE;
        self.prev_byte = crate::bus::IDLE_BYTE;
        self.bits_read = 0;
    }

    /// Re-frame the counters from the current window contents.
    ///
    /// Used when an in-band marker pattern fixes the byte boundary at the
    /// current bit position.
    pub fn mark_boundary(&mut self) {
        self.prev_byte = (self.window >> 8) as u8;
        self.last_byte = (self.window & 0xFF) as u8;
        self.bits_read = 0;
    }

    /// Zero the byte counters without touching the window.
    ///
    /// Used after a fault frame has been collected: the next framed bit
    /// starts a fresh byte with no history.
    pub fn clear_counters(&mut self) {
        self.bits_read = 0;
        self.last_byte = 0;
        self.prev_byte = 0;
    }

    /// Rolling window of the last 16 sampled wire bits.
    pub fn window(&self) -> u16 {
        self.window
    }

    /// Last completed return byte.
    pub fn last_byte(&self) -> u8 {
        self.last_byte
    }

    /// Return byte completed before `last_byte`.
    pub fn prev_byte(&self) -> u8 {
        self.prev_byte
    }

    /// Framed bits sampled since the last byte boundary.
    pub fn bits_read(&self) -> u8 {
        self.bits_read
    }

    pub fn port(&self) -> &P {
        &self.port
    }

    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::sim::SimBus;

    #[test]
    fn test_window_tracks_last_16_bits() {
        let mut transport = BitTransport::new(SimBus::new());

        // The idle stream is 0x01 per byte: 16 transmits leave two idle
        // bytes in the window regardless of framing state.
        for _ in 0..16 {
            transport.write_bits(crate::bus::opcode::NOP);
        }
        assert_eq!(transport.window(), 0x0101);
    }

    #[test]
    fn test_complete_bit_every_eighth_call() {
        let mut transport = BitTransport::new(SimBus::new());

        for i in 0..7 {
            transport.write_bits(crate::bus::opcode::NOP);
            assert_eq!(transport.complete_bit(), None, "bit {}", i);
        }
        transport.write_bits(crate::bus::opcode::NOP);
        assert_eq!(transport.complete_bit(), Some(0x01));
        assert_eq!(transport.bits_read(), 0);
    }

    #[test]
    fn test_reset_clears_counters() {
        let mut transport = BitTransport::new(SimBus::new());
        for _ in 0..8 {
            transport.write_bits(0);
            transport.complete_bit();
        }
        transport.reset_device();
        assert_eq!(transport.bits_read(), 0);
        assert_eq!(transport.last_byte(), 0);
        assert_eq!(transport.prev_byte(), 0);
    }
}
