//! Deterministic software model of the FPGA receiver.
//!
//! `SimBus` implements [`BusPort`] without any hardware: driven bytes are
//! decoded by a model of the bridge's command receiver, and the serial
//! return line is fed from a queue of response bytes (idle `0x01` when the
//! queue is empty). The model supports the scenarios the protocol layers
//! must survive: an initial bit-phase offset, a dead return line, injected
//! fault frames and corrupted return bytes.
//!
//! Decoded register writes are recorded for assertions, which makes the
//! whole stack testable from note event to chip register.

use std::collections::VecDeque;
use std::time::Duration;

use crate::bus::port::BusPort;
use crate::bus::{opcode, IDLE_BYTE};

/// One register write decoded by the simulated receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterWrite {
    pub device: u8,
    pub bank: bool,
    pub address: u8,
    pub data: u8,
}

/// Receiver command decode state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decode {
    Idle,
    /// Collecting the 3 argument bytes of a register write.
    RegWrite { have: u8, device_bank: u8, address: u8 },
}

/// Simulated FPGA bridge implementing [`BusPort`].
#[derive(Debug)]
pub struct SimBus {
    // Wire state
    data: u8,
    clock: bool,
    reset: bool,
    latched: bool,

    // Return channel
    return_bits: VecDeque<bool>,
    response_bytes: VecDeque<u8>,
    phase_offset: usize,
    dead_line: bool,

    // Receiver model
    decode: Decode,
    writes: Vec<RegisterWrite>,
    sent_bytes: Vec<u8>,

    total_delay: Duration,
}

impl SimBus {
    /// A bus that is already bit-aligned and idle.
    pub fn new() -> Self {
        Self::with_phase_offset(0)
    }

    /// A bus whose return stream leads with `bits` junk zero bits, so the
    /// controller must synchronize before byte extraction is meaningful.
    pub fn with_phase_offset(bits: usize) -> Self {
        let mut sim = Self {
            data: 0,
            clock: false,
            reset: false,
            latched: true,
            return_bits: VecDeque::new(),
            response_bytes: VecDeque::new(),
            phase_offset: bits,
            dead_line: false,
            decode: Decode::Idle,
            writes: Vec::new(),
            sent_bytes: Vec::new(),
            total_delay: Duration::ZERO,
        };
        sim.load_phase_offset();
        sim
    }

    /// A bus whose return line never goes high; synchronization must fail.
    pub fn dead_line() -> Self {
        let mut sim = Self::new();
        sim.dead_line = true;
        sim
    }

    fn load_phase_offset(&mut self) {
        self.return_bits.clear();
        for _ in 0..self.phase_offset {
            self.return_bits.push_back(false);
        }
    }

    /// Queue one raw response byte ahead of the idle stream.
    pub fn inject_response_byte(&mut self, byte: u8) {
        self.response_bytes.push_back(byte);
    }

    /// Queue a complete fault announcement: the `0xF0D4` marker, the code,
    /// the declared length and the payload.
    pub fn inject_fault(&mut self, code: u8, payload: &[u8]) {
        self.inject_response_byte(0xF0);
        self.inject_response_byte(0xD4);
        self.inject_response_byte(code);
        self.inject_response_byte(payload.len() as u8);
        for &byte in payload {
            self.inject_response_byte(byte);
        }
    }

    /// Register writes decoded by the receiver so far, in wire order.
    pub fn writes(&self) -> &[RegisterWrite] {
        &self.writes
    }

    /// Drain the decoded register writes.
    pub fn take_writes(&mut self) -> Vec<RegisterWrite> {
        std::mem::take(&mut self.writes)
    }

    /// Every byte driven onto the data lines, in order.
    pub fn sent_bytes(&self) -> &[u8] {
        &self.sent_bytes
    }

    /// Accumulated busy-wait time requested through [`BusPort::delay`].
    pub fn total_delay(&self) -> Duration {
        self.total_delay
    }

    /// Force the handshake line level.
    pub fn set_latched(&mut self, level: bool) {
        self.latched = level;
    }

    fn feed_byte(&mut self, byte: u8) {
        self.sent_bytes.push(byte);
        self.decode = match self.decode {
            Decode::Idle => match byte {
                opcode::REG_WRITE => Decode::RegWrite {
                    have: 0,
                    device_bank: 0,
                    address: 0,
                },
                // NOP, DEBUG_READ and everything else are single-byte as far
                // as the model is concerned.
                _ => Decode::Idle,
            },
            Decode::RegWrite {
                have,
                device_bank,
                address,
            } => match have {
                0 => Decode::RegWrite {
                    have: 1,
                    device_bank: byte,
                    address,
                },
                1 => Decode::RegWrite {
                    have: 2,
                    device_bank,
                    address: byte,
                },
                _ => {
                    self.writes.push(RegisterWrite {
                        device: device_bank >> 1,
                        bank: device_bank & 1 != 0,
                        address,
                        data: byte,
                    });
                    // Payload latched; the controller may send the next
                    // command for this device.
                    self.latched = true;
                    Decode::Idle
                }
            },
        };
    }

    fn refill_return_bits(&mut self) {
        let byte = self.response_bytes.pop_front().unwrap_or(IDLE_BYTE);
        for bit in (0..8).rev() {
            self.return_bits.push_back(byte & (1 << bit) != 0);
        }
    }
}

impl Default for SimBus {
    fn default() -> Self {
        Self::new()
    }
}

impl BusPort for SimBus {
    fn set_reset(&mut self, level: bool) {
        // Falling edge completes the reset pulse: receiver and return
        // stream restart from their power-on state.
        if self.reset && !level {
            self.decode = Decode::Idle;
            self.response_bytes.clear();
            self.load_phase_offset();
            self.latched = true;
        }
        self.reset = level;
    }

    fn drive_data(&mut self, byte: u8) {
        self.data = byte;
    }

    fn set_clock(&mut self, level: bool) {
        if !self.clock && level {
            let byte = self.data;
            self.feed_byte(byte);
        }
        self.clock = level;
    }

    fn read_return(&mut self) -> bool {
        if self.dead_line {
            return false;
        }
        if self.return_bits.is_empty() {
            self.refill_return_bits();
        }
        self.return_bits.pop_front().unwrap_or(false)
    }

    fn read_latched(&mut self) -> bool {
        self.latched
    }

    fn delay(&mut self, duration: Duration) {
        self.total_delay += duration;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clock_byte(sim: &mut SimBus, byte: u8) -> bool {
        sim.drive_data(byte);
        sim.set_clock(true);
        sim.set_clock(false);
        sim.read_return()
    }

    #[test]
    fn test_decodes_register_write() {
        let mut sim = SimBus::new();
        for byte in [opcode::REG_WRITE, 0x03, 0xA4, 0x22] {
            clock_byte(&mut sim, byte);
        }
        assert_eq!(
            sim.writes(),
            &[RegisterWrite {
                device: 1,
                bank: true,
                address: 0xA4,
                data: 0x22,
            }]
        );
    }

    #[test]
    fn test_idle_stream_is_ones_every_eighth_bit() {
        let mut sim = SimBus::new();
        let bits: Vec<bool> = (0..16).map(|_| clock_byte(&mut sim, 0)).collect();
        let ones: usize = bits.iter().filter(|&&b| b).count();
        assert_eq!(ones, 2);
        assert!(bits[7] && bits[15]);
    }

    #[test]
    fn test_reset_restores_phase_offset() {
        let mut sim = SimBus::with_phase_offset(3);
        for _ in 0..5 {
            clock_byte(&mut sim, 0);
        }
        sim.set_reset(true);
        sim.set_reset(false);
        // The first three bits after reset are the junk prefix again.
        assert!(!clock_byte(&mut sim, 0));
        assert!(!clock_byte(&mut sim, 0));
        assert!(!clock_byte(&mut sim, 0));
    }
}
