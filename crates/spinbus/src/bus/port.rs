//! Hardware line abstraction for the bit-serial link.
//!
//! The physical link consists of a reset line, a clock line, 8 parallel
//! data-out lines, one serial data-in line and a handshake line that reports
//! "previous write latched". `BusPort` wraps those lines plus the busy-wait
//! delays the protocol timing needs, so the protocol layers above can run
//! unchanged against real GPIO or against [`crate::bus::sim::SimBus`].

use std::time::Duration;

/// Access to the physical bus lines.
///
/// Implementations are expected to be plain I/O with no buffering of their
/// own; all framing and windowing happens in
/// [`BitTransport`](crate::bus::transport::BitTransport).
///
/// Delays are duration-based busy waits. Protocol pulse timing is
/// hardware-determined, not scheduler-determined, so implementations should
/// not yield to other work inside `delay`.
pub trait BusPort {
    /// Drive the reset line.
    fn set_reset(&mut self, level: bool);

    /// Drive all 8 data-out lines to the byte's bit pattern.
    fn drive_data(&mut self, byte: u8);

    /// Drive the clock line.
    fn set_clock(&mut self, level: bool);

    /// Sample the serial return line.
    fn read_return(&mut self) -> bool;

    /// Sample the handshake line ("previous write latched").
    fn read_latched(&mut self) -> bool;

    /// Busy-wait for the given duration.
    fn delay(&mut self, duration: Duration);
}
