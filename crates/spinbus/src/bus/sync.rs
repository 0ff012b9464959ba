//! Wire alignment recovery.
//!
//! The link has no independent framing signal, so byte alignment is
//! established by transmitting NOP until two back-to-back idle bytes appear
//! in the rolling window. The pattern `0x0101` cannot occur at a mis-aligned
//! phase of the idle stream, so observing it fixes the byte boundary.

use std::time::Duration;

use crate::bus::port::BusPort;
use crate::bus::transport::BitTransport;
use crate::bus::opcode;

/// Window pattern that marks two correctly framed idle bytes.
pub const SYNC_PATTERN: u16 = 0x0101;

/// Maximum NOP transmits before giving up.
pub const SYNC_ATTEMPT_LIMIT: u16 = 100;

/// Back-off applied when the attempt limit is reached.
pub const SYNC_BACKOFF: Duration = Duration::from_millis(100);

/// Outcome of a synchronization attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncResult {
    /// Completed probe iterations before the pattern appeared (or the limit).
    pub attempts: u16,
    /// Return bits that sampled as 1 during probing.
    pub idle_hits: u16,
    pub success: bool,
}

/// Probe for alignment by repeating NOP until [`SYNC_PATTERN`] appears.
///
/// On success the transport counters are reset to the known-aligned state.
/// On failure the counters are left untouched, a back-off delay is issued and
/// the caller is expected to retry the whole operating cycle from device
/// reset.
pub fn synchronize<P: BusPort>(transport: &mut BitTransport<P>) -> SyncResult {
    let mut attempts: u16 = 0;
    let mut idle_hits: u16 = 0;

    loop {
        if transport.write_bits(opcode::NOP) {
            idle_hits += 1;
        }
        if transport.window() == SYNC_PATTERN {
            transport.mark_aligned();
            log::info!(
                "synchronized after {} writes (window {:04X})",
                attempts,
                transport.window()
            );
            return SyncResult {
                attempts,
                idle_hits,
                success: true,
            };
        }
        attempts += 1;
        if attempts >= SYNC_ATTEMPT_LIMIT {
            break;
        }
    }

    log::warn!(
        "couldn't synchronize after {} writes (window {:04X})",
        attempts,
        transport.window()
    );
    transport.port_mut().delay(SYNC_BACKOFF);
    SyncResult {
        attempts,
        idle_hits,
        success: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::sim::SimBus;

    #[test]
    fn test_synchronize_aligned_stream() {
        let mut transport = BitTransport::new(SimBus::new());
        let result = synchronize(&mut transport);
        assert!(result.success);
        // The idle stream needs exactly 16 bits to fill the window.
        assert_eq!(result.attempts, 15);
        assert_eq!(result.idle_hits, 2);
        assert_eq!(transport.bits_read(), 0);
        assert_eq!(transport.last_byte(), 0x01);
    }

    #[test]
    fn test_synchronize_with_phase_offset() {
        // Five junk bits ahead of the idle stream: the pattern can only
        // complete at the true byte phase, 21 bits in.
        let mut transport = BitTransport::new(SimBus::with_phase_offset(5));
        let result = synchronize(&mut transport);
        assert!(result.success);
        assert_eq!(result.attempts, 20);
        assert_eq!(result.idle_hits, 2);
    }

    #[test]
    fn test_synchronize_gives_up_on_dead_line() {
        let mut transport = BitTransport::new(SimBus::dead_line());
        let result = synchronize(&mut transport);
        assert!(!result.success);
        assert_eq!(result.attempts, SYNC_ATTEMPT_LIMIT);
        assert_eq!(result.idle_hits, 0);
        // The failure path backs off before returning.
        assert!(transport.port().total_delay() >= SYNC_BACKOFF);
    }
}
