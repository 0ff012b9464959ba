//! Framed byte writes over the bit transport.
//!
//! `BusLink` is the layer command traffic goes through: every framed byte is
//! checked against the fault marker, byte boundaries are accounted, and a
//! completed return byte that is not the idle acknowledge triggers automatic
//! re-synchronization. When a fault frame is announced it is collected
//! inline, before any further command byte is transmitted.

use crate::bus::fault::{FaultCollector, FaultFrame, FAULT_PATTERN};
use crate::bus::port::BusPort;
use crate::bus::sync::{synchronize, SyncResult};
use crate::bus::transport::BitTransport;
use crate::bus::{opcode, IDLE_BYTE};

/// High byte of [`FAULT_PATTERN`], seen alone one boundary early.
const FAULT_MARKER_PREFIX: u8 = (FAULT_PATTERN >> 8) as u8;

/// Notable outcomes of a framed byte write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// Eight framed bits accumulated into a completed return byte.
    ByteCompleted(u8),
    /// A fault frame was announced and fully collected.
    Fault(FaultFrame),
    /// A completed return byte was not the idle acknowledge and
    /// re-synchronization failed.
    SyncLost(SyncResult),
}

/// Framed write layer over a [`BitTransport`].
#[derive(Debug)]
pub struct BusLink<P: BusPort> {
    transport: BitTransport<P>,
    /// The last completed byte was the fault-marker prefix; its resync is
    /// deferred until the next boundary decides whether it was a marker.
    pending_prefix: bool,
}

impl<P: BusPort> BusLink<P> {
    pub fn new(port: P) -> Self {
        Self {
            transport: BitTransport::new(port),
            pending_prefix: false,
        }
    }

    /// Transmit one framed byte.
    ///
    /// Checks the window for the fault marker first: a match re-frames the
    /// byte boundary and collects the whole fault frame before returning.
    /// Otherwise the byte-boundary counter advances; every 8th framed byte
    /// yields the completed return byte, and a non-idle return byte triggers
    /// re-synchronization before the event is reported. A completed marker
    /// prefix alone defers its resync one boundary, in case it is the first
    /// half of a fault announcement; if the marker does not materialize the
    /// deferred resync fires even when the following byte is idle.
    pub fn write_byte(&mut self, data: u8) -> Option<LinkEvent> {
        self.transport.write_bits(data);

        if self.transport.window() == FAULT_PATTERN {
            self.pending_prefix = false;
            self.transport.mark_boundary();
            let frame = self.collect_fault();
            return Some(LinkEvent::Fault(frame));
        }

        match self.transport.complete_bit() {
            Some(byte) => {
                let prefix_pending = std::mem::take(&mut self.pending_prefix);
                if byte == FAULT_MARKER_PREFIX && !prefix_pending {
                    self.pending_prefix = true;
                    Some(LinkEvent::ByteCompleted(byte))
                } else if prefix_pending || byte != IDLE_BYTE {
                    let sync = synchronize(&mut self.transport);
                    if sync.success {
                        Some(LinkEvent::ByteCompleted(byte))
                    } else {
                        Some(LinkEvent::SyncLost(sync))
                    }
                } else {
                    Some(LinkEvent::ByteCompleted(byte))
                }
            }
            None => None,
        }
    }

    /// Transmit the 4-byte register-write framing for one command.
    ///
    /// Wire layout: `[REG_WRITE, (device << 1) | bank, address, data]`.
    /// Returns the events produced along the way, if any.
    pub fn write_register(
        &mut self,
        device: u8,
        bank: bool,
        address: u8,
        data: u8,
    ) -> Option<Vec<LinkEvent>> {
        let framing = [
            opcode::REG_WRITE,
            (device << 1) | bank as u8,
            address,
            data,
        ];
        let mut events = Vec::new();
        for byte in framing {
            if let Some(event) = self.write_byte(byte) {
                events.push(event);
            }
        }
        if events.is_empty() { None } else { Some(events) }
    }

    /// Collect a complete fault frame with `DEBUG_READ` bursts.
    ///
    /// Ordinary command traffic is suspended until the frame is complete;
    /// each burst of 8 raw transmits clocks one frame byte onto the window.
    fn collect_fault(&mut self) -> FaultFrame {
        let mut collector = FaultCollector::new();
        loop {
            for _ in 0..8 {
                self.transport.write_bits(opcode::DEBUG_READ);
            }
            let byte = (self.transport.window() & 0xFF) as u8;
            if let Some(frame) = collector.push_byte(byte) {
                self.transport.clear_counters();
                return frame;
            }
        }
    }

    pub fn transport(&self) -> &BitTransport<P> {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut BitTransport<P> {
        &mut self.transport
    }

    pub fn port(&self) -> &P {
        self.transport.port()
    }

    pub fn port_mut(&mut self) -> &mut P {
        self.transport.port_mut()
    }
}
