//! Per-device command queues.
//!
//! Register writes are not sent directly: each device has a bounded FIFO of
//! pending commands, and the hardware handshake line gates transmission so
//! that at most one command is in flight per device at any time. The
//! handshake reports "previous payload latched" for all devices at once, not
//! per device.
//!
//! Overflow is a lossy backpressure valve: a command pushed onto a queue
//! already past the hard limit is dropped (and counted), and a fixed delay
//! is issued instead of queuing.

use std::collections::VecDeque;
use std::time::Duration;

use crate::bus::fault::FaultFrame;
use crate::bus::link::{BusLink, LinkEvent};
use crate::bus::port::BusPort;
use crate::DEVICE_COUNT;

/// Pending commands a single device queue may hold before dropping.
pub const QUEUE_HARD_LIMIT: usize = 1000;

/// Delay issued in place of queuing when a command is dropped.
pub const OVERFLOW_BACKOFF: Duration = Duration::from_millis(100);

/// One chip register write. Immutable once created, consumed exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    /// Register bank: `false` for channels 0-2, `true` for channels 3-5.
    pub bank: bool,
    pub address: u8,
    pub data: u8,
}

#[derive(Debug, Default)]
struct DeviceQueue {
    pending: VecDeque<Command>,
    in_flight: bool,
    dropped: u64,
}

/// Outcome of one drain step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrainStep {
    /// Commands still pending across all devices, counted before this
    /// step's transmissions were popped.
    pub remaining: usize,
    /// Fault frame collected while transmitting, if any. The queues have
    /// already been cleared when this is set.
    pub fault: Option<FaultFrame>,
}

/// The bounded command FIFOs for all devices.
#[derive(Debug)]
pub struct CommandQueues {
    devices: [DeviceQueue; DEVICE_COUNT],
}

impl CommandQueues {
    pub fn new() -> Self {
        Self {
            devices: std::array::from_fn(|_| DeviceQueue::default()),
        }
    }

    /// Append a command to a device's queue.
    ///
    /// Past the hard limit the command is dropped, the device's drop
    /// counter is bumped and the backpressure delay is issued through the
    /// port instead.
    pub fn enqueue<P: BusPort>(&mut self, port: &mut P, device: u8, command: Command) {
        let queue = &mut self.devices[device as usize % DEVICE_COUNT];
        if queue.pending.len() > QUEUE_HARD_LIMIT {
            queue.dropped = queue.dropped.saturating_add(1);
            log::warn!(
                "hit queue limit ({}) for device {} (addr {:02X} data {:02X})",
                QUEUE_HARD_LIMIT,
                device,
                command.address,
                command.data
            );
            port.delay(OVERFLOW_BACKOFF);
        } else {
            queue.pending.push_back(command);
        }
    }

    /// Service every device queue once.
    ///
    /// First samples the handshake line: when the previous payload reports
    /// latched, every device's in-flight flag clears. Then each device with
    /// pending commands and no command in flight transmits exactly one
    /// command. Callers loop until `remaining` reaches 0 to get a
    /// drain-to-empty barrier.
    ///
    /// A fault collected during transmission clears all queues; the step
    /// reports 0 remaining so drain loops terminate.
    pub fn drain_step<P: BusPort>(&mut self, link: &mut BusLink<P>) -> DrainStep {
        if link.port_mut().read_latched() {
            for queue in &mut self.devices {
                queue.in_flight = false;
            }
        }

        let mut remaining = 0;
        for device in 0..DEVICE_COUNT {
            remaining += self.devices[device].pending.len();
            if self.devices[device].pending.is_empty() || self.devices[device].in_flight {
                continue;
            }

            self.devices[device].in_flight = true;
            let Some(command) = self.devices[device].pending.pop_front() else {
                continue;
            };
            let events =
                link.write_register(device as u8, command.bank, command.address, command.data);
            if let Some(events) = events {
                for event in events {
                    match event {
                        LinkEvent::Fault(frame) => {
                            self.clear();
                            return DrainStep {
                                remaining: 0,
                                fault: Some(frame),
                            };
                        }
                        LinkEvent::SyncLost(result) => {
                            log::warn!(
                                "sync lost during drain (attempts {}), continuing",
                                result.attempts
                            );
                        }
                        LinkEvent::ByteCompleted(_) => {}
                    }
                }
            }
        }

        DrainStep {
            remaining,
            fault: None,
        }
    }

    /// Discard all pending commands on every device.
    pub fn clear(&mut self) {
        for queue in &mut self.devices {
            queue.pending.clear();
            queue.in_flight = false;
        }
    }

    /// Pending commands for one device.
    pub fn pending_len(&self, device: u8) -> usize {
        self.devices[device as usize % DEVICE_COUNT].pending.len()
    }

    /// Pending commands across all devices.
    pub fn total_pending(&self) -> usize {
        self.devices.iter().map(|q| q.pending.len()).sum()
    }

    /// Commands dropped by the overflow valve for one device.
    pub fn dropped(&self, device: u8) -> u64 {
        self.devices[device as usize % DEVICE_COUNT].dropped
    }
}

impl Default for CommandQueues {
    fn default() -> Self {
        Self::new()
    }
}
