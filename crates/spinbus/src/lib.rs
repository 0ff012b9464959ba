#![doc = include_str!("../README.md")]
//!
//! `spinbus` drives two FM-synthesis sound chips through a bit-serial link
//! bridged by an FPGA. Incoming note events (MIDI or raw keyboard) are turned
//! into chip register writes, spread across a bounded pool of polyphonic
//! voices, with automatic recovery from link desynchronization and
//! device-reported faults.
//!
//! Layering, leaves first:
//!
//! - [`bus::port::BusPort`]: the hardware lines (data, clock, return,
//!   handshake, reset) and busy-wait delays. [`bus::sim::SimBus`] is a
//!   deterministic software model of the FPGA receiver.
//! - [`bus::transport::BitTransport`]: one byte out, one return bit in,
//!   rolling 16-bit window of the last sampled bits.
//! - [`bus::sync`] and [`bus::fault`]: wire alignment recovery and in-band
//!   fault-frame collection.
//! - [`bus::link::BusLink`]: framed byte writes with fault detection,
//!   byte-boundary accounting and automatic re-synchronization.
//! - [`queue::CommandQueues`]: per-device bounded FIFOs gated by the
//!   handshake line (at most one command in flight per device).
//! - [`voice::VoiceAllocator`]: note-to-slot mapping with last-key reuse
//!   and steal-at-cursor fallback.
//! - [`chip::codec`] and [`chip::patch`]: frequency to block/f-number
//!   conversion and the fixed FM voice patch.
//! - [`controller::Controller`]: the cooperative control loop tying the
//!   pieces together.
//!
//! # Examples
//!
//! Frequency conversion is a pure function of the input:
//!
//! ```rust
//! use spinbus::chip::codec::frequency_to_note;
//!
//! let a4 = frequency_to_note(440);
//! assert_eq!((a4.block, a4.fnum), (2, 1082));
//! // The packed form goes into registers 0xA4/0xA0.
//! assert_eq!(a4.pack(), (2 << 11) | 1082);
//! ```
//!
//! Running the full stack against the simulated bus:
//!
//! ```rust
//! use spinbus::bus::sim::SimBus;
//! use spinbus::controller::{Controller, CycleOutcome};
//! use spinbus::note::{self, NoteEvent};
//!
//! let (mut input, output) = note::note_channel(16);
//! let mut controller = Controller::new(SimBus::new(), output);
//!
//! assert!(matches!(controller.start_cycle(), CycleOutcome::Ready));
//!
//! input.push(NoteEvent { key: 69, frequency_hz: 440, on: true });
//! controller.service();
//!
//! // The simulated FPGA decoded the register writes for the note.
//! let writes = controller.port().writes();
//! assert!(writes.iter().any(|w| w.address == 0x28 && w.data & 0xF0 == 0xF0));
//! ```

pub mod bus;
pub mod chip;
pub mod controller;
pub mod note;
pub mod queue;
pub mod voice;

/// Number of sound chips on the link.
pub const DEVICE_COUNT: usize = 2;

/// FM channels per chip.
pub const CHANNELS_PER_DEVICE: usize = 6;

/// Total polyphony across all devices.
pub const VOICE_SLOTS: usize = DEVICE_COUNT * CHANNELS_PER_DEVICE;

pub use bus::fault::{FaultCode, FaultFrame};
pub use bus::link::{BusLink, LinkEvent};
pub use bus::port::BusPort;
pub use bus::sync::SyncResult;
pub use controller::Controller;
pub use note::NoteEvent;
pub use queue::{Command, CommandQueues};
pub use voice::VoiceAllocator;
