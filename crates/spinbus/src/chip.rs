//! FM chip register programming.
//!
//! Everything here produces [`Command`] entries on the per-device queues;
//! nothing talks to the wire directly. Channel indices are the logical 0-5
//! range; the hardware splits them across two register banks of three, so
//! register offsets use `channel % 3` and the key strobe skips the unused
//! slot between the banks.

pub mod codec;
pub mod patch;

use crate::bus::port::BusPort;
use crate::chip::codec::NoteValue;
use crate::queue::{Command, CommandQueues};

/// Key on/off strobe register (bank 0 on every chip).
pub const KEY_REGISTER: u8 = 0x28;

/// Channel value for the key strobe: the 3-bit field skips index 3.
fn key_channel(channel: u8) -> u8 {
    channel + (channel > 2) as u8
}

fn bank(channel: u8) -> bool {
    channel > 2
}

fn push<P: BusPort>(
    queues: &mut CommandQueues,
    port: &mut P,
    device: u8,
    bank: bool,
    address: u8,
    data: u8,
) {
    queues.enqueue(port, device, Command { bank, address, data });
}

/// Queue the full patch setup for one channel.
///
/// Channel 0 also carries the chip-global rows (LFO, channel 3 mode, DAC).
/// Ends with the channel keyed off and its frequency registers at the
/// patch defaults.
pub fn prepare_voice<P: BusPort>(
    queues: &mut CommandQueues,
    port: &mut P,
    device: u8,
    channel: u8,
) {
    let offset = channel % 3;
    let in_bank = bank(channel);

    if channel == 0 {
        for &(address, data) in patch::GLOBAL_INIT {
            push(queues, port, device, false, address, data);
        }
    }

    push(queues, port, device, false, KEY_REGISTER, key_channel(channel));

    for &(base, data) in patch::OPERATOR_PATCH {
        push(queues, port, device, in_bank, base + offset, data);
    }
    for &(base, data) in patch::CHANNEL_INIT {
        push(queues, port, device, in_bank, base + offset, data);
    }
}

/// Queue a note-on at a frequency in Hz.
///
/// Returns the block/fnum value that was programmed.
pub fn queue_note_on<P: BusPort>(
    queues: &mut CommandQueues,
    port: &mut P,
    device: u8,
    channel: u8,
    frequency_hz: u16,
) -> NoteValue {
    let note = codec::frequency_to_note(frequency_hz);
    queue_note_raw(queues, port, device, channel, note);
    note
}

/// Queue a note-on for an already-encoded block/fnum value.
///
/// Frequency registers first (high byte then low, so the chip latches the
/// pair atomically), then the key-on strobe.
pub fn queue_note_raw<P: BusPort>(
    queues: &mut CommandQueues,
    port: &mut P,
    device: u8,
    channel: u8,
    note: NoteValue,
) {
    let packed = note.pack();
    let offset = channel % 3;
    let in_bank = bank(channel);
    push(queues, port, device, in_bank, 0xA4 + offset, (packed >> 8) as u8);
    push(queues, port, device, in_bank, 0xA0 + offset, (packed & 0xFF) as u8);
    push(
        queues,
        port,
        device,
        false,
        KEY_REGISTER,
        0xF0 + key_channel(channel),
    );
}

/// Queue a key-off strobe for one channel.
pub fn queue_note_off<P: BusPort>(
    queues: &mut CommandQueues,
    port: &mut P,
    device: u8,
    channel: u8,
) {
    push(queues, port, device, false, KEY_REGISTER, key_channel(channel));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::sim::SimBus;

    #[test]
    fn test_prepare_channel_zero_includes_globals() {
        let mut queues = CommandQueues::new();
        let mut port = SimBus::new();
        prepare_voice(&mut queues, &mut port, 0, 0);
        // 3 global rows, key off, 28 operator rows, 4 channel rows.
        assert_eq!(queues.pending_len(0), 3 + 1 + 28 + 4);
    }

    #[test]
    fn test_prepare_other_channels_skip_globals() {
        let mut queues = CommandQueues::new();
        let mut port = SimBus::new();
        prepare_voice(&mut queues, &mut port, 0, 4);
        assert_eq!(queues.pending_len(0), 1 + 28 + 4);
    }

    #[test]
    fn test_note_on_register_sequence() {
        let mut queues = CommandQueues::new();
        let mut port = SimBus::new();
        // Channel 4 lives in the second bank at offset 1, strobe value 5.
        let note = queue_note_on(&mut queues, &mut port, 1, 4, 440);
        assert_eq!((note.block, note.fnum), (2, 1082));

        let packed = note.pack();
        let mut link = crate::bus::link::BusLink::new(port);
        assert!(crate::bus::sync::synchronize(link.transport_mut()).success);
        loop {
            if queues.drain_step(&mut link).remaining == 0 {
                break;
            }
        }
        let writes = link.port().writes();
        assert_eq!(writes.len(), 3);
        assert!(writes[0].bank && writes[0].address == 0xA5);
        assert_eq!(writes[0].data, (packed >> 8) as u8);
        assert!(writes[1].bank && writes[1].address == 0xA1);
        assert_eq!(writes[1].data, (packed & 0xFF) as u8);
        assert!(!writes[2].bank && writes[2].address == KEY_REGISTER);
        assert_eq!(writes[2].data, 0xF5);
    }

    #[test]
    fn test_note_off_strobe() {
        let mut queues = CommandQueues::new();
        let mut port = SimBus::new();
        queue_note_off(&mut queues, &mut port, 0, 2);
        queue_note_off(&mut queues, &mut port, 0, 3);
        let mut link = crate::bus::link::BusLink::new(port);
        assert!(crate::bus::sync::synchronize(link.transport_mut()).success);
        loop {
            if queues.drain_step(&mut link).remaining == 0 {
                break;
            }
        }
        let data: Vec<u8> = link.port().writes().iter().map(|w| w.data).collect();
        assert_eq!(data, vec![0x02, 0x04]);
    }
}
