//! Note events and the input-to-controller queue.
//!
//! Input sources (a MIDI device, a plain keyboard) run in interrupt or
//! callback context and must not touch the bus; they push [`NoteEvent`]s
//! into a lock-free single-producer single-consumer ring, which the control
//! loop drains between bus transactions. When the ring is full the newest
//! event is dropped and counted; pending events are never displaced.

use rtrb::{Consumer, Producer, RingBuffer};

/// Default capacity of the note event ring.
pub const NOTE_QUEUE_CAPACITY: usize = 256;

/// Equal-tempered frequency for each MIDI key number, A4 = 440 Hz.
pub const KEY_FREQUENCY_HZ: [f32; 128] = [
    8.17580, 8.66196, 9.17702, 9.72272, 10.3009, 10.9134, 11.5623, 12.2499, 12.9783, 13.7500,
    14.5676, 15.4339, 16.3516, 17.3239, 18.3540, 19.4454, 20.6017, 21.8268, 23.1247, 24.4997,
    25.9565, 27.5000, 29.1352, 30.8677, 32.7032, 34.6478, 36.7081, 38.8909, 41.2034, 43.6535,
    46.2493, 48.9994, 51.9131, 55.0000, 58.2705, 61.7354, 65.4064, 69.2957, 73.4162, 77.7817,
    82.4069, 87.3071, 92.4986, 97.9989, 103.826, 110.000, 116.541, 123.471, 130.813, 138.591,
    146.832, 155.563, 164.814, 174.614, 184.997, 195.998, 207.652, 220.000, 233.082, 246.942,
    261.626, 277.183, 293.665, 311.127, 329.628, 349.228, 369.994, 391.995, 415.305, 440.000,
    466.164, 493.883, 523.251, 554.365, 587.330, 622.254, 659.255, 698.456, 739.989, 783.991,
    830.609, 880.000, 932.328, 987.767, 1046.50, 1108.73, 1174.66, 1244.51, 1318.51, 1396.91,
    1479.98, 1567.98, 1661.22, 1760.00, 1864.66, 1975.53, 2093.00, 2217.46, 2349.32, 2489.02,
    2637.02, 2793.83, 2959.96, 3135.96, 3322.44, 3520.00, 3729.31, 3951.07, 4186.01, 4434.92,
    4698.64, 4978.03, 5274.04, 5587.65, 5919.91, 6271.93, 6644.88, 7040.00, 7458.62, 7902.13,
    8372.02, 8869.84, 9397.27, 9956.06, 10548.1, 11175.3, 11839.8, 12543.9,
];

/// One octave-and-a-bit of QWERTY keys mapped to MIDI key numbers, C3 at Z.
pub const KEYBOARD_KEYS: &[(char, u8)] = &[
    (',', 72),
    ('M', 71),
    ('J', 70),
    ('N', 69),
    ('H', 68),
    ('B', 67),
    ('G', 66),
    ('V', 65),
    ('C', 64),
    ('D', 63),
    ('X', 62),
    ('S', 61),
    ('Z', 60),
];

/// Frequency in whole Hz for a MIDI key number.
pub fn key_frequency_hz(key: u8) -> Option<u16> {
    KEY_FREQUENCY_HZ
        .get(key as usize)
        .map(|&hz| hz as u16)
}

/// MIDI key number for a mapped QWERTY key, case-insensitive.
pub fn key_for_char(c: char) -> Option<u8> {
    let upper = c.to_ascii_uppercase();
    KEYBOARD_KEYS
        .iter()
        .find(|&&(key, _)| key == upper)
        .map(|&(_, number)| number)
}

/// A key press or release, with its frequency already resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteEvent {
    pub key: u8,
    pub frequency_hz: u16,
    pub on: bool,
}

impl NoteEvent {
    /// Note-on for a MIDI key number; `None` when the key is out of range.
    pub fn on(key: u8) -> Option<Self> {
        Some(Self {
            key,
            frequency_hz: key_frequency_hz(key)?,
            on: true,
        })
    }

    /// Note-off for a MIDI key number.
    pub fn off(key: u8) -> Option<Self> {
        Some(Self {
            key,
            frequency_hz: key_frequency_hz(key)?,
            on: false,
        })
    }
}

/// Create a note event ring of the given capacity.
pub fn note_channel(capacity: usize) -> (NoteInput, NoteOutput) {
    let (producer, consumer) = RingBuffer::new(capacity);
    (
        NoteInput {
            producer,
            dropped: 0,
        },
        NoteOutput { consumer },
    )
}

/// Producer half of the note event ring.
#[derive(Debug)]
pub struct NoteInput {
    producer: Producer<NoteEvent>,
    dropped: u64,
}

impl NoteInput {
    /// Push an event; a full ring drops the event and counts it.
    pub fn push(&mut self, event: NoteEvent) {
        if self.producer.push(event).is_err() {
            self.dropped = self.dropped.saturating_add(1);
            log::warn!("note queue full, dropping event for key {}", event.key);
        }
    }

    /// Events dropped because the ring was full.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

/// Consumer half of the note event ring.
#[derive(Debug)]
pub struct NoteOutput {
    consumer: Consumer<NoteEvent>,
}

impl NoteOutput {
    /// Take the oldest pending event, if any.
    pub fn pop(&mut self) -> Option<NoteEvent> {
        self.consumer.pop().ok()
    }

    /// Events currently waiting in the ring.
    pub fn len(&self) -> usize {
        self.consumer.slots()
    }

    pub fn is_empty(&self) -> bool {
        self.consumer.is_empty()
    }
}

pub mod midi {
    //! Raw MIDI packet decoding.

    use super::NoteEvent;

    const NOTE_OFF: u8 = 0b1000;
    const NOTE_ON: u8 = 0b1001;

    /// Decode one MIDI packet into a note event.
    ///
    /// Note-on with velocity zero is a release, per the MIDI convention.
    /// Packets that are too short, out of key range, or any other message
    /// type (control change included) decode to `None`.
    pub fn decode_packet(packet: &[u8]) -> Option<NoteEvent> {
        if packet.len() < 3 {
            return None;
        }
        let kind = packet[0] >> 4;
        let key = packet[1];
        let velocity = packet[2];
        match kind {
            NOTE_ON if velocity > 0 => NoteEvent::on(key),
            NOTE_ON | NOTE_OFF => NoteEvent::off(key),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_frequencies() {
        assert_eq!(key_frequency_hz(69), Some(440));
        assert_eq!(key_frequency_hz(60), Some(261));
        assert_eq!(key_frequency_hz(127), Some(12543));
        assert_eq!(key_frequency_hz(128), None);
    }

    #[test]
    fn test_keyboard_map() {
        assert_eq!(key_for_char('z'), Some(60));
        assert_eq!(key_for_char('N'), Some(69));
        assert_eq!(key_for_char(','), Some(72));
        assert_eq!(key_for_char('Q'), None);
    }

    #[test]
    fn test_ring_drops_newest_when_full() {
        let (mut input, mut output) = note_channel(2);
        for key in [60, 62, 64] {
            input.push(NoteEvent::on(key).unwrap());
        }
        assert_eq!(input.dropped(), 1);
        assert_eq!(output.pop().map(|e| e.key), Some(60));
        assert_eq!(output.pop().map(|e| e.key), Some(62));
        assert_eq!(output.pop(), None);
    }

    #[test]
    fn test_midi_note_on_decodes() {
        let event = midi::decode_packet(&[0x90, 69, 100]).unwrap();
        assert!(event.on);
        assert_eq!(event.key, 69);
        assert_eq!(event.frequency_hz, 440);
    }

    #[test]
    fn test_midi_zero_velocity_is_release() {
        let event = midi::decode_packet(&[0x93, 60, 0]).unwrap();
        assert!(!event.on);
    }

    #[test]
    fn test_midi_ignores_other_messages() {
        assert_eq!(midi::decode_packet(&[0xB0, 7, 100]), None);
        assert_eq!(midi::decode_packet(&[0x90, 69]), None);
        assert_eq!(midi::decode_packet(&[0x90, 200, 100]), None);
    }
}
