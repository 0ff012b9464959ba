//! Voice allocation across both devices.
//!
//! The two chips together expose 12 channels, treated as one flat pool of
//! voice slots. Slot `n` maps to device `n / 6`, channel `n % 6`. Allocation
//! prefers the slot that last played the requested key (patch state is
//! already warm there), then any free slot scanning round-robin from the
//! cursor, and finally steals the slot under the cursor outright. The cursor
//! advances after every note-on so steals spread across the pool.

use crate::{CHANNELS_PER_DEVICE, VOICE_SLOTS};

/// How a slot was obtained for a note-on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentKind {
    /// The slot was free.
    Fresh,
    /// The slot last played this same key (or is still playing it).
    Reused,
    /// The slot was sounding another key, which must be released first.
    Stolen { evicted: u8 },
}

/// A slot picked for a note-on, with its device coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment {
    pub slot: usize,
    pub device: u8,
    pub channel: u8,
    pub kind: AssignmentKind,
}

/// A slot released by a note-off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Release {
    pub slot: usize,
    pub device: u8,
    pub channel: u8,
}

#[derive(Debug, Clone, Copy, Default)]
struct VoiceSlot {
    /// Key currently sounding, if any.
    current_key: Option<u8>,
    /// Key most recently played on this slot, sounding or not.
    last_key: u8,
}

/// Round-robin allocator over the flat slot pool.
#[derive(Debug)]
pub struct VoiceAllocator {
    slots: [VoiceSlot; VOICE_SLOTS],
    cursor: usize,
}

impl VoiceAllocator {
    pub fn new() -> Self {
        Self {
            slots: [VoiceSlot::default(); VOICE_SLOTS],
            cursor: 0,
        }
    }

    fn coords(slot: usize) -> (u8, u8) {
        (
            (slot / CHANNELS_PER_DEVICE) as u8,
            (slot % CHANNELS_PER_DEVICE) as u8,
        )
    }

    fn assignment(slot: usize, kind: AssignmentKind) -> Assignment {
        let (device, channel) = Self::coords(slot);
        Assignment {
            slot,
            device,
            channel,
            kind,
        }
    }

    /// Pick a slot for a note-on of `key` and mark it sounding.
    pub fn note_on(&mut self, key: u8) -> Assignment {
        let chosen = self.pick(key);
        self.slots[chosen.slot].current_key = Some(key);
        self.slots[chosen.slot].last_key = key;
        self.cursor = (self.cursor + 1) % VOICE_SLOTS;
        chosen
    }

    fn pick(&mut self, key: u8) -> Assignment {
        // A key never occupies two slots: a retrigger reuses its slot.
        if let Some(slot) = self
            .slots
            .iter()
            .position(|s| s.current_key == Some(key))
        {
            self.cursor = slot;
            return Self::assignment(slot, AssignmentKind::Reused);
        }

        // Prefer the free slot that last played this key. The cursor moves
        // to the reused slot so the next scan starts just past it.
        if let Some(slot) = self
            .slots
            .iter()
            .position(|s| s.current_key.is_none() && s.last_key == key)
        {
            self.cursor = slot;
            return Self::assignment(slot, AssignmentKind::Reused);
        }

        // Any free slot, scanning round-robin from the cursor.
        for offset in 0..VOICE_SLOTS {
            let slot = (self.cursor + offset) % VOICE_SLOTS;
            if self.slots[slot].current_key.is_none() {
                self.cursor = slot;
                return Self::assignment(slot, AssignmentKind::Fresh);
            }
        }

        // All busy: steal the slot under the cursor.
        let slot = self.cursor;
        let evicted = self.slots[slot].current_key.unwrap_or(0);
        Self::assignment(slot, AssignmentKind::Stolen { evicted })
    }

    /// Release the slot sounding `key`, if any.
    ///
    /// The slot keeps its `last_key` so a later note-on of the same key
    /// lands on it again.
    pub fn note_off(&mut self, key: u8) -> Option<Release> {
        let slot = self
            .slots
            .iter()
            .position(|s| s.current_key == Some(key))?;
        self.slots[slot].current_key = None;
        let (device, channel) = Self::coords(slot);
        Some(Release {
            slot,
            device,
            channel,
        })
    }

    /// Mark every slot silent and rewind the cursor.
    pub fn reset(&mut self) {
        self.slots = [VoiceSlot::default(); VOICE_SLOTS];
        self.cursor = 0;
    }

    /// Slots currently sounding a key.
    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|s| s.current_key.is_some()).count()
    }

    /// Key sounding on a slot, if any.
    pub fn sounding_key(&self, slot: usize) -> Option<u8> {
        self.slots.get(slot).and_then(|s| s.current_key)
    }
}

impl Default for VoiceAllocator {
    fn default() -> Self {
        Self::new()
    }
}
