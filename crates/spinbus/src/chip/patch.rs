//! The built-in FM patch.
//!
//! A single fixed instrument, programmed into every channel at startup and
//! whenever a voice is re-prepared. Addresses in [`OPERATOR_PATCH`] and
//! [`CHANNEL_INIT`] are the channel-offset-0 bases; callers add `channel % 3`
//! and select the bank.

/// Chip-global registers, written once per device (with channel 0).
///
/// LFO disabled, channel 3 in normal mode with timers off, DAC disabled.
pub const GLOBAL_INIT: &[(u8, u8)] = &[(0x22, 0x00), (0x27, 0x00), (0x2B, 0x00)];

/// Per-operator registers: 7 parameter groups, operators ordered 1, 3, 2, 4.
///
/// Detune/multiple, total level, attack rate/rate scaling, decay rate,
/// sustain rate, release rate/sustain level, SSG-EG off.
pub const OPERATOR_PATCH: &[(u8, u8)] = &[
    (0x30, 0x71),
    (0x34, 0x0D),
    (0x38, 0x33),
    (0x3C, 0x01),
    (0x40, 0x23),
    (0x44, 0x2D),
    (0x48, 0x26),
    (0x4C, 0x00),
    (0x50, 0x5F),
    (0x54, 0x99),
    (0x58, 0x5F),
    (0x5C, 0x92),
    (0x60, 0x05),
    (0x64, 0x05),
    (0x68, 0x05),
    (0x6C, 0x07),
    (0x70, 0x02),
    (0x74, 0x02),
    (0x78, 0x02),
    (0x7C, 0x02),
    (0x80, 0x11),
    (0x84, 0x11),
    (0x88, 0x11),
    (0x8C, 0xA2),
    (0x90, 0x00),
    (0x94, 0x00),
    (0x98, 0x00),
    (0x9C, 0x00),
];

/// Per-channel registers: default frequency, feedback/algorithm, stereo pan.
pub const CHANNEL_INIT: &[(u8, u8)] = &[
    (0xA4, 0x22),
    (0xA0, 0x69),
    (0xB0, 0x32),
    (0xB4, 0xC0),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_patch_covers_all_groups() {
        assert_eq!(OPERATOR_PATCH.len(), 28);
        // 7 groups of 4 operator rows, bases 0x30 through 0x9C step 4.
        for (i, &(base, _)) in OPERATOR_PATCH.iter().enumerate() {
            assert_eq!(base, 0x30 + 4 * i as u8);
        }
    }

    #[test]
    fn test_channel_init_programs_frequency_pair() {
        assert_eq!(CHANNEL_INIT[0], (0xA4, 0x22));
        assert_eq!(CHANNEL_INIT[1], (0xA0, 0x69));
    }
}
