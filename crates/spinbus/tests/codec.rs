use spinbus::chip::codec::{frequency_to_note, NoteValue};
use spinbus::note::key_frequency_hz;

#[test]
fn test_every_midi_key_fits_the_register() {
    // Keys below 12 truncate to frequencies too small to matter; the
    // playable range must encode without overflowing block or fnum.
    for key in 12..128u8 {
        let hz = key_frequency_hz(key).unwrap();
        let note = frequency_to_note(hz);
        assert!(note.fnum < 2048, "key {} fnum {}", key, note.fnum);
        assert!(
            (2..=9).contains(&note.block),
            "key {} block {}",
            key,
            note.block
        );
    }
}

#[test]
fn test_conversion_error_stays_under_one_percent() {
    for key in 24..120u8 {
        let hz = key_frequency_hz(key).unwrap();
        let note = frequency_to_note(hz);
        let got = note.approx_hz();
        let err = (got - f64::from(hz)).abs() / f64::from(hz);
        assert!(err < 0.01, "key {}: {} Hz -> {:.2} Hz", key, hz, got);
    }
}

#[test]
fn test_octaves_double_the_pitch() {
    let a3 = frequency_to_note(220);
    let a4 = frequency_to_note(440);
    let a5 = frequency_to_note(880);
    // Same fnum magnitude, rising block, once the value leaves block 2.
    assert!(a4.pack() > a3.pack());
    assert!(a5.pack() > a4.pack());
    assert_eq!(a5.block, a4.block + 1);
}

#[test]
fn test_packed_layout_matches_register_pair() {
    let note = NoteValue {
        block: 2,
        fnum: 1082,
    };
    let packed = note.pack();
    assert_eq!(packed >> 8, 0x14);
    assert_eq!(packed & 0xFF, 0x3A);
}
