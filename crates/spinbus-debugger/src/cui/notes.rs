use anyhow::{bail, Result};
use comfy_table::{presets::NOTHING, Cell, ContentArrangement, Table};

use spinbus::chip::codec::frequency_to_note;
use spinbus::note::key_frequency_hz;

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

fn note_name(key: u8) -> String {
    let octave = i32::from(key / 12) - 1;
    format!("{}{}", NOTE_NAMES[usize::from(key % 12)], octave)
}

/// Print the chip encoding for a range of MIDI keys.
pub fn print_note_table(from: u8, to: u8) -> Result<()> {
    if from > to || to > 127 {
        bail!("invalid key range {}..{}", from, to);
    }

    let mut table = Table::new();
    table.load_preset(NOTHING);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Key"),
        Cell::new("Note"),
        Cell::new("Hz"),
        Cell::new("Block"),
        Cell::new("FNum"),
        Cell::new("Packed"),
        Cell::new("Actual Hz"),
    ]);

    for key in from..=to {
        let Some(hz) = key_frequency_hz(key) else {
            continue;
        };
        let note = frequency_to_note(hz);
        table.add_row(vec![
            Cell::new(key),
            Cell::new(note_name(key)),
            Cell::new(hz),
            Cell::new(note.block),
            Cell::new(note.fnum),
            Cell::new(format!("0x{:04X}", note.pack())),
            Cell::new(format!("{:.2}", note.approx_hz())),
        ]);
    }
    println!("{}", table);
    Ok(())
}
