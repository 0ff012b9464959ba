use anyhow::{bail, Context, Result};
use comfy_table::{presets::NOTHING, Cell, ContentArrangement, Table};

use spinbus::bus::sim::{RegisterWrite, SimBus};
use spinbus::controller::{Controller, CycleOutcome, ServiceOutcome};
use spinbus::note::{key_for_char, note_channel, NoteEvent, NOTE_QUEUE_CAPACITY};

/// Resolve a note argument: a MIDI key number or a mapped QWERTY key.
fn parse_note(arg: &str) -> Result<u8> {
    if let Ok(key) = arg.parse::<u8>() {
        if key > 127 {
            bail!("MIDI key {} out of range", key);
        }
        return Ok(key);
    }
    let mut chars = arg.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => {
            key_for_char(c).with_context(|| format!("key '{}' is not mapped to a note", c))
        }
        _ => bail!("'{}' is neither a MIDI key number nor a single key", arg),
    }
}

fn write_table(writes: &[RegisterWrite]) -> Table {
    let mut table = Table::new();
    table.load_preset(NOTHING);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Device"),
        Cell::new("Bank"),
        Cell::new("Address"),
        Cell::new("Data"),
    ]);
    for write in writes {
        table.add_row(vec![
            Cell::new(write.device),
            Cell::new(u8::from(write.bank)),
            Cell::new(format!("0x{:02X}", write.address)),
            Cell::new(format!("0x{:02X}", write.data)),
        ]);
    }
    table
}

/// Play each note through a full controller cycle over the simulated bus.
pub fn play(notes: &[String], full: bool) -> Result<()> {
    let (mut input, output) = note_channel(NOTE_QUEUE_CAPACITY);
    let mut controller = Controller::new(SimBus::new(), output);

    match controller.start_cycle() {
        CycleOutcome::Ready => {}
        CycleOutcome::SyncFailed(result) => {
            bail!("synchronization failed after {} attempts", result.attempts)
        }
        CycleOutcome::Faulted(frame) => bail!("fault during patch upload: {}", frame.describe()),
    }

    let upload = controller.port_mut().take_writes();
    if full {
        println!("patch upload ({} writes):", upload.len());
        println!("{}", write_table(&upload));
    }

    for arg in notes {
        let key = parse_note(arg)?;
        let event =
            NoteEvent::on(key).with_context(|| format!("key {} has no frequency", key))?;
        input.push(event);
        match controller.service() {
            ServiceOutcome::Faulted(frame) => bail!("fault: {}", frame.describe()),
            _ => {}
        }
        let writes = controller.port_mut().take_writes();
        println!(
            "note {} ({} Hz), {} register writes:",
            key, event.frequency_hz, writes.len()
        );
        println!("{}", write_table(&writes));

        if let Some(off) = NoteEvent::off(key) {
            input.push(off);
            controller.service();
            controller.port_mut().take_writes();
        }
    }

    Ok(())
}
