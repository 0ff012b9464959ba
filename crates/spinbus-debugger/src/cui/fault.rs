use anyhow::{bail, Context, Result};
use comfy_table::{presets::NOTHING, Cell, ContentArrangement, Table};

use spinbus::bus::fault::FaultCollector;

/// Decode a fault frame from raw hex bytes, the way the link would collect
/// it after the marker.
pub fn decode(args: &[String]) -> Result<()> {
    let bytes: Vec<u8> = args
        .iter()
        .map(|s| {
            u8::from_str_radix(s.trim_start_matches("0x"), 16)
                .with_context(|| format!("'{}' is not a hex byte", s))
        })
        .collect::<Result<_>>()?;

    let mut collector = FaultCollector::new();
    let mut frame = None;
    for &byte in &bytes {
        if let Some(done) = collector.push_byte(byte) {
            frame = Some(done);
            break;
        }
    }
    let Some(frame) = frame else {
        bail!(
            "incomplete frame: {} byte(s) given, more payload expected",
            bytes.len()
        );
    };

    let mut table = Table::new();
    table.load_preset(NOTHING);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.add_row(vec![Cell::new("code"), Cell::new(format!("0x{:02X}", frame.code))]);
    if let Some(code) = frame.code() {
        table.add_row(vec![Cell::new("name"), Cell::new(code.to_string())]);
    }
    table.add_row(vec![
        Cell::new("declared length"),
        Cell::new(frame.declared_len),
    ]);
    for (i, byte) in frame.payload.iter().enumerate() {
        table.add_row(vec![
            Cell::new(format!("data {}", i)),
            Cell::new(format!("0x{:02X}", byte)),
        ]);
    }
    table.add_row(vec![Cell::new("meaning"), Cell::new(frame.describe())]);
    println!("{}", table);
    Ok(())
}
