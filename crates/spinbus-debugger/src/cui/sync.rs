use anyhow::Result;

use spinbus::bus::sim::SimBus;
use spinbus::bus::sync::synchronize;
use spinbus::bus::transport::BitTransport;

/// Run one synchronization attempt against the simulated receiver.
pub fn run(phase: usize, dead: bool) -> Result<()> {
    let port = if dead {
        SimBus::dead_line()
    } else {
        SimBus::with_phase_offset(phase)
    };
    let mut transport = BitTransport::new(port);
    let result = synchronize(&mut transport);

    println!(
        "success: {}\nattempts: {}\nidle bits seen: {}\nwindow: 0x{:04X}",
        result.success,
        result.attempts,
        result.idle_hits,
        transport.window()
    );
    if !result.success {
        println!(
            "backed off for {:?} before giving up",
            spinbus::bus::sync::SYNC_BACKOFF
        );
    }
    Ok(())
}
