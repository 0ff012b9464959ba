//! Command-line harness for exercising the link stack against the
//! simulated FPGA receiver.
//!
//! Every subcommand runs entirely on the host: the `play` command drives a
//! full controller cycle and shows the decoded register writes, the others
//! poke individual protocol layers.

mod cui;

use clap::{Parser, Subcommand};

#[derive(Subcommand, Debug)]
enum Commands {
    /// Play notes through a simulated link and show the register writes
    Play {
        /// Notes as MIDI key numbers or mapped QWERTY keys (e.g. 69 n Z)
        #[arg(value_name = "NOTE", required = true)]
        notes: Vec<String>,

        /// Show the patch upload writes as well, not just the note traffic
        #[arg(long)]
        full: bool,
    },
    /// Print the block/f-number encoding for the MIDI key range
    Notes {
        /// First MIDI key to show
        #[arg(long, default_value_t = 21)]
        from: u8,

        /// Last MIDI key to show
        #[arg(long, default_value_t = 108)]
        to: u8,
    },
    /// Decode a raw fault frame (code, length, payload bytes in hex)
    Fault {
        /// Frame bytes in hex, e.g. F8 02 00 04
        #[arg(value_name = "BYTE", required = true)]
        bytes: Vec<String>,
    },
    /// Run wire synchronization against the simulated receiver
    Sync {
        /// Junk bits ahead of the idle stream
        #[arg(long, default_value_t = 0)]
        phase: usize,

        /// Simulate a dead return line
        #[arg(long)]
        dead: bool,
    },
}

#[derive(Parser, Debug)]
#[command(
    name = "spinbus",
    author = env!("CARGO_PKG_AUTHORS"),
    version = env!("CARGO_PKG_VERSION"),
    about = env!("CARGO_PKG_DESCRIPTION"),
)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let result = match args.command {
        Commands::Play { notes, full } => cui::play::play(&notes, full),
        Commands::Notes { from, to } => cui::notes::print_note_table(from, to),
        Commands::Fault { bytes } => cui::fault::decode(&bytes),
        Commands::Sync { phase, dead } => cui::sync::run(phase, dead),
    };

    if let Err(e) = result {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}
