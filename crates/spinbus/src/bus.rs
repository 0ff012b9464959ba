//! Bus transport and wire protocols.
//!
//! Everything that touches the bit-serial link lives here: the hardware line
//! abstraction ([`port::BusPort`]), the raw bit transport with its rolling
//! 16-bit return window ([`transport::BitTransport`]), alignment recovery
//! ([`sync`]), in-band fault frames ([`fault`]), and the framed write layer
//! that composes them ([`link::BusLink`]). A deterministic software model of
//! the FPGA receiver is provided in [`sim`] for host-side testing.

pub mod fault;
pub mod link;
pub mod port;
pub mod sim;
pub mod sync;
pub mod transport;

pub use fault::{FaultCode, FaultFrame};
pub use link::{BusLink, LinkEvent};
pub use port::BusPort;
pub use sync::SyncResult;
pub use transport::BitTransport;

/// Wire opcodes understood by the FPGA receiver. One byte each.
pub mod opcode {
    /// No operation; used to probe for alignment.
    pub const NOP: u8 = 0x00;
    /// Soft reset of the receiver state machine.
    pub const RESET: u8 = 0x0F;
    /// Clock out one byte of debug/fault data on the return line.
    pub const DEBUG_READ: u8 = 0x7F;
    /// Register write: `[REG_WRITE, (device << 1) | bank, address, data]`.
    pub const REG_WRITE: u8 = 0x11;
    /// Chip configuration command (reserved by the bridge).
    pub const CHIP_CONFIG: u8 = 0x15;
}

/// Idle/acknowledge byte on the return channel.
pub const IDLE_BYTE: u8 = 0x01;
