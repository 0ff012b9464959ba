//! In-band fault frames reported by the FPGA receiver.
//!
//! A fault is announced by the 16-bit marker `0xF0D4` appearing in the
//! rolling window. The marker fixes the byte boundary; the controller then
//! clocks out a fixed-shape frame with `DEBUG_READ` bursts: one code byte,
//! one declared payload length (clamped to 8), then the payload bytes.
//! While a frame is being collected, ordinary command traffic is suspended.

/// Window pattern that announces a fault frame on the return channel.
pub const FAULT_PATTERN: u16 = 0xF0D4;

/// Maximum accepted payload length; larger declared lengths are clamped.
pub const FAULT_PAYLOAD_MAX: usize = 8;

/// Known fault codes and their meanings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultCode {
    /// The receiver saw an opcode it does not understand (`payload[0]`).
    UnknownCommand,
    /// The command receiver was in an invalid state (`payload[1]`).
    InvalidState,
    /// More bytes arrived than the command accepts (`payload[0]` = opcode).
    TooManyBytes,
    /// Device index out of range (`payload[1] >> 1` = index).
    DeviceIndexOutOfRange,
    /// A second command was submitted to a device with one still latched
    /// (`payload[1] >> 1` = index).
    DoubleSubmission,
}

impl FaultCode {
    /// Decode a raw fault code byte.
    pub fn from_byte(code: u8) -> Option<Self> {
        match code {
            0xF1 => Some(Self::UnknownCommand),
            0xF2 => Some(Self::InvalidState),
            0xF3 => Some(Self::TooManyBytes),
            0xF8 => Some(Self::DeviceIndexOutOfRange),
            0xF9 => Some(Self::DoubleSubmission),
            _ => None,
        }
    }

    /// Symbolic name, as reported in fault dumps.
    pub fn name(&self) -> &'static str {
        match self {
            Self::UnknownCommand => "ERROR_COMMAND_UNKNOWN",
            Self::InvalidState => "ERROR_INVALID_STATE",
            Self::TooManyBytes => "ERROR_TOO_MANY_BYTES",
            Self::DeviceIndexOutOfRange => "ERROR_DEVICE_IDX_OUTOFRANGE",
            Self::DoubleSubmission => "ERROR_DEVICE_DOUBLE_SUBMIT",
        }
    }
}

impl std::fmt::Display for FaultCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One decoded fault frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultFrame {
    /// Raw fault code byte.
    pub code: u8,
    /// Payload length declared by the device, clamped to
    /// [`FAULT_PAYLOAD_MAX`].
    pub declared_len: u8,
    /// Collected payload bytes (`declared_len` of them).
    pub payload: Vec<u8>,
}

impl FaultFrame {
    /// The decoded code, if it is one of the known values.
    pub fn code(&self) -> Option<FaultCode> {
        FaultCode::from_byte(self.code)
    }

    fn payload_byte(&self, index: usize) -> u8 {
        self.payload.get(index).copied().unwrap_or(0)
    }

    /// Human-readable, per-code interpretation of the frame.
    pub fn describe(&self) -> String {
        match self.code() {
            Some(FaultCode::UnknownCommand) => {
                format!("unknown command received: {:02X}", self.payload_byte(0))
            }
            Some(FaultCode::InvalidState) => {
                format!("invalid command receiver state: {:02X}", self.payload_byte(1))
            }
            Some(FaultCode::TooManyBytes) => {
                format!("received too many bytes for command: {:02X}", self.payload_byte(0))
            }
            Some(FaultCode::DeviceIndexOutOfRange) => {
                format!("device index out of range: {}", self.payload_byte(1) >> 1)
            }
            Some(FaultCode::DoubleSubmission) => {
                format!("double submission on device index: {}", self.payload_byte(1) >> 1)
            }
            None => format!("unknown fault code: {:02X}", self.code),
        }
    }

    /// Emit the full diagnostic dump through the `log` facade.
    pub fn dump(&self) {
        log::error!("LINK FAULT");
        if let Some(code) = self.code() {
            log::error!("{}", code);
        }
        log::error!("ERRCODE: {:02X}", self.code);
        for (i, byte) in self.payload.iter().enumerate() {
            log::error!("DATA {:2}: {:02X}", i, byte);
        }
        log::error!("{}", self.describe());
    }
}

/// Incremental collector for a fault frame.
///
/// Fed one completed return byte at a time; yields the frame once the
/// payload matches the declared length. A declared length of zero completes
/// immediately with an empty payload.
#[derive(Debug, Default)]
pub struct FaultCollector {
    code: Option<u8>,
    declared_len: Option<u8>,
    payload: Vec<u8>,
}

impl FaultCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one return byte; returns the completed frame when done.
    pub fn push_byte(&mut self, byte: u8) -> Option<FaultFrame> {
        match (self.code, self.declared_len) {
            (None, _) => {
                self.code = Some(byte);
                None
            }
            (Some(_), None) => {
                self.declared_len = Some(byte.min(FAULT_PAYLOAD_MAX as u8));
                self.try_finish()
            }
            (Some(_), Some(len)) => {
                if (self.payload.len() as u8) < len {
                    self.payload.push(byte);
                }
                self.try_finish()
            }
        }
    }

    fn try_finish(&mut self) -> Option<FaultFrame> {
        let declared = self.declared_len?;
        if self.payload.len() < declared as usize {
            return None;
        }
        let frame = FaultFrame {
            code: self.code.take().unwrap_or(0),
            declared_len: declared,
            payload: std::mem::take(&mut self.payload),
        };
        self.declared_len = None;
        Some(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_frame() {
        let mut collector = FaultCollector::new();
        assert_eq!(collector.push_byte(0xF8), None);
        assert_eq!(collector.push_byte(0x02), None);
        assert_eq!(collector.push_byte(0x00), None);
        let frame = collector.push_byte(0x04).unwrap();
        assert_eq!(frame.code, 0xF8);
        assert_eq!(frame.declared_len, 2);
        assert_eq!(frame.payload, vec![0x00, 0x04]);
    }

    #[test]
    fn test_describe_device_index() {
        let frame = FaultFrame {
            code: 0xF8,
            declared_len: 2,
            payload: vec![0x00, 0x04],
        };
        assert_eq!(frame.code(), Some(FaultCode::DeviceIndexOutOfRange));
        assert_eq!(frame.describe(), "device index out of range: 2");
    }

    #[test]
    fn test_describe_unknown_command() {
        let frame = FaultFrame {
            code: 0xF1,
            declared_len: 1,
            payload: vec![0x42],
        };
        assert_eq!(frame.describe(), "unknown command received: 42");
    }

    #[test]
    fn test_declared_length_clamped() {
        let mut collector = FaultCollector::new();
        collector.push_byte(0xF2);
        assert_eq!(collector.push_byte(0xFF), None);
        let mut frame = None;
        for i in 0..8 {
            frame = collector.push_byte(i);
        }
        let frame = frame.unwrap();
        assert_eq!(frame.declared_len, 8);
        assert_eq!(frame.payload.len(), 8);
    }

    #[test]
    fn test_zero_length_frame_completes() {
        let mut collector = FaultCollector::new();
        collector.push_byte(0xF2);
        let frame = collector.push_byte(0x00).unwrap();
        assert_eq!(frame.declared_len, 0);
        assert!(frame.payload.is_empty());
    }

    #[test]
    fn test_unknown_code_describe() {
        let frame = FaultFrame {
            code: 0x55,
            declared_len: 0,
            payload: Vec::new(),
        };
        assert_eq!(frame.code(), None);
        assert_eq!(frame.describe(), "unknown fault code: 55");
    }
}
