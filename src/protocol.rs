//! Command bytes and framing for the analyser link.
//!
//! Every request starts with a command byte. The MSB of the command is set
//! for commands the device answers. Variable-length commands carry a
//! little-endian 16-bit length after the command byte; fixed-size commands
//! go straight to their payload.

/// Set on commands that read from the device
pub const DIRECTION_READ: u8 = 0x80;

/// Load trigger LUTs: word count + big-endian words
pub const C_LUT_CONFIG: u8 = 0x01;
/// Write the control register
pub const C_WR_CONTROL: u8 = 0x02;
/// Write the pre-trigger sample count
pub const C_WR_PRETRIG: u8 = 0x03;
/// Write the total capture sample count
pub const C_WR_CAPTURE: u8 = 0x04;
/// Read the acquisition state
pub const C_RD_STATUS: u8 = DIRECTION_READ | 0x01;
/// Read the bitstream version
pub const C_RD_VERSION: u8 = DIRECTION_READ | 0x02;
/// Read captured samples
pub const C_RD_BUFFER: u8 = DIRECTION_READ | 0x03;
/// Read the trigger engine geometry
pub const C_RD_CONFIG: u8 = DIRECTION_READ | 0x04;

/// Largest value of the 24-bit sample count registers
pub const MAX_SAMPLE_COUNT: u32 = 0x00FF_FFFF;

/// Key preceding the geometry bytes of a `C_RD_CONFIG` reply
pub const CONFIG_KEY: [u8; 4] = [0xA5, 0x5E, 0x12, 0x34];

/// Length of a `C_RD_CONFIG` reply
pub const CONFIG_REPLY_LEN: usize = CONFIG_KEY.len() + 4;

/// Bytes per captured sample on the wire
pub const BYTES_PER_SAMPLE: usize = 2;

/// Control register fields
pub mod control {
    /// Start acquisition
    pub const START_ACQ: u8 = 1 << 0;
    /// Clear the acquisition state machine
    pub const CLEAR: u8 = 1 << 1;
    pub const DIVIDER_SHIFT: u8 = 2;
    pub const DIVIDER_MASK: u8 = 0b11 << DIVIDER_SHIFT;
    pub const EXPONENT_SHIFT: u8 = 4;
    pub const EXPONENT_MASK: u8 = 0b11 << EXPONENT_SHIFT;
}

/// Acquisition state reported by `C_RD_STATUS`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    Idle,
    Pretrig,
    Armed,
    Run,
    Done,
}

impl DeviceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceState::Idle => "Idle",
            DeviceState::Pretrig => "Pretrig",
            DeviceState::Armed => "Armed",
            DeviceState::Run => "Run",
            DeviceState::Done => "Done",
        }
    }

    /// Decode a status byte; only the low 3 bits carry the state.
    ///
    /// Returns `None` for the reserved values 5 to 7.
    pub fn from_status(status: u8) -> Option<Self> {
        match status & 0b111 {
            0 => Some(DeviceState::Idle),
            1 => Some(DeviceState::Pretrig),
            2 => Some(DeviceState::Armed),
            3 => Some(DeviceState::Run),
            4 => Some(DeviceState::Done),
            _ => None,
        }
    }
}

/// Value written to the control register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlBits(u8);

impl ControlBits {
    pub fn clear() -> Self {
        Self(control::CLEAR)
    }

    /// Divider bits only, start and clear deasserted
    pub fn divider(divider_bits: u8) -> Self {
        Self(divider_bits & (control::DIVIDER_MASK | control::EXPONENT_MASK))
    }

    pub fn with_start(self) -> Self {
        Self(self.0 | control::START_ACQ)
    }

    pub fn bits(&self) -> u8 {
        self.0
    }
}

/// `[command]`
pub fn command_frame(command: u8) -> Vec<u8> {
    vec![command]
}

/// `[C_WR_CONTROL, bits]`
pub fn control_frame(bits: ControlBits) -> Vec<u8> {
    vec![C_WR_CONTROL, bits.bits()]
}

/// `[command, n0, n1, n2]` with a 24-bit little-endian count.
///
/// Returns `None` when `count` does not fit in 24 bits.
pub fn sample_count_frame(command: u8, count: u32) -> Option<Vec<u8>> {
    if count > MAX_SAMPLE_COUNT {
        return None;
    }
    let [b0, b1, b2, _] = count.to_le_bytes();
    Some(vec![command, b0, b1, b2])
}

/// `[C_LUT_CONFIG, n_lo, n_hi, payload...]` where `n` is the number of LUT words
pub fn lut_config_frame(lut_count: u16, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(3 + payload.len());
    frame.push(C_LUT_CONFIG);
    frame.extend_from_slice(&lut_count.to_le_bytes());
    frame.extend_from_slice(payload);
    frame
}

/// `[C_RD_BUFFER, len_lo, len_hi]` requesting `byte_count` sample bytes
pub fn read_buffer_frame(byte_count: u16) -> Vec<u8> {
    let [lo, hi] = byte_count.to_le_bytes();
    vec![C_RD_BUFFER, lo, hi]
}

/// Samples arrive low byte first
pub fn decode_samples(bytes: &[u8]) -> impl Iterator<Item = u16> + '_ {
    bytes
        .chunks_exact(BYTES_PER_SAMPLE)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_bit() {
        for command in [C_LUT_CONFIG, C_WR_CONTROL, C_WR_PRETRIG, C_WR_CAPTURE] {
            assert_eq!(command & DIRECTION_READ, 0);
        }
        for command in [C_RD_STATUS, C_RD_VERSION, C_RD_BUFFER, C_RD_CONFIG] {
            assert_eq!(command & DIRECTION_READ, DIRECTION_READ);
        }
    }

    #[test]
    fn test_device_state_decoding() {
        assert_eq!(DeviceState::from_status(0), Some(DeviceState::Idle));
        assert_eq!(DeviceState::from_status(4), Some(DeviceState::Done));
        assert_eq!(DeviceState::from_status(0xF3), Some(DeviceState::Run));
        for reserved in 5..=7 {
            assert_eq!(DeviceState::from_status(reserved), None);
        }
    }

    #[test]
    fn test_control_bits() {
        assert_eq!(ControlBits::clear().bits(), 0b10);
        let divider = ControlBits::divider(0b0011_0111);
        assert_eq!(divider.bits(), 0b0011_0100);
        assert_eq!(divider.with_start().bits(), 0b0011_0101);
    }

    #[test]
    fn test_sample_count_frame() {
        assert_eq!(
            sample_count_frame(C_WR_CAPTURE, 40000),
            Some(vec![C_WR_CAPTURE, 0x40, 0x9C, 0x00])
        );
        assert_eq!(
            sample_count_frame(C_WR_PRETRIG, MAX_SAMPLE_COUNT),
            Some(vec![C_WR_PRETRIG, 0xFF, 0xFF, 0xFF])
        );
        assert_eq!(sample_count_frame(C_WR_PRETRIG, MAX_SAMPLE_COUNT + 1), None);
    }

    #[test]
    fn test_lut_config_frame() {
        let frame = lut_config_frame(0x1A2, &[1, 2, 3, 4]);
        assert_eq!(frame, vec![C_LUT_CONFIG, 0xA2, 0x01, 1, 2, 3, 4]);
    }

    #[test]
    fn test_decode_samples() {
        let samples: Vec<u16> = decode_samples(&[0x34, 0x12, 0xCD, 0xAB]).collect();
        assert_eq!(samples, vec![0x1234, 0xABCD]);
    }
}
