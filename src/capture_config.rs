use std::time::Duration;

use crate::protocol::{control, MAX_SAMPLE_COUNT};

/// Sample clock feeding the divider chain
pub const SAMPLE_CLOCK_HZ: u64 = 100_000_000;

#[derive(Debug, thiserror::Error)]
pub enum CaptureConfigError {
    #[error("Sample count {count} does not fit the 24-bit capture registers")]
    SampleCountTooLarge { count: u32 },

    #[error("Capture length must be at least one sample")]
    EmptyCapture,

    #[error("Pre-trigger length {pre_trigger} exceeds capture length {capture_length}")]
    PreTriggerTooLong { pre_trigger: u32, capture_length: u32 },

    #[error("Clock divider {divider} or exponent {exponent} out of range (0..=3)")]
    DividerOutOfRange { divider: u8, exponent: u8 },
}

/// Sample interval selector: the sample clock is divided by
/// `(divider + 1) * 10^exponent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SampleRate {
    divider: u8,
    exponent: u8,
}

impl SampleRate {
    pub fn new(divider: u8, exponent: u8) -> Result<Self, CaptureConfigError> {
        if divider > 3 || exponent > 3 {
            return Err(CaptureConfigError::DividerOutOfRange { divider, exponent });
        }
        Ok(Self { divider, exponent })
    }

    /// Fastest rate, one sample per clock
    pub fn full_speed() -> Self {
        Self::default()
    }

    pub fn divisor(&self) -> u64 {
        u64::from(self.divider + 1) * 10u64.pow(u32::from(self.exponent))
    }

    pub fn sample_period(&self) -> Duration {
        Duration::from_nanos(self.divisor() * 1_000_000_000 / SAMPLE_CLOCK_HZ)
    }

    pub fn samples_per_second(&self) -> f64 {
        SAMPLE_CLOCK_HZ as f64 / self.divisor() as f64
    }

    /// Divider field of the control register
    pub fn control_bits(&self) -> u8 {
        ((self.divider << control::DIVIDER_SHIFT) & control::DIVIDER_MASK)
            | ((self.exponent << control::EXPONENT_SHIFT) & control::EXPONENT_MASK)
    }
}

/// Capture parameters sent with every acquisition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureConfig {
    sample_rate: SampleRate,
    capture_length: u32,
    pre_trigger: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: SampleRate::full_speed(),
            capture_length: 1000,
            pre_trigger: 0,
        }
    }
}

impl CaptureConfig {
    pub fn new(
        sample_rate: SampleRate,
        capture_length: u32,
        pre_trigger: u32,
    ) -> Result<Self, CaptureConfigError> {
        if capture_length == 0 {
            return Err(CaptureConfigError::EmptyCapture);
        }
        if capture_length > MAX_SAMPLE_COUNT {
            return Err(CaptureConfigError::SampleCountTooLarge {
                count: capture_length,
            });
        }
        if pre_trigger > capture_length {
            return Err(CaptureConfigError::PreTriggerTooLong {
                pre_trigger,
                capture_length,
            });
        }
        Ok(Self {
            sample_rate,
            capture_length,
            pre_trigger,
        })
    }

    pub fn sample_rate(&self) -> SampleRate {
        self.sample_rate
    }

    pub fn capture_length(&self) -> u32 {
        self.capture_length
    }

    pub fn pre_trigger(&self) -> u32 {
        self.pre_trigger
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_rate_bits() {
        assert_eq!(SampleRate::full_speed().control_bits(), 0);
        assert_eq!(SampleRate::new(3, 0).unwrap().control_bits(), 0b0000_1100);
        assert_eq!(SampleRate::new(1, 2).unwrap().control_bits(), 0b0010_0100);
        assert!(SampleRate::new(4, 0).is_err());
        assert!(SampleRate::new(0, 4).is_err());
    }

    #[test]
    fn test_sample_period() {
        assert_eq!(SampleRate::full_speed().sample_period(), Duration::from_nanos(10));
        let rate = SampleRate::new(1, 3).unwrap();
        assert_eq!(rate.divisor(), 2000);
        assert_eq!(rate.sample_period(), Duration::from_micros(20));
    }

    #[test]
    fn test_capture_config_validation() {
        let rate = SampleRate::full_speed();
        assert!(CaptureConfig::new(rate, 40000, 10000).is_ok());
        assert!(matches!(CaptureConfig::new(rate, 0, 0), Err(CaptureConfigError::EmptyCapture)));
        assert!(matches!(
            CaptureConfig::new(rate, 0x100_0000, 0),
            Err(CaptureConfigError::SampleCountTooLarge { .. })
        ));
        assert!(matches!(
            CaptureConfig::new(rate, 10, 11),
            Err(CaptureConfigError::PreTriggerTooLong { .. })
        ));
    }
}
