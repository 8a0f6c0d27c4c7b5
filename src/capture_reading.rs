use polars::prelude::*;
use std::time::Duration;

use crate::capture_config::{CaptureConfig, SampleRate};

/// Channels carried by one sample on the wire
pub const SAMPLE_BITS: usize = u16::BITS as usize;

const RAW_COLUMN_NAME: &str = "raw";
const TIME_COLUMN_NAME: &str = "time";

/// Samples read back after a capture, oldest first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureReading {
    samples: Vec<u16>,
    sample_rate: SampleRate,
    pre_trigger: u32,
}

impl CaptureReading {
    pub fn new(samples: Vec<u16>, capture: &CaptureConfig) -> Self {
        Self {
            samples,
            sample_rate: capture.sample_rate(),
            pre_trigger: capture.pre_trigger(),
        }
    }

    pub fn samples(&self) -> &[u16] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<u16> {
        self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn sample_period(&self) -> Duration {
        self.sample_rate.sample_period()
    }

    /// Number of samples captured before the trigger fired
    pub fn pre_trigger(&self) -> u32 {
        self.pre_trigger
    }

    /// Levels of one channel over the capture; channels past [`SAMPLE_BITS`] read low
    pub fn channel(&self, bit: usize) -> impl Iterator<Item = bool> + '_ {
        let mask = u32::try_from(bit)
            .ok()
            .and_then(|bit| 1u16.checked_shl(bit))
            .unwrap_or(0);
        self.samples.iter().map(move |&sample| sample & mask != 0)
    }

    /// One row per sample: `time` in seconds relative to the trigger,
    /// the `raw` bus value and a `bit_N` column per channel.
    ///
    /// At most [`SAMPLE_BITS`] channels are available.
    pub fn to_dataframe(&self, channels: usize) -> Result<DataFrame, PolarsError> {
        if channels > SAMPLE_BITS {
            return Err(PolarsError::OutOfBounds(
                format!("{channels} channels requested, samples carry {SAMPLE_BITS}").into(),
            ));
        }

        let period = self.sample_period().as_secs_f64();
        let pre_trigger = f64::from(self.pre_trigger);

        let time: Vec<f64> = (0..self.samples.len())
            .map(|index| (index as f64 - pre_trigger) * period)
            .collect();
        let raw: Vec<u32> = self.samples.iter().map(|&s| u32::from(s)).collect();

        let mut df = DataFrame::new(vec![
            Series::new(TIME_COLUMN_NAME.into(), time).into(),
            Series::new(RAW_COLUMN_NAME.into(), raw).into(),
        ])?;

        for bit in 0..channels {
            let values: Vec<bool> = self.channel(bit).collect();
            let column: Column = Series::new(format!("bit_{}", bit).into(), values).into();
            df.with_column(column)?;
        }

        Ok(df)
    }

    /// Write the capture as CSV with a header row
    pub fn write_csv<W: std::io::Write>(
        &self,
        writer: W,
        channels: usize,
    ) -> Result<(), PolarsError> {
        let mut df = self.to_dataframe(channels)?;
        CsvWriter::new(writer).include_header(true).finish(&mut df)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading() -> CaptureReading {
        let capture = CaptureConfig::new(SampleRate::new(1, 0).unwrap(), 4, 1).unwrap();
        CaptureReading::new(vec![0b00, 0b01, 0b11, 0b10], &capture)
    }

    #[test]
    fn test_channel_extraction() {
        let reading = reading();
        assert_eq!(reading.channel(0).collect::<Vec<_>>(), [false, true, true, false]);
        assert_eq!(reading.channel(1).collect::<Vec<_>>(), [false, false, true, true]);
        assert_eq!(reading.sample_period(), Duration::from_nanos(20));
    }

    #[test]
    fn test_dataframe_columns() {
        let df = reading().to_dataframe(2).unwrap();
        assert_eq!(df.height(), 4);
        assert_eq!(df.width(), 4);

        let time: Vec<f64> = df.column(TIME_COLUMN_NAME).unwrap().f64().unwrap().into_no_null_iter().collect();
        assert!((time[0] + 20e-9).abs() < 1e-15);
        assert_eq!(time[1], 0.0);

        let bit1: Vec<bool> = df.column("bit_1").unwrap().bool().unwrap().into_no_null_iter().collect();
        assert_eq!(bit1, [false, false, true, true]);
    }

    #[test]
    fn test_channels_beyond_sample_width() {
        let capture = CaptureConfig::default();
        let reading = CaptureReading::new(vec![0xFFFF, 0], &capture);

        assert_eq!(reading.channel(15).collect::<Vec<_>>(), [true, false]);
        assert_eq!(reading.channel(16).collect::<Vec<_>>(), [false, false]);
        assert_eq!(reading.channel(31).collect::<Vec<_>>(), [false, false]);

        assert_eq!(reading.to_dataframe(SAMPLE_BITS).unwrap().width(), 2 + SAMPLE_BITS);
        assert!(matches!(
            reading.to_dataframe(32),
            Err(PolarsError::OutOfBounds(_))
        ));
        assert!(reading.write_csv(Vec::new(), 32).is_err());
    }

    #[test]
    fn test_write_csv() {
        let mut out = Vec::new();
        reading().write_csv(&mut out, 1).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("time,raw,bit_0\n"));
        assert_eq!(text.lines().count(), 5);
    }
}
