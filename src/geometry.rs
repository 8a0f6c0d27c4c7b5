use crate::trigger_config::TriggerConfigError;

/// Number of partial pattern matchers sharing one pattern-matcher LUT
pub const PARTIAL_PATTERN_MATCHERS_PER_LUT: usize = 2;

/// Number of sample bits handled by one pattern-matcher LUT
pub const PATTERN_MATCHER_BITS_PER_LUT: usize = 2;

/// Number of combiner LUTs for each trigger step
pub const LUTS_PER_TRIGGER_STEP_FOR_COMBINERS: usize = 1;

/// Number of trigger flag LUTs (last active step, contiguous mask)
pub const NUM_TRIGGER_FLAGS: usize = 2;

/// Width of the LFSR used to encode match counts
pub const LFSR_WIDTH: usize = 16;

/// Shape of the trigger engine synthesised into the FPGA.
///
/// The default matches the standard bitstream: 16 channels, 16 trigger steps,
/// 2 patterns per step and 16-bit match counters. A device reports its own
/// geometry through [`crate::IdleLogicAnalyser::read_geometry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalyserGeometry {
    sample_width: usize,
    max_trigger_steps: usize,
    max_trigger_patterns: usize,
    match_counter_bits: usize,
}

impl Default for AnalyserGeometry {
    fn default() -> Self {
        Self {
            sample_width: 16,
            max_trigger_steps: 16,
            max_trigger_patterns: 2,
            match_counter_bits: LFSR_WIDTH,
        }
    }
}

impl AnalyserGeometry {
    pub fn new(
        sample_width: usize,
        max_trigger_steps: usize,
        max_trigger_patterns: usize,
        match_counter_bits: usize,
    ) -> Result<Self, TriggerConfigError> {
        let geometry = Self {
            sample_width,
            max_trigger_steps,
            max_trigger_patterns,
            match_counter_bits,
        };

        if sample_width < PATTERN_MATCHER_BITS_PER_LUT
            || sample_width > 32
            || sample_width % PATTERN_MATCHER_BITS_PER_LUT != 0
        {
            return Err(TriggerConfigError::InvalidGeometry {
                geometry,
                reason: "sample width must be even and between 2 and 32",
            });
        }
        if !(1..=32).contains(&max_trigger_steps) {
            return Err(TriggerConfigError::InvalidGeometry {
                geometry,
                reason: "step count must be between 1 and 32",
            });
        }
        if !(PARTIAL_PATTERN_MATCHERS_PER_LUT..=4).contains(&max_trigger_patterns)
            || max_trigger_patterns % PARTIAL_PATTERN_MATCHERS_PER_LUT != 0
        {
            return Err(TriggerConfigError::InvalidGeometry {
                geometry,
                reason: "pattern count must be 2 or 4",
            });
        }
        if match_counter_bits != LFSR_WIDTH {
            return Err(TriggerConfigError::InvalidGeometry {
                geometry,
                reason: "match counters must be 16 bits wide",
            });
        }

        Ok(geometry)
    }

    pub fn sample_width(&self) -> usize {
        self.sample_width
    }

    pub fn max_trigger_steps(&self) -> usize {
        self.max_trigger_steps
    }

    pub fn max_trigger_patterns(&self) -> usize {
        self.max_trigger_patterns
    }

    pub fn match_counter_bits(&self) -> usize {
        self.match_counter_bits
    }

    /// Region sizes and offsets of the compiled LUT image for this geometry
    pub fn layout(&self) -> LutLayout {
        let luts_per_step_for_patterns = (self.max_trigger_patterns * self.sample_width)
            / (PATTERN_MATCHER_BITS_PER_LUT * PARTIAL_PATTERN_MATCHERS_PER_LUT);
        let pattern_luts = self.max_trigger_steps * luts_per_step_for_patterns;
        let combiner_luts = self.max_trigger_steps * LUTS_PER_TRIGGER_STEP_FOR_COMBINERS;
        let count_luts = self.match_counter_bits;
        let flag_luts = NUM_TRIGGER_FLAGS;

        let pattern_start = 0;
        let combiner_start = pattern_start + pattern_luts;
        let count_start = combiner_start + combiner_luts;
        let flag_start = count_start + count_luts;

        LutLayout {
            luts_per_step_for_patterns,
            pattern_start,
            combiner_start,
            count_start,
            flag_start,
            total_luts: flag_start + flag_luts,
        }
    }
}

/// Offsets of the four LUT regions inside a compiled image.
///
/// Regions are contiguous and always in the order pattern matchers,
/// combiners, count matchers, flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LutLayout {
    pub luts_per_step_for_patterns: usize,
    pub pattern_start: usize,
    pub combiner_start: usize,
    pub count_start: usize,
    pub flag_start: usize,
    pub total_luts: usize,
}

impl LutLayout {
    pub fn pattern_range(&self) -> std::ops::Range<usize> {
        self.pattern_start..self.combiner_start
    }

    pub fn combiner_range(&self) -> std::ops::Range<usize> {
        self.combiner_start..self.count_start
    }

    pub fn count_range(&self) -> std::ops::Range<usize> {
        self.count_start..self.flag_start
    }

    pub fn flag_range(&self) -> std::ops::Range<usize> {
        self.flag_start..self.total_luts
    }
}
