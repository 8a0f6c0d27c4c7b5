//! Compiles a [`TriggerProgram`] into the LUT words that configure the
//! trigger engine.
//!
//! The image is made of four regions, always in this order:
//!
//! ```text
//!  +------------------+  layout.pattern_start
//!  | pattern matchers |  per step, last step first
//!  +------------------+  layout.combiner_start
//!  | combiners        |  one per step, last step first
//!  +------------------+  layout.count_start
//!  | count matchers   |  one per counter bit, MSB first
//!  +------------------+  layout.flag_start
//!  | flags            |  last active step, contiguous mask
//!  +------------------+
//! ```
//!
//! Each pattern-matcher LUT implements 2 channel bits of 2 different
//! patterns. For 2 patterns over 16 channels a step uses 8 LUTs:
//!
//! ```text
//!    33         1 1
//!    10         6 5          0
//!   +-------------------------+
//!   |  T1(15:14) |  T0(15:14) | word 0
//!   +-------------------------+
//!   |            ...          |
//!   +-------------------------+
//!   |   T1(1:0)  |   T0(1:0)  | word 7
//!   +-------------------------+
//! ```

use std::fmt;

use crate::geometry::{AnalyserGeometry, LutLayout};
use crate::lfsr;
use crate::protocol;
use crate::trigger_config::{TriggerProgram, TriggerStep, TriggerSymbol};

/// Truth tables for one bit of two channels, indexed by
/// `6 * index(upper) + index(lower)`.
///
/// Bit `i` of an entry is the result for input `i = {prevU, curU, prevL, curL}`
/// (MSB first).
const HALF_LUT_TABLE: [u16; 36] = [
    0b1111_1111_1111_1111, // XX
    0b1010_1010_1010_1010, // XH
    0b0101_0101_0101_0101, // XL
    0b0010_0010_0010_0010, // XR
    0b0100_0100_0100_0100, // XF
    0b0110_0110_0110_0110, // XC
    0b1111_0000_1111_0000, // HX
    0b1010_0000_1010_0000, // HH
    0b0101_0000_0101_0000, // HL
    0b0010_0000_0010_0000, // HR
    0b0100_0000_0100_0000, // HF
    0b0110_0000_0110_0000, // HC
    0b0000_1111_0000_1111, // LX
    0b0000_1010_0000_1010, // LH
    0b0000_0101_0000_0101, // LL
    0b0000_0010_0000_0010, // LR
    0b0000_0100_0000_0100, // LF
    0b0000_0110_0000_0110, // LC
    0b0000_0000_1111_0000, // RX
    0b0000_0000_1010_0000, // RH
    0b0000_0000_0101_0000, // RL
    0b0000_0000_0010_0000, // RR
    0b0000_0000_0100_0000, // RF
    0b0000_0000_0110_0000, // RC
    0b0000_1111_0000_0000, // FX
    0b0000_1010_0000_0000, // FH
    0b0000_0101_0000_0000, // FL
    0b0000_0010_0000_0000, // FR
    0b0000_0100_0000_0000, // FF
    0b0000_0110_0000_0000, // FC
    0b0000_1111_1111_0000, // CX
    0b0000_1010_1010_0000, // CH
    0b0000_0101_0101_0000, // CL
    0b0000_0010_0010_0000, // CR
    0b0000_0100_0100_0000, // CF
    0b0000_0110_0110_0000, // CC
];

/// LUT value for one bit of two adjacent channels of a single pattern
pub fn half_lut_value(upper: TriggerSymbol, lower: TriggerSymbol) -> u16 {
    HALF_LUT_TABLE[6 * upper.index() + lower.index()]
}

/// Pattern-matcher words for one step.
///
/// `out` must hold `layout.luts_per_step_for_patterns` words.
pub fn encode_pattern_matchers(step: &TriggerStep, out: &mut [u32]) {
    let arity = step.patterns.len();
    let width = step.patterns.first().map_or(0, |(p, _)| p.width());

    let lut_values = (1..width).rev().step_by(2).flat_map(|bit| {
        (1..arity).rev().step_by(2).map(move |condition| {
            let upper = &step.patterns[condition].0;
            let lower = &step.patterns[condition - 1].0;
            (u32::from(half_lut_value(upper.bit(bit), upper.bit(bit - 1))) << 16)
                | u32::from(half_lut_value(lower.bit(bit), lower.bit(bit - 1)))
        })
    });

    for (slot, value) in out.iter_mut().zip(lut_values) {
        *slot = value;
    }
}

/// Combiner word for one step: bit `v` is the step result when the raw
/// pattern matches are the bits of `v`.
pub fn encode_combiner(step: &TriggerStep) -> u32 {
    let operation = step.operation;
    (0u32..1 << step.patterns.len())
        .filter(|value| {
            step.patterns
                .iter()
                .enumerate()
                .fold(operation.identity(), |accumulator, (index, (_, polarity))| {
                    let matched = value & (1 << index) != 0;
                    operation.combine(accumulator, polarity.apply(matched, operation))
                })
        })
        .fold(0, |result, value| result | (1 << value))
}

/// Count-matcher words, one bit-plane of the LFSR targets per word.
///
/// Bit `s` of word `counter_bits - 1 - b` is bit `b` of the encoded count of
/// step `s`. Only `active_steps` contribute; all other bits stay clear.
pub fn encode_counts(active_steps: &[TriggerStep], out: &mut [u32]) {
    out.fill(0);
    let counter_bits = out.len();
    for (step_index, step) in active_steps.iter().enumerate() {
        let encoded = lfsr::encode_count(step.match_count);
        for bit in 0..counter_bits {
            if encoded & (1 << bit) != 0 {
                out[counter_bits - 1 - bit] |= 1 << step_index;
            }
        }
    }
}

/// Flag words: one-hot last active step, then the contiguous mask
pub fn encode_flags(active_steps: &[TriggerStep], out: &mut [u32]) {
    let last_active_step = active_steps.len().saturating_sub(1);
    let contiguous = active_steps
        .iter()
        .enumerate()
        .filter(|(_, step)| step.contiguous)
        .fold(0u32, |flags, (index, _)| flags | (1 << index));

    out[0] = 1 << last_active_step;
    out[1] = contiguous;
}

/// Compiled trigger program
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LutImage {
    geometry: AnalyserGeometry,
    layout: LutLayout,
    words: Vec<u32>,
}

/// Compile `program` into its LUT image.
///
/// Slots after the last active step are compiled as neutral steps so they
/// can never block the sequence.
#[tracing::instrument(skip_all, fields(last_active_step = program.last_active_step()))]
pub fn compile(program: &TriggerProgram) -> LutImage {
    let geometry = *program.geometry();
    let layout = geometry.layout();
    let mut words = vec![0u32; layout.total_luts];
    let neutral = TriggerStep::neutral(&geometry);
    let last_step = geometry.max_trigger_steps() - 1;

    for (index, step) in program.steps().iter().enumerate() {
        let step = if index <= program.last_active_step() {
            step
        } else {
            &neutral
        };
        let slot = last_step - index;

        let start = layout.pattern_start + slot * layout.luts_per_step_for_patterns;
        encode_pattern_matchers(step, &mut words[start..start + layout.luts_per_step_for_patterns]);
        words[layout.combiner_start + slot] = encode_combiner(step);
    }

    encode_counts(program.active_steps(), &mut words[layout.count_range()]);
    encode_flags(program.active_steps(), &mut words[layout.flag_range()]);

    log::debug!("Compiled trigger program into {} LUTs", layout.total_luts);
    LutImage {
        geometry,
        layout,
        words,
    }
}

/// Words as sent on the link: each word big-endian
pub fn format_for_transport(words: &[u32]) -> Vec<u8> {
    words.iter().flat_map(|word| word.to_be_bytes()).collect()
}

/// Inverse of [`format_for_transport`]; trailing partial words are ignored
pub fn parse_transport(bytes: &[u8]) -> Vec<u32> {
    bytes
        .chunks_exact(4)
        .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

impl LutImage {
    pub fn geometry(&self) -> &AnalyserGeometry {
        &self.geometry
    }

    pub fn layout(&self) -> &LutLayout {
        &self.layout
    }

    pub fn words(&self) -> &[u32] {
        &self.words
    }

    pub fn pattern_words(&self) -> &[u32] {
        &self.words[self.layout.pattern_range()]
    }

    pub fn combiner_words(&self) -> &[u32] {
        &self.words[self.layout.combiner_range()]
    }

    pub fn count_words(&self) -> &[u32] {
        &self.words[self.layout.count_range()]
    }

    pub fn flag_words(&self) -> &[u32] {
        &self.words[self.layout.flag_range()]
    }

    pub fn to_transport_bytes(&self) -> Vec<u8> {
        format_for_transport(&self.words)
    }

    /// Render the image as the stimulus array of the VHDL testbench.
    ///
    /// The stimulus holds exactly the bytes of the `C_LUT_CONFIG` frame.
    pub fn to_vhdl_stimulus(&self) -> String {
        self.vhdl_stimulus().to_string()
    }

    /// [`Display`](fmt::Display) adapter rendering the VHDL stimulus
    pub fn vhdl_stimulus(&self) -> VhdlStimulus<'_> {
        VhdlStimulus { image: self }
    }
}

/// VHDL testbench stimulus of a [`LutImage`]
#[derive(Debug, Clone, Copy)]
pub struct VhdlStimulus<'a> {
    image: &'a LutImage,
}

impl fmt::Display for VhdlStimulus<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let LutImage {
            geometry,
            layout,
            words,
        } = self.image;
        let number = words.len();
        let [count_lo, count_hi] = (number as u16).to_le_bytes();
        let preamble = 3;

        writeln!(f)?;
        for (name, value) in [
            ("SIM_SAMPLE_WIDTH", geometry.sample_width()),
            ("SIM_MAX_TRIGGER_STEPS", geometry.max_trigger_steps()),
            ("SIM_MAX_TRIGGER_PATTERNS", geometry.max_trigger_patterns()),
            ("SIM_NUM_TRIGGER_FLAGS", layout.total_luts - layout.flag_start),
            ("SIM_NUM_MATCH_COUNTER_BITS", geometry.match_counter_bits()),
        ] {
            writeln!(f, "   constant {name:<26} : natural := {value};")?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "   type StimulusArray is array (0 to {}) of DataBusType;",
            4 * number - 1 + preamble
        )?;
        writeln!(f, "   variable stimulus : StimulusArray := (")?;
        writeln!(f, "      -- Preamble")?;
        writeln!(
            f,
            "      C_LUT_CONFIG, \"{count_lo:08b}\", \"{count_hi:08b}\", -- {} bytes ({number} LUTs)",
            4 * number
        )?;

        let regions = [
            ("PatternMatcher LUT values", layout.pattern_range()),
            ("Combiner LUT values", layout.combiner_range()),
            ("Count LUT values", layout.count_range()),
            ("Flag LUT values", layout.flag_range()),
        ];
        for (title, range) in regions {
            writeln!(f, "      -- {title} ({} LUTs)", range.len())?;
            for index in range {
                let [b3, b2, b1, b0] = words[index].to_be_bytes();
                let separator = if index + 1 == number { "" } else { "," };
                writeln!(
                    f,
                    "      \"{b3:08b}\", \"{b2:08b}\", \"{b1:08b}\", \"{b0:08b}\"{separator}"
                )?;
            }
        }
        writeln!(f, "   );")
    }
}

/// Frame carrying `image` with the `C_LUT_CONFIG` command
pub fn lut_config_frame(image: &LutImage) -> Vec<u8> {
    protocol::lut_config_frame(image.words.len() as u16, &image.to_transport_bytes())
}
