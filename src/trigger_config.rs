use std::fmt;

use crate::capture_config::CaptureConfig;
use crate::geometry::AnalyserGeometry;

#[derive(Debug, thiserror::Error)]
pub enum TriggerConfigError {
    #[error("Invalid trigger symbol '{symbol}', expected one of X, H, 1, L, 0, R, F, C")]
    InvalidSymbol { symbol: char },

    #[error("Pattern '{pattern}' is wider than the {sample_width}-channel sample bus")]
    PatternTooWide { pattern: String, sample_width: usize },

    #[error("Pattern index {index} out of range, a step has {arity} patterns")]
    PatternIndexOutOfRange { index: usize, arity: usize },

    #[error("Step index {index} out of range, the trigger sequence has {capacity} steps")]
    StepOutOfRange { index: usize, capacity: usize },

    #[error("Invalid analyser geometry {geometry:?}: {reason}")]
    InvalidGeometry {
        geometry: AnalyserGeometry,
        reason: &'static str,
    },

    #[error("Trigger step does not fit the analyser geometry")]
    GeometryMismatch,

    #[error("A trigger program needs at least one step")]
    NoSteps,
}

/// Condition on a single channel of the sample bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TriggerSymbol {
    #[default]
    DontCare,
    High,
    Low,
    RisingEdge,
    FallingEdge,
    EitherEdge,
}

impl TriggerSymbol {
    /// Row/column of this symbol in the half-LUT truth table
    pub fn index(&self) -> usize {
        match self {
            TriggerSymbol::DontCare => 0,
            TriggerSymbol::High => 1,
            TriggerSymbol::Low => 2,
            TriggerSymbol::RisingEdge => 3,
            TriggerSymbol::FallingEdge => 4,
            TriggerSymbol::EitherEdge => 5,
        }
    }

    pub fn as_char(&self) -> char {
        match self {
            TriggerSymbol::DontCare => 'X',
            TriggerSymbol::High => 'H',
            TriggerSymbol::Low => 'L',
            TriggerSymbol::RisingEdge => 'R',
            TriggerSymbol::FallingEdge => 'F',
            TriggerSymbol::EitherEdge => 'C',
        }
    }

    /// Whether a channel that went from `previous` to `current` satisfies this symbol
    pub fn matches(&self, previous: bool, current: bool) -> bool {
        match self {
            TriggerSymbol::DontCare => true,
            TriggerSymbol::High => current,
            TriggerSymbol::Low => !current,
            TriggerSymbol::RisingEdge => !previous && current,
            TriggerSymbol::FallingEdge => previous && !current,
            TriggerSymbol::EitherEdge => previous != current,
        }
    }
}

impl TryFrom<char> for TriggerSymbol {
    type Error = TriggerConfigError;

    fn try_from(symbol: char) -> Result<Self, Self::Error> {
        match symbol.to_ascii_uppercase() {
            'X' => Ok(TriggerSymbol::DontCare),
            'H' | '1' => Ok(TriggerSymbol::High),
            'L' | '0' => Ok(TriggerSymbol::Low),
            'R' => Ok(TriggerSymbol::RisingEdge),
            'F' => Ok(TriggerSymbol::FallingEdge),
            'C' => Ok(TriggerSymbol::EitherEdge),
            _ => Err(TriggerConfigError::InvalidSymbol { symbol }),
        }
    }
}

/// One symbol per channel, most significant channel first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerPattern {
    symbols: Vec<TriggerSymbol>,
}

impl TriggerPattern {
    /// Parse a pattern such as `"XXR1"`.
    ///
    /// Patterns shorter than `sample_width` are padded with `X` on the left.
    pub fn parse(pattern: &str, sample_width: usize) -> Result<Self, TriggerConfigError> {
        let given = pattern
            .chars()
            .map(TriggerSymbol::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        if given.len() > sample_width {
            return Err(TriggerConfigError::PatternTooWide {
                pattern: pattern.to_string(),
                sample_width,
            });
        }

        let mut symbols = vec![TriggerSymbol::DontCare; sample_width - given.len()];
        symbols.extend(given);
        Ok(Self { symbols })
    }

    pub fn dont_care(sample_width: usize) -> Self {
        Self {
            symbols: vec![TriggerSymbol::DontCare; sample_width],
        }
    }

    pub fn width(&self) -> usize {
        self.symbols.len()
    }

    /// Symbol applied to channel `bit` (bit 0 is the rightmost character)
    pub fn bit(&self, bit: usize) -> TriggerSymbol {
        self.symbols[self.symbols.len() - 1 - bit]
    }
}

impl fmt::Display for TriggerPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.symbols.iter().try_for_each(|s| write!(f, "{}", s.as_char()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Operation {
    /// True when all patterns match
    #[default]
    And,
    /// True when any pattern matches
    Or,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::And => "And",
            Operation::Or => "Or",
        }
    }

    /// Starting value of the fold, the identity of the operation
    pub fn identity(&self) -> bool {
        matches!(self, Operation::And)
    }

    pub fn combine(&self, accumulator: bool, term: bool) -> bool {
        match self {
            Operation::And => accumulator && term,
            Operation::Or => accumulator || term,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Polarity {
    /// Pattern is true when matched
    #[default]
    Normal,
    /// Pattern is true when not matched
    Inverted,
    /// Pattern never controls the result of its step
    Disabled,
}

impl Polarity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Polarity::Normal => "Normal",
            Polarity::Inverted => "Inverted",
            Polarity::Disabled => "Disabled",
        }
    }

    pub fn apply(&self, matched: bool, operation: Operation) -> bool {
        match self {
            Polarity::Normal => matched,
            Polarity::Inverted => !matched,
            Polarity::Disabled => operation.identity(),
        }
    }
}

/// One stage of the trigger sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerStep {
    pub patterns: Vec<(TriggerPattern, Polarity)>,
    pub operation: Operation,
    pub contiguous: bool,
    pub match_count: u16,
}

impl TriggerStep {
    /// Step that matches every sample and never holds up the sequence
    pub fn neutral(geometry: &AnalyserGeometry) -> Self {
        Self {
            patterns: vec![
                (TriggerPattern::dont_care(geometry.sample_width()), Polarity::Normal);
                geometry.max_trigger_patterns()
            ],
            operation: Operation::And,
            contiguous: false,
            match_count: 0,
        }
    }

    pub fn when(geometry: &AnalyserGeometry) -> TriggerStepBuilder {
        TriggerStepBuilder::new(*geometry)
    }

    pub fn fits(&self, geometry: &AnalyserGeometry) -> bool {
        self.patterns.len() == geometry.max_trigger_patterns()
            && self
                .patterns
                .iter()
                .all(|(p, _)| p.width() == geometry.sample_width())
    }
}

impl fmt::Display for TriggerStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<3}", self.operation.as_str())?;
        for (index, (pattern, polarity)) in self.patterns.iter().enumerate() {
            write!(f, " T{}[{}, {:<8}]", index, pattern, polarity.as_str())?;
        }
        if self.contiguous {
            write!(f, " Contiguous")?;
        }
        write!(f, " Count = {}", self.match_count)
    }
}

/// Builds a [`TriggerStep`]; patterns are parsed when the step is built.
///
/// Pattern slots that are never set are `Disabled`.
#[derive(Debug)]
pub struct TriggerStepBuilder {
    geometry: AnalyserGeometry,
    patterns: Vec<(usize, String, Polarity)>,
    operation: Operation,
    contiguous: bool,
    match_count: u16,
}

impl TriggerStepBuilder {
    pub fn new(geometry: AnalyserGeometry) -> Self {
        Self {
            geometry,
            patterns: Vec::new(),
            operation: Operation::And,
            contiguous: false,
            match_count: 1,
        }
    }

    pub fn pattern(mut self, index: usize, pattern: &str, polarity: Polarity) -> Self {
        self.patterns.push((index, pattern.to_string(), polarity));
        self
    }

    pub fn matches(self, index: usize, pattern: &str) -> Self {
        self.pattern(index, pattern, Polarity::Normal)
    }

    pub fn does_not_match(self, index: usize, pattern: &str) -> Self {
        self.pattern(index, pattern, Polarity::Inverted)
    }

    pub fn all(mut self) -> Self {
        self.operation = Operation::And;
        self
    }

    pub fn any(mut self) -> Self {
        self.operation = Operation::Or;
        self
    }

    pub fn operation(mut self, operation: Operation) -> Self {
        self.operation = operation;
        self
    }

    /// Require the matches to be on consecutive samples
    pub fn contiguous(mut self) -> Self {
        self.contiguous = true;
        self
    }

    pub fn times(mut self, match_count: u16) -> Self {
        self.match_count = match_count;
        self
    }

    pub fn build(self) -> Result<TriggerStep, TriggerConfigError> {
        let arity = self.geometry.max_trigger_patterns();
        let width = self.geometry.sample_width();
        let mut patterns = vec![(TriggerPattern::dont_care(width), Polarity::Disabled); arity];

        for (index, pattern, polarity) in self.patterns {
            let slot = patterns
                .get_mut(index)
                .ok_or(TriggerConfigError::PatternIndexOutOfRange { index, arity })?;
            *slot = (TriggerPattern::parse(&pattern, width)?, polarity);
        }

        Ok(TriggerStep {
            patterns,
            operation: self.operation,
            contiguous: self.contiguous,
            match_count: self.match_count,
        })
    }
}

/// Complete trigger sequence and capture parameters for one acquisition
#[derive(Debug, Clone)]
pub struct TriggerProgram {
    geometry: AnalyserGeometry,
    steps: Vec<TriggerStep>,
    last_active_step: usize,
    capture: CaptureConfig,
}

impl TriggerProgram {
    /// Program whose only active step is neutral, triggering on the first sample
    pub fn new(geometry: AnalyserGeometry, capture: CaptureConfig) -> Self {
        Self {
            geometry,
            steps: vec![TriggerStep::neutral(&geometry); geometry.max_trigger_steps()],
            last_active_step: 0,
            capture,
        }
    }

    /// Program running `steps` in order, the last of them ending the sequence
    pub fn from_steps(
        geometry: AnalyserGeometry,
        steps: Vec<TriggerStep>,
        capture: CaptureConfig,
    ) -> Result<Self, TriggerConfigError> {
        if steps.is_empty() {
            return Err(TriggerConfigError::NoSteps);
        }
        let mut program = Self::new(geometry, capture);
        let last = steps.len() - 1;
        for (index, step) in steps.into_iter().enumerate() {
            program.set_step(index, step)?;
        }
        program.set_last_active_step(last)?;
        Ok(program)
    }

    pub fn set_step(&mut self, index: usize, step: TriggerStep) -> Result<(), TriggerConfigError> {
        if !step.fits(&self.geometry) {
            return Err(TriggerConfigError::GeometryMismatch);
        }
        let capacity = self.steps.len();
        let slot = self
            .steps
            .get_mut(index)
            .ok_or(TriggerConfigError::StepOutOfRange { index, capacity })?;
        *slot = step;
        Ok(())
    }

    pub fn set_last_active_step(&mut self, index: usize) -> Result<(), TriggerConfigError> {
        if index >= self.steps.len() {
            return Err(TriggerConfigError::StepOutOfRange {
                index,
                capacity: self.steps.len(),
            });
        }
        self.last_active_step = index;
        Ok(())
    }

    pub fn set_capture(&mut self, capture: CaptureConfig) {
        self.capture = capture;
    }

    pub fn geometry(&self) -> &AnalyserGeometry {
        &self.geometry
    }

    pub fn steps(&self) -> &[TriggerStep] {
        &self.steps
    }

    pub fn step(&self, index: usize) -> Option<&TriggerStep> {
        self.steps.get(index)
    }

    pub fn last_active_step(&self) -> usize {
        self.last_active_step
    }

    pub fn capture(&self) -> &CaptureConfig {
        &self.capture
    }

    /// Steps that take part in the sequence
    pub fn active_steps(&self) -> &[TriggerStep] {
        &self.steps[..=self.last_active_step]
    }

    pub fn log_steps(&self) {
        for (index, step) in self.active_steps().iter().enumerate() {
            log::debug!("  -- {:2}: {}", index, step);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn narrow() -> AnalyserGeometry {
        AnalyserGeometry::new(4, 4, 2, 16).unwrap()
    }

    #[test]
    fn test_symbol_parsing() {
        let expected = [
            ('X', TriggerSymbol::DontCare),
            ('h', TriggerSymbol::High),
            ('1', TriggerSymbol::High),
            ('L', TriggerSymbol::Low),
            ('0', TriggerSymbol::Low),
            ('R', TriggerSymbol::RisingEdge),
            ('F', TriggerSymbol::FallingEdge),
            ('C', TriggerSymbol::EitherEdge),
        ];
        for (c, symbol) in expected {
            assert_eq!(TriggerSymbol::try_from(c).unwrap(), symbol);
        }
        assert!(matches!(
            TriggerSymbol::try_from('Q'),
            Err(TriggerConfigError::InvalidSymbol { symbol: 'Q' })
        ));
    }

    #[test]
    fn test_symbol_indices() {
        let symbols = [
            TriggerSymbol::DontCare,
            TriggerSymbol::High,
            TriggerSymbol::Low,
            TriggerSymbol::RisingEdge,
            TriggerSymbol::FallingEdge,
            TriggerSymbol::EitherEdge,
        ];
        for (expected, symbol) in symbols.iter().enumerate() {
            assert_eq!(symbol.index(), expected);
        }
    }

    #[test]
    fn test_pattern_left_padding() {
        let pattern = TriggerPattern::parse("R1", 6).unwrap();
        assert_eq!(pattern.width(), 6);
        assert_eq!(pattern.to_string(), "XXXXRH");
        assert_eq!(pattern.bit(0), TriggerSymbol::High);
        assert_eq!(pattern.bit(1), TriggerSymbol::RisingEdge);
        assert_eq!(pattern.bit(5), TriggerSymbol::DontCare);
    }

    #[test]
    fn test_pattern_too_wide() {
        assert!(matches!(
            TriggerPattern::parse("XXXXX", 4),
            Err(TriggerConfigError::PatternTooWide { sample_width: 4, .. })
        ));
    }

    #[test]
    fn test_polarity() {
        assert!(Polarity::Normal.apply(true, Operation::Or));
        assert!(!Polarity::Inverted.apply(true, Operation::And));
        assert!(Polarity::Disabled.apply(false, Operation::And));
        assert!(!Polarity::Disabled.apply(true, Operation::Or));
    }

    #[test]
    fn test_step_builder() {
        let step = TriggerStep::when(&narrow())
            .matches(0, "XXR")
            .does_not_match(1, "HL")
            .any()
            .contiguous()
            .times(7)
            .build()
            .unwrap();

        assert_eq!(step.patterns[0].0.to_string(), "XXXR");
        assert_eq!(step.patterns[1], (TriggerPattern::parse("HL", 4).unwrap(), Polarity::Inverted));
        assert_eq!(step.operation, Operation::Or);
        assert!(step.contiguous);
        assert_eq!(step.match_count, 7);
        assert_eq!(
            step.to_string(),
            "Or  T0[XXXR, Normal  ] T1[XXHL, Inverted] Contiguous Count = 7"
        );
    }

    #[test]
    fn test_step_builder_defaults_to_disabled() {
        let step = TriggerStep::when(&narrow()).matches(1, "1").build().unwrap();
        assert_eq!(step.patterns[0].1, Polarity::Disabled);
        assert_eq!(step.patterns[1].1, Polarity::Normal);
        assert_eq!(step.match_count, 1);
    }

    #[test]
    fn test_step_builder_rejects_bad_index() {
        let result = TriggerStep::when(&narrow()).matches(2, "1").build();
        assert!(matches!(
            result,
            Err(TriggerConfigError::PatternIndexOutOfRange { index: 2, arity: 2 })
        ));
    }

    #[test]
    fn test_program_from_steps() {
        let geometry = narrow();
        let step = TriggerStep::when(&geometry).matches(0, "H").times(3).build().unwrap();
        let program = TriggerProgram::from_steps(
            geometry,
            vec![step.clone(), step],
            CaptureConfig::default(),
        )
        .unwrap();

        assert_eq!(program.last_active_step(), 1);
        assert_eq!(program.steps().len(), 4);
        assert_eq!(program.active_steps().len(), 2);
        assert_eq!(program.step(3), Some(&TriggerStep::neutral(&geometry)));
    }

    #[test]
    fn test_program_rejects_mismatched_step() {
        let step = TriggerStep::when(&AnalyserGeometry::default()).build().unwrap();
        let mut program = TriggerProgram::new(narrow(), CaptureConfig::default());
        assert!(matches!(
            program.set_step(0, step),
            Err(TriggerConfigError::GeometryMismatch)
        ));
        assert!(program.set_last_active_step(4).is_err());
        assert!(TriggerProgram::from_steps(narrow(), Vec::new(), CaptureConfig::default()).is_err());
    }
}
