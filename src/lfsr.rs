//! 16-bit maximal-length LFSR used to encode trigger match counts.
//!
//! The hardware counts matches with a shift register rather than a binary
//! counter, so a count `n` is loaded as the LFSR state reached after `n-1`
//! steps from the seed. Comparing "current state == target" then needs one
//! LUT bit per counter stage.

/// Toggle mask applied when the shifted-out bit is set
const TOGGLE_MASK: u16 = 0xB400;

/// Seed state; also the encoding of a count of 1
pub const SEED: u16 = 0x0001;

/// Next state of the right-shifting LFSR.
///
/// State 0 is a fixed point and never reached from [`SEED`].
pub fn next_state(state: u16) -> u16 {
    let lsb = state & 1;
    let shifted = state >> 1;
    if lsb == 1 {
        shifted ^ TOGGLE_MASK
    } else {
        shifted
    }
}

/// LFSR state corresponding to `count`.
///
/// `encode_count(1) == 1`. A count of 0 is clamped to 1, so a step with a
/// zero match count is satisfied by its first match.
pub fn encode_count(count: u16) -> u16 {
    let steps = usize::from(count.max(1)) - 1;
    Lfsr16::new().nth(steps).unwrap_or(SEED)
}

/// Iterator over the LFSR sequence starting at [`SEED`]
#[derive(Debug, Clone)]
pub struct Lfsr16 {
    state: u16,
}

impl Lfsr16 {
    pub fn new() -> Self {
        Self { state: SEED }
    }
}

impl Default for Lfsr16 {
    fn default() -> Self {
        Self::new()
    }
}

impl Iterator for Lfsr16 {
    type Item = u16;

    fn next(&mut self) -> Option<u16> {
        let current = self.state;
        self.state = next_state(current);
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Distinct non-zero states visited before the sequence repeats
    const PERIOD: u32 = 65535;

    #[test]
    fn test_encode_small_counts() {
        assert_eq!(encode_count(1), 1);
        assert_eq!(encode_count(2), 0xB400);
        assert_eq!(encode_count(3), 0x5A00);
        assert_eq!(encode_count(4), 0x2D00);
    }

    #[test]
    fn test_zero_count_clamps_to_one() {
        assert_eq!(encode_count(0), encode_count(1));
        assert_eq!(encode_count(0), SEED);
    }

    #[test]
    fn test_maximal_period() {
        let mut seen = vec![false; 1 << 16];
        let mut state = SEED;
        for _ in 0..PERIOD {
            assert_ne!(state, 0);
            assert!(!seen[usize::from(state)], "state {state:#06x} repeated early");
            seen[usize::from(state)] = true;
            state = next_state(state);
        }
        assert_eq!(state, SEED);
        assert!(!seen[0]);
    }

    #[test]
    fn test_encode_matches_sequence() {
        let sequence: Vec<u16> = Lfsr16::new().take(PERIOD as usize).collect();
        for count in [1u16, 2, 17, 100, 1000, 4096, 40000, 65534, 65535] {
            assert_eq!(encode_count(count), sequence[usize::from(count) - 1]);
        }
    }

    #[test]
    fn test_encodings_are_distinct() {
        let mut sorted: Vec<u16> = Lfsr16::new().take(PERIOD as usize).collect();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), PERIOD as usize);
    }
}
