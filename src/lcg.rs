//! Seeded linear congruential generator
//!
//! Used wherever reproducibility matters more than statistical quality:
//! initial layout jitter, fallback embedding vectors, and weight init for
//! representation learning.

/// 32-bit LCG with the Numerical Recipes constants.
#[derive(Debug, Clone)]
pub struct Lcg {
    state: u32,
}

impl Lcg {
    const MULTIPLIER: u32 = 1_664_525;
    const INCREMENT: u32 = 1_013_904_223;

    pub fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    /// Seed derived from the character codes of `text`
    pub fn from_text(text: &str) -> Self {
        let seed = text
            .chars()
            .fold(0u32, |acc, c| acc.wrapping_mul(31).wrapping_add(c as u32));
        Self::new(seed)
    }

    pub fn next_u32(&mut self) -> u32 {
        self.state = self
            .state
            .wrapping_mul(Self::MULTIPLIER)
            .wrapping_add(Self::INCREMENT);
        self.state
    }

    /// Uniform in [0, 1)
    pub fn next_f64(&mut self) -> f64 {
        self.next_u32() as f64 / 4_294_967_296.0
    }

    /// Uniform in [-1, 1)
    pub fn next_signed(&mut self) -> f64 {
        self.next_f64() * 2.0 - 1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_sequence() {
        let mut a = Lcg::new(42);
        let mut b = Lcg::new(42);
        for _ in 0..100 {
            assert_eq!(a.next_u32(), b.next_u32());
        }
    }

    #[test]
    fn values_in_range() {
        let mut rng = Lcg::new(7);
        for _ in 0..1000 {
            let v = rng.next_f64();
            assert!((0.0..1.0).contains(&v));
            let s = rng.next_signed();
            assert!((-1.0..1.0).contains(&s));
        }
    }

    #[test]
    fn text_seed_depends_on_content() {
        assert_eq!(Lcg::from_text("abc").next_u32(), Lcg::from_text("abc").next_u32());
        assert_ne!(Lcg::from_text("abc").next_u32(), Lcg::from_text("abd").next_u32());
    }
}
