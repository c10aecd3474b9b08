use rand::Rng;

/// The `!work` flat payout: punch the clock, get paid, no cooldown.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct WorkPolicy {
    pub max_payout: i64,
}

impl Default for WorkPolicy {
    fn default() -> Self {
        Self { max_payout: 100 }
    }
}

impl WorkPolicy {
    pub fn new(max_payout: i64) -> Self {
        Self {
            max_payout: max_payout.max(1),
        }
    }

    /// Amount earned for one shift, uniform in `[1, max_payout]`.
    pub fn roll<R: Rng + ?Sized>(&self, rng: &mut R) -> i64 {
        rng.gen_range(1..=self.max_payout.max(1))
    }
}
