use std::hint;

/// Pure pause-spin backoff used by the ring's blocking variants.
///
/// Progressively increases the number of pause hints per call, capped once
/// `step` reaches `SPIN_LIMIT`. Never yields to the OS scheduler, parks, or
/// sleeps — see the module-level docs on `Ring` for why busy-waiting is the
/// point of this design.
#[derive(Debug)]
pub struct Backoff {
    step: u32,
}

impl Backoff {
    const SPIN_LIMIT: u32 = 6;

    /// Creates a fresh backoff state.
    #[inline]
    pub fn new() -> Self {
        Self { step: 0 }
    }

    /// One unit of backoff: spin with a pause hint, doubling the spin count
    /// each call up to `SPIN_LIMIT`, then holding steady there.
    #[inline]
    pub fn snooze(&mut self) {
        let spins = 1u32 << self.step;
        for _ in 0..spins {
            hint::spin_loop();
        }
        if self.step < Self::SPIN_LIMIT {
            self.step += 1;
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}
