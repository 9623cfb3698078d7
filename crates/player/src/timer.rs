use std::time::Duration;

/// Whole-run step duration totals.
#[derive(Debug, Default)]
pub struct StepTimer {
    total: Duration,
    steps: usize,
    max: Duration,
}

impl StepTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, dt: Duration) {
        self.total += dt;
        self.steps += 1;
        self.max = self.max.max(dt);
    }

    /// Mean over the whole run.
    pub fn mean(&self) -> Duration {
        if self.steps == 0 {
            return Duration::ZERO;
        }
        Duration::from_nanos((self.total.as_nanos() / self.steps as u128) as u64)
    }

    pub fn max(&self) -> Duration {
        self.max
    }
}
