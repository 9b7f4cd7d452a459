//! Fixed-step simulation clock.
//!
//! The arena runs headless, so time is derived from the tick count instead
//! of the wall clock. Every run with the same tick rate is reproducible.

/// Fixed timestep clock.
#[derive(Debug, Clone)]
pub struct SimClock {
    /// Ticks advanced so far
    tick: u64,
    /// Seconds per tick
    fixed_dt: f32,
}

impl Default for SimClock {
    fn default() -> Self {
        Self::new(20)
    }
}

impl SimClock {
    /// Creates a clock ticking `tick_rate` times per simulated second.
    #[must_use]
    pub fn new(tick_rate: u32) -> Self {
        let tick_rate = tick_rate.max(1);
        Self {
            tick: 0,
            fixed_dt: 1.0 / tick_rate as f32,
        }
    }

    /// Seconds per tick.
    #[must_use]
    pub fn fixed_dt(&self) -> f32 {
        self.fixed_dt
    }

    /// Ticks advanced so far.
    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.tick
    }

    /// Current simulated time in seconds.
    #[must_use]
    pub fn now(&self) -> f64 {
        self.tick as f64 * f64::from(self.fixed_dt)
    }

    /// Advances one tick and returns the new time.
    pub fn advance(&mut self) -> f64 {
        self.tick += 1;
        self.now()
    }

    /// Number of ticks covering `seconds`.
    #[must_use]
    pub fn ticks_for(&self, seconds: f32) -> u64 {
        (seconds.max(0.0) / self.fixed_dt).ceil() as u64
    }
}
