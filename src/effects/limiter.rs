use super::{db_to_linear, EffectKernel, ParamSpec};

const PARAMS: &[ParamSpec] = &[ParamSpec::new("threshold_db", -12.0, 0.0, -0.5)];

/// Brick-wall limiter: every sample is clamped to `±10^(threshold_db/20)`.
///
/// The limiter holds no per-channel state, so it is always ready to process.
#[derive(Debug, Clone)]
pub struct Limiter {
    enabled: bool,
    threshold_db: f32,
    ceiling: f32,
}

impl Limiter {
    /// Creates a limiter at -0.5 dBFS.
    pub fn new() -> Self {
        let threshold_db = PARAMS[0].default;
        Self {
            enabled: true,
            threshold_db,
            ceiling: db_to_linear(threshold_db),
        }
    }

    /// Sets the threshold in dB.
    #[must_use]
    pub fn with_threshold_db(mut self, db: f32) -> Self {
        self.set_threshold_db(db);
        self
    }

    /// Threshold in dB.
    pub fn threshold_db(&self) -> f32 {
        self.threshold_db
    }

    /// Linear ceiling derived from the threshold.
    pub fn ceiling(&self) -> f32 {
        self.ceiling
    }

    /// Sets the threshold, clamped to -12..=0 dB.
    pub fn set_threshold_db(&mut self, db: f32) {
        self.threshold_db = PARAMS[0].clamp(db);
        self.ceiling = db_to_linear(self.threshold_db);
    }
}

impl Default for Limiter {
    fn default() -> Self {
        Self::new()
    }
}

impl EffectKernel for Limiter {
    fn name(&self) -> &'static str {
        "Limiter"
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn params(&self) -> &'static [ParamSpec] {
        PARAMS
    }

    fn param(&self, name: &str) -> Option<f32> {
        (name == "threshold_db").then_some(self.threshold_db)
    }

    fn write_param(&mut self, name: &str, value: f32) -> bool {
        if name != "threshold_db" {
            return false;
        }
        self.set_threshold_db(value);
        true
    }

    fn prepare(&mut self, _sample_rate: u32, _channels: usize) {}

    fn release(&mut self) {}

    fn is_prepared(&self) -> bool {
        true
    }

    fn process(&mut self, block: &mut [f32]) {
        let ceiling = self.ceiling;
        for sample in block.iter_mut() {
            *sample = sample.clamp(-ceiling, ceiling);
        }
    }
}
