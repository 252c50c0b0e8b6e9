use super::{db_to_linear, linear_to_db, EffectKernel, ParamSpec};

const PARAMS: &[ParamSpec] = &[
    ParamSpec::new("threshold_db", -60.0, 0.0, -20.0),
    ParamSpec::new("ratio", 1.0, 20.0, 4.0),
    ParamSpec::new("attack_ms", 0.1, 100.0, 5.0),
    ParamSpec::new("release_ms", 10.0, 1000.0, 50.0),
    ParamSpec::new("makeup_db", 0.0, 24.0, 0.0),
];

/// Feed-forward downward compressor with a per-channel peak envelope.
///
/// The envelope rises with the attack coefficient and falls with the
/// release coefficient. Above threshold, gain is reduced by
/// `excess_db * (1 - 1/ratio)`. Makeup gain is applied to every sample.
#[derive(Debug, Clone)]
pub struct Compressor {
    enabled: bool,
    threshold_db: f32,
    ratio: f32,
    attack_ms: f32,
    release_ms: f32,
    makeup_db: f32,
    sample_rate: u32,
    attack_coeff: f32,
    release_coeff: f32,
    envelopes: Vec<f32>,
}

/// Smoothing coefficient for a one-pole follower with the given time constant.
fn time_coefficient(sample_rate: u32, ms: f32) -> f32 {
    (-1.0 / (sample_rate as f32 * ms / 1000.0)).exp()
}

impl Compressor {
    /// Creates a compressor at -20 dB, 4:1, 5 ms attack, 50 ms release.
    pub fn new() -> Self {
        Self {
            enabled: true,
            threshold_db: PARAMS[0].default,
            ratio: PARAMS[1].default,
            attack_ms: PARAMS[2].default,
            release_ms: PARAMS[3].default,
            makeup_db: PARAMS[4].default,
            sample_rate: 0,
            attack_coeff: 0.0,
            release_coeff: 0.0,
            envelopes: Vec::new(),
        }
    }

    /// Sets the threshold in dB.
    #[must_use]
    pub fn with_threshold_db(mut self, db: f32) -> Self {
        self.threshold_db = PARAMS[0].clamp(db);
        self
    }

    /// Sets the compression ratio.
    #[must_use]
    pub fn with_ratio(mut self, ratio: f32) -> Self {
        self.ratio = PARAMS[1].clamp(ratio);
        self
    }

    /// Sets the attack time in milliseconds.
    #[must_use]
    pub fn with_attack_ms(mut self, ms: f32) -> Self {
        self.set_attack_ms(ms);
        self
    }

    /// Sets the release time in milliseconds.
    #[must_use]
    pub fn with_release_ms(mut self, ms: f32) -> Self {
        self.set_release_ms(ms);
        self
    }

    /// Sets the makeup gain in dB.
    #[must_use]
    pub fn with_makeup_db(mut self, db: f32) -> Self {
        self.makeup_db = PARAMS[4].clamp(db);
        self
    }

    /// Threshold in dB.
    pub fn threshold_db(&self) -> f32 {
        self.threshold_db
    }

    /// Compression ratio.
    pub fn ratio(&self) -> f32 {
        self.ratio
    }

    /// Attack time in milliseconds.
    pub fn attack_ms(&self) -> f32 {
        self.attack_ms
    }

    /// Release time in milliseconds.
    pub fn release_ms(&self) -> f32 {
        self.release_ms
    }

    /// Makeup gain in dB.
    pub fn makeup_db(&self) -> f32 {
        self.makeup_db
    }

    /// Sets the threshold, clamped to -60..=0 dB.
    pub fn set_threshold_db(&mut self, db: f32) {
        self.threshold_db = PARAMS[0].clamp(db);
    }

    /// Sets the ratio, clamped to 1..=20.
    pub fn set_ratio(&mut self, ratio: f32) {
        self.ratio = PARAMS[1].clamp(ratio);
    }

    /// Sets the makeup gain, clamped to 0..=24 dB.
    pub fn set_makeup_db(&mut self, db: f32) {
        self.makeup_db = PARAMS[4].clamp(db);
    }

    /// Sets the attack time, clamped to 0.1..=100 ms.
    pub fn set_attack_ms(&mut self, ms: f32) {
        self.attack_ms = PARAMS[2].clamp(ms);
        self.update_coefficients();
    }

    /// Sets the release time, clamped to 10..=1000 ms.
    pub fn set_release_ms(&mut self, ms: f32) {
        self.release_ms = PARAMS[3].clamp(ms);
        self.update_coefficients();
    }

    fn update_coefficients(&mut self) {
        if self.sample_rate > 0 {
            self.attack_coeff = time_coefficient(self.sample_rate, self.attack_ms);
            self.release_coeff = time_coefficient(self.sample_rate, self.release_ms);
        }
    }
}

impl Default for Compressor {
    fn default() -> Self {
        Self::new()
    }
}

impl EffectKernel for Compressor {
    fn name(&self) -> &'static str {
        "Compressor"
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
        match name {
            "threshold_db" => Some(self.threshold_db),
            "ratio" => Some(self.ratio),
            "attack_ms" => Some(self.attack_ms),
            "release_ms" => Some(self.release_ms),
            "makeup_db" => Some(self.makeup_db),
            _ => None,
        }
    }

    fn write_param(&mut self, name: &str, value: f32) -> bool {
        match name {
            "threshold_db" => self.set_threshold_db(value),
            "ratio" => self.set_ratio(value),
            "attack_ms" => self.set_attack_ms(value),
            "release_ms" => self.set_release_ms(value),
            "makeup_db" => self.set_makeup_db(value),
            _ => return false,
        }
        true
    }

    fn prepare(&mut self, sample_rate: u32, channels: usize) {
        self.sample_rate = sample_rate;
        self.envelopes = vec![0.0; channels];
        self.update_coefficients();
    }

    fn release(&mut self) {
        self.sample_rate = 0;
        self.envelopes = Vec::new();
    }

    fn is_prepared(&self) -> bool {
        !self.envelopes.is_empty()
    }

    fn process(&mut self, block: &mut [f32]) {
        if self.envelopes.is_empty() {
            return;
        }
        let channels = self.envelopes.len();
        let threshold = db_to_linear(self.threshold_db);
        let makeup = db_to_linear(self.makeup_db);
        let slope = 1.0 - 1.0 / self.ratio;

        for (i, sample) in block.iter_mut().enumerate() {
            let envelope = &mut self.envelopes[i % channels];
            let level = sample.abs();
            let coeff = if level > *envelope {
                self.attack_coeff
            } else {
                self.release_coeff
            };
            *envelope = coeff * *envelope + (1.0 - coeff) * level;

            let mut gain = 1.0;
            if *envelope > threshold {
                let excess_db = linear_to_db(*envelope / threshold);
                gain = db_to_linear(-excess_db * slope);
            }
            *sample *= gain * makeup;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn steady_peak(compressor: &mut Compressor, amplitude: f32) -> f32 {
        let mut block = vec![amplitude; 48000];
        compressor.process(&mut block);
        block[47999]
    }

    #[test]
    fn test_below_threshold_is_untouched() {
        let mut comp = Compressor::new();
        comp.prepare(48000, 1);
        // -40 dB, well under the -20 dB threshold
        let out = steady_peak(&mut comp, 0.01);
        assert!((out - 0.01).abs() < 1e-6);
    }

    #[test]
    fn test_reduces_gain_above_threshold() {
        let mut comp = Compressor::new().with_threshold_db(-20.0).with_ratio(4.0);
        comp.prepare(48000, 1);
        // 0 dBFS input: 20 dB excess, 4:1 keeps 5 dB of it → -15 dB out
        let out = steady_peak(&mut comp, 1.0);
        assert!((linear_to_db(out) + 15.0).abs() < 0.1, "{}", linear_to_db(out));
    }

    #[test]
    fn test_unity_ratio_never_compresses() {
        let mut comp = Compressor::new().with_ratio(1.0);
        comp.prepare(48000, 1);
        let out = steady_peak(&mut comp, 0.9);
        assert!((out - 0.9).abs() < 1e-5);
    }

    #[test]
    fn test_makeup_is_always_applied() {
        let mut comp = Compressor::new().with_makeup_db(6.0);
        comp.prepare(48000, 1);
        let out = steady_peak(&mut comp, 0.01);
        assert!((out - 0.01 * db_to_linear(6.0)).abs() < 1e-5);
    }

    #[test]
    fn test_every_parameter_has_builder_and_setter() {
        let built = Compressor::new()
            .with_threshold_db(-30.0)
            .with_ratio(8.0)
            .with_attack_ms(1.0)
            .with_release_ms(200.0)
            .with_makeup_db(3.0);

        let mut set = Compressor::new();
        set.set_threshold_db(-30.0);
        set.set_ratio(8.0);
        set.set_attack_ms(1.0);
        set.set_release_ms(200.0);
        set.set_makeup_db(3.0);

        for comp in [&built, &set] {
            assert_eq!(comp.threshold_db(), -30.0);
            assert_eq!(comp.ratio(), 8.0);
            assert_eq!(comp.attack_ms(), 1.0);
            assert_eq!(comp.release_ms(), 200.0);
            assert_eq!(comp.makeup_db(), 3.0);
        }

        // Out-of-range values clamp
        set.set_threshold_db(-90.0);
        set.set_ratio(0.5);
        set.set_makeup_db(40.0);
        assert_eq!(set.threshold_db(), -60.0);
        assert_eq!(set.ratio(), 1.0);
        assert_eq!(set.makeup_db(), 24.0);
        assert_eq!(Compressor::new().with_attack_ms(500.0).attack_ms(), 100.0);
    }

    #[test]
    fn test_attack_applies_after_prepare() {
        let mut fast = Compressor::new().with_attack_ms(0.1);
        let mut slow = Compressor::new().with_attack_ms(100.0);
        fast.prepare(48000, 1);
        slow.prepare(48000, 1);

        // 1 ms of full scale: the fast attack has clamped down further
        let mut a = vec![1.0; 48];
        let mut b = vec![1.0; 48];
        fast.process(&mut a);
        slow.process(&mut b);
        assert!(a[47] < b[47]);
    }

    #[test]
    fn test_time_coefficient() {
        let c = time_coefficient(48000, 5.0);
        assert!((c - (-1.0f32 / 240.0).exp()).abs() < 1e-7);
    }
}
