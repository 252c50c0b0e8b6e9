use super::biquad::{BiquadState, Coefficients};
use super::{EffectKernel, ParamSpec};

const LOW_FREQUENCY: f32 = 80.0;
const MID_FREQUENCY: f32 = 1000.0;
const HIGH_FREQUENCY: f32 = 8000.0;
const BAND_Q: f32 = 1.0;

const PARAMS: &[ParamSpec] = &[
    ParamSpec::new("low_db", -12.0, 12.0, 0.0),
    ParamSpec::new("mid_db", -12.0, 12.0, 0.0),
    ParamSpec::new("high_db", -12.0, 12.0, 0.0),
];

/// Three-band equalizer: 80 Hz low shelf, 1 kHz peak, 8 kHz high shelf.
#[derive(Debug, Clone)]
pub struct Equalizer {
    enabled: bool,
    gains: [f32; 3],
    sample_rate: u32,
    bands: [Coefficients; 3],
    states: Vec<[BiquadState; 3]>,
}

impl Equalizer {
    /// Creates a flat equalizer.
    pub fn new() -> Self {
        Self {
            enabled: true,
            gains: [0.0; 3],
            sample_rate: 0,
            bands: [Coefficients::IDENTITY; 3],
            states: Vec::new(),
        }
    }

    /// Sets all three band gains in dB.
    #[must_use]
    pub fn with_gains(mut self, low_db: f32, mid_db: f32, high_db: f32) -> Self {
        self.set_low_db(low_db);
        self.set_mid_db(mid_db);
        self.set_high_db(high_db);
        self
    }

    /// Low band gain in dB.
    pub fn low_db(&self) -> f32 {
        self.gains[0]
    }

    /// Mid band gain in dB.
    pub fn mid_db(&self) -> f32 {
        self.gains[1]
    }

    /// High band gain in dB.
    pub fn high_db(&self) -> f32 {
        self.gains[2]
    }

    /// Sets the low shelf gain, clamped to ±12 dB.
    pub fn set_low_db(&mut self, db: f32) {
        self.set_band(0, db);
    }

    /// Sets the mid peak gain, clamped to ±12 dB.
    pub fn set_mid_db(&mut self, db: f32) {
        self.set_band(1, db);
    }

    /// Sets the high shelf gain, clamped to ±12 dB.
    pub fn set_high_db(&mut self, db: f32) {
        self.set_band(2, db);
    }

    fn set_band(&mut self, band: usize, db: f32) {
        self.gains[band] = PARAMS[band].clamp(db);
        self.update_coefficients();
    }

    fn update_coefficients(&mut self) {
        if self.sample_rate == 0 {
            return;
        }
        let sr = self.sample_rate;
        self.bands = [
            Coefficients::low_shelf(sr, LOW_FREQUENCY, BAND_Q, self.gains[0]),
            Coefficients::peaking(sr, MID_FREQUENCY, BAND_Q, self.gains[1]),
            Coefficients::high_shelf(sr, HIGH_FREQUENCY, BAND_Q, self.gains[2]),
        ];
    }
}

impl Default for Equalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl EffectKernel for Equalizer {
    fn name(&self) -> &'static str {
        "Equalizer"
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
        PARAMS
            .iter()
            .position(|p| p.name == name)
            .map(|band| self.gains[band])
    }

    fn write_param(&mut self, name: &str, value: f32) -> bool {
        match PARAMS.iter().position(|p| p.name == name) {
            Some(band) => {
                self.set_band(band, value);
                true
            }
            None => false,
        }
    }

    fn prepare(&mut self, sample_rate: u32, channels: usize) {
        self.sample_rate = sample_rate;
        self.states = vec![[BiquadState::default(); 3]; channels];
        self.update_coefficients();
    }

    fn release(&mut self) {
        self.sample_rate = 0;
        self.states = Vec::new();
    }

    fn is_prepared(&self) -> bool {
        !self.states.is_empty()
    }

    fn process(&mut self, block: &mut [f32]) {
        if self.states.is_empty() {
            return;
        }
        let channels = self.states.len();
        for (i, sample) in block.iter_mut().enumerate() {
            let state = &mut self.states[i % channels];
            let mut x = *sample;
            for (band, coefficients) in self.bands.iter().enumerate() {
                x = state[band].process(coefficients, x);
            }
            *sample = x;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_is_transparent() {
        let mut eq = Equalizer::new();
        eq.prepare(44100, 2);
        let input: Vec<f32> = (0..256).map(|i| ((i * 7) % 13) as f32 / 13.0 - 0.5).collect();
        let mut block = input.clone();
        eq.process(&mut block);
        for (a, b) in input.iter().zip(&block) {
            assert!((a - b).abs() < 1e-4);
        }
    }

    #[test]
    fn test_low_cut_attenuates_dc() {
        let mut eq = Equalizer::new().with_gains(-12.0, 0.0, 0.0);
        eq.prepare(48000, 1);
        let mut block = vec![1.0f32; 48000];
        eq.process(&mut block);
        let settled = block[47999];
        assert!((settled - 10f32.powf(-12.0 / 20.0)).abs() < 0.01, "{settled}");
    }

    #[test]
    fn test_param_names_map_to_bands() {
        let mut eq = Equalizer::new();
        assert!(eq.write_param("mid_db", 3.0));
        assert!(eq.write_param("high_db", -20.0));
        assert_eq!(eq.mid_db(), 3.0);
        assert_eq!(eq.high_db(), -12.0);
        assert_eq!(eq.param("low_db"), Some(0.0));
        assert!(!eq.write_param("presence_db", 1.0));
    }
}
