//! Second-order IIR filter with RBJ cookbook coefficients.

use std::f32::consts::PI;

/// Normalized biquad coefficients (`a0` divided out).
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Coefficients {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
}

impl Coefficients {
    /// Pass-through coefficients.
    pub const IDENTITY: Self = Self {
        b0: 1.0,
        b1: 0.0,
        b2: 0.0,
        a1: 0.0,
        a2: 0.0,
    };

    fn normalized(b0: f32, b1: f32, b2: f32, a0: f32, a1: f32, a2: f32) -> Self {
        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }

    fn omega(sample_rate: u32, frequency: f32) -> (f32, f32) {
        // Keep the corner below Nyquist so low sample rates stay stable
        let w0 = 2.0 * PI * (frequency / sample_rate as f32).clamp(0.0, 0.49);
        (w0.cos(), w0.sin())
    }

    /// Low shelf with shelf slope `slope` (1.0 = steepest monotonic).
    pub fn low_shelf(sample_rate: u32, frequency: f32, slope: f32, gain_db: f32) -> Self {
        let a = 10f32.powf(gain_db / 40.0);
        let (cos_w0, sin_w0) = Self::omega(sample_rate, frequency);
        let alpha = sin_w0 / 2.0 * ((a + 1.0 / a) * (1.0 / slope - 1.0) + 2.0).sqrt();
        let two_sqrt_a_alpha = 2.0 * a.sqrt() * alpha;

        Self::normalized(
            a * ((a + 1.0) - (a - 1.0) * cos_w0 + two_sqrt_a_alpha),
            2.0 * a * ((a - 1.0) - (a + 1.0) * cos_w0),
            a * ((a + 1.0) - (a - 1.0) * cos_w0 - two_sqrt_a_alpha),
            (a + 1.0) + (a - 1.0) * cos_w0 + two_sqrt_a_alpha,
            -2.0 * ((a - 1.0) + (a + 1.0) * cos_w0),
            (a + 1.0) + (a - 1.0) * cos_w0 - two_sqrt_a_alpha,
        )
    }

    /// High shelf with shelf slope `slope`.
    pub fn high_shelf(sample_rate: u32, frequency: f32, slope: f32, gain_db: f32) -> Self {
        let a = 10f32.powf(gain_db / 40.0);
        let (cos_w0, sin_w0) = Self::omega(sample_rate, frequency);
        let alpha = sin_w0 / 2.0 * ((a + 1.0 / a) * (1.0 / slope - 1.0) + 2.0).sqrt();
        let two_sqrt_a_alpha = 2.0 * a.sqrt() * alpha;

        Self::normalized(
            a * ((a + 1.0) + (a - 1.0) * cos_w0 + two_sqrt_a_alpha),
            -2.0 * a * ((a - 1.0) + (a + 1.0) * cos_w0),
            a * ((a + 1.0) + (a - 1.0) * cos_w0 - two_sqrt_a_alpha),
            (a + 1.0) - (a - 1.0) * cos_w0 + two_sqrt_a_alpha,
            2.0 * ((a - 1.0) - (a + 1.0) * cos_w0),
            (a + 1.0) - (a - 1.0) * cos_w0 - two_sqrt_a_alpha,
        )
    }

    /// Peaking EQ centered on `frequency` with quality `q`.
    pub fn peaking(sample_rate: u32, frequency: f32, q: f32, gain_db: f32) -> Self {
        let a = 10f32.powf(gain_db / 40.0);
        let (cos_w0, sin_w0) = Self::omega(sample_rate, frequency);
        let alpha = sin_w0 / (2.0 * q.max(0.1));

        Self::normalized(
            1.0 + alpha * a,
            -2.0 * cos_w0,
            1.0 - alpha * a,
            1.0 + alpha / a,
            -2.0 * cos_w0,
            1.0 - alpha / a,
        )
    }

    /// Magnitude response at DC (0 Hz).
    #[cfg(test)]
    pub fn dc_gain(&self) -> f32 {
        (self.b0 + self.b1 + self.b2) / (1.0 + self.a1 + self.a2)
    }

    /// Magnitude response at Nyquist.
    #[cfg(test)]
    pub fn nyquist_gain(&self) -> f32 {
        (self.b0 - self.b1 + self.b2) / (1.0 - self.a1 + self.a2)
    }
}

/// Direct form I history for one channel.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct BiquadState {
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

impl BiquadState {
    #[inline]
    pub fn process(&mut self, c: &Coefficients, x: f32) -> f32 {
        let y = c.b0 * x + c.b1 * self.x1 + c.b2 * self.x2 - c.a1 * self.y1 - c.a2 * self.y2;
        self.x2 = self.x1;
        self.x1 = x;
        self.y2 = self.y1;
        self.y1 = y;
        y
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db(gain: f32) -> f32 {
        20.0 * gain.abs().log10()
    }

    #[test]
    fn test_identity_passes_through() {
        let mut state = BiquadState::default();
        for x in [0.5, -0.25, 1.0, 0.0] {
            assert_eq!(state.process(&Coefficients::IDENTITY, x), x);
        }
    }

    #[test]
    fn test_low_shelf_boosts_dc() {
        let c = Coefficients::low_shelf(48000, 100.0, 0.707, 12.0);
        assert!((db(c.dc_gain()) - 12.0).abs() < 0.05);
        assert!(db(c.nyquist_gain()).abs() < 0.05);
    }

    #[test]
    fn test_high_shelf_boosts_nyquist() {
        let c = Coefficients::high_shelf(48000, 8000.0, 1.0, -6.0);
        assert!((db(c.nyquist_gain()) + 6.0).abs() < 0.05);
        assert!(db(c.dc_gain()).abs() < 0.05);
    }

    #[test]
    fn test_peaking_leaves_extremes_alone() {
        let c = Coefficients::peaking(48000, 1000.0, 1.0, 9.0);
        assert!(db(c.dc_gain()).abs() < 0.05);
        assert!(db(c.nyquist_gain()).abs() < 0.05);
    }

    #[test]
    fn test_zero_gain_is_flat() {
        for c in [
            Coefficients::low_shelf(44100, 80.0, 1.0, 0.0),
            Coefficients::peaking(44100, 1000.0, 1.0, 0.0),
            Coefficients::high_shelf(44100, 8000.0, 1.0, 0.0),
        ] {
            assert!((c.dc_gain() - 1.0).abs() < 1e-4);
            assert!((c.nyquist_gain() - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_step_response_settles_to_dc_gain() {
        let c = Coefficients::low_shelf(48000, 100.0, 0.707, 6.0);
        let mut state = BiquadState::default();
        let mut y = 0.0;
        for _ in 0..48000 {
            y = state.process(&c, 1.0);
        }
        assert!((y - c.dc_gain()).abs() < 1e-3);
    }
}
