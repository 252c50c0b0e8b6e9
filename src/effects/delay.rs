use super::{EffectKernel, ParamSpec};

const PARAMS: &[ParamSpec] = &[
    ParamSpec::new("delay_ms", 1.0, 2000.0, 250.0),
    ParamSpec::new("feedback", 0.0, 0.9, 0.3),
    ParamSpec::new("wet", 0.0, 1.0, 0.3),
];

/// Feedback delay with one circular line per channel.
///
/// Each sample reads the line at the cursor, writes `x + delayed * feedback`
/// back, and outputs `x * (1 - wet) + delayed * wet`. The line holds
/// `round(sample_rate * delay_ms / 1000)` samples, so an impulse comes back
/// exactly that many frames later.
#[derive(Debug, Clone)]
pub struct Delay {
    enabled: bool,
    delay_ms: f32,
    feedback: f32,
    wet: f32,
    sample_rate: u32,
    lines: Vec<DelayLine>,
}

#[derive(Debug, Clone)]
struct DelayLine {
    buffer: Vec<f32>,
    cursor: usize,
}

impl DelayLine {
    fn new(len: usize) -> Self {
        Self {
            buffer: vec![0.0; len],
            cursor: 0,
        }
    }
}

/// Delay line length in samples for `ms` at `sample_rate`; never zero.
pub(crate) fn delay_samples(sample_rate: u32, ms: f32) -> usize {
    let samples = (f64::from(sample_rate) * f64::from(ms) / 1000.0).round();
    (samples as usize).max(1)
}

impl Delay {
    /// Creates a 250 ms delay with 0.3 feedback and 0.3 wet mix.
    pub fn new() -> Self {
        Self {
            enabled: true,
            delay_ms: PARAMS[0].default,
            feedback: PARAMS[1].default,
            wet: PARAMS[2].default,
            sample_rate: 0,
            lines: Vec::new(),
        }
    }

    /// Sets the delay time in milliseconds.
    #[must_use]
    pub fn with_delay_ms(mut self, ms: f32) -> Self {
        self.set_delay_ms(ms);
        self
    }

    /// Sets the feedback amount.
    #[must_use]
    pub fn with_feedback(mut self, feedback: f32) -> Self {
        self.set_feedback(feedback);
        self
    }

    /// Sets the wet/dry mix (0 = dry only, 1 = delayed only).
    #[must_use]
    pub fn with_wet(mut self, wet: f32) -> Self {
        self.set_wet(wet);
        self
    }

    /// Delay time in milliseconds.
    pub fn delay_ms(&self) -> f32 {
        self.delay_ms
    }

    /// Feedback amount.
    pub fn feedback(&self) -> f32 {
        self.feedback
    }

    /// Wet/dry mix.
    pub fn wet(&self) -> f32 {
        self.wet
    }

    /// Sets the delay time, clamped to 1..=2000 ms.
    ///
    /// On a prepared delay this reallocates every line, dropping whatever
    /// was in flight.
    pub fn set_delay_ms(&mut self, ms: f32) {
        self.delay_ms = PARAMS[0].clamp(ms);
        if !self.lines.is_empty() {
            let channels = self.lines.len();
            self.allocate(channels);
        }
    }

    /// Sets the feedback, clamped to 0..=0.9.
    pub fn set_feedback(&mut self, feedback: f32) {
        self.feedback = PARAMS[1].clamp(feedback);
    }

    /// Sets the wet mix, clamped to 0..=1.
    pub fn set_wet(&mut self, wet: f32) {
        self.wet = PARAMS[2].clamp(wet);
    }

    /// Length of each line in samples, or `None` before `prepare`.
    pub fn line_len(&self) -> Option<usize> {
        self.lines.first().map(|line| line.buffer.len())
    }

    fn allocate(&mut self, channels: usize) {
        let len = delay_samples(self.sample_rate, self.delay_ms);
        self.lines = (0..channels).map(|_| DelayLine::new(len)).collect();
    }
}

impl Default for Delay {
    fn default() -> Self {
        Self::new()
    }
}

impl EffectKernel for Delay {
    fn name(&self) -> &'static str {
        "Delay"
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
            "delay_ms" => Some(self.delay_ms),
            "feedback" => Some(self.feedback),
            "wet" => Some(self.wet),
            _ => None,
        }
    }

    fn write_param(&mut self, name: &str, value: f32) -> bool {
        match name {
            "delay_ms" => self.set_delay_ms(value),
            "feedback" => self.set_feedback(value),
            "wet" => self.set_wet(value),
            _ => return false,
        }
        true
    }

    fn prepare(&mut self, sample_rate: u32, channels: usize) {
        self.sample_rate = sample_rate;
        self.allocate(channels);
    }

    fn release(&mut self) {
        self.lines = Vec::new();
    }

    fn is_prepared(&self) -> bool {
        !self.lines.is_empty()
    }

    fn process(&mut self, block: &mut [f32]) {
        if self.lines.is_empty() {
            return;
        }
        let channels = self.lines.len();
        let dry = 1.0 - self.wet;
        for (i, sample) in block.iter_mut().enumerate() {
            let line = &mut self.lines[i % channels];
            let x = *sample;
            let delayed = line.buffer[line.cursor];
            line.buffer[line.cursor] = x + delayed * self.feedback;
            line.cursor = (line.cursor + 1) % line.buffer.len();
            *sample = x * dry + delayed * self.wet;
        }
    }
}
