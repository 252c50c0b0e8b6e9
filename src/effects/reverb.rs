use super::{EffectKernel, ParamSpec};

const COMB_LENGTHS: [usize; 8] = [1557, 1617, 1491, 1422, 1277, 1356, 1188, 1116];
const COMB_FEEDBACK: f32 = 0.3;
const TAP_GAIN: f32 = 0.5;

const PARAMS: &[ParamSpec] = &[
    ParamSpec::new("wet", 0.0, 1.0, 0.3),
    ParamSpec::new("room_size", 0.0, 1.0, 0.5),
];

/// Comb-bank reverb.
///
/// Eight parallel combs per channel, scaled by `0.5 + room_size`. Comb
/// lengths are in samples and do not depend on the sample rate.
#[derive(Debug, Clone)]
pub struct Reverb {
    enabled: bool,
    wet: f32,
    room_size: f32,
    lengths: [usize; 8],
    offsets: [usize; 8],
    channels: Vec<CombBank>,
}

/// All eight combs of one channel in a single buffer.
#[derive(Debug, Clone)]
struct CombBank {
    buffer: Vec<f32>,
    cursor: usize,
}

fn comb_lengths(room_size: f32) -> [usize; 8] {
    let scale = 0.5 + room_size;
    COMB_LENGTHS.map(|base| ((base as f32 * scale) as usize).max(1))
}

impl Reverb {
    /// Creates a reverb with 0.3 wet mix and a 0.5 room.
    pub fn new() -> Self {
        let mut reverb = Self {
            enabled: true,
            wet: PARAMS[0].default,
            room_size: PARAMS[1].default,
            lengths: [0; 8],
            offsets: [0; 8],
            channels: Vec::new(),
        };
        reverb.update_layout();
        reverb
    }

    /// Sets the wet/dry mix.
    #[must_use]
    pub fn with_wet(mut self, wet: f32) -> Self {
        self.set_wet(wet);
        self
    }

    /// Sets the room size.
    #[must_use]
    pub fn with_room_size(mut self, room_size: f32) -> Self {
        self.set_room_size(room_size);
        self
    }

    /// Wet/dry mix.
    pub fn wet(&self) -> f32 {
        self.wet
    }

    /// Room size.
    pub fn room_size(&self) -> f32 {
        self.room_size
    }

    /// Sets the wet mix, clamped to 0..=1.
    pub fn set_wet(&mut self, wet: f32) {
        self.wet = PARAMS[0].clamp(wet);
    }

    /// Sets the room size, clamped to 0..=1.
    ///
    /// On a prepared reverb this rebuilds (and silences) every comb.
    pub fn set_room_size(&mut self, room_size: f32) {
        self.room_size = PARAMS[1].clamp(room_size);
        self.update_layout();
        if !self.channels.is_empty() {
            let channels = self.channels.len();
            self.allocate(channels);
        }
    }

    fn update_layout(&mut self) {
        self.lengths = comb_lengths(self.room_size);
        let mut offset = 0;
        for (k, len) in self.lengths.iter().enumerate() {
            self.offsets[k] = offset;
            offset += len;
        }
    }

    fn allocate(&mut self, channels: usize) {
        let total: usize = self.lengths.iter().sum();
        self.channels = (0..channels)
            .map(|_| CombBank {
                buffer: vec![0.0; total],
                cursor: 0,
            })
            .collect();
    }
}

impl Default for Reverb {
    fn default() -> Self {
        Self::new()
    }
}

impl EffectKernel for Reverb {
    fn name(&self) -> &'static str {
        "Reverb"
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
            "wet" => Some(self.wet),
            "room_size" => Some(self.room_size),
            _ => None,
        }
    }

    fn write_param(&mut self, name: &str, value: f32) -> bool {
        match name {
            "wet" => self.set_wet(value),
            "room_size" => self.set_room_size(value),
            _ => return false,
        }
        true
    }

    fn prepare(&mut self, _sample_rate: u32, channels: usize) {
        self.allocate(channels);
    }

    fn release(&mut self) {
        self.channels = Vec::new();
    }

    fn is_prepared(&self) -> bool {
        !self.channels.is_empty()
    }

    fn process(&mut self, block: &mut [f32]) {
        if self.channels.is_empty() {
            return;
        }
        let channel_count = self.channels.len();
        let dry = 1.0 - self.wet;
        let mut taps = [0usize; 8];

        for (i, sample) in block.iter_mut().enumerate() {
            let bank = &mut self.channels[i % channel_count];
            let x = *sample;

            // Each comb's tap is skewed by its own segment offset
            let mut sum = 0.0;
            for k in 0..COMB_LENGTHS.len() {
                let offset = self.offsets[k];
                taps[k] = offset + (bank.cursor + offset) % self.lengths[k];
                sum += bank.buffer[taps[k]] * TAP_GAIN;
            }
            let reverb = sum / COMB_LENGTHS.len() as f32;

            for tap in taps {
                bank.buffer[tap] = x + reverb * COMB_FEEDBACK;
            }
            bank.cursor = (bank.cursor + 1) % self.lengths[0];

            *sample = x * dry + reverb * self.wet;
        }
    }
}
