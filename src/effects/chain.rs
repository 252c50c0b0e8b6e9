//! Ordered effect chain owned by one sink.

use std::fmt;

use super::Effect;
use crate::format::AudioFormat;
use crate::EffectError;

/// Stable handle to an effect inside an [`EffectChain`].
///
/// Ids are never reused within a chain, so a stale id simply stops matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EffectId(u64);

impl EffectId {
    /// Raw numeric value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EffectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fx{}", self.0)
    }
}

/// Effects applied left to right to every rendered block.
///
/// A disabled chain (or an empty one) leaves blocks untouched. Disabled
/// effects stay in place and are skipped.
#[derive(Debug, Clone)]
pub struct EffectChain {
    enabled: bool,
    effects: Vec<(EffectId, Effect)>,
    next_id: u64,
    format: Option<AudioFormat>,
}

impl EffectChain {
    /// Creates an empty, enabled chain.
    pub fn new() -> Self {
        Self {
            enabled: true,
            effects: Vec::new(),
            next_id: 1,
            format: None,
        }
    }

    /// Whether the chain processes audio at all.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Enables or bypasses the whole chain.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Number of effects in the chain.
    pub fn len(&self) -> usize {
        self.effects.len()
    }

    /// Returns `true` if the chain holds no effects.
    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    /// Format the chain is currently prepared for.
    pub fn format(&self) -> Option<AudioFormat> {
        self.format
    }

    /// Appends an effect and returns its id.
    ///
    /// If the chain is already prepared the effect is prepared for the same
    /// format before it is inserted.
    pub fn add(&mut self, effect: impl Into<Effect>) -> EffectId {
        let mut effect = effect.into();
        if let Some(format) = &self.format {
            effect.prepare(format);
        }
        let id = EffectId(self.next_id);
        self.next_id += 1;
        tracing::debug!(effect = effect.name(), %id, "Effect added");
        self.effects.push((id, effect));
        id
    }

    /// Removes an effect, releasing its state.
    pub fn remove(&mut self, id: EffectId) -> Option<Effect> {
        let index = self.effects.iter().position(|(eid, _)| *eid == id)?;
        let (_, mut effect) = self.effects.remove(index);
        effect.release();
        tracing::debug!(effect = effect.name(), %id, "Effect removed");
        Some(effect)
    }

    /// Removes every effect.
    pub fn clear(&mut self) {
        for (_, effect) in &mut self.effects {
            effect.release();
        }
        self.effects.clear();
    }

    /// Looks up an effect by id.
    pub fn get(&self, id: EffectId) -> Option<&Effect> {
        self.effects
            .iter()
            .find(|(eid, _)| *eid == id)
            .map(|(_, effect)| effect)
    }

    /// Looks up an effect by id for modification.
    pub fn get_mut(&mut self, id: EffectId) -> Option<&mut Effect> {
        self.effects
            .iter_mut()
            .find(|(eid, _)| *eid == id)
            .map(|(_, effect)| effect)
    }

    /// Sets a named parameter on one effect, returning the clamped value.
    ///
    /// # Errors
    ///
    /// [`EffectError::EffectNotFound`] for an unknown id, or
    /// [`EffectError::UnknownParameter`] for a name the effect lacks.
    pub fn set_param(&mut self, id: EffectId, name: &str, value: f32) -> Result<f32, EffectError> {
        self.get_mut(id)
            .ok_or(EffectError::EffectNotFound(id.0))?
            .set_param(name, value)
    }

    /// Enables or bypasses one effect.
    ///
    /// # Errors
    ///
    /// [`EffectError::EffectNotFound`] for an unknown id.
    pub fn set_effect_enabled(&mut self, id: EffectId, enabled: bool) -> Result<(), EffectError> {
        self.get_mut(id)
            .ok_or(EffectError::EffectNotFound(id.0))?
            .set_enabled(enabled);
        Ok(())
    }

    /// Iterates effects in processing order.
    pub fn iter(&self) -> impl Iterator<Item = (EffectId, &Effect)> {
        self.effects.iter().map(|(id, effect)| (*id, effect))
    }

    /// Sizes every effect's state for `format`.
    pub fn prepare(&mut self, format: AudioFormat) {
        for (_, effect) in &mut self.effects {
            effect.prepare(&format);
        }
        self.format = Some(format);
    }

    /// Frees every effect's state. Effects and parameters stay.
    pub fn release(&mut self) {
        for (_, effect) in &mut self.effects {
            effect.release();
        }
        self.format = None;
    }

    /// Runs the block through each enabled effect in order.
    pub fn process(&mut self, block: &mut [f32]) {
        if !self.enabled {
            return;
        }
        for (_, effect) in &mut self.effects {
            if effect.is_enabled() {
                effect.process(block);
            }
        }
    }
}

impl Default for EffectChain {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::{Compressor, Delay, Equalizer, Limiter, Reverb};
    use crate::format::SampleEncoding;

    fn stereo() -> AudioFormat {
        AudioFormat::new(48000, 2, SampleEncoding::Float32)
    }

    fn noise(len: usize) -> Vec<f32> {
        let mut state = 0x1234_5678u32;
        (0..len)
            .map(|_| {
                state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                (state >> 8) as f32 / (1u32 << 24) as f32 * 2.0 - 1.0
            })
            .collect()
    }

    #[test]
    fn test_empty_chain_is_identity() {
        let mut chain = EffectChain::new();
        chain.prepare(stereo());
        let input = noise(512);
        let mut block = input.clone();
        chain.process(&mut block);
        assert_eq!(block, input);
    }

    #[test]
    fn test_disabled_chain_is_identity() {
        let mut chain = EffectChain::new();
        chain.add(Equalizer::new().with_gains(6.0, -3.0, 9.0));
        chain.add(Compressor::new().with_makeup_db(12.0));
        chain.add(Reverb::new());
        chain.add(Limiter::new().with_threshold_db(-12.0));
        chain.prepare(stereo());
        chain.set_enabled(false);

        let input = noise(1024);
        let mut block = input.clone();
        chain.process(&mut block);
        assert_eq!(block, input);
    }

    #[test]
    fn test_disabled_effect_is_skipped() {
        let mut chain = EffectChain::new();
        let limiter = chain.add(Limiter::new().with_threshold_db(-12.0));
        chain.set_effect_enabled(limiter, false).unwrap();

        let mut block = vec![0.9f32, -0.9];
        chain.process(&mut block);
        assert_eq!(block, vec![0.9, -0.9]);
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn test_effects_run_in_order() {
        // Limit then boost differs from boost then limit
        let mut limit_first = EffectChain::new();
        limit_first.add(Limiter::new().with_threshold_db(-6.0));
        limit_first.add(Compressor::new().with_ratio(1.0).with_makeup_db(6.0));
        limit_first.prepare(stereo());

        let mut block = vec![1.0f32; 4];
        limit_first.process(&mut block);
        assert!(block[0] > 0.9);

        let mut boost_first = EffectChain::new();
        boost_first.add(Compressor::new().with_ratio(1.0).with_makeup_db(6.0));
        boost_first.add(Limiter::new().with_threshold_db(-6.0));
        boost_first.prepare(stereo());

        let mut block = vec![1.0f32; 4];
        boost_first.process(&mut block);
        assert!(block[0] < 0.51);
    }

    #[test]
    fn test_add_prepares_when_chain_is_prepared() {
        let mut chain = EffectChain::new();
        let early = chain.add(Delay::new());
        assert!(!chain.get(early).unwrap().is_prepared());

        chain.prepare(stereo());
        let late = chain.add(Reverb::new());
        assert!(chain.get(early).unwrap().is_prepared());
        assert!(chain.get(late).unwrap().is_prepared());
    }

    #[test]
    fn test_remove_releases_and_ids_are_stable() {
        let mut chain = EffectChain::new();
        chain.prepare(stereo());
        let a = chain.add(Delay::new());
        let b = chain.add(Reverb::new());

        let removed = chain.remove(a).unwrap();
        assert!(!removed.is_prepared());
        assert!(chain.remove(a).is_none());
        assert!(chain.get(b).is_some());

        let c = chain.add(Limiter::new());
        assert_ne!(c, a);
    }

    #[test]
    fn test_set_param_errors() {
        let mut chain = EffectChain::new();
        let delay = chain.add(Delay::new());
        assert_eq!(chain.set_param(delay, "wet", 2.0), Ok(1.0));
        assert!(matches!(
            chain.set_param(delay, "ratio", 2.0),
            Err(EffectError::UnknownParameter { .. })
        ));

        chain.clear();
        assert!(chain.is_empty());
        assert_eq!(
            chain.set_param(delay, "wet", 0.5),
            Err(EffectError::EffectNotFound(delay.get()))
        );
    }

    #[test]
    fn test_release_forgets_format() {
        let mut chain = EffectChain::new();
        let delay = chain.add(Delay::new());
        chain.prepare(stereo());
        chain.release();
        assert!(chain.format().is_none());
        assert!(!chain.get(delay).unwrap().is_prepared());
        assert_eq!(chain.get(delay).unwrap().param("delay_ms"), Some(250.0));
    }
}
