// mix.rs - Main mixing logic

//! Main audio mixing logic for the mixer.
//!
//! The `MixingEngine` owns the decode cache and the active sound registry.
//! It lives on the mixer worker thread; nothing else touches it.

use std::sync::Arc;

use crate::sound::factory::DecoderFactory;
use crate::sound::mixer::cache::DecodeCache;
use crate::sound::mixer::command::{Command, CommandQueue};
use crate::sound::mixer::registry::{ActiveSound, InsertOutcome, SoundRegistry};
use crate::sound::mixer::spatial::{Gains, Spatializer};
use crate::sound::mixer::types::{OUTPUT_CHANNELS, SINT16_MAX, SINT16_MIN};

/// Snapshot of what is playing after a pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaybackStatus {
    /// Active music sounds (0 or 1)
    pub music: usize,
    /// Active effects and streamed PCM sounds
    pub non_music: usize,
}

impl PlaybackStatus {
    /// Music is playing
    pub fn is_music_playing(&self) -> bool {
        self.music > 0
    }

    /// An effect or streamed PCM sound is playing
    pub fn is_non_music_playing(&self) -> bool {
        self.non_music > 0
    }

    /// Any sound at all is playing
    pub fn is_anything_playing(&self) -> bool {
        self.music + self.non_music > 0
    }
}

/// Decodes and sums active sounds into stereo 16-bit output
pub struct MixingEngine {
    cache: DecodeCache,
    registry: SoundRegistry,
    spatializer: Arc<dyn Spatializer>,
    /// Floating-point stereo accumulator
    accum: Vec<f32>,
    /// Drained command buffer, reused across passes
    drained: Vec<Command>,
}

impl MixingEngine {
    /// Create an engine mixing at `rate` with room for `max_channels`
    /// simultaneous sounds. Decoders come from `factory`; positional gains
    /// from `spatializer`.
    pub fn new(
        factory: Arc<dyn DecoderFactory>,
        spatializer: Arc<dyn Spatializer>,
        rate: u32,
        max_channels: usize,
    ) -> Self {
        Self {
            cache: DecodeCache::new(factory, rate),
            registry: SoundRegistry::new(max_channels),
            spatializer,
            accum: Vec::new(),
            drained: Vec::new(),
        }
    }

    /// Mixing rate in Hz
    pub fn rate(&self) -> u32 {
        self.cache.rate()
    }

    /// Decoded sounds, keyed by category and id
    pub fn cache(&self) -> &DecodeCache {
        &self.cache
    }

    /// Sounds currently playing
    pub fn registry(&self) -> &SoundRegistry {
        &self.registry
    }

    /// Drain `queue` and apply every command in order, then tell the queue
    /// whether music survived them
    pub fn handle_commands(&mut self, queue: &CommandQueue) {
        let mut drained = std::mem::take(&mut self.drained);
        queue.drain_into(&mut drained);
        for command in drained.drain(..) {
            self.apply(command);
        }
        self.drained = drained;
        queue.settle_music(self.registry.music_count() > 0);
    }

    /// Apply a single command
    pub fn apply(&mut self, command: Command) {
        match command {
            Command::Play {
                category,
                sound,
                data,
                actor,
                channel,
            } => {
                // Invalid data leaves an invalid slot and nothing to play
                if self.cache.get_or_create(category, sound, &data).is_none() {
                    return;
                }
                match self
                    .registry
                    .insert(ActiveSound::new(category, sound, actor, channel))
                {
                    InsertOutcome::Replaced(old) => log::debug!(
                        "{:?} sound {} replaced {:?} sound {} at sample {}",
                        category,
                        sound.0,
                        old.category,
                        old.sound.0,
                        old.cursor
                    ),
                    InsertOutcome::Added | InsertOutcome::Dropped => {}
                }
            }
            Command::StopMusic => {
                let stopped = self.registry.stop_music();
                log::debug!("Stopped {} music sound(s)", stopped);
            }
        }
    }

    /// Render one pass into `out` (interleaved stereo).
    ///
    /// When `mute` is set silence is written but cursors advance exactly as
    /// they would unmuted.
    pub fn mix(&mut self, mute: bool, out: &mut [i16]) {
        let frames = out.len() / OUTPUT_CHANNELS;
        let Self {
            cache,
            registry,
            spatializer,
            accum,
            ..
        } = self;

        accum.clear();
        accum.resize(frames * OUTPUT_CHANNELS, 0.0);

        registry.retain_mut(|sound| {
            let Some(slot) = cache.get_mut(sound.category, sound.sound) else {
                return false;
            };
            if slot.is_invalid() {
                return false;
            }

            slot.ensure_decoded(sound.cursor + frames);
            let available = slot
                .decoded_samples()
                .saturating_sub(sound.cursor)
                .min(frames);

            if !mute && available > 0 {
                let gains = match sound.actor {
                    Some(actor) => spatializer.gains(actor, sound.channel),
                    None => Gains::FULL,
                };
                if !gains.is_silent() {
                    let window = &slot.samples()[sound.cursor..sound.cursor + available];
                    for (frame, &sample) in accum.chunks_exact_mut(OUTPUT_CHANNELS).zip(window) {
                        let sample = f32::from(sample);
                        frame[0] += sample * gains.left;
                        frame[1] += sample * gains.right;
                    }
                }
            }

            sound.cursor += available;
            sound.cursor < slot.total_samples()
        });

        for (dst, &sum) in out.iter_mut().zip(accum.iter()) {
            *dst = sum.round().clamp(SINT16_MIN, SINT16_MAX) as i16;
        }
        // Odd trailing sample, if any
        for dst in out.iter_mut().skip(accum.len()) {
            *dst = 0;
        }
    }

    /// Count music and non-music sounds still in the registry
    pub fn status(&self) -> PlaybackStatus {
        PlaybackStatus {
            music: self.registry.music_count(),
            non_music: self.registry.non_music_count(),
        }
    }

    /// Stop everything and drop all cached samples
    pub fn reset(&mut self) {
        self.registry.clear();
        self.cache.clear();
        self.drained.clear();
    }
}
