// registry.rs - Active sound registry

//! The set of sounds currently playing.
//!
//! Entries reference their cache slot by (category, id) and carry their own
//! playback cursor, so several plays of one sound share decoded samples.

use crate::sound::mixer::types::{ActorChannel, ActorId, SoundCategory, SoundId, MAX_CHANNELS};

/// A playing sound instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveSound {
    pub category: SoundCategory,
    pub sound: SoundId,
    /// Next sample to mix
    pub cursor: usize,
    /// Owning actor; `None` plays at full volume
    pub actor: Option<ActorId>,
    pub channel: ActorChannel,
}

impl ActiveSound {
    pub fn new(
        category: SoundCategory,
        sound: SoundId,
        actor: Option<ActorId>,
        channel: ActorChannel,
    ) -> Self {
        Self {
            category,
            sound,
            cursor: 0,
            actor,
            channel,
        }
    }

    pub fn is_positional(&self) -> bool {
        self.actor.is_some()
    }

    fn same_slot(&self, actor: ActorId, channel: ActorChannel) -> bool {
        self.actor == Some(actor) && self.channel == channel
    }
}

/// Outcome of `SoundRegistry::insert`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Added,
    /// An entry on the same actor and channel was replaced
    Replaced(ActiveSound),
    /// The registry was full
    Dropped,
}

/// Registry of active sounds, bounded by a channel cap
#[derive(Debug)]
pub struct SoundRegistry {
    sounds: Vec<ActiveSound>,
    max_channels: usize,
}

impl Default for SoundRegistry {
    fn default() -> Self {
        Self::new(MAX_CHANNELS)
    }
}

impl SoundRegistry {
    pub fn new(max_channels: usize) -> Self {
        Self {
            sounds: Vec::with_capacity(max_channels),
            max_channels,
        }
    }

    /// Start a sound.
    ///
    /// A positional sound replaces whatever its actor already plays on the
    /// same channel. New music replaces the current music.
    pub fn insert(&mut self, sound: ActiveSound) -> InsertOutcome {
        if let Some(actor) = sound.actor {
            if let Some(existing) = self
                .sounds
                .iter_mut()
                .find(|s| s.same_slot(actor, sound.channel))
            {
                let old = std::mem::replace(existing, sound);
                return InsertOutcome::Replaced(old);
            }
        }

        if sound.category.is_music() {
            if let Some(existing) = self.sounds.iter_mut().find(|s| s.category.is_music()) {
                let old = std::mem::replace(existing, sound);
                return InsertOutcome::Replaced(old);
            }
        }

        if self.sounds.len() >= self.max_channels {
            log::warn!(
                "All {} mixer channels busy, dropping {:?} sound {}",
                self.max_channels,
                sound.category,
                sound.sound.0
            );
            return InsertOutcome::Dropped;
        }

        self.sounds.push(sound);
        InsertOutcome::Added
    }

    /// Remove every active music sound; returns how many were removed
    pub fn stop_music(&mut self) -> usize {
        let before = self.sounds.len();
        self.sounds.retain(|s| !s.category.is_music());
        before - self.sounds.len()
    }

    /// Keep only the sounds for which `f` returns true
    pub fn retain_mut<F>(&mut self, f: F)
    where
        F: FnMut(&mut ActiveSound) -> bool,
    {
        self.sounds.retain_mut(f);
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActiveSound> {
        self.sounds.iter()
    }

    pub fn find(&self, actor: ActorId, channel: ActorChannel) -> Option<&ActiveSound> {
        self.sounds.iter().find(|s| s.same_slot(actor, channel))
    }

    pub fn music_count(&self) -> usize {
        self.sounds.iter().filter(|s| s.category.is_music()).count()
    }

    pub fn non_music_count(&self) -> usize {
        self.sounds.len() - self.music_count()
    }

    pub fn len(&self) -> usize {
        self.sounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sounds.is_empty()
    }

    pub fn max_channels(&self) -> usize {
        self.max_channels
    }

    pub fn clear(&mut self) {
        self.sounds.clear();
    }
}
