// spatial.rs - Positional gain policies

//! Positional attenuation.
//!
//! The mixer asks a `Spatializer` for the (left, right) gains of every
//! positional sound on every pass, so gains follow actors as they move.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::sound::mixer::types::{ActorChannel, ActorId};

/// Stereo gain pair, each in `0.0..=1.0`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gains {
    pub left: f32,
    pub right: f32,
}

impl Default for Gains {
    fn default() -> Self {
        Self::FULL
    }
}

impl Gains {
    pub const FULL: Gains = Gains {
        left: 1.0,
        right: 1.0,
    };

    pub const SILENT: Gains = Gains {
        left: 0.0,
        right: 0.0,
    };

    pub fn new(left: f32, right: f32) -> Self {
        Self {
            left: clamp_gain(left),
            right: clamp_gain(right),
        }
    }

    /// Gains from a volume and a pan in `-1.0` (left) to `1.0` (right).
    ///
    /// The far side is attenuated linearly; the near side keeps the volume.
    pub fn from_volume_pan(volume: f32, pan: f32) -> Self {
        let volume = clamp_gain(volume);
        let pan = if pan.is_nan() { 0.0 } else { pan.clamp(-1.0, 1.0) };
        Self::new(
            volume * (1.0 - pan.max(0.0)),
            volume * (1.0 + pan.min(0.0)),
        )
    }

    pub fn is_silent(&self) -> bool {
        self.left == 0.0 && self.right == 0.0
    }
}

fn clamp_gain(gain: f32) -> f32 {
    if gain.is_nan() {
        0.0
    } else {
        gain.clamp(0.0, 1.0)
    }
}

/// Gain policy for positional sounds
pub trait Spatializer: Send + Sync {
    fn gains(&self, actor: ActorId, channel: ActorChannel) -> Gains;
}

/// Plays every sound at full volume
#[derive(Debug, Default, Clone, Copy)]
pub struct FullVolume;

impl Spatializer for FullVolume {
    fn gains(&self, _actor: ActorId, _channel: ActorChannel) -> Gains {
        Gains::FULL
    }
}

/// Gains the game updates per actor, typically once per frame.
/// Unknown actors play at full volume.
#[derive(Debug, Default)]
pub struct ActorGainTable {
    gains: RwLock<HashMap<ActorId, Gains>>,
}

impl ActorGainTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, actor: ActorId, gains: Gains) {
        self.gains.write().insert(actor, gains);
    }

    pub fn remove(&self, actor: ActorId) {
        self.gains.write().remove(&actor);
    }

    pub fn clear(&self) {
        self.gains.write().clear();
    }

    pub fn get(&self, actor: ActorId) -> Option<Gains> {
        self.gains.read().get(&actor).copied()
    }
}

impl Spatializer for ActorGainTable {
    fn gains(&self, actor: ActorId, _channel: ActorChannel) -> Gains {
        self.get(actor).unwrap_or(Gains::FULL)
    }
}
