// types.rs - Core types and constants for the audio mixer

//! Core types, constants and the error enum of the sound mixer.

use thiserror::Error;

/// Lowest output rate the mixer accepts
pub const MIN_RATE: u32 = 11025;

/// Highest output rate the mixer accepts
pub const MAX_RATE: u32 = 192_000;

/// Maximum number of sounds mixed simultaneously
pub const MAX_CHANNELS: usize = 64;

/// Interleaved output channels (stereo)
pub const OUTPUT_CHANNELS: usize = 2;

/// Length of one mixing pass in milliseconds, before rounding
pub const MIX_PASS_MS: u32 = 40;

/// Bounds of the per-pass frame count
pub const MIN_PASS_FRAMES: usize = 256;
pub const MAX_PASS_FRAMES: usize = 4096;

/// Maximum value for 16-bit signed integer
pub const SINT16_MAX: f32 = 32767.0;

/// Minimum value for 16-bit signed integer
pub const SINT16_MIN: f32 = -32768.0;

/// Frames rendered per mixing pass at `rate`: 40 ms rounded up to a power of
/// two and clamped.
pub fn calculate_pass_frames(rate: u32) -> usize {
    let exact = (rate as usize * MIX_PASS_MS as usize) / 1000;
    exact
        .max(1)
        .next_power_of_two()
        .clamp(MIN_PASS_FRAMES, MAX_PASS_FRAMES)
}

/// Sound category; selects the cache table and decoder family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SoundCategory {
    Music,
    ShortEffect,
    StreamedPcm,
}

impl SoundCategory {
    pub const ALL: [SoundCategory; 3] = [
        SoundCategory::Music,
        SoundCategory::ShortEffect,
        SoundCategory::StreamedPcm,
    ];

    /// Index into per-category tables
    pub fn index(self) -> usize {
        match self {
            SoundCategory::Music => 0,
            SoundCategory::ShortEffect => 1,
            SoundCategory::StreamedPcm => 2,
        }
    }

    pub fn is_music(self) -> bool {
        self == SoundCategory::Music
    }
}

/// Per-actor sound slot; one sound per actor per channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ActorChannel {
    #[default]
    Voice,
    Weapon,
    Item,
    WallHit,
}

/// In-game actor owning a positional sound
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActorId(pub u32);

impl ActorId {
    /// Map a game actor index; negative indices mean "not positional"
    pub fn from_index(index: i32) -> Option<ActorId> {
        u32::try_from(index).ok().map(ActorId)
    }
}

/// Identifier of a sound within its category (e.g. a chunk number)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SoundId(pub u32);

/// Mixer errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MixerError {
    #[error("Mixer is not initialized")]
    NotInitialized,
    #[error("Unsupported output rate: {0} Hz")]
    UnsupportedRate(u32),
    #[error("Audio device error: {0}")]
    Device(#[from] super::device::DeviceError),
    #[error("Invalid sound data: {0}")]
    InvalidSoundData(#[from] crate::sound::decoder::DecodeError),
    #[error("Command queue is full ({0} pending)")]
    QueueFull(usize),
    #[error("Failed to spawn mixer thread: {0}")]
    SpawnFailed(String),
    #[error("Nothing to stop")]
    NothingToStop,
}

/// Result type for mixer operations
pub type MixerResult<T> = Result<T, MixerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(11025, 512)]
    #[case(22050, 1024)]
    #[case(44100, 2048)]
    #[case(48000, 2048)]
    #[case(96000, 4096)]
    #[case(192000, 4096)]
    #[case(1000, 256)]
    fn test_calculate_pass_frames(#[case] rate: u32, #[case] frames: usize) {
        assert_eq!(calculate_pass_frames(rate), frames);
    }

    #[test]
    fn test_actor_id_from_index() {
        assert_eq!(ActorId::from_index(-1), None);
        assert_eq!(ActorId::from_index(i32::MIN), None);
        assert_eq!(ActorId::from_index(0), Some(ActorId(0)));
        assert_eq!(ActorId::from_index(5), Some(ActorId(5)));
    }

    #[test]
    fn test_category_indices_are_distinct() {
        let mut seen = [false; 3];
        for category in SoundCategory::ALL {
            assert!(!seen[category.index()]);
            seen[category.index()] = true;
        }
        assert!(SoundCategory::Music.is_music());
        assert!(!SoundCategory::StreamedPcm.is_music());
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            MixerError::NotInitialized.to_string(),
            "Mixer is not initialized"
        );
        assert_eq!(
            MixerError::UnsupportedRate(500_000).to_string(),
            "Unsupported output rate: 500000 Hz"
        );
    }
}
