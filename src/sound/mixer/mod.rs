// mod.rs - Audio mixer module

//! Real-time audio mixing engine.
//!
//! Game code on any thread asks the `AudioMixer` to play or stop sounds.
//! Requests travel through a command queue to a worker thread that owns the
//! decode cache and the active sound registry, renders stereo passes ahead of
//! the hardware, and hands them to the audio callback through a lock-free
//! ring.
//!
//! # Architecture
//!
//! - `types` - Core types, constants and errors
//! - `cache` - Per-category decode cache
//! - `registry` - Active sounds and actor/channel replacement
//! - `command` - Producer to worker command queue
//! - `spatial` - Positional gain policies
//! - `mix` - The mixing engine
//! - `output` - Lock-free hand-off to the audio callback
//! - `device` - cpal and null output backends
//! - `audio_mixer` - The public façade
//!
//! # Example
//!
//! ```rust,ignore
//! use bstone_audio::config::{MixerConfig, SoundDriver};
//! use bstone_audio::sound::mixer::{ActorChannel, ActorId, AudioMixer, SoundId};
//!
//! let mixer = AudioMixer::new(MixerConfig::default());
//! if mixer.initialize(44100) {
//!     mixer.play_effect(SoundId(3), wav_bytes, ActorId::from_index(5), ActorChannel::Voice);
//! }
//! mixer.uninitialize();
//! ```

pub mod audio_mixer;
pub mod cache;
pub mod command;
pub mod device;
pub mod mix;
pub mod output;
pub mod registry;
pub mod spatial;
pub mod types;

pub use audio_mixer::{AudioMixer, AudioMixerBuilder};
pub use cache::{CacheSlot, DecodeCache};
pub use command::{Command, CommandQueue, DEFAULT_COMMAND_CAPACITY};
pub use device::{AudioBackend, AudioDevice, CpalBackend, DeviceError, DeviceResult, NullBackend};
pub use mix::{MixingEngine, PlaybackStatus};
pub use output::{output_ring, OutputConsumer, OutputProducer, StereoFrame};
pub use registry::{ActiveSound, InsertOutcome, SoundRegistry};
pub use spatial::{ActorGainTable, FullVolume, Gains, Spatializer};
pub use types::{
    calculate_pass_frames, ActorChannel, ActorId, MixerError, MixerResult, SoundCategory,
    SoundId, MAX_CHANNELS, MAX_RATE, MIN_RATE, OUTPUT_CHANNELS,
};
