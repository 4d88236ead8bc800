// bstone-audio library
// Real-time sound mixing for game engines

pub mod cli;
pub mod config;
pub mod logging;
pub mod sound;

pub use cli::Cli;
pub use config::{load_config, MixerConfig, SoundDriver};
pub use logging::{init_logging, LogLevel};
pub use sound::mixer::AudioMixer;
