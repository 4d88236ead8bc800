use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use crate::config::{parse_rate, parse_sound_driver, MixerConfig};
use crate::logging::LogLevel;
use crate::sound::mixer::{ActorChannel, ActorId};

/// Plays sounds through the real-time mixer
#[derive(Parser, Debug, Default)]
#[command(name = "bstone-audio")]
#[command(version = "0.8.0")]
#[command(about = "Real-time audio mixer player", long_about = None)]
pub struct Cli {
    /// Output rate in Hz (0 selects the minimum)
    #[arg(short, long, value_name = "HZ")]
    pub rate: Option<String>,

    /// Sound driver (cpal, null)
    #[arg(short, long, value_name = "DRIVER")]
    pub driver: Option<String>,

    /// Configuration file (key = value lines)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Ogg Vorbis music track
    #[arg(short, long, value_name = "FILE")]
    pub music: Option<PathBuf>,

    /// WAV sound effect (can be specified multiple times)
    #[arg(short, long, value_name = "FILE")]
    pub effect: Vec<PathBuf>,

    /// Raw unsigned 8-bit PCM sound (can be specified multiple times)
    #[arg(short, long, value_name = "FILE")]
    pub pcm: Vec<PathBuf>,

    /// Actor owning the effects; negative plays non-positional
    #[arg(short, long, value_name = "INDEX", allow_hyphen_values = true)]
    pub actor: Option<i32>,

    /// Actor channel (voice, weapon, item, wallhit)
    #[arg(long, value_name = "CHANNEL")]
    pub channel: Option<String>,

    /// Start muted
    #[arg(long)]
    pub mute: bool,

    /// Log level (0 = nothing .. 6 = all)
    #[arg(short, long, value_name = "LEVEL")]
    pub log_level: Option<i32>,

    /// Give up waiting for playback after this many seconds
    #[arg(short, long, value_name = "SECONDS", default_value_t = 600)]
    pub timeout: u64,
}

impl Cli {
    /// Merge CLI arguments into the config
    pub fn merge_into_config(&self, mut config: MixerConfig) -> Result<MixerConfig> {
        if let Some(ref rate) = self.rate {
            config.rate = parse_rate(rate).context("Invalid --rate")?;
        }

        if let Some(ref driver) = self.driver {
            config.driver = parse_sound_driver(driver)?;
        }

        if self.mute {
            config.mute = true;
        }

        Ok(config)
    }

    pub fn log_level(&self) -> LogLevel {
        self.log_level.map_or(LogLevel::Info, LogLevel::from_i32)
    }

    pub fn actor(&self) -> Option<ActorId> {
        self.actor.and_then(ActorId::from_index)
    }

    pub fn actor_channel(&self) -> Result<ActorChannel> {
        match self.channel {
            Some(ref channel) => Self::parse_channel(channel),
            None => Ok(ActorChannel::Voice),
        }
    }

    fn parse_channel(s: &str) -> Result<ActorChannel> {
        match s.to_lowercase().as_str() {
            "voice" => Ok(ActorChannel::Voice),
            "weapon" => Ok(ActorChannel::Weapon),
            "item" => Ok(ActorChannel::Item),
            "wallhit" | "wall" => Ok(ActorChannel::WallHit),
            _ => anyhow::bail!(
                "Invalid actor channel: {}. Valid options: voice, weapon, item, wallhit",
                s
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SoundDriver;

    #[test]
    fn test_parse_channel() {
        assert_eq!(Cli::parse_channel("voice").unwrap(), ActorChannel::Voice);
        assert_eq!(Cli::parse_channel("WEAPON").unwrap(), ActorChannel::Weapon);
        assert_eq!(Cli::parse_channel("wall").unwrap(), ActorChannel::WallHit);
        assert!(Cli::parse_channel("invalid").is_err());
    }

    #[test]
    fn test_merge_basic_options() {
        let cli = Cli {
            rate: Some("22050".to_string()),
            driver: Some("null".to_string()),
            mute: true,
            ..Default::default()
        };

        let config = cli.merge_into_config(MixerConfig::default()).unwrap();
        assert_eq!(config.rate, 22050);
        assert_eq!(config.driver, SoundDriver::Null);
        assert!(config.mute);
    }

    #[test]
    fn test_invalid_rate() {
        let cli = Cli {
            rate: Some("fast".to_string()),
            ..Default::default()
        };
        assert!(cli.merge_into_config(MixerConfig::default()).is_err());
    }

    #[test]
    fn test_parse_args() {
        let cli = Cli::try_parse_from([
            "bstone-audio",
            "--driver",
            "null",
            "-e",
            "a.wav",
            "-e",
            "b.wav",
            "--actor",
            "-1",
            "--channel",
            "item",
        ])
        .unwrap();
        assert_eq!(cli.effect.len(), 2);
        assert_eq!(cli.actor(), None);
        assert_eq!(cli.actor_channel().unwrap(), ActorChannel::Item);
        assert_eq!(cli.log_level(), LogLevel::Info);
        assert_eq!(cli.timeout, 600);
    }
}
