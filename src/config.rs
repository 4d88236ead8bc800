use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::sound::mixer::{DEFAULT_COMMAND_CAPACITY, MAX_RATE};

/// Mixer options that can be set via CLI or config file
#[derive(Debug, Clone, PartialEq)]
pub struct MixerConfig {
    /// Requested output rate in Hz; 0 selects the minimum rate
    pub rate: u32,
    pub driver: SoundDriver,
    /// Worker sleep while the output ring is full
    pub poll_interval: Duration,
    /// Mixing passes buffered ahead of the device
    pub passes_ahead: usize,
    /// Pending play requests before new ones are refused
    pub command_capacity: usize,
    /// Start muted
    pub mute: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundDriver {
    /// System audio through cpal
    Cpal,
    /// Real-time timer that discards output
    Null,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            rate: 44100,
            driver: SoundDriver::Cpal,
            poll_interval: Duration::from_millis(2),
            passes_ahead: 2,
            command_capacity: DEFAULT_COMMAND_CAPACITY,
            mute: false,
        }
    }
}

/// Load configuration from a `key = value` file.
///
/// A missing path yields the defaults. Unknown keys are logged and skipped.
pub fn load_config(path: Option<&Path>) -> Result<MixerConfig> {
    let mut config = MixerConfig::default();
    let Some(path) = path else {
        return Ok(config);
    };

    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    apply_config_str(&mut config, &data)
        .with_context(|| format!("Invalid config file {}", path.display()))?;
    Ok(config)
}

/// Apply `key = value` lines to `config`
pub fn apply_config_str(config: &mut MixerConfig, data: &str) -> Result<()> {
    for (number, raw) in data.lines().enumerate() {
        let line = match raw.find('#') {
            Some(pos) => &raw[..pos],
            None => raw,
        }
        .trim();
        if line.is_empty() {
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            log::warn!("Config line {}: key without value", number + 1);
            continue;
        };
        let (key, value) = (key.trim(), value.trim());

        apply_option(config, key, value)
            .with_context(|| format!("line {}: {}", number + 1, key))?;
    }
    Ok(())
}

fn apply_option(config: &mut MixerConfig, key: &str, value: &str) -> Result<()> {
    match key.to_lowercase().as_str() {
        "rate" | "frequency" => config.rate = parse_rate(value)?,
        "driver" | "sound" => config.driver = parse_sound_driver(value)?,
        "poll_interval_ms" => {
            config.poll_interval = Duration::from_millis(parse_bounded(value, 1, 100)?)
        }
        "passes_ahead" => config.passes_ahead = parse_bounded(value, 1, 16)? as usize,
        "command_capacity" => config.command_capacity = parse_bounded(value, 1, 65536)? as usize,
        "mute" => config.mute = parse_bool(value)?,
        _ => log::warn!("Unknown config key '{}' ignored", key),
    }
    Ok(())
}

/// Parse an output rate in Hz
pub fn parse_rate(s: &str) -> Result<u32> {
    let rate: u32 = s.parse().context("Invalid rate value")?;
    if rate > MAX_RATE {
        anyhow::bail!("Rate {} out of range (0 to {})", rate, MAX_RATE);
    }
    Ok(rate)
}

/// Parse a sound driver name
pub fn parse_sound_driver(s: &str) -> Result<SoundDriver> {
    match s.to_lowercase().as_str() {
        "cpal" | "default" => Ok(SoundDriver::Cpal),
        "null" | "none" | "nosound" => Ok(SoundDriver::Null),
        _ => anyhow::bail!("Invalid sound driver: {}. Valid options: cpal, null", s),
    }
}

/// Parse a boolean option
pub fn parse_bool(s: &str) -> Result<bool> {
    match s.to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => anyhow::bail!("Invalid boolean value: {}", s),
    }
}

fn parse_bounded(s: &str, min: u64, max: u64) -> Result<u64> {
    let value: u64 = s.parse().with_context(|| format!("Invalid number: {}", s))?;
    if value < min || value > max {
        anyhow::bail!("Value {} out of range ({} to {})", value, min, max);
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_config_default() {
        let config = MixerConfig::default();
        assert_eq!(config.rate, 44100);
        assert_eq!(config.driver, SoundDriver::Cpal);
        assert_eq!(config.passes_ahead, 2);
        assert_eq!(config.command_capacity, 128);
        assert!(!config.mute);
    }

    #[test]
    fn test_load_config_without_path() {
        assert_eq!(load_config(None).unwrap(), MixerConfig::default());
    }

    #[test]
    fn test_load_config_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "# mixer settings").unwrap();
        writeln!(file, "rate = 22050").unwrap();
        writeln!(file, "driver = null   # headless").unwrap();
        writeln!(file, "passes_ahead=3").unwrap();
        writeln!(file, "poll_interval_ms = 5").unwrap();
        writeln!(file, "mute = yes").unwrap();
        writeln!(file, "unknown_key = whatever").unwrap();
        writeln!(file).unwrap();

        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.rate, 22050);
        assert_eq!(config.driver, SoundDriver::Null);
        assert_eq!(config.passes_ahead, 3);
        assert_eq!(config.poll_interval, Duration::from_millis(5));
        assert!(config.mute);
    }

    #[test]
    fn test_load_config_bad_value() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "rate = loud").unwrap();
        assert!(load_config(Some(file.path())).is_err());
    }

    #[test]
    fn test_load_config_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.cfg");
        assert!(load_config(Some(missing.as_path())).is_err());
    }

    #[test]
    fn test_parse_rate() {
        assert_eq!(parse_rate("0").unwrap(), 0);
        assert_eq!(parse_rate("48000").unwrap(), 48000);
        assert!(parse_rate("192001").is_err());
        assert!(parse_rate("-1").is_err());
    }

    #[test]
    fn test_parse_sound_driver() {
        assert_eq!(parse_sound_driver("CPAL").unwrap(), SoundDriver::Cpal);
        assert_eq!(parse_sound_driver("none").unwrap(), SoundDriver::Null);
        assert!(parse_sound_driver("openal").is_err());
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("On").unwrap());
        assert!(!parse_bool("0").unwrap());
        assert!(parse_bool("maybe").is_err());
    }

    #[test]
    fn test_key_without_value_is_skipped() {
        let mut config = MixerConfig::default();
        apply_config_str(&mut config, "rate\nmute = true\n").unwrap();
        assert!(config.mute);
        assert_eq!(config.rate, 44100);
    }
}
