use std::fs;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;

use bstone_audio::cli::Cli;
use bstone_audio::config::load_config;
use bstone_audio::logging::init_logging;
use bstone_audio::sound::mixer::{AudioMixer, SoundId};

fn read_sound(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// Wait for the queued sounds to start, then for everything to finish
fn wait_for_playback(mixer: &AudioMixer, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    let started = mixer.passes_rendered();

    // Status is published after each pass; give the worker a few
    while mixer.passes_rendered() < started + 2 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }

    while mixer.is_anything_playing() {
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(50));
    }
    true
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level());

    let config = load_config(cli.config.as_deref())?;
    let config = cli.merge_into_config(config)?;
    let actor = cli.actor();
    let channel = cli.actor_channel()?;

    log::info!("Configuration:");
    log::info!("  Rate: {}Hz", config.rate);
    log::info!("  Driver: {:?}", config.driver);
    log::info!("  Muted: {}", config.mute);

    let rate = config.rate;
    let mixer = AudioMixer::new(config);
    if !mixer.initialize(rate) {
        anyhow::bail!("Failed to initialize audio mixer at {}Hz", rate);
    }

    let mut queued = 0;

    if let Some(ref path) = cli.music {
        if mixer.play_music(SoundId(0), read_sound(path)?) {
            queued += 1;
        } else {
            log::warn!("Could not play music {}", path.display());
        }
    }

    for (index, path) in cli.effect.iter().enumerate() {
        if mixer.play_effect(SoundId(index as u32), read_sound(path)?, actor, channel) {
            queued += 1;
        } else {
            log::warn!("Could not play effect {}", path.display());
        }
    }

    for (index, path) in cli.pcm.iter().enumerate() {
        if mixer.play_pcm(SoundId(index as u32), read_sound(path)?, actor, channel) {
            queued += 1;
        } else {
            log::warn!("Could not play PCM sound {}", path.display());
        }
    }

    if queued == 0 {
        log::info!("Nothing to play");
    } else if !wait_for_playback(&mixer, Duration::from_secs(cli.timeout)) {
        log::warn!("Playback still running after {}s, stopping", cli.timeout);
    }

    let underruns = mixer.underrun_frames();
    if underruns > 0 {
        log::debug!("{} frames of silence played due to underruns", underruns);
    }

    mixer.uninitialize();
    Ok(())
}
