// audio_mixer.rs - Public mixer façade

//! `AudioMixer` ties the pieces together.
//!
//! It owns the output device and a worker thread that renders passes ahead
//! of the hardware callback. Callers on any thread only ever touch the
//! command queue and a few atomics; the decode cache and the registry live
//! inside the worker's `MixingEngine`.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;

use crate::config::{MixerConfig, SoundDriver};
use crate::sound::decoder::DecodeError;
use crate::sound::factory::{DecoderFactory, StandardDecoders};
use crate::sound::mixer::command::{Command, CommandQueue};
use crate::sound::mixer::device::{AudioBackend, AudioDevice, CpalBackend, NullBackend};
use crate::sound::mixer::mix::{MixingEngine, PlaybackStatus};
use crate::sound::mixer::output::{output_ring, OutputProducer};
use crate::sound::mixer::spatial::{FullVolume, Spatializer};
use crate::sound::mixer::types::{
    calculate_pass_frames, ActorChannel, ActorId, MixerError, MixerResult, SoundCategory,
    SoundId, MAX_CHANNELS, MAX_RATE, MIN_RATE, OUTPUT_CHANNELS,
};

/// State shared between the API and the worker
struct Shared {
    queue: CommandQueue,
    quit: AtomicBool,
    mute: AtomicBool,
    /// Last pass status, music count in the high half
    status: AtomicU64,
    passes: AtomicU64,
}

fn pack_status(status: PlaybackStatus) -> u64 {
    let music = status.music.min(u32::MAX as usize) as u64;
    let non_music = status.non_music.min(u32::MAX as usize) as u64;
    (music << 32) | non_music
}

fn unpack_status(packed: u64) -> PlaybackStatus {
    PlaybackStatus {
        music: (packed >> 32) as usize,
        non_music: (packed & u64::from(u32::MAX)) as usize,
    }
}

impl Shared {
    fn new(command_capacity: usize, mute: bool) -> Self {
        Self {
            queue: CommandQueue::new(command_capacity),
            quit: AtomicBool::new(false),
            mute: AtomicBool::new(mute),
            status: AtomicU64::new(0),
            passes: AtomicU64::new(0),
        }
    }

    fn publish_status(&self, status: PlaybackStatus) {
        self.status.store(pack_status(status), Ordering::Release);
        self.passes.fetch_add(1, Ordering::Release);
    }

    fn status(&self) -> PlaybackStatus {
        unpack_status(self.status.load(Ordering::Acquire))
    }
}

/// Everything that exists only while the mixer is initialized
struct Running {
    rate: u32,
    pass_frames: usize,
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
    device: Option<Box<dyn AudioDevice>>,
    underruns: Arc<AtomicU64>,
}

impl Running {
    /// Stop the worker, then the device. The worker's engine (cache and
    /// registry) is dropped when the thread exits.
    fn shutdown(mut self) {
        self.shared.quit.store(true, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("Mixer worker thread panicked");
            }
        }
        if let Some(device) = self.device.take() {
            device.close();
        }
        log::info!("Mixer shut down");
    }
}

fn worker_main(
    mut engine: MixingEngine,
    shared: Arc<Shared>,
    mut output: OutputProducer,
    pass_frames: usize,
    poll_interval: Duration,
) {
    log::debug!("Mixer worker started ({} frames per pass)", pass_frames);
    let mut buffer = vec![0i16; pass_frames * OUTPUT_CHANNELS];

    while !shared.quit.load(Ordering::Acquire) {
        if !output.has_room(pass_frames) {
            if output.is_abandoned() {
                log::warn!("Audio output went away, mixer worker stopping");
                break;
            }
            thread::sleep(poll_interval);
            continue;
        }

        engine.handle_commands(&shared.queue);
        engine.mix(shared.mute.load(Ordering::Relaxed), &mut buffer);
        output.publish(&buffer);
        let status = engine.status();
        shared.queue.complete_pass(|| shared.publish_status(status));
    }

    log::debug!("Mixer worker exiting");
}

/// Map a requested rate onto the supported range
fn normalize_rate(rate: u32) -> MixerResult<u32> {
    match rate {
        0 => Ok(MIN_RATE),
        r if r > MAX_RATE => Err(MixerError::UnsupportedRate(r)),
        r if r < MIN_RATE => {
            log::warn!("Rate {}Hz below minimum, using {}Hz", r, MIN_RATE);
            Ok(MIN_RATE)
        }
        r => Ok(r),
    }
}

/// Thread-safe audio mixer
pub struct AudioMixer {
    config: MixerConfig,
    backend: Arc<dyn AudioBackend>,
    factory: Arc<dyn DecoderFactory>,
    spatializer: Arc<dyn Spatializer>,
    running: Mutex<Option<Running>>,
}

impl AudioMixer {
    /// Mixer using the configured driver, the standard decoders and no
    /// positional attenuation
    pub fn new(config: MixerConfig) -> Self {
        Self::builder().config(config).build()
    }

    pub fn builder() -> AudioMixerBuilder {
        AudioMixerBuilder::default()
    }

    /// Lowest output rate `initialize` accepts
    pub fn min_rate() -> u32 {
        MIN_RATE
    }

    /// Maximum number of sounds playing at once
    pub fn max_channels() -> usize {
        MAX_CHANNELS
    }

    pub fn config(&self) -> &MixerConfig {
        &self.config
    }

    /// Open the device and start mixing at (close to) `rate`.
    ///
    /// Re-initializing tears the running mixer down first. Returns false if
    /// the rate is unsupported or the device cannot be opened; the mixer is
    /// then uninitialized.
    pub fn initialize(&self, rate: u32) -> bool {
        match self.try_initialize(rate) {
            Ok(()) => true,
            Err(e) => {
                log::error!("Failed to initialize mixer: {}", e);
                false
            }
        }
    }

    fn try_initialize(&self, rate: u32) -> MixerResult<()> {
        let mut running = self.running.lock();
        if let Some(old) = running.take() {
            log::debug!("Mixer already initialized, restarting");
            old.shutdown();
        }

        let requested = normalize_rate(rate)?;
        let negotiated = self.backend.supported_rate(requested)?;
        let pass_frames = calculate_pass_frames(negotiated);
        let (producer, consumer) = output_ring(pass_frames * self.config.passes_ahead.max(1));
        let underruns = consumer.underrun_counter();

        let device = self.backend.open(negotiated, consumer)?;
        let rate = device.rate();
        if rate != negotiated {
            log::warn!("Device opened at {}Hz instead of {}Hz", rate, negotiated);
        }

        let shared = Arc::new(Shared::new(self.config.command_capacity, self.config.mute));
        let engine = MixingEngine::new(
            Arc::clone(&self.factory),
            Arc::clone(&self.spatializer),
            rate,
            MAX_CHANNELS,
        );

        let worker_shared = Arc::clone(&shared);
        let poll_interval = self.config.poll_interval;
        let spawned = thread::Builder::new()
            .name("audio-mixer".to_string())
            .spawn(move || worker_main(engine, worker_shared, producer, pass_frames, poll_interval));

        let worker = match spawned {
            Ok(worker) => worker,
            Err(e) => {
                device.close();
                return Err(MixerError::SpawnFailed(e.to_string()));
            }
        };

        log::info!(
            "Mixer initialized: {}Hz on '{}' ({} backend), {} frames per pass",
            rate,
            device.name(),
            self.backend.name(),
            pass_frames
        );

        *running = Some(Running {
            rate,
            pass_frames,
            shared,
            worker: Some(worker),
            device: Some(device),
            underruns,
        });
        Ok(())
    }

    /// Stop mixing, join the worker and close the device. Safe to call
    /// repeatedly or without a prior `initialize`.
    pub fn uninitialize(&self) {
        let running = self.running.lock().take();
        if let Some(running) = running {
            running.shutdown();
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.running.lock().is_some()
    }

    /// Output rate, if initialized
    pub fn rate(&self) -> Option<u32> {
        self.running.lock().as_ref().map(|r| r.rate)
    }

    /// Frames rendered per mixing pass, if initialized
    pub fn pass_frames(&self) -> Option<usize> {
        self.running.lock().as_ref().map(|r| r.pass_frames)
    }

    /// Mixing passes completed since `initialize`
    pub fn passes_rendered(&self) -> u64 {
        self.running
            .lock()
            .as_ref()
            .map_or(0, |r| r.shared.passes.load(Ordering::Acquire))
    }

    /// Frames the device played as silence because no audio was ready
    pub fn underrun_frames(&self) -> u64 {
        self.running
            .lock()
            .as_ref()
            .map_or(0, |r| r.underruns.load(Ordering::Relaxed))
    }

    fn shared(&self) -> MixerResult<Arc<Shared>> {
        self.running
            .lock()
            .as_ref()
            .map(|r| Arc::clone(&r.shared))
            .ok_or(MixerError::NotInitialized)
    }

    fn try_play(
        &self,
        category: SoundCategory,
        sound: SoundId,
        data: Arc<[u8]>,
        actor: Option<ActorId>,
        channel: ActorChannel,
    ) -> MixerResult<()> {
        let shared = self.shared()?;
        if data.is_empty() {
            return Err(DecodeError::Empty.into());
        }
        self.factory.probe(category, &data)?;
        shared.queue.push(Command::Play {
            category,
            sound,
            data,
            actor,
            channel,
        })
    }

    fn play(
        &self,
        category: SoundCategory,
        sound: SoundId,
        data: Arc<[u8]>,
        actor: Option<ActorId>,
        channel: ActorChannel,
    ) -> bool {
        match self.try_play(category, sound, data, actor, channel) {
            Ok(()) => true,
            Err(MixerError::NotInitialized) => false,
            Err(e) => {
                log::warn!("Dropping {:?} sound {}: {}", category, sound.0, e);
                false
            }
        }
    }

    /// Start a music track, replacing the current one.
    ///
    /// Borrowed data is copied before this returns.
    pub fn play_music(&self, sound: SoundId, data: impl Into<Arc<[u8]>>) -> bool {
        self.play(
            SoundCategory::Music,
            sound,
            data.into(),
            None,
            ActorChannel::Voice,
        )
    }

    /// Play a sound effect; with an actor it replaces whatever that actor
    /// plays on `channel`
    pub fn play_effect(
        &self,
        sound: SoundId,
        data: impl Into<Arc<[u8]>>,
        actor: Option<ActorId>,
        channel: ActorChannel,
    ) -> bool {
        self.play(SoundCategory::ShortEffect, sound, data.into(), actor, channel)
    }

    /// Play a digitized (raw PCM) sound
    pub fn play_pcm(
        &self,
        sound: SoundId,
        data: impl Into<Arc<[u8]>>,
        actor: Option<ActorId>,
        channel: ActorChannel,
    ) -> bool {
        self.play(SoundCategory::StreamedPcm, sound, data.into(), actor, channel)
    }

    fn try_stop_music(&self) -> MixerResult<()> {
        let shared = self.shared()?;
        shared
            .queue
            .push_stop_music(|| shared.status().is_music_playing())
    }

    /// Stop music by the next pass. Returns false if nothing was playing
    /// or queued.
    pub fn stop_music(&self) -> bool {
        match self.try_stop_music() {
            Ok(()) => true,
            Err(e) => {
                log::debug!("stop_music: {}", e);
                false
            }
        }
    }

    /// Silence output while sounds keep advancing
    pub fn set_mute(&self, mute: bool) -> bool {
        match self.shared() {
            Ok(shared) => {
                shared.mute.store(mute, Ordering::Relaxed);
                true
            }
            Err(_) => false,
        }
    }

    pub fn is_muted(&self) -> bool {
        self.shared()
            .map(|s| s.mute.load(Ordering::Relaxed))
            .unwrap_or(false)
    }

    /// Sound counts after the last completed pass
    pub fn playback_status(&self) -> PlaybackStatus {
        self.shared().map(|s| s.status()).unwrap_or_default()
    }

    /// Music was playing after the last completed pass
    pub fn is_music_playing(&self) -> bool {
        self.playback_status().is_music_playing()
    }

    pub fn is_non_music_playing(&self) -> bool {
        self.playback_status().is_non_music_playing()
    }

    pub fn is_anything_playing(&self) -> bool {
        self.playback_status().is_anything_playing()
    }
}

impl Drop for AudioMixer {
    fn drop(&mut self) {
        self.uninitialize();
    }
}

/// Builder for `AudioMixer` with custom collaborators
#[derive(Default)]
pub struct AudioMixerBuilder {
    config: MixerConfig,
    backend: Option<Arc<dyn AudioBackend>>,
    factory: Option<Arc<dyn DecoderFactory>>,
    spatializer: Option<Arc<dyn Spatializer>>,
}

impl AudioMixerBuilder {
    pub fn config(mut self, config: MixerConfig) -> Self {
        self.config = config;
        self
    }

    /// Output backend; defaults to the configured driver
    pub fn backend(mut self, backend: Arc<dyn AudioBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Decoder factory; defaults to `StandardDecoders`
    pub fn factory(mut self, factory: Arc<dyn DecoderFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Positional gain policy; defaults to `FullVolume`
    pub fn spatializer(mut self, spatializer: Arc<dyn Spatializer>) -> Self {
        self.spatializer = Some(spatializer);
        self
    }

    pub fn build(self) -> AudioMixer {
        let backend: Arc<dyn AudioBackend> = match self.backend {
            Some(backend) => backend,
            None => match self.config.driver {
                SoundDriver::Cpal => Arc::new(CpalBackend),
                SoundDriver::Null => Arc::new(NullBackend::new()),
            },
        };
        let factory: Arc<dyn DecoderFactory> = match self.factory {
            Some(factory) => factory,
            None => Arc::new(StandardDecoders),
        };
        let spatializer: Arc<dyn Spatializer> = match self.spatializer {
            Some(spatializer) => spatializer,
            None => Arc::new(FullVolume),
        };

        AudioMixer {
            config: self.config,
            backend,
            factory,
            spatializer,
            running: Mutex::new(None),
        }
    }
}
