// device.rs - Audio output backends

//! Audio output devices.
//!
//! A backend negotiates an output rate and opens a device that pulls
//! rendered frames from an [`OutputConsumer`]. `CpalBackend` talks to the
//! system audio host; `NullBackend` consumes audio in real time and throws
//! it away, for headless runs and tests.
//!
//! cpal streams are not `Send`, so each cpal device owns a dedicated thread
//! that builds the stream, keeps it alive and drops it on close.

use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use thiserror::Error;

use crate::sound::mixer::output::OutputConsumer;
use crate::sound::mixer::types::{MAX_RATE, MIN_RATE};

/// Errors raised by audio backends
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    #[error("No default audio output device")]
    NoDefaultDevice,
    #[error("Failed to get device config: {0}")]
    ConfigError(String),
    #[error("Failed to build audio stream: {0}")]
    StreamBuildError(String),
    #[error("Failed to start audio stream: {0}")]
    StreamPlayError(String),
    #[error("Unsupported sample format: {0}")]
    UnsupportedFormat(String),
    #[error("Audio thread error: {0}")]
    ThreadError(String),
}

/// Result type for device operations
pub type DeviceResult<T> = Result<T, DeviceError>;

/// Opens audio output devices
pub trait AudioBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// The rate closest to `requested` that the device can run at
    fn supported_rate(&self, requested: u32) -> DeviceResult<u32>;

    /// Open a device at `rate`, playing frames pulled from `output`
    fn open(&self, rate: u32, output: OutputConsumer) -> DeviceResult<Box<dyn AudioDevice>>;
}

/// An open output device
pub trait AudioDevice: Send {
    fn rate(&self) -> u32;

    fn name(&self) -> &str;

    /// Stop playback and release the device
    fn close(self: Box<Self>);
}

/// Thread owning an output loop until told to stop
struct DeviceThread {
    shutdown: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl DeviceThread {
    fn stop(&mut self) {
        // Dropping the sender wakes the thread
        self.shutdown.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Audio device thread panicked");
            }
        }
    }
}

impl Drop for DeviceThread {
    fn drop(&mut self) {
        self.stop();
    }
}

// ============================================================================
// cpal
// ============================================================================

/// System audio output through cpal's default host and device
#[derive(Debug, Default, Clone, Copy)]
pub struct CpalBackend;

fn default_device() -> DeviceResult<cpal::Device> {
    cpal::default_host()
        .default_output_device()
        .ok_or(DeviceError::NoDefaultDevice)
}

/// Pick the best output configuration for `rate`: i16 or f32 samples,
/// stereo preferred, rate clamped into the supported range.
fn output_config(device: &cpal::Device, rate: u32) -> DeviceResult<cpal::SupportedStreamConfig> {
    let supported: Vec<_> = device
        .supported_output_configs()
        .map_err(|e| DeviceError::ConfigError(e.to_string()))?
        .filter(|c| matches!(c.sample_format(), cpal::SampleFormat::F32 | cpal::SampleFormat::I16))
        .collect();

    let in_range = |c: &&cpal::SupportedStreamConfigRange| {
        rate >= c.min_sample_rate().0 && rate <= c.max_sample_rate().0
    };

    let best = supported
        .iter()
        .filter(|c| c.channels() >= 2)
        .find(in_range)
        .or_else(|| supported.iter().find(in_range))
        .or_else(|| supported.iter().find(|c| c.channels() >= 2))
        .or_else(|| supported.first())
        .ok_or_else(|| DeviceError::ConfigError("No suitable output configuration".to_string()))?;

    let clamped = rate.clamp(best.min_sample_rate().0, best.max_sample_rate().0);
    if clamped != rate {
        log::warn!(
            "Audio device doesn't support {}Hz, using {}Hz",
            rate,
            clamped
        );
    }
    Ok(best.clone().with_sample_rate(cpal::SampleRate(clamped)))
}

fn build_stream(
    device: &cpal::Device,
    supported: &cpal::SupportedStreamConfig,
    mut output: OutputConsumer,
) -> DeviceResult<cpal::Stream> {
    let config = supported.config();
    let channels = config.channels as usize;
    let on_error = |err: cpal::StreamError| log::error!("Audio stream error: {}", err);

    let stream = match supported.sample_format() {
        cpal::SampleFormat::F32 => device.build_output_stream(
            &config,
            move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                output.fill_f32(data, channels);
            },
            on_error,
            None,
        ),
        cpal::SampleFormat::I16 => device.build_output_stream(
            &config,
            move |data: &mut [i16], _info: &cpal::OutputCallbackInfo| {
                output.fill_i16(data, channels);
            },
            on_error,
            None,
        ),
        other => return Err(DeviceError::UnsupportedFormat(format!("{:?}", other))),
    };

    stream.map_err(|e| DeviceError::StreamBuildError(e.to_string()))
}

fn open_stream(
    rate: u32,
    output: OutputConsumer,
) -> DeviceResult<(cpal::Stream, u32, String)> {
    let device = default_device()?;
    let name = device.name().unwrap_or_else(|_| "unknown".to_string());
    let supported = output_config(&device, rate)?;
    let actual_rate = supported.sample_rate().0;
    let stream = build_stream(&device, &supported, output)?;
    stream
        .play()
        .map_err(|e| DeviceError::StreamPlayError(e.to_string()))?;
    Ok((stream, actual_rate, name))
}

/// Runs on the device thread: build and start the stream, report back,
/// then keep the stream alive until shutdown.
fn cpal_thread_main(
    rate: u32,
    output: OutputConsumer,
    ready: Sender<DeviceResult<(u32, String)>>,
    shutdown: Receiver<()>,
) {
    let opened = open_stream(rate, output);

    match opened {
        Ok((stream, actual_rate, name)) => {
            if ready.send(Ok((actual_rate, name))).is_err() {
                return;
            }
            // Blocks until the sender is dropped
            let _ = shutdown.recv();
            drop(stream);
            log::debug!("cpal output stream closed");
        }
        Err(e) => {
            let _ = ready.send(Err(e));
        }
    }
}

/// An open cpal output stream
pub struct CpalDevice {
    rate: u32,
    name: String,
    thread: DeviceThread,
}

impl AudioDevice for CpalDevice {
    fn rate(&self) -> u32 {
        self.rate
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn close(mut self: Box<Self>) {
        self.thread.stop();
    }
}

impl AudioBackend for CpalBackend {
    fn name(&self) -> &'static str {
        "cpal"
    }

    fn supported_rate(&self, requested: u32) -> DeviceResult<u32> {
        let device = default_device()?;
        let config = output_config(&device, requested)?;
        Ok(config.sample_rate().0)
    }

    fn open(&self, rate: u32, output: OutputConsumer) -> DeviceResult<Box<dyn AudioDevice>> {
        let (ready_tx, ready_rx) = channel::bounded(1);
        let (shutdown_tx, shutdown_rx) = channel::bounded::<()>(1);

        let handle = thread::Builder::new()
            .name("audio-output".to_string())
            .spawn(move || cpal_thread_main(rate, output, ready_tx, shutdown_rx))
            .map_err(|e| DeviceError::ThreadError(e.to_string()))?;

        let mut thread = DeviceThread {
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        };

        match ready_rx.recv() {
            Ok(Ok((actual_rate, name))) => {
                log::info!("Opened audio device '{}' at {}Hz", name, actual_rate);
                Ok(Box::new(CpalDevice {
                    rate: actual_rate,
                    name,
                    thread,
                }))
            }
            Ok(Err(e)) => {
                thread.stop();
                Err(e)
            }
            Err(_) => {
                thread.stop();
                Err(DeviceError::ThreadError(
                    "audio thread exited before opening the device".to_string(),
                ))
            }
        }
    }
}

// ============================================================================
// Null
// ============================================================================

/// Headless output: consumes frames at the device rate and discards them
#[derive(Debug, Clone, Copy)]
pub struct NullBackend {
    tick: Duration,
}

impl Default for NullBackend {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(5),
        }
    }
}

impl NullBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume audio every `tick` instead of the default 5 ms
    pub fn with_tick(tick: Duration) -> Self {
        Self {
            tick: tick.max(Duration::from_millis(1)),
        }
    }
}

fn null_thread_main(rate: u32, tick: Duration, mut output: OutputConsumer, shutdown: Receiver<()>) {
    let start = Instant::now();
    let mut consumed: u64 = 0;

    loop {
        match shutdown.recv_timeout(tick) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }

        let due = (start.elapsed().as_secs_f64() * f64::from(rate)) as u64;
        let frames = due.saturating_sub(consumed);
        output.discard(frames as usize);
        consumed = due;
    }
}

/// Device handle of `NullBackend`
pub struct NullDevice {
    rate: u32,
    thread: DeviceThread,
}

impl AudioDevice for NullDevice {
    fn rate(&self) -> u32 {
        self.rate
    }

    fn name(&self) -> &str {
        "null"
    }

    fn close(mut self: Box<Self>) {
        self.thread.stop();
    }
}

impl AudioBackend for NullBackend {
    fn name(&self) -> &'static str {
        "null"
    }

    fn supported_rate(&self, requested: u32) -> DeviceResult<u32> {
        Ok(requested.clamp(MIN_RATE, MAX_RATE))
    }

    fn open(&self, rate: u32, output: OutputConsumer) -> DeviceResult<Box<dyn AudioDevice>> {
        let (shutdown_tx, shutdown_rx) = channel::bounded::<()>(1);
        let tick = self.tick;

        let handle = thread::Builder::new()
            .name("null-audio".to_string())
            .spawn(move || null_thread_main(rate, tick, output, shutdown_rx))
            .map_err(|e| DeviceError::ThreadError(e.to_string()))?;

        log::debug!("Opened null audio device at {}Hz", rate);
        Ok(Box::new(NullDevice {
            rate,
            thread: DeviceThread {
                shutdown: Some(shutdown_tx),
                handle: Some(handle),
            },
        }))
    }
}
