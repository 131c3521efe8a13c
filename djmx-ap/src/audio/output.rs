//! Audio output using cpal
//!
//! The cpal stream is not `Send`, so it is built and kept alive on a dedicated
//! thread. The thread reports the negotiated sample rate back before the
//! caller continues. When no device is available a null output renders the
//! mixer in real time and discards the result, so voice positions still
//! advance (useful on headless hosts).

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::mixer::Mixer;
use super::resampler::TARGET_SAMPLE_RATE;
use crate::error::{Error, Result};

/// Null output render period
const NULL_PERIOD: Duration = Duration::from_millis(10);

/// Handle to the running output thread; dropping it stops the thread
pub struct AudioOutput {
    sample_rate: u32,
    device_name: String,
    shutdown: Arc<AtomicBool>,
    error_flag: Arc<AtomicBool>,
}

impl AudioOutput {
    /// List available output devices
    pub fn list_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();
        let devices = host
            .output_devices()
            .map_err(|e| Error::AudioOutput(format!("Failed to enumerate devices: {}", e)))?
            .filter_map(|device| device.name().ok())
            .collect();
        Ok(devices)
    }

    /// Open a device (default when `device_name` is None) and start rendering
    pub fn open(mixer: Arc<Mixer>, device_name: Option<String>) -> Result<Self> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let error_flag = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(u32, String)>>();

        let thread_shutdown = Arc::clone(&shutdown);
        let thread_error = Arc::clone(&error_flag);
        thread::Builder::new()
            .name("djmx-audio-out".to_string())
            .spawn(move || {
                let started = Self::start_stream(mixer, device_name, thread_error);
                let stream = match started {
                    Ok((stream, rate, name)) => {
                        let _ = ready_tx.send(Ok((rate, name)));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                while !thread_shutdown.load(Ordering::Acquire) {
                    thread::sleep(Duration::from_millis(100));
                }
                drop(stream);
                debug!("Audio output thread stopped");
            })
            .map_err(|e| Error::AudioOutput(format!("Failed to spawn audio thread: {}", e)))?;

        let (sample_rate, device_name) = ready_rx
            .recv()
            .map_err(|_| Error::AudioOutput("Audio thread exited during startup".to_string()))??;

        info!(device = %device_name, sample_rate, "Audio output started");
        Ok(Self {
            sample_rate,
            device_name,
            shutdown,
            error_flag,
        })
    }

    /// Render the mixer without a device
    pub fn null(mixer: Arc<Mixer>, sample_rate: u32) -> Self {
        let shutdown = Arc::new(AtomicBool::new(false));
        let thread_shutdown = Arc::clone(&shutdown);
        let frames = (sample_rate as u64 * NULL_PERIOD.as_millis() as u64 / 1000) as usize;

        let spawned = thread::Builder::new()
            .name("djmx-audio-null".to_string())
            .spawn(move || {
                let mut scratch = vec![0.0f32; frames * 2];
                while !thread_shutdown.load(Ordering::Acquire) {
                    mixer.mix_into(&mut scratch, 2);
                    thread::sleep(NULL_PERIOD);
                }
            });
        if let Err(e) = spawned {
            error!("Failed to spawn null output thread: {}", e);
        }

        info!(sample_rate, "Using null audio output");
        Self {
            sample_rate,
            device_name: "null".to_string(),
            shutdown,
            error_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Open the device, falling back to the null output on failure
    pub fn open_or_null(mixer: Arc<Mixer>, device_name: Option<String>) -> Self {
        match Self::open(Arc::clone(&mixer), device_name) {
            Ok(output) => output,
            Err(e) => {
                warn!("Audio device unavailable ({}), falling back to null output", e);
                Self::null(mixer, TARGET_SAMPLE_RATE)
            }
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// True once the stream reported an error
    pub fn has_error(&self) -> bool {
        self.error_flag.load(Ordering::Acquire)
    }

    fn start_stream(
        mixer: Arc<Mixer>,
        device_name: Option<String>,
        error_flag: Arc<AtomicBool>,
    ) -> Result<(Stream, u32, String)> {
        let host = cpal::default_host();

        let device = match device_name.as_ref() {
            Some(name) => {
                let mut devices = host.output_devices().map_err(|e| {
                    Error::AudioOutput(format!("Failed to enumerate devices: {}", e))
                })?;
                match devices.find(|d| d.name().ok().as_ref() == Some(name)) {
                    Some(device) => device,
                    None => {
                        warn!("Requested device '{}' not found, using default device", name);
                        host.default_output_device().ok_or_else(|| {
                            Error::AudioOutput("No default output device found".to_string())
                        })?
                    }
                }
            }
            None => host
                .default_output_device()
                .ok_or_else(|| Error::AudioOutput("No default output device found".to_string()))?,
        };
        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());

        let (config, sample_format) = Self::get_best_config(&device)?;
        debug!(
            "Audio config: sample_rate={}, channels={}, format={:?}",
            config.sample_rate.0, config.channels, sample_format
        );

        let stream = match sample_format {
            SampleFormat::F32 => Self::build_stream_f32(&device, &config, mixer, error_flag)?,
            SampleFormat::I16 => Self::build_stream_i16(&device, &config, mixer, error_flag)?,
            SampleFormat::U16 => Self::build_stream_u16(&device, &config, mixer, error_flag)?,
            other => {
                return Err(Error::AudioOutput(format!(
                    "Unsupported sample format: {:?}",
                    other
                )))
            }
        };

        stream
            .play()
            .map_err(|e| Error::AudioOutput(format!("Failed to start stream: {}", e)))?;

        Ok((stream, config.sample_rate.0, name))
    }

    /// Prefer 44.1 kHz stereo f32, else the device default
    fn get_best_config(device: &Device) -> Result<(StreamConfig, SampleFormat)> {
        let mut supported = device
            .supported_output_configs()
            .map_err(|e| Error::AudioOutput(format!("Failed to get device configs: {}", e)))?;

        let preferred = supported.find(|c| {
            c.channels() == 2
                && c.min_sample_rate().0 <= TARGET_SAMPLE_RATE
                && c.max_sample_rate().0 >= TARGET_SAMPLE_RATE
                && c.sample_format() == SampleFormat::F32
        });

        if let Some(c) = preferred {
            let format = c.sample_format();
            return Ok((
                c.with_sample_rate(cpal::SampleRate(TARGET_SAMPLE_RATE)).config(),
                format,
            ));
        }

        let default = device
            .default_output_config()
            .map_err(|e| Error::AudioOutput(format!("Failed to get default config: {}", e)))?;
        let format = default.sample_format();
        Ok((default.config(), format))
    }

    fn on_stream_error(error_flag: Arc<AtomicBool>) -> impl FnMut(cpal::StreamError) + Send + 'static {
        move |err| {
            error!("Audio stream error: {}", err);
            error_flag.store(true, Ordering::Release);
        }
    }

    fn build_stream_f32(
        device: &Device,
        config: &StreamConfig,
        mixer: Arc<Mixer>,
        error_flag: Arc<AtomicBool>,
    ) -> Result<Stream> {
        let channels = config.channels as usize;
        device
            .build_output_stream(
                config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    mixer.mix_into(data, channels);
                },
                Self::on_stream_error(error_flag),
                None,
            )
            .map_err(|e| Error::AudioOutput(format!("Failed to build stream: {}", e)))
    }

    fn build_stream_i16(
        device: &Device,
        config: &StreamConfig,
        mixer: Arc<Mixer>,
        error_flag: Arc<AtomicBool>,
    ) -> Result<Stream> {
        let channels = config.channels as usize;
        let mut scratch: Vec<f32> = Vec::new();
        device
            .build_output_stream(
                config,
                move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                    scratch.resize(data.len(), 0.0);
                    mixer.mix_into(&mut scratch, channels);
                    for (out, s) in data.iter_mut().zip(&scratch) {
                        *out = (s * i16::MAX as f32) as i16;
                    }
                },
                Self::on_stream_error(error_flag),
                None,
            )
            .map_err(|e| Error::AudioOutput(format!("Failed to build stream: {}", e)))
    }

    fn build_stream_u16(
        device: &Device,
        config: &StreamConfig,
        mixer: Arc<Mixer>,
        error_flag: Arc<AtomicBool>,
    ) -> Result<Stream> {
        let channels = config.channels as usize;
        let mut scratch: Vec<f32> = Vec::new();
        device
            .build_output_stream(
                config,
                move |data: &mut [u16], _: &cpal::OutputCallbackInfo| {
                    scratch.resize(data.len(), 0.0);
                    mixer.mix_into(&mut scratch, channels);
                    for (out, s) in data.iter_mut().zip(&scratch) {
                        *out = ((s + 1.0) * 32767.5) as u16;
                    }
                },
                Self::on_stream_error(error_flag),
                None,
            )
            .map_err(|e| Error::AudioOutput(format!("Failed to build stream: {}", e)))
    }
}

impl Drop for AudioOutput {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
    }
}
