//! CPAL output backend.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, SampleRate, Stream, StreamConfig};

use super::{OutputBackend, OutputDeviceInfo, PlaybackStream};
use crate::format::{f32_to_i16, AudioFormat};
use crate::sink::SinkRenderer;
use crate::{RouterError, SinkError};

/// Lists the host's output devices in enumeration order.
///
/// The position in this list is the device index used as a
/// [`SinkId`](crate::SinkId).
///
/// # Errors
///
/// Returns [`RouterError::Backend`] if the host cannot enumerate devices.
pub fn list_output_devices() -> Result<Vec<OutputDeviceInfo>, RouterError> {
    let host = cpal::default_host();
    let devices = host
        .output_devices()
        .map_err(|e| RouterError::Backend(e.to_string()))?;

    Ok(devices
        .enumerate()
        .map(|(index, device)| {
            let name = device.name().unwrap_or_else(|_| "unknown".to_string());
            let channels = device
                .default_output_config()
                .map(|config| config.channels())
                .unwrap_or(0);
            OutputDeviceInfo::new(index, name, channels)
        })
        .collect())
}

/// Plays sinks through CPAL output devices.
///
/// Devices are matched by name first and by index second, since indices
/// shift when devices are plugged in or removed.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpalOutput;

impl CpalOutput {
    /// Creates the backend on the default host.
    pub fn new() -> Self {
        Self
    }

    fn find_device(info: &OutputDeviceInfo) -> Result<Device, SinkError> {
        let host = cpal::default_host();
        let devices = host
            .output_devices()
            .map_err(|e| SinkError::init_failed(e.to_string()))?;

        let mut by_index = None;
        for (index, device) in devices.enumerate() {
            if device.name().is_ok_and(|name| name == info.name) {
                return Ok(device);
            }
            if index == info.index {
                by_index = Some(device);
            }
        }

        by_index.ok_or_else(|| {
            SinkError::init_failed(format!("output device '{}' not found", info.name))
        })
    }

    fn build_f32_stream(
        device: &Device,
        config: &StreamConfig,
        mut renderer: SinkRenderer,
        playing: Arc<AtomicBool>,
    ) -> Result<Stream, SinkError> {
        let report = renderer.error_reporter();
        device
            .build_output_stream(
                config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    if !playing.load(Ordering::Relaxed) {
                        data.fill(0.0);
                        return;
                    }
                    renderer.render(data);
                },
                move |err| {
                    tracing::error!(error = %err, "Audio output stream error");
                    report(SinkError::playback(err.to_string()));
                },
                None,
            )
            .map_err(|e| SinkError::init_failed(e.to_string()))
    }

    fn build_i16_stream(
        device: &Device,
        config: &StreamConfig,
        mut renderer: SinkRenderer,
        playing: Arc<AtomicBool>,
    ) -> Result<Stream, SinkError> {
        let report = renderer.error_reporter();
        let mut scratch: Vec<f32> = Vec::new();
        device
            .build_output_stream(
                config,
                move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                    if !playing.load(Ordering::Relaxed) {
                        data.fill(0);
                        return;
                    }
                    scratch.resize(data.len(), 0.0);
                    renderer.render(&mut scratch);
                    for (out, sample) in data.iter_mut().zip(&scratch) {
                        *out = f32_to_i16(*sample);
                    }
                },
                move |err| {
                    tracing::error!(error = %err, "Audio output stream error");
                    report(SinkError::playback(err.to_string()));
                },
                None,
            )
            .map_err(|e| SinkError::init_failed(e.to_string()))
    }
}

impl OutputBackend for CpalOutput {
    fn open(
        &self,
        info: &OutputDeviceInfo,
        format: &AudioFormat,
        renderer: SinkRenderer,
    ) -> Result<Box<dyn PlaybackStream>, SinkError> {
        let device = Self::find_device(info)?;
        let sample_format = device
            .default_output_config()
            .map_err(|e| SinkError::init_failed(e.to_string()))?
            .sample_format();

        let config = StreamConfig {
            channels: format.channels,
            sample_rate: SampleRate(format.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let playing = Arc::new(AtomicBool::new(false));
        let stream = match sample_format {
            SampleFormat::F32 => {
                Self::build_f32_stream(&device, &config, renderer, Arc::clone(&playing))?
            }
            SampleFormat::I16 => {
                Self::build_i16_stream(&device, &config, renderer, Arc::clone(&playing))?
            }
            other => {
                return Err(SinkError::init_failed(format!(
                    "unsupported device sample format {other:?}"
                )));
            }
        };

        tracing::debug!(
            device = %info.name,
            sample_rate = format.sample_rate,
            channels = format.channels,
            "Audio output stream built"
        );

        Ok(Box::new(CpalPlayback { stream, playing }))
    }

    fn name(&self) -> &'static str {
        "CPAL output"
    }
}

/// A running CPAL output stream. Dropping it closes the device.
struct CpalPlayback {
    stream: Stream,
    playing: Arc<AtomicBool>,
}

impl PlaybackStream for CpalPlayback {
    fn play(&mut self) -> Result<(), SinkError> {
        self.stream
            .play()
            .map_err(|e| SinkError::playback(e.to_string()))?;
        self.playing.store(true, Ordering::Relaxed);
        Ok(())
    }

    fn pause(&mut self) -> Result<(), SinkError> {
        self.playing.store(false, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[ignore = "requires audio hardware"]
    fn test_list_output_devices() {
        let devices = list_output_devices().unwrap();
        for device in &devices {
            println!("{}: {} ({} ch)", device.index, device.name, device.channels);
        }
    }

    #[test]
    #[ignore = "requires audio hardware"]
    fn test_missing_device_fails_to_open() {
        let info = OutputDeviceInfo::new(usize::MAX, "no such device", 2);
        assert!(CpalOutput::find_device(&info).is_err());
    }
}
