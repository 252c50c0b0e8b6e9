//! CPAL loopback backend.
//!
//! On WASAPI, CPAL opens an input stream on an output device in loopback
//! mode, delivering exactly what the device is playing. Hosts without
//! loopback support fail at `start` with
//! [`RouterError::CaptureUnavailable`].

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};

use super::{BlockCallback, CaptureBackend, CaptureEndpoint, CaptureErrorCallback};
use crate::block::RawBlock;
use crate::format::{AudioFormat, SampleEncoding};
use crate::RouterError;

/// Lists output endpoints that can be captured.
///
/// Safe to call before any capture starts.
///
/// # Errors
///
/// Returns [`RouterError::Backend`] if the host cannot enumerate devices.
pub fn list_capture_endpoints() -> Result<Vec<CaptureEndpoint>, RouterError> {
    let host = cpal::default_host();
    let default_name = host.default_output_device().and_then(|d| d.name().ok());
    let devices = host
        .output_devices()
        .map_err(|e| RouterError::Backend(e.to_string()))?;

    Ok(devices
        .filter_map(|device| device.name().ok())
        .map(|name| CaptureEndpoint {
            is_default: default_name.as_deref() == Some(name.as_str()),
            id: name.clone(),
            display_name: name,
        })
        .collect())
}

/// Captures an output device's mix through CPAL.
#[derive(Default)]
pub struct CpalLoopback {
    stream: Option<Stream>,
}

impl CpalLoopback {
    /// Creates an idle backend.
    pub fn new() -> Self {
        Self::default()
    }

    fn open_device(endpoint: Option<&str>) -> Result<Device, RouterError> {
        let host = cpal::default_host();
        match endpoint {
            None => host
                .default_output_device()
                .ok_or_else(|| RouterError::capture_unavailable("no default output device")),
            Some(id) => host
                .output_devices()
                .map_err(|e| RouterError::capture_unavailable(e.to_string()))?
                .find(|d| d.name().is_ok_and(|name| name == id))
                .ok_or_else(|| {
                    RouterError::capture_unavailable(format!("output endpoint '{id}' not found"))
                }),
        }
    }

    fn build_f32_stream(
        device: &Device,
        config: &StreamConfig,
        format: AudioFormat,
        mut on_block: BlockCallback,
        mut on_error: CaptureErrorCallback,
    ) -> Result<Stream, RouterError> {
        let mut scratch: Vec<u8> = Vec::new();
        device
            .build_input_stream(
                config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    scratch.clear();
                    for sample in data {
                        scratch.extend_from_slice(&sample.to_le_bytes());
                    }
                    on_block(&RawBlock::new(&scratch, format));
                },
                move |err| {
                    tracing::error!(error = %err, "Loopback capture stream error");
                    on_error(err.to_string());
                },
                None,
            )
            .map_err(|e| RouterError::capture_unavailable(e.to_string()))
    }

    fn build_i16_stream(
        device: &Device,
        config: &StreamConfig,
        format: AudioFormat,
        mut on_block: BlockCallback,
        mut on_error: CaptureErrorCallback,
    ) -> Result<Stream, RouterError> {
        let mut scratch: Vec<u8> = Vec::new();
        device
            .build_input_stream(
                config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    scratch.clear();
                    for sample in data {
                        scratch.extend_from_slice(&sample.to_le_bytes());
                    }
                    on_block(&RawBlock::new(&scratch, format));
                },
                move |err| {
                    tracing::error!(error = %err, "Loopback capture stream error");
                    on_error(err.to_string());
                },
                None,
            )
            .map_err(|e| RouterError::capture_unavailable(e.to_string()))
    }
}

impl CaptureBackend for CpalLoopback {
    fn start(
        &mut self,
        endpoint: Option<&str>,
        on_block: BlockCallback,
        on_error: CaptureErrorCallback,
    ) -> Result<AudioFormat, RouterError> {
        let device = Self::open_device(endpoint)?;
        let supported = device
            .default_output_config()
            .map_err(|e| RouterError::capture_unavailable(e.to_string()))?;

        let sample_format = supported.sample_format();
        let config: StreamConfig = supported.into();
        let encoding = match sample_format {
            SampleFormat::F32 => SampleEncoding::Float32,
            SampleFormat::I16 => SampleEncoding::Pcm16,
            other => {
                return Err(RouterError::capture_unavailable(format!(
                    "unsupported mix format {other:?}"
                )));
            }
        };
        let format = AudioFormat::new(config.sample_rate.0, config.channels, encoding);

        let stream = match encoding {
            SampleEncoding::Pcm16 => {
                Self::build_i16_stream(&device, &config, format, on_block, on_error)?
            }
            _ => Self::build_f32_stream(&device, &config, format, on_block, on_error)?,
        };
        stream
            .play()
            .map_err(|e| RouterError::capture_unavailable(e.to_string()))?;

        self.stream = Some(stream);
        Ok(format)
    }

    fn stop(&mut self) {
        // Dropping the stream halts the callback before returning
        self.stream = None;
    }

    fn name(&self) -> &'static str {
        "CPAL loopback"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[ignore = "requires audio hardware"]
    fn test_list_capture_endpoints() {
        let endpoints = list_capture_endpoints().unwrap();
        assert!(endpoints.iter().filter(|e| e.is_default).count() <= 1);
    }

    #[test]
    #[ignore = "requires audio hardware with loopback support"]
    fn test_cpal_loopback_start_stop() {
        let mut backend = CpalLoopback::new();
        let format = backend
            .start(None, Box::new(|_| {}), Box::new(|_| {}))
            .unwrap();
        assert!(format.sample_rate > 0);
        assert!(format.channels > 0);
        backend.stop();
    }

    #[test]
    #[ignore = "requires audio hardware"]
    fn test_unknown_endpoint_is_unavailable() {
        let mut backend = CpalLoopback::new();
        let err = backend
            .start(Some("no such endpoint"), Box::new(|_| {}), Box::new(|_| {}))
            .unwrap_err();
        assert!(matches!(err, RouterError::CaptureUnavailable { .. }));
    }
}
