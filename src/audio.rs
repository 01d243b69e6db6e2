use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{
    BackendSpecificError, BuildStreamError, DefaultStreamConfigError, Device, FromSample,
    InputCallbackInfo, PlayStreamError, Sample, SampleFormat, SizedSample, Stream, StreamConfig,
    StreamError,
};
use crossbeam_channel::{Receiver, Sender, TrySendError};
use std::time::Duration;
use thiserror::Error;

use crate::analyser::ByteFrequencyAnalyser;

/// Frame chunks buffered between the audio callback and the sampler.
const FRAME_CHANNEL_CAPACITY: usize = 64;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("No input device available")]
    NoDevice,

    #[error("No input device matching '{0}'")]
    DeviceNotFound(String),

    #[error("Microphone access denied: {0}")]
    PermissionDenied(String),

    #[error("Failed to get device config: {0}")]
    Config(String),

    #[error("Unsupported sample format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to build input stream: {0}")]
    Stream(String),

    #[error("Failed to start stream: {0}")]
    Play(String),
}

fn is_permission_error(err: &BackendSpecificError) -> bool {
    let text = err.description.to_lowercase();
    text.contains("permission") || text.contains("denied") || text.contains("not authorized")
}

impl From<DefaultStreamConfigError> for CaptureError {
    fn from(err: DefaultStreamConfigError) -> Self {
        match err {
            DefaultStreamConfigError::DeviceNotAvailable => CaptureError::NoDevice,
            DefaultStreamConfigError::BackendSpecific { err } if is_permission_error(&err) => {
                CaptureError::PermissionDenied(err.description)
            }
            other => CaptureError::Config(other.to_string()),
        }
    }
}

impl From<BuildStreamError> for CaptureError {
    fn from(err: BuildStreamError) -> Self {
        match err {
            BuildStreamError::DeviceNotAvailable => CaptureError::NoDevice,
            BuildStreamError::BackendSpecific { err } if is_permission_error(&err) => {
                CaptureError::PermissionDenied(err.description)
            }
            other => CaptureError::Stream(other.to_string()),
        }
    }
}

impl From<PlayStreamError> for CaptureError {
    fn from(err: PlayStreamError) -> Self {
        match err {
            PlayStreamError::DeviceNotAvailable => CaptureError::NoDevice,
            PlayStreamError::BackendSpecific { err } if is_permission_error(&err) => {
                CaptureError::PermissionDenied(err.description)
            }
            other => CaptureError::Play(other.to_string()),
        }
    }
}

/// Supplies fixed-length frequency-magnitude snapshots on demand.
pub trait SnapshotSource {
    fn snapshot(&mut self) -> &[u8];
}

/// Live microphone input feeding a byte frequency analyser.
pub struct MicrophoneSource {
    _stream: Stream,
    rx_frames: Receiver<Vec<f32>>,
    analyser: ByteFrequencyAnalyser,
    device_name: String,
    sample_rate: u32,
}

impl MicrophoneSource {
    /// Opens the default input device, or the first one whose name contains
    /// `device_name`, and starts capturing.
    pub fn open(device_name: Option<&str>, fft_size: usize) -> Result<Self, CaptureError> {
        let host = cpal::default_host();
        let device = match device_name {
            Some(wanted) => find_input_device(&host, wanted)?,
            None => host.default_input_device().ok_or(CaptureError::NoDevice)?,
        };

        let name = device
            .name()
            .unwrap_or_else(|_| "Unknown Device".to_string());

        let input_cfg = device.default_input_config()?;
        let cfg = input_cfg.config();
        let channels = cfg.channels as usize;
        let sample_rate = cfg.sample_rate.0;

        log::info!(
            "Opening input '{}' ({} Hz, {} ch, {:?})",
            name,
            sample_rate,
            channels,
            input_cfg.sample_format()
        );

        let (tx_frames, rx_frames) = crossbeam_channel::bounded::<Vec<f32>>(FRAME_CHANNEL_CAPACITY);
        let stream = create_input_stream(
            &device,
            input_cfg.sample_format(),
            &cfg,
            channels,
            tx_frames,
            rx_frames.clone(),
        )?;

        Ok(Self {
            _stream: stream,
            rx_frames,
            analyser: ByteFrequencyAnalyser::new(fft_size),
            device_name: name,
            sample_rate,
        })
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl SnapshotSource for MicrophoneSource {
    fn snapshot(&mut self) -> &[u8] {
        while let Ok(chunk) = self.rx_frames.try_recv() {
            self.analyser.push_samples(&chunk);
        }
        self.analyser.byte_frequency_data()
    }
}

fn find_input_device(host: &cpal::Host, wanted: &str) -> Result<Device, CaptureError> {
    let devices = host
        .input_devices()
        .map_err(|e| CaptureError::Config(e.to_string()))?;
    let wanted_lower = wanted.to_lowercase();
    for device in devices {
        if let Ok(name) = device.name() {
            if name.to_lowercase().contains(&wanted_lower) {
                return Ok(device);
            }
        }
    }
    Err(CaptureError::DeviceNotFound(wanted.to_string()))
}

/// Names of every input device on the default host.
pub fn list_input_devices() -> Result<Vec<String>, CaptureError> {
    let host = cpal::default_host();
    let devices = host
        .input_devices()
        .map_err(|e| CaptureError::Config(e.to_string()))?;
    Ok(devices
        .map(|d| d.name().unwrap_or_else(|_| "Unknown Device".to_string()))
        .collect())
}

/// Queues `chunk`, evicting the oldest queued chunk when the channel is full.
fn send_latest(tx: &Sender<Vec<f32>>, rx: &Receiver<Vec<f32>>, chunk: Vec<f32>) {
    if let Err(TrySendError::Full(chunk)) = tx.try_send(chunk) {
        let _ = rx.try_recv();
        let _ = tx.try_send(chunk);
    }
}

/// Averages one interleaved frame down to mono.
fn downmix<T>(frame: &[T]) -> f32
where
    T: Sample,
    f32: FromSample<<T as Sample>::Float>,
{
    if frame.is_empty() {
        return 0.0;
    }
    let sum: f32 = frame
        .iter()
        .map(|s| f32::from_sample(s.to_float_sample()))
        .sum();
    sum / frame.len() as f32
}

pub fn build_input_stream<T>(
    device: &Device,
    cfg: &StreamConfig,
    channels: usize,
    tx_frames: Sender<Vec<f32>>,
    rx_evict: Receiver<Vec<f32>>,
) -> Result<Stream, CaptureError>
where
    T: Sample + Send + 'static + SizedSample + std::fmt::Debug,
    f32: FromSample<<T as Sample>::Float>,
{
    let err_callback = |err: StreamError| log::error!("an error occurred on input stream: {}", err);

    let channels = channels.max(1);
    let input_callback = move |data: &[T], _info: &InputCallbackInfo| {
        let mono_chunk: Vec<f32> = data.chunks(channels).map(downmix::<T>).collect();
        if !mono_chunk.is_empty() {
            send_latest(&tx_frames, &rx_evict, mono_chunk);
        }
    };

    let latency = Some(Duration::from_millis(20));
    let stream = device.build_input_stream(cfg, input_callback, err_callback, latency)?;
    stream.play()?;
    Ok(stream)
}

pub fn create_input_stream(
    device: &Device,
    sample_format: SampleFormat,
    cfg: &StreamConfig,
    channels: usize,
    tx_frames: Sender<Vec<f32>>,
    rx_evict: Receiver<Vec<f32>>,
) -> Result<Stream, CaptureError> {
    match sample_format {
        SampleFormat::F32 => build_input_stream::<f32>(device, cfg, channels, tx_frames, rx_evict),
        SampleFormat::I16 => build_input_stream::<i16>(device, cfg, channels, tx_frames, rx_evict),
        SampleFormat::U16 => build_input_stream::<u16>(device, cfg, channels, tx_frames, rx_evict),
        other => Err(CaptureError::UnsupportedFormat(format!("{:?}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downmix_averages_channels() {
        assert_eq!(downmix(&[0.5f32, -0.5]), 0.0);
        assert_eq!(downmix(&[0.25f32, 0.75]), 0.5);
        assert_eq!(downmix::<f32>(&[]), 0.0);
    }

    #[test]
    fn downmix_converts_integer_samples() {
        let v = downmix(&[i16::MAX]);
        assert!((v - 1.0).abs() < 1e-3);
        let u = downmix(&[u16::MAX / 2 + 1]);
        assert!(u.abs() < 1e-3);
    }

    #[test]
    fn full_channel_keeps_the_newest_chunks() {
        let (tx, rx) = crossbeam_channel::bounded::<Vec<f32>>(2);
        send_latest(&tx, &rx, vec![1.0]);
        send_latest(&tx, &rx, vec![2.0]);
        send_latest(&tx, &rx, vec![3.0]);

        assert_eq!(rx.try_recv().ok(), Some(vec![2.0]));
        assert_eq!(rx.try_recv().ok(), Some(vec![3.0]));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn backend_permission_errors_are_classified() {
        let err = BuildStreamError::BackendSpecific {
            err: BackendSpecificError {
                description: "Permission denied by the OS".to_string(),
            },
        };
        assert!(matches!(CaptureError::from(err), CaptureError::PermissionDenied(_)));

        let err = BuildStreamError::BackendSpecific {
            err: BackendSpecificError {
                description: "device busy".to_string(),
            },
        };
        assert!(matches!(CaptureError::from(err), CaptureError::Stream(_)));
    }

    #[test]
    fn missing_device_maps_to_no_device() {
        let err = CaptureError::from(DefaultStreamConfigError::DeviceNotAvailable);
        assert!(matches!(err, CaptureError::NoDevice));
        assert_eq!(err.to_string(), "No input device available");
    }
}
