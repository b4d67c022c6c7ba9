//! Microphone capture
//!
//! Records a fixed duration from the default input device into a scoped
//! temporary WAV file. The file is removed when the returned handle drops,
//! on every exit path.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SampleFormat;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use super::AudioSource;

/// Errors from audio capture
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("no default input device")]
    NoDevice,

    #[error("audio stream error: {0}")]
    Stream(String),

    #[error("could not write capture buffer: {0}")]
    Wav(#[from] hound::Error),

    #[error("capture task failed: {0}")]
    Io(#[from] std::io::Error),
}

/// [`AudioSource`] over the default cpal input device.
pub struct MicrophoneSource;

#[async_trait]
impl AudioSource for MicrophoneSource {
    async fn capture(&self, duration: Duration) -> Result<NamedTempFile, CaptureError> {
        // cpal streams are not Send; the whole capture runs on one blocking
        // thread and only the finished temp file crosses back.
        tokio::task::spawn_blocking(move || capture_blocking(duration))
            .await
            .map_err(|e| CaptureError::Stream(e.to_string()))?
    }
}

fn capture_blocking(duration: Duration) -> Result<NamedTempFile, CaptureError> {
    let host = cpal::default_host();
    let device = host.default_input_device().ok_or(CaptureError::NoDevice)?;
    let config = device
        .default_input_config()
        .map_err(|e| CaptureError::Stream(e.to_string()))?;

    let sample_rate = config.sample_rate().0;
    let channels = config.channels() as usize;
    let samples: Arc<Mutex<Vec<i16>>> = Arc::new(Mutex::new(Vec::new()));

    debug!(sample_rate, channels, secs = duration.as_secs(), "recording audio");

    let err_fn = |e| warn!(?e, "input stream error");
    let stream = match config.sample_format() {
        SampleFormat::F32 => {
            let samples = Arc::clone(&samples);
            device.build_input_stream(
                &config.into(),
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let mut buffer = samples.lock().expect("capture buffer lock");
                    for frame in data.chunks(channels) {
                        let value = (frame[0] * 32767.0).clamp(-32768.0, 32767.0) as i16;
                        buffer.push(value);
                    }
                },
                err_fn,
                None,
            )
        }
        SampleFormat::I16 => {
            let samples = Arc::clone(&samples);
            device.build_input_stream(
                &config.into(),
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    let mut buffer = samples.lock().expect("capture buffer lock");
                    for frame in data.chunks(channels) {
                        buffer.push(frame[0]);
                    }
                },
                err_fn,
                None,
            )
        }
        other => return Err(CaptureError::Stream(format!("unsupported sample format {other:?}"))),
    }
    .map_err(|e| CaptureError::Stream(e.to_string()))?;

    stream.play().map_err(|e| CaptureError::Stream(e.to_string()))?;
    std::thread::sleep(duration);
    drop(stream);

    let captured = match Arc::try_unwrap(samples) {
        Ok(buffer) => buffer.into_inner().unwrap_or_default(),
        // cpal can briefly hold a callback clone after drop
        Err(shared) => shared.lock().map(|b| b.clone()).unwrap_or_default(),
    };
    debug!(frames = captured.len(), "recording complete");

    let file = tempfile::Builder::new().suffix(".wav").tempfile()?;
    write_wav(file.path(), &captured, sample_rate)?;
    Ok(file)
}

/// 16-bit mono PCM WAV encode.
fn write_wav(path: &Path, samples: &[i16], sample_rate: u32) -> Result<(), hound::Error> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_wav_round_trip() {
        let file = tempfile::Builder::new().suffix(".wav").tempfile().unwrap();
        let samples: Vec<i16> = vec![0, 1000, -1000, i16::MAX, i16::MIN];
        write_wav(file.path(), &samples, 16000).unwrap();

        let reader = hound::WavReader::open(file.path()).unwrap();
        assert_eq!(reader.spec().channels, 1);
        assert_eq!(reader.spec().sample_rate, 16000);
        let read: Vec<i16> = reader.into_samples::<i16>().map(Result::unwrap).collect();
        assert_eq!(read, samples);
    }
}
