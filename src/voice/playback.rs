//! Audio playback to speakers

use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SampleRate;

use crate::{Error, Result};

/// Plays synthesized reply audio on the default output device
///
/// Playback is cancellable: [`request_stop`](Self::request_stop) interrupts a
/// running [`play_mp3`](Self::play_mp3) and discards the remaining samples,
/// so the next playback starts from the beginning of its own buffer.
pub struct AudioPlayback {
    stop_flag: Arc<AtomicBool>,
}

impl AudioPlayback {
    /// Create a playback instance
    ///
    /// # Errors
    ///
    /// Returns [`Error::Device`] if no output device is available
    pub fn new() -> Result<Self> {
        cpal::default_host()
            .default_output_device()
            .ok_or_else(|| Error::Device("no output device available".to_string()))?;

        Ok(Self {
            stop_flag: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Handle that interrupts playback from another task
    #[must_use]
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop_flag)
    }

    /// Interrupt the current playback, if any
    pub fn request_stop(&self) {
        self.stop_flag.store(true, Ordering::Relaxed);
    }

    /// Decode MP3 bytes and play them to completion (or until stopped)
    ///
    /// # Errors
    ///
    /// Returns error if decoding fails or no usable output config exists
    #[allow(clippy::unused_async)]
    pub async fn play_mp3(&mut self, mp3_data: &[u8]) -> Result<()> {
        let (samples, sample_rate) = decode_mp3(mp3_data)?;
        self.play_samples(samples, sample_rate)
    }

    /// Play mono f32 samples, blocking until done or stopped
    fn play_samples(&self, samples: Vec<f32>, sample_rate: u32) -> Result<()> {
        if samples.is_empty() {
            return Ok(());
        }

        self.stop_flag.store(false, Ordering::Relaxed);

        let device = cpal::default_host()
            .default_output_device()
            .ok_or_else(|| Error::Device("no output device".to_string()))?;

        let supported = device
            .supported_output_configs()
            .map_err(|e| Error::Device(e.to_string()))?
            .find(|c| {
                (c.channels() == 1 || c.channels() == 2)
                    && c.min_sample_rate() <= SampleRate(sample_rate)
                    && c.max_sample_rate() >= SampleRate(sample_rate)
            })
            .ok_or_else(|| {
                Error::Device(format!("no output config for {sample_rate} Hz"))
            })?;

        let config = supported.with_sample_rate(SampleRate(sample_rate)).config();
        let channels = config.channels as usize;

        let total = samples.len();
        let samples = Arc::new(Mutex::new(samples));
        let position = Arc::new(AtomicUsize::new(0));
        let position_cb = Arc::clone(&position);
        let samples_cb = Arc::clone(&samples);

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let Ok(samples) = samples_cb.lock() else {
                        data.fill(0.0);
                        return;
                    };
                    let mut pos = position_cb.load(Ordering::Relaxed);

                    for frame in data.chunks_mut(channels) {
                        let sample = samples.get(pos).copied().unwrap_or(0.0);
                        for out in frame.iter_mut() {
                            *out = sample;
                        }
                        if pos < samples.len() {
                            pos += 1;
                        }
                    }

                    position_cb.store(pos, Ordering::Relaxed);
                },
                |err| {
                    tracing::error!(error = %err, "audio playback error");
                },
                None,
            )
            .map_err(|e| Error::Device(e.to_string()))?;

        stream.play().map_err(|e| Error::Device(e.to_string()))?;

        // Poll for completion; the stop flag cuts playback short
        let duration_ms = (total as u64 * 1000) / u64::from(sample_rate);
        let deadline =
            std::time::Instant::now() + std::time::Duration::from_millis(duration_ms + 500);

        loop {
            if self.stop_flag.load(Ordering::Relaxed) {
                tracing::debug!("playback interrupted");
                break;
            }
            if position.load(Ordering::Relaxed) >= total {
                // Small grace period so the device drains its last buffer
                std::thread::sleep(std::time::Duration::from_millis(100));
                break;
            }
            if std::time::Instant::now() > deadline {
                tracing::warn!("playback timed out waiting for completion");
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(50));
        }

        drop(stream);
        tracing::debug!(samples = total, "playback finished");

        Ok(())
    }
}

/// Decode MP3 bytes to mono f32 samples, returning the stream's sample rate
fn decode_mp3(mp3_data: &[u8]) -> Result<(Vec<f32>, u32)> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
    let mut samples = Vec::new();
    let mut sample_rate = 0u32;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                #[allow(clippy::cast_sign_loss)]
                {
                    sample_rate = frame.sample_rate as u32;
                }

                if frame.channels == 2 {
                    // Average stereo down to mono
                    samples.extend(frame.data.chunks(2).map(|chunk| {
                        let left = f32::from(chunk[0]) / 32768.0;
                        let right = f32::from(chunk.get(1).copied().unwrap_or(chunk[0])) / 32768.0;
                        (left + right) / 2.0
                    }));
                } else {
                    samples.extend(frame.data.iter().map(|&s| f32::from(s) / 32768.0));
                }
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::Device(format!("MP3 decode error: {e}"))),
        }
    }

    if sample_rate == 0 {
        return Err(Error::Device("MP3 stream contained no frames".to_string()));
    }

    Ok((samples, sample_rate))
}
