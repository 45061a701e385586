//! CPAL-based audio context.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig};
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tl_engine::{AudioBuffer, AudioContext, ContextError, ContextState};

type StereoFrame = [f32; 2];

/// Default output device, fed through a lock-free ring buffer.
///
/// The stream is built lazily on the first `resume`, which is also the
/// point where a suspended context starts pulling audio again.
pub struct CpalContext {
    device: Device,
    config: StreamConfig,
    stream: Option<Stream>,
    producer: HeapProd<StereoFrame>,
    consumer: Option<HeapCons<StereoFrame>>,
    running: Arc<AtomicBool>,
    state: ContextState,
}

impl CpalContext {
    /// Open the default output device.
    pub fn new() -> Result<Self, ContextError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(ContextError::NoDevice)?;

        let config = device
            .default_output_config()
            .map_err(|e| ContextError::DeviceInit(e.to_string()))?;

        let mut config: StreamConfig = config.into();
        // The callback interleaves stereo
        config.channels = 2;

        // About 200ms of frames
        let capacity = (config.sample_rate.0 as usize / 10) * 2;
        let (producer, consumer) = HeapRb::<StereoFrame>::new(capacity).split();

        log::info!(
            "opened output device {:?} at {} Hz",
            device.name().unwrap_or_default(),
            config.sample_rate.0
        );

        Ok(Self {
            device,
            config,
            stream: None,
            producer,
            consumer: Some(consumer),
            running: Arc::new(AtomicBool::new(false)),
            state: ContextState::Suspended,
        })
    }

    fn build_stream(&mut self) -> Result<(), ContextError> {
        let Some(mut consumer) = self.consumer.take() else {
            return Err(ContextError::Stream("ring buffer consumer already taken".into()));
        };
        let running = self.running.clone();
        let channels = self.config.channels as usize;

        let stream = self
            .device
            .build_output_stream(
                &self.config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    if !running.load(Ordering::Relaxed) {
                        data.fill(0.0);
                        return;
                    }
                    fill_interleaved(data, channels, || consumer.try_pop());
                },
                |err| log::error!("audio stream error: {}", err),
                None,
            )
            .map_err(|e| ContextError::Stream(e.to_string()))?;

        self.stream = Some(stream);
        Ok(())
    }

    /// Drop the stream. A closed context cannot be resumed.
    pub fn close(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        self.stream = None;
        self.state = ContextState::Closed;
        log::info!("audio context closed");
    }
}

/// Write stereo frames from `next` into an interleaved device buffer of
/// `channels` channels. Extra channels and underruns are zero-filled.
fn fill_interleaved(data: &mut [f32], channels: usize, mut next: impl FnMut() -> Option<StereoFrame>) {
    for chunk in data.chunks_mut(channels.max(1)) {
        let frame = next().unwrap_or([0.0; 2]);
        for (i, sample) in chunk.iter_mut().enumerate() {
            *sample = match i {
                0 => frame[0],
                1 => frame[1],
                _ => 0.0,
            };
        }
    }
}

impl AudioContext for CpalContext {
    fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    fn state(&self) -> ContextState {
        self.state
    }

    fn resume(&mut self) -> Result<(), ContextError> {
        match self.state {
            ContextState::Closed => return Err(ContextError::Closed),
            ContextState::Running => return Ok(()),
            ContextState::Suspended => {}
        }
        if self.stream.is_none() {
            self.build_stream()?;
        }
        self.running.store(true, Ordering::Relaxed);
        if let Some(stream) = &self.stream {
            stream.play().map_err(|e| ContextError::Stream(e.to_string()))?;
        }
        self.state = ContextState::Running;
        log::info!("audio context running");
        Ok(())
    }

    fn suspend(&mut self) -> Result<(), ContextError> {
        if self.state != ContextState::Running {
            return Ok(());
        }
        self.running.store(false, Ordering::Relaxed);
        if let Some(stream) = &self.stream {
            stream.pause().map_err(|e| ContextError::Stream(e.to_string()))?;
        }
        self.state = ContextState::Suspended;
        log::info!("audio context suspended");
        Ok(())
    }

    fn write(&mut self, block: &AudioBuffer) -> Result<(), ContextError> {
        if self.state == ContextState::Closed {
            return Err(ContextError::Closed);
        }
        let left = block.channel(0);
        let right = block.channel(block.channels().saturating_sub(1));
        let mut dropped = 0;
        for (&l, &r) in left.iter().zip(right) {
            // Non-blocking; drop frames if the device fell behind
            if self.producer.try_push([l, r]).is_err() {
                dropped += 1;
            }
        }
        if dropped > 0 {
            log::warn!("output ring buffer full, dropped {} frames", dropped);
        }
        Ok(())
    }

    fn queued_frames(&self) -> usize {
        self.producer.occupied_len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_stereo_and_zeroes_extra_channels() {
        let mut frames = vec![[0.25, -0.5], [1.0, 0.0]].into_iter();
        let mut data = [9.0f32; 8];
        fill_interleaved(&mut data, 4, || frames.next());
        assert_eq!(data, [0.25, -0.5, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn underrun_writes_silence() {
        let mut data = [1.0f32; 6];
        fill_interleaved(&mut data, 2, || None);
        assert!(data.iter().all(|&s| s == 0.0));
    }
}
