// output.rs - Lock-free hand-off to the audio callback

//! Rendered audio travels from the mixer worker to the hardware callback
//! through an `rtrb` single-producer single-consumer ring of stereo frames.
//! The callback side never locks or allocates; when the ring runs dry it
//! plays silence and counts the missing frames.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::sound::mixer::types::OUTPUT_CHANNELS;

/// One interleaved stereo frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StereoFrame {
    pub left: i16,
    pub right: i16,
}

impl StereoFrame {
    pub const SILENCE: StereoFrame = StereoFrame { left: 0, right: 0 };
}

/// Create a ring holding up to `capacity_frames` frames
pub fn output_ring(capacity_frames: usize) -> (OutputProducer, OutputConsumer) {
    let (producer, consumer) = rtrb::RingBuffer::<StereoFrame>::new(capacity_frames.max(1));
    let underruns = Arc::new(AtomicU64::new(0));
    (
        OutputProducer { producer },
        OutputConsumer {
            consumer,
            underruns,
        },
    )
}

/// Worker side of the output ring
pub struct OutputProducer {
    producer: rtrb::Producer<StereoFrame>,
}

impl OutputProducer {
    /// Whether `frames` more frames fit without overwriting unread audio
    pub fn has_room(&self, frames: usize) -> bool {
        self.producer.slots() >= frames
    }

    /// Free space in frames
    pub fn free_frames(&self) -> usize {
        self.producer.slots()
    }

    /// Push an interleaved stereo buffer; returns frames written.
    /// Frames that do not fit are dropped.
    pub fn publish(&mut self, interleaved: &[i16]) -> usize {
        let frames = (interleaved.len() / OUTPUT_CHANNELS).min(self.producer.slots());
        if frames == 0 {
            return 0;
        }

        let Ok(mut chunk) = self.producer.write_chunk(frames) else {
            return 0;
        };
        let (first, second) = chunk.as_mut_slices();
        let src = interleaved.chunks_exact(OUTPUT_CHANNELS);
        for (dst, pair) in first.iter_mut().chain(second.iter_mut()).zip(src) {
            *dst = StereoFrame {
                left: pair[0],
                right: pair[1],
            };
        }
        chunk.commit_all();
        frames
    }

    /// Whether the callback side has been dropped (device closed)
    pub fn is_abandoned(&self) -> bool {
        self.producer.is_abandoned()
    }
}

/// Callback side of the output ring
pub struct OutputConsumer {
    consumer: rtrb::Consumer<StereoFrame>,
    underruns: Arc<AtomicU64>,
}

impl OutputConsumer {
    /// Counter of frames played as silence, shared with the mixer
    pub fn underrun_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.underruns)
    }

    /// Frames ready to be played
    pub fn available_frames(&self) -> usize {
        self.consumer.slots()
    }

    fn next_frame(&mut self) -> Option<StereoFrame> {
        self.consumer.pop().ok()
    }

    /// Fill an interleaved i16 buffer with `channels` channels per frame
    pub fn fill_i16(&mut self, data: &mut [i16], channels: usize) {
        let mut missing = 0u64;
        for frame in data.chunks_mut(channels.max(1)) {
            let sample = self.next_frame().unwrap_or_else(|| {
                missing += 1;
                StereoFrame::SILENCE
            });
            write_frame(frame, sample.left, sample.right, 0);
        }
        self.record_underrun(missing);
    }

    /// Fill an interleaved f32 buffer with `channels` channels per frame
    pub fn fill_f32(&mut self, data: &mut [f32], channels: usize) {
        let mut missing = 0u64;
        for frame in data.chunks_mut(channels.max(1)) {
            let sample = self.next_frame().unwrap_or_else(|| {
                missing += 1;
                StereoFrame::SILENCE
            });
            write_frame(
                frame,
                i16_to_f32(sample.left),
                i16_to_f32(sample.right),
                0.0,
            );
        }
        self.record_underrun(missing);
    }

    /// Drop up to `frames` frames without playing them; returns how many
    /// were available
    pub fn discard(&mut self, frames: usize) -> usize {
        let count = frames.min(self.consumer.slots());
        if let Ok(chunk) = self.consumer.read_chunk(count) {
            chunk.commit_all();
        }
        if count < frames {
            self.record_underrun((frames - count) as u64);
        }
        count
    }

    fn record_underrun(&self, frames: u64) {
        if frames > 0 {
            self.underruns.fetch_add(frames, Ordering::Relaxed);
        }
    }
}

fn write_frame<T: Copy>(frame: &mut [T], left: T, right: T, silence: T) {
    match frame {
        [mono] => *mono = left,
        [l, r, rest @ ..] => {
            *l = left;
            *r = right;
            rest.fill(silence);
        }
        [] => {}
    }
}

fn i16_to_f32(sample: i16) -> f32 {
    f32::from(sample) / 32768.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_then_fill() {
        let (mut producer, mut consumer) = output_ring(8);
        assert!(producer.has_room(8));
        assert_eq!(producer.publish(&[1, -1, 2, -2, 3, -3]), 3);
        assert_eq!(producer.free_frames(), 5);
        assert_eq!(consumer.available_frames(), 3);

        let mut out = [0i16; 6];
        consumer.fill_i16(&mut out, 2);
        assert_eq!(out, [1, -1, 2, -2, 3, -3]);
        assert_eq!(consumer.underrun_counter().load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_underrun_plays_silence_and_counts() {
        let (mut producer, mut consumer) = output_ring(8);
        producer.publish(&[100, 200]);

        let mut out = [9i16; 6];
        consumer.fill_i16(&mut out, 2);
        assert_eq!(out, [100, 200, 0, 0, 0, 0]);
        assert_eq!(consumer.underrun_counter().load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_publish_drops_what_does_not_fit() {
        let (mut producer, mut consumer) = output_ring(2);
        assert!(!producer.has_room(3));
        assert_eq!(producer.publish(&[1, 1, 2, 2, 3, 3]), 2);
        assert_eq!(producer.publish(&[4, 4]), 0);

        let mut out = [0i16; 4];
        consumer.fill_i16(&mut out, 2);
        assert_eq!(out, [1, 1, 2, 2]);
    }

    #[test]
    fn test_fill_f32_multichannel() {
        let (mut producer, mut consumer) = output_ring(4);
        producer.publish(&[16384, -32768]);

        let mut out = [1.0f32; 8];
        consumer.fill_f32(&mut out, 4);
        assert_eq!(&out[..4], &[0.5, -1.0, 0.0, 0.0]);
        assert_eq!(&out[4..], &[0.0; 4]);
    }

    #[test]
    fn test_fill_mono_takes_left() {
        let (mut producer, mut consumer) = output_ring(4);
        producer.publish(&[7, 8, 9, 10]);
        let mut out = [0i16; 2];
        consumer.fill_i16(&mut out, 1);
        assert_eq!(out, [7, 9]);
    }

    #[test]
    fn test_discard_and_abandon() {
        let (mut producer, mut consumer) = output_ring(4);
        producer.publish(&[1, 1, 2, 2]);
        assert_eq!(consumer.discard(3), 2);
        assert_eq!(consumer.underrun_counter().load(Ordering::Relaxed), 1);
        assert!(!producer.is_abandoned());
        drop(consumer);
        assert!(producer.is_abandoned());
    }
}
