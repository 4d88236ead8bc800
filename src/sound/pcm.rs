//! Raw PCM decoding
//!
//! Digitized effects are stored as headerless unsigned 8-bit mono PCM at a
//! fixed source rate. `PcmStream` holds the shared conversion loop (raw
//! frames to mono 16-bit at the mixing rate) that the WAV decoder reuses.

use std::ops::Range;
use std::sync::Arc;

use super::decoder::{DecodeError, DecodeResult, SoundDecoder};
use super::formats::AudioFormat;
use super::resample::RateConverter;

/// Source rate of digitized sounds
pub const PCM_SOURCE_RATE: u32 = 7042;

/// Streams raw interleaved frames out of an in-memory buffer
pub struct PcmStream {
    data: Arc<[u8]>,
    /// Next unread byte
    pos: usize,
    /// One past the last byte of sample data
    end: usize,
    format: AudioFormat,
    /// Mono samples not yet consumed by the converter
    pending: Vec<i16>,
    converter: RateConverter,
    total_samples: usize,
    produced: usize,
}

impl PcmStream {
    /// Source frames widened per refill
    const CHUNK_FRAMES: usize = 1024;

    /// Stream the frames found in `range` of `data`
    pub fn new(
        data: Arc<[u8]>,
        range: Range<usize>,
        format: AudioFormat,
        src_rate: u32,
        dst_rate: u32,
    ) -> DecodeResult<Self> {
        let end = range.end.min(data.len());
        let start = range.start.min(end);
        let frames = format.frame_count(end - start);
        if frames == 0 {
            return Err(DecodeError::Empty);
        }

        let converter = RateConverter::new(src_rate, dst_rate)?;
        let total_samples = converter.output_len(frames);

        Ok(Self {
            data,
            pos: start,
            end: start + frames * format.bytes_per_frame(),
            format,
            pending: Vec::with_capacity(Self::CHUNK_FRAMES),
            converter,
            total_samples,
            produced: 0,
        })
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    pub fn src_rate(&self) -> u32 {
        self.converter.src_rate()
    }

    pub fn total_samples(&self) -> usize {
        self.total_samples
    }

    pub fn is_finished(&self) -> bool {
        self.produced >= self.total_samples
    }

    fn source_exhausted(&self) -> bool {
        self.pos >= self.end
    }

    fn refill(&mut self) {
        let chunk = Self::CHUNK_FRAMES * self.format.bytes_per_frame();
        let stop = (self.pos + chunk).min(self.end);
        let widened = self.format.to_mono16(&self.data[self.pos..stop]);
        self.pending.extend_from_slice(&widened);
        self.pos = stop;
    }

    /// Fill `buf` with converted samples; 0 means end-of-stream
    pub fn decode(&mut self, buf: &mut [i16]) -> usize {
        let mut written = 0;

        while written < buf.len() && !self.is_finished() {
            if self.pending.len() < 2 && !self.source_exhausted() {
                self.refill();
            }

            let is_last = self.source_exhausted();
            let (count, consumed) = self
                .converter
                .convert(&self.pending, &mut buf[written..], is_last);
            self.pending.drain(..consumed);
            written += count;
            self.produced += count;

            if count == 0 {
                if is_last {
                    break;
                }
                self.refill();
            }
        }

        written
    }
}

/// Unsigned 8-bit mono PCM decoder
pub struct PcmDecoder {
    stream: PcmStream,
}

impl PcmDecoder {
    /// Validate raw PCM data without building a decoder
    pub fn probe(data: &[u8]) -> DecodeResult<()> {
        if data.is_empty() {
            return Err(DecodeError::Empty);
        }
        Ok(())
    }

    /// Create a decoder producing samples at `dst_rate`
    pub fn new(data: Arc<[u8]>, dst_rate: u32) -> DecodeResult<Self> {
        Self::with_source_rate(data, PCM_SOURCE_RATE, dst_rate)
    }

    /// Create a decoder for data recorded at `src_rate`
    pub fn with_source_rate(data: Arc<[u8]>, src_rate: u32, dst_rate: u32) -> DecodeResult<Self> {
        Self::probe(&data)?;
        let len = data.len();
        let stream = PcmStream::new(data, 0..len, AudioFormat::Mono8, src_rate, dst_rate)?;
        Ok(Self { stream })
    }
}

impl SoundDecoder for PcmDecoder {
    fn name(&self) -> &'static str {
        "PCM"
    }

    fn total_samples(&self) -> usize {
        self.stream.total_samples()
    }

    fn decode(&mut self, buf: &mut [i16]) -> DecodeResult<usize> {
        Ok(self.stream.decode(buf))
    }

    fn is_finished(&self) -> bool {
        self.stream.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sound::formats::u8_to_i16;

    fn decode_all(decoder: &mut dyn SoundDecoder) -> Vec<i16> {
        let mut out = Vec::new();
        let mut buf = [0i16; 100];
        loop {
            let n = decoder.decode(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        out
    }

    #[test]
    fn test_pcm_probe_rejects_empty() {
        assert_eq!(PcmDecoder::probe(&[]), Err(DecodeError::Empty));
        assert!(PcmDecoder::probe(&[128]).is_ok());
        assert!(PcmDecoder::new(Arc::from(Vec::new()), 22050).is_err());
    }

    #[test]
    fn test_pcm_same_rate_converts_unsigned() {
        let data: Arc<[u8]> = Arc::from(vec![128u8, 255, 0, 128]);
        let mut decoder = PcmDecoder::with_source_rate(data, 8000, 8000).unwrap();
        assert_eq!(decoder.name(), "PCM");
        assert_eq!(decoder.total_samples(), 4);

        let samples = decode_all(&mut decoder);
        assert_eq!(samples, vec![0, 127 << 8, -32768, 0]);
        assert!(decoder.is_finished());
    }

    #[test]
    fn test_pcm_upsamples_to_mixing_rate() {
        let data: Arc<[u8]> = Arc::from(vec![128u8; 7042]);
        let mut decoder = PcmDecoder::new(data, 22050).unwrap();
        let expected = decoder.total_samples();
        assert!((22049..=22051).contains(&expected));

        let samples = decode_all(&mut decoder);
        assert_eq!(samples.len(), expected);
        assert!(samples.iter().all(|&s| s == 0));
    }

    #[test]
    fn test_pcm_crosses_chunk_boundaries() {
        let data: Vec<u8> = (0..3000).map(|i| (i % 256) as u8).collect();
        let mut decoder =
            PcmDecoder::with_source_rate(Arc::from(data.clone()), 11025, 11025).unwrap();
        let samples = decode_all(&mut decoder);
        let expected: Vec<i16> = data.iter().map(|&b| u8_to_i16(b)).collect();
        assert_eq!(samples, expected);
    }

    #[test]
    fn test_pcm_decode_after_end_returns_zero() {
        let data: Arc<[u8]> = Arc::from(vec![200u8; 10]);
        let mut decoder = PcmDecoder::with_source_rate(data, 10, 10).unwrap();
        let _ = decode_all(&mut decoder);
        let mut buf = [0i16; 4];
        assert_eq!(decoder.decode(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_stream_respects_range_and_partial_frames() {
        let mut bytes = vec![0xAAu8; 4];
        bytes.extend_from_slice(&100i16.to_le_bytes());
        bytes.extend_from_slice(&(-100i16).to_le_bytes());
        bytes.push(0x01);
        let len = bytes.len();

        let mut stream =
            PcmStream::new(Arc::from(bytes), 4..len, AudioFormat::Mono16, 8000, 8000).unwrap();
        assert_eq!(stream.total_samples(), 2);

        let mut buf = [0i16; 8];
        assert_eq!(stream.decode(&mut buf), 2);
        assert_eq!(&buf[..2], &[100, -100]);
        assert_eq!(stream.decode(&mut buf), 0);
    }
}
