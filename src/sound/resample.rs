// resample.rs - Fixed-ratio sample rate conversion

//! Converts decoded source samples to the mixer's single fixed output rate.
//!
//! The converter walks the source with a 32.32 fixed-point position and
//! linearly interpolates between neighbouring samples. Source data may be
//! fed in pieces (streamed decoders) or all at once (in-memory formats).

use super::decoder::{DecodeError, DecodeResult};

const FRAC_BITS: u32 = 32;
const FRAC_ONE: u64 = 1 << FRAC_BITS;
const FRAC_MASK: u64 = FRAC_ONE - 1;

/// Linear interpolating rate converter
#[derive(Debug, Clone)]
pub struct RateConverter {
    src_rate: u32,
    dst_rate: u32,
    /// Source advance per output sample (32.32)
    step: u64,
    /// Position relative to the start of the pending source slice (32.32)
    pos: u64,
}

impl RateConverter {
    /// Create a converter from `src_rate` to `dst_rate`
    pub fn new(src_rate: u32, dst_rate: u32) -> DecodeResult<Self> {
        if src_rate == 0 {
            return Err(DecodeError::InvalidRate(src_rate));
        }
        if dst_rate == 0 {
            return Err(DecodeError::InvalidRate(dst_rate));
        }

        let step = ((src_rate as u64) << FRAC_BITS) / dst_rate as u64;

        Ok(Self {
            src_rate,
            dst_rate,
            step: step.max(1),
            pos: 0,
        })
    }

    pub fn src_rate(&self) -> u32 {
        self.src_rate
    }

    pub fn dst_rate(&self) -> u32 {
        self.dst_rate
    }

    /// True when no conversion is needed
    pub fn is_passthrough(&self) -> bool {
        self.step == FRAC_ONE
    }

    /// Number of output samples produced from `src_len` source samples
    pub fn output_len(&self, src_len: usize) -> usize {
        if src_len == 0 {
            return 0;
        }
        let span = (src_len as u128) << FRAC_BITS;
        let step = self.step as u128;
        span.div_ceil(step) as usize
    }

    /// Convert from `src` into `out`.
    ///
    /// `src` always starts at the first source sample not yet consumed.
    /// When `is_last` is false the converter stops before it would need a
    /// sample past the end of `src`; when true the final sample is held.
    ///
    /// # Returns
    /// `(written, consumed)`: output samples written and whole source samples
    /// the caller may now discard from the front of `src`.
    pub fn convert(&mut self, src: &[i16], out: &mut [i16], is_last: bool) -> (usize, usize) {
        let mut written = 0;

        while written < out.len() {
            let index = (self.pos >> FRAC_BITS) as usize;
            if index >= src.len() {
                break;
            }

            let next = match src.get(index + 1) {
                Some(&s) => s,
                None if is_last => src[index],
                None => break,
            };

            let frac = (self.pos & FRAC_MASK) as i64;
            let current = src[index] as i64;
            let value = current + (((next as i64 - current) * frac) >> FRAC_BITS);

            out[written] = value as i16;
            written += 1;
            self.pos += self.step;
        }

        let consumed = ((self.pos >> FRAC_BITS) as usize).min(src.len());
        self.pos -= (consumed as u64) << FRAC_BITS;

        (written, consumed)
    }

    /// Rewind to the start of a fresh source
    pub fn reset(&mut self) {
        self.pos = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_zero_rate() {
        assert_eq!(
            RateConverter::new(0, 44100).unwrap_err(),
            DecodeError::InvalidRate(0)
        );
        assert!(RateConverter::new(22050, 0).is_err());
    }

    #[test]
    fn test_passthrough_copies_samples() {
        let mut conv = RateConverter::new(22050, 22050).unwrap();
        assert!(conv.is_passthrough());

        let src = [1, 2, 3, 4, 5];
        let mut out = [0i16; 8];
        let (written, consumed) = conv.convert(&src, &mut out, true);

        assert_eq!(written, 5);
        assert_eq!(consumed, 5);
        assert_eq!(&out[..5], &src);
        assert_eq!(conv.output_len(src.len()), 5);
    }

    #[test]
    fn test_upsample_doubles_length_and_interpolates() {
        let mut conv = RateConverter::new(11025, 22050).unwrap();
        let src = [0, 100, 200];
        let mut out = [0i16; 16];
        let (written, consumed) = conv.convert(&src, &mut out, true);

        assert_eq!(written, conv.output_len(src.len()));
        assert_eq!(written, 6);
        assert_eq!(consumed, 3);
        assert_eq!(&out[..6], &[0, 50, 100, 150, 200, 200]);
    }

    #[test]
    fn test_downsample_halves_length() {
        let conv = RateConverter::new(44100, 22050).unwrap();
        assert_eq!(conv.output_len(100), 50);
        assert_eq!(conv.output_len(101), 51);
        assert_eq!(conv.output_len(0), 0);
    }

    #[test]
    fn test_streamed_conversion_matches_single_shot() {
        let src: Vec<i16> = (0..64).map(|i| (i * 300) as i16).collect();

        let mut whole = RateConverter::new(7042, 22050).unwrap();
        let mut expected = vec![0i16; 512];
        let (total, _) = whole.convert(&src, &mut expected, true);
        expected.truncate(total);

        let mut streamed = RateConverter::new(7042, 22050).unwrap();
        let mut pending: Vec<i16> = Vec::new();
        let mut produced = Vec::new();
        for (i, piece) in src.chunks(10).enumerate() {
            pending.extend_from_slice(piece);
            let is_last = (i + 1) * 10 >= src.len();
            let mut out = [0i16; 7];
            loop {
                let (written, consumed) = streamed.convert(&pending, &mut out, is_last);
                produced.extend_from_slice(&out[..written]);
                pending.drain(..consumed);
                if written < out.len() {
                    break;
                }
            }
        }

        assert_eq!(produced, expected);
    }

    #[test]
    fn test_small_output_buffer_resumes_in_place() {
        let mut conv = RateConverter::new(11025, 22050).unwrap();
        let src = [0, 100, 200, 300];
        let mut first = [0i16; 3];
        let (written, consumed) = conv.convert(&src, &mut first, true);
        assert_eq!(written, 3);
        assert_eq!(consumed, 1);
        assert_eq!(first, [0, 50, 100]);

        let mut rest = [0i16; 8];
        let (written, _) = conv.convert(&src[consumed..], &mut rest, true);
        assert_eq!(&rest[..written], &[150, 200, 250, 300, 300]);
    }
}
