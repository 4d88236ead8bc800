//! Decoder selection by sound category
//!
//! Each sound category maps to exactly one decoder family. The mixer only
//! talks to the `DecoderFactory` trait so games can plug in their own
//! encodings.

use std::sync::Arc;

use super::decoder::{DecodeResult, SoundDecoder};
use super::mixer::types::SoundCategory;
use super::ogg::OggDecoder;
use super::pcm::PcmDecoder;
use super::wav::WavDecoder;

/// Builds decoders for raw sound data
pub trait DecoderFactory: Send + Sync {
    /// Cheap header validation, run on the calling thread so `play_*` can
    /// reject malformed data before anything is queued.
    fn probe(&self, category: SoundCategory, data: &[u8]) -> DecodeResult<()>;

    /// Construct a decoder producing mono samples at `dst_rate`.
    ///
    /// Called only from the mixer worker thread, at most once per cache slot.
    fn create(
        &self,
        category: SoundCategory,
        data: Arc<[u8]>,
        dst_rate: u32,
    ) -> DecodeResult<Box<dyn SoundDecoder>>;
}

/// Default decoder families
///
/// | Category      | Encoding                         |
/// |---------------|----------------------------------|
/// | `Music`       | Ogg Vorbis                       |
/// | `ShortEffect` | RIFF WAVE, 8/16-bit PCM          |
/// | `StreamedPcm` | headerless unsigned 8-bit mono   |
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardDecoders;

impl DecoderFactory for StandardDecoders {
    fn probe(&self, category: SoundCategory, data: &[u8]) -> DecodeResult<()> {
        match category {
            SoundCategory::Music => OggDecoder::probe(data),
            SoundCategory::ShortEffect => WavDecoder::probe(data),
            SoundCategory::StreamedPcm => PcmDecoder::probe(data),
        }
    }

    fn create(
        &self,
        category: SoundCategory,
        data: Arc<[u8]>,
        dst_rate: u32,
    ) -> DecodeResult<Box<dyn SoundDecoder>> {
        let decoder: Box<dyn SoundDecoder> = match category {
            SoundCategory::Music => Box::new(OggDecoder::new(data, dst_rate)?),
            SoundCategory::ShortEffect => Box::new(WavDecoder::new(data, dst_rate)?),
            SoundCategory::StreamedPcm => Box::new(PcmDecoder::new(data, dst_rate)?),
        };
        Ok(decoder)
    }
}
