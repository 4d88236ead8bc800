//! Sound decoding and mixing
//!
//! # Architecture
//!
//! - `SoundDecoder` trait defines the decoder interface
//! - `DecoderFactory` picks a decoder family per sound category
//! - Individual decoder implementations (Ogg, Wav, raw PCM)
//! - `RateConverter` brings every source to the mixing rate
//! - `mixer` module runs the real-time mixing engine

pub mod decoder;
pub mod factory;
pub mod formats;
pub mod mixer;
pub mod ogg;
pub mod pcm;
pub mod resample;
pub mod wav;

pub use decoder::{DecodeError, DecodeResult, SoundDecoder};
pub use factory::{DecoderFactory, StandardDecoders};
pub use formats::AudioFormat;
pub use ogg::OggDecoder;
pub use pcm::{PcmDecoder, PCM_SOURCE_RATE};
pub use resample::RateConverter;
pub use wav::WavDecoder;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_exports() {
        // Verify that all public types are accessible
        let _format = AudioFormat::default();
        let _factory: Box<dyn DecoderFactory> = Box::new(StandardDecoders);
        assert!(RateConverter::new(PCM_SOURCE_RATE, 22050).is_ok());
    }
}
