//! Sound decoder trait definition
//!
//! Defines the `SoundDecoder` trait that every encoding-specific decoder
//! implements. A decoder owns a copy (or shared handle) of the encoded bytes
//! and produces mono 16-bit PCM at the mixing rate on demand.

use thiserror::Error;

/// Error type for decoder operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// No bytes were supplied
    #[error("Empty sound data")]
    Empty,
    /// Invalid or corrupted audio data
    #[error("Invalid audio data: {0}")]
    InvalidData(String),
    /// Unsupported audio format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    /// Rate outside what the converter accepts
    #[error("Invalid sample rate: {0} Hz")]
    InvalidRate(u32),
    /// Generic decoder error raised mid-stream
    #[error("Decoder error: {0}")]
    DecoderError(String),
}

/// Result type for decoder operations
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Sound decoder trait
///
/// Source data is always fully in memory, so `decode` never blocks on I/O.
/// The mixer worker thread is the only caller once a decoder is handed to
/// the decode cache.
pub trait SoundDecoder: Send {
    /// Returns the decoder name (e.g., "Ogg Vorbis", "Wave")
    fn name(&self) -> &'static str;

    /// Total number of samples this decoder is expected to produce at the
    /// mixing rate.
    fn total_samples(&self) -> usize;

    /// Decode up to `buf.len()` mono samples into `buf`.
    ///
    /// # Returns
    /// Number of samples written; `Ok(0)` signals end-of-stream.
    fn decode(&mut self, buf: &mut [i16]) -> DecodeResult<usize>;

    /// Returns true once the decoder has nothing more to produce
    fn is_finished(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_error_display() {
        let err = DecodeError::InvalidData("bad header".to_string());
        assert_eq!(format!("{}", err), "Invalid audio data: bad header");

        let err = DecodeError::Empty;
        assert_eq!(format!("{}", err), "Empty sound data");

        let err = DecodeError::InvalidRate(0);
        assert_eq!(format!("{}", err), "Invalid sample rate: 0 Hz");
    }

    #[test]
    fn test_decode_error_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<DecodeError>();
    }
}
