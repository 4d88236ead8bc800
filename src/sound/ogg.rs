//! Ogg Vorbis decoder implementation
//!
//! Uses the `lewton` crate for pure Rust Ogg Vorbis decoding. Music tracks
//! are decoded packet by packet as the mixer's playback cursor advances.

use std::io::Cursor;
use std::sync::Arc;

use lewton::inside_ogg::OggStreamReader;

use super::decoder::{DecodeError, DecodeResult, SoundDecoder};
use super::formats::downmix_interleaved;
use super::resample::RateConverter;

/// Find the granule position of the last Ogg page, i.e. the stream length
/// in frames.
///
/// Only the trailing 64KB are scanned.
pub fn last_granule_position(data: &[u8]) -> Option<u64> {
    let search_size = data.len().min(65536);
    let tail = &data[data.len() - search_size..];

    // Search backwards for the last "OggS" page carrying a granule
    for i in (0..tail.len().saturating_sub(13)).rev() {
        if tail[i..].starts_with(b"OggS") {
            let mut granule = [0u8; 8];
            granule.copy_from_slice(&tail[i + 6..i + 14]);
            let granule = u64::from_le_bytes(granule);
            // Granule position of -1 means "no granule"
            if granule != u64::MAX {
                return Some(granule);
            }
        }
    }

    None
}

fn open_reader<T>(source: T) -> DecodeResult<OggStreamReader<Cursor<T>>>
where
    T: AsRef<[u8]>,
{
    OggStreamReader::new(Cursor::new(source))
        .map_err(|e| DecodeError::InvalidData(format!("Failed to open Ogg stream: {:?}", e)))
}

fn missing_granule() -> DecodeError {
    DecodeError::InvalidData("Missing end-of-stream granule position".to_string())
}

/// Identification header checks shared by `probe` and `new`; returns the
/// channel count
fn check_stream_header(sample_rate: u32, channels: u8) -> DecodeResult<usize> {
    if sample_rate == 0 {
        return Err(DecodeError::InvalidRate(0));
    }
    if channels == 0 {
        return Err(DecodeError::UnsupportedFormat("zero channels".to_string()));
    }
    Ok(channels as usize)
}

/// Ogg Vorbis decoder using lewton
pub struct OggDecoder {
    reader: OggStreamReader<Cursor<Arc<[u8]>>>,
    channels: usize,
    /// Mono samples not yet consumed by the converter
    pending: Vec<i16>,
    converter: RateConverter,
    end_of_stream: bool,
    total_samples: usize,
    produced: usize,
}

impl OggDecoder {
    /// Validate an Ogg Vorbis stream without building a decoder
    pub fn probe(data: &[u8]) -> DecodeResult<()> {
        if data.is_empty() {
            return Err(DecodeError::Empty);
        }
        last_granule_position(data).ok_or_else(missing_granule)?;
        let reader = open_reader(data)?;
        check_stream_header(
            reader.ident_hdr.audio_sample_rate,
            reader.ident_hdr.audio_channels,
        )
        .map(|_| ())
    }

    /// Create a decoder producing mono samples at `dst_rate`
    pub fn new(data: Arc<[u8]>, dst_rate: u32) -> DecodeResult<Self> {
        if data.is_empty() {
            return Err(DecodeError::Empty);
        }

        let frames = last_granule_position(&data).ok_or_else(missing_granule)?;
        let reader = open_reader(data)?;
        let sample_rate = reader.ident_hdr.audio_sample_rate;
        let channels = check_stream_header(sample_rate, reader.ident_hdr.audio_channels)?;

        let converter = RateConverter::new(sample_rate, dst_rate)?;
        let total_samples = converter.output_len(frames as usize);

        log::debug!(
            "Ogg stream: {} Hz, {} channels, {} frames -> {} samples",
            sample_rate,
            channels,
            frames,
            total_samples
        );

        Ok(Self {
            reader,
            channels,
            pending: Vec::new(),
            converter,
            end_of_stream: false,
            total_samples,
            produced: 0,
        })
    }

    /// Decode the next packet into `pending`; false at end of stream
    fn decode_next_packet(&mut self) -> DecodeResult<bool> {
        match self.reader.read_dec_packet_itl() {
            Ok(Some(samples)) => {
                let mono = downmix_interleaved(&samples, self.channels);
                self.pending.extend_from_slice(&mono);
                Ok(true)
            }
            Ok(None) => {
                self.end_of_stream = true;
                Ok(false)
            }
            Err(e) => {
                self.end_of_stream = true;
                Err(DecodeError::DecoderError(format!("Ogg decode error: {:?}", e)))
            }
        }
    }
}

impl SoundDecoder for OggDecoder {
    fn name(&self) -> &'static str {
        "Ogg Vorbis"
    }

    fn total_samples(&self) -> usize {
        self.total_samples
    }

    fn decode(&mut self, buf: &mut [i16]) -> DecodeResult<usize> {
        let mut written = 0;

        while written < buf.len() && !self.is_finished() {
            let room = (self.total_samples - self.produced).min(buf.len() - written);
            let (count, consumed) = self.converter.convert(
                &self.pending,
                &mut buf[written..written + room],
                self.end_of_stream,
            );
            self.pending.drain(..consumed);
            written += count;
            self.produced += count;

            if count == 0 {
                if self.end_of_stream {
                    break;
                }
                self.decode_next_packet()?;
            }
        }

        Ok(written)
    }

    fn is_finished(&self) -> bool {
        self.produced >= self.total_samples
            || (self.end_of_stream && self.pending.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_page(granule: u64) -> Vec<u8> {
        let mut page = b"OggS".to_vec();
        page.push(0); // version
        page.push(0x04); // header type: end of stream
        page.extend_from_slice(&granule.to_le_bytes());
        page.extend_from_slice(&[0u8; 16]);
        page
    }

    #[test]
    fn test_check_stream_header() {
        assert_eq!(check_stream_header(44100, 2), Ok(2));
        assert_eq!(check_stream_header(0, 2), Err(DecodeError::InvalidRate(0)));
        assert!(matches!(
            check_stream_header(44100, 0),
            Err(DecodeError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_last_granule_position_picks_last_page() {
        let mut data = vec![0u8; 100];
        data.extend(fake_page(1000));
        data.extend(vec![0u8; 50]);
        data.extend(fake_page(48_000));
        assert_eq!(last_granule_position(&data), Some(48_000));
    }

    #[test]
    fn test_last_granule_position_skips_unset_granule() {
        let mut data = fake_page(5000);
        data.extend(fake_page(u64::MAX));
        assert_eq!(last_granule_position(&data), Some(5000));
    }

    #[test]
    fn test_last_granule_position_none_without_pages() {
        assert_eq!(last_granule_position(&[]), None);
        assert_eq!(last_granule_position(&[0u8; 64]), None);
    }

    #[test]
    fn test_ogg_probe_rejects_garbage() {
        assert_eq!(OggDecoder::probe(&[]), Err(DecodeError::Empty));
        assert!(matches!(
            OggDecoder::probe(b"definitely not an ogg stream"),
            Err(DecodeError::InvalidData(_))
        ));
        assert!(OggDecoder::new(Arc::from(fake_page(10)), 22050).is_err());
    }

    #[test]
    fn test_ogg_decoder_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<OggDecoder>();
    }
}
