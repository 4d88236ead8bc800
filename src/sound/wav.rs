//! WAV decoder implementation
//!
//! Decodes WAV (RIFF WAVE) sound effects held in memory. Supports:
//! - 8-bit and 16-bit PCM
//! - Mono and stereo (stereo is downmixed)
//! - Any sample rate (converted to the mixing rate)

use std::io::{Cursor, Read, Seek, SeekFrom};
use std::ops::Range;
use std::sync::Arc;

use super::decoder::{DecodeError, DecodeResult, SoundDecoder};
use super::formats::AudioFormat;
use super::pcm::PcmStream;

// WAV format constants (little-endian IDs)
const RIFF_ID: u32 = 0x46464952; // "RIFF"
const WAVE_ID: u32 = 0x45564157; // "WAVE"
const FMT_ID: u32 = 0x20746d66; // "fmt "
const DATA_ID: u32 = 0x61746164; // "data"

// WAV format codes
const WAVE_FORMAT_PCM: u16 = 1;

/// WAV format chunk
#[derive(Debug, Default, Clone, Copy)]
struct WavFormatHeader {
    channels: u16,
    sample_rate: u32,
    bits_per_sample: u16,
}

/// WAV chunk header
#[derive(Debug, Default)]
struct WavChunkHeader {
    id: u32,
    size: u32,
}

/// Layout of a parsed WAV file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WavLayout {
    pub format: AudioFormat,
    pub sample_rate: u32,
    /// Byte range of the sample data within the file
    pub data: Range<usize>,
}

impl WavLayout {
    /// Parse the RIFF structure of `data`
    pub fn parse(data: &[u8]) -> DecodeResult<Self> {
        if data.is_empty() {
            return Err(DecodeError::Empty);
        }

        let mut cursor = Cursor::new(data);
        parse_file_header(&mut cursor)?;

        let mut fmt_header = None;
        let mut data_range = None;

        while (cursor.position() as usize) + 8 <= data.len() {
            let chunk = parse_chunk_header(&mut cursor)?;

            match chunk.id {
                FMT_ID => {
                    fmt_header = Some(parse_format_header(&mut cursor, chunk.size)?);
                }
                DATA_ID => {
                    let start = cursor.position() as usize;
                    let end = start.saturating_add(chunk.size as usize).min(data.len());
                    data_range = Some(start..end);
                    break;
                }
                _ => {
                    // Chunks are word aligned
                    let skip = chunk.size as i64 + (chunk.size & 1) as i64;
                    cursor.seek(SeekFrom::Current(skip)).map_err(|e| {
                        DecodeError::InvalidData(format!("Failed to skip chunk: {}", e))
                    })?;
                }
            }
        }

        let fmt_header =
            fmt_header.ok_or_else(|| DecodeError::InvalidData("No format chunk found".to_string()))?;
        let data_range = data_range
            .filter(|range| !range.is_empty())
            .ok_or_else(|| DecodeError::InvalidData("No data chunk found".to_string()))?;

        let format = AudioFormat::from_layout(fmt_header.channels, fmt_header.bits_per_sample)
            .ok_or_else(|| {
                DecodeError::UnsupportedFormat(format!(
                    "{} channels, {} bits",
                    fmt_header.channels, fmt_header.bits_per_sample
                ))
            })?;

        if fmt_header.sample_rate == 0 {
            return Err(DecodeError::InvalidRate(0));
        }
        if format.frame_count(data_range.len()) == 0 {
            return Err(DecodeError::Empty);
        }

        Ok(Self {
            format,
            sample_rate: fmt_header.sample_rate,
            data: data_range,
        })
    }

    /// Duration of the sample data in seconds
    pub fn duration_secs(&self) -> f32 {
        let frames = self.format.frame_count(self.data.len());
        frames as f32 / self.sample_rate as f32
    }
}

/// Read a little-endian u16
fn read_le_u16(cursor: &mut Cursor<&[u8]>) -> DecodeResult<u16> {
    let mut buf = [0u8; 2];
    cursor
        .read_exact(&mut buf)
        .map_err(|e| DecodeError::InvalidData(format!("Failed to read u16: {}", e)))?;
    Ok(u16::from_le_bytes(buf))
}

/// Read a little-endian u32
fn read_le_u32(cursor: &mut Cursor<&[u8]>) -> DecodeResult<u32> {
    let mut buf = [0u8; 4];
    cursor
        .read_exact(&mut buf)
        .map_err(|e| DecodeError::InvalidData(format!("Failed to read u32: {}", e)))?;
    Ok(u32::from_le_bytes(buf))
}

fn parse_file_header(cursor: &mut Cursor<&[u8]>) -> DecodeResult<()> {
    let id = read_le_u32(cursor)?;
    let _size = read_le_u32(cursor)?;
    let format = read_le_u32(cursor)?;

    if id != RIFF_ID {
        return Err(DecodeError::InvalidData("Not a RIFF file".to_string()));
    }
    if format != WAVE_ID {
        return Err(DecodeError::InvalidData("Not a WAVE file".to_string()));
    }

    Ok(())
}

fn parse_chunk_header(cursor: &mut Cursor<&[u8]>) -> DecodeResult<WavChunkHeader> {
    let id = read_le_u32(cursor)?;
    let size = read_le_u32(cursor)?;
    Ok(WavChunkHeader { id, size })
}

fn parse_format_header(cursor: &mut Cursor<&[u8]>, size: u32) -> DecodeResult<WavFormatHeader> {
    if size < 16 {
        return Err(DecodeError::InvalidData("Format chunk too small".to_string()));
    }

    let format = read_le_u16(cursor)?;
    let channels = read_le_u16(cursor)?;
    let sample_rate = read_le_u32(cursor)?;
    let _byte_rate = read_le_u32(cursor)?;
    let _block_align = read_le_u16(cursor)?;
    let bits_per_sample = read_le_u16(cursor)?;

    // Skip any extra format bytes
    if size > 16 {
        let extra = (size - 16) as i64 + (size & 1) as i64;
        cursor.seek(SeekFrom::Current(extra)).map_err(|e| {
            DecodeError::InvalidData(format!("Failed to skip format bytes: {}", e))
        })?;
    }

    if format != WAVE_FORMAT_PCM {
        return Err(DecodeError::UnsupportedFormat(format!(
            "WAV format {} (only PCM supported)",
            format
        )));
    }

    Ok(WavFormatHeader {
        channels,
        sample_rate,
        bits_per_sample,
    })
}

/// WAV decoder
pub struct WavDecoder {
    layout: WavLayout,
    stream: PcmStream,
}

impl WavDecoder {
    /// Validate a WAV file without building a decoder
    pub fn probe(data: &[u8]) -> DecodeResult<()> {
        WavLayout::parse(data).map(|_| ())
    }

    /// Create a decoder producing mono samples at `dst_rate`
    pub fn new(data: Arc<[u8]>, dst_rate: u32) -> DecodeResult<Self> {
        let layout = WavLayout::parse(&data)?;
        let stream = PcmStream::new(
            data,
            layout.data.clone(),
            layout.format,
            layout.sample_rate,
            dst_rate,
        )?;

        Ok(Self { layout, stream })
    }

    /// Parsed file layout
    pub fn layout(&self) -> &WavLayout {
        &self.layout
    }
}

impl SoundDecoder for WavDecoder {
    fn name(&self) -> &'static str {
        "Wave"
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

/// Build an in-memory WAV file (used by tests and tools)
pub fn encode_wav(format: AudioFormat, sample_rate: u32, frames: &[u8]) -> Vec<u8> {
    let channels = format.channels() as u16;
    let bits: u16 = if format.is_16bit() { 16 } else { 8 };
    let block_align = format.bytes_per_frame() as u16;
    let byte_rate = sample_rate * block_align as u32;

    let mut out = Vec::with_capacity(44 + frames.len());
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + frames.len() as u32).to_le_bytes());
    out.extend_from_slice(b"WAVE");
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&WAVE_FORMAT_PCM.to_le_bytes());
    out.extend_from_slice(&channels.to_le_bytes());
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&bits.to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&(frames.len() as u32).to_le_bytes());
    out.extend_from_slice(frames);
    out
}
