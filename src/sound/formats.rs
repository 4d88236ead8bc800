//! Source sample formats and conversion to the mixer's mono 16-bit samples

/// Sample layout of encoded source data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AudioFormat {
    /// 8-bit unsigned mono (1 byte per frame)
    Mono8,
    /// 16-bit signed little-endian mono (2 bytes per frame)
    #[default]
    Mono16,
    /// 8-bit unsigned stereo (2 bytes per frame)
    Stereo8,
    /// 16-bit signed little-endian stereo (4 bytes per frame)
    Stereo16,
}

impl AudioFormat {
    /// Build a format from a channel count and a sample width in bits
    pub fn from_layout(channels: u16, bits_per_sample: u16) -> Option<Self> {
        match (channels, bits_per_sample) {
            (1, 8) => Some(AudioFormat::Mono8),
            (2, 8) => Some(AudioFormat::Stereo8),
            (1, 16) => Some(AudioFormat::Mono16),
            (2, 16) => Some(AudioFormat::Stereo16),
            _ => None,
        }
    }

    /// Returns the number of bytes per frame (one sample for every channel)
    pub fn bytes_per_frame(&self) -> usize {
        match self {
            AudioFormat::Mono8 => 1,
            AudioFormat::Stereo8 => 2,
            AudioFormat::Mono16 => 2,
            AudioFormat::Stereo16 => 4,
        }
    }

    /// Returns the number of channels
    pub fn channels(&self) -> usize {
        match self {
            AudioFormat::Mono8 | AudioFormat::Mono16 => 1,
            AudioFormat::Stereo8 | AudioFormat::Stereo16 => 2,
        }
    }

    /// Returns true if this is a 16-bit format
    pub fn is_16bit(&self) -> bool {
        matches!(self, AudioFormat::Mono16 | AudioFormat::Stereo16)
    }

    /// Returns true if this is a stereo format
    pub fn is_stereo(&self) -> bool {
        matches!(self, AudioFormat::Stereo8 | AudioFormat::Stereo16)
    }

    /// Number of whole frames contained in `byte_len` bytes
    pub fn frame_count(&self, byte_len: usize) -> usize {
        byte_len / self.bytes_per_frame()
    }

    /// Convert raw frames into mono 16-bit samples, averaging stereo pairs.
    ///
    /// A trailing partial frame is ignored.
    pub fn to_mono16(&self, data: &[u8]) -> Vec<i16> {
        let frame_len = self.bytes_per_frame();
        data.chunks_exact(frame_len)
            .map(|frame| match self {
                AudioFormat::Mono8 => u8_to_i16(frame[0]),
                AudioFormat::Stereo8 => average(u8_to_i16(frame[0]), u8_to_i16(frame[1])),
                AudioFormat::Mono16 => i16::from_le_bytes([frame[0], frame[1]]),
                AudioFormat::Stereo16 => average(
                    i16::from_le_bytes([frame[0], frame[1]]),
                    i16::from_le_bytes([frame[2], frame[3]]),
                ),
            })
            .collect()
    }
}

/// Convert an unsigned 8-bit sample (128 = silence) to signed 16-bit
pub fn u8_to_i16(sample: u8) -> i16 {
    ((sample as i16) - 128) << 8
}

/// Average two samples without overflowing
pub fn average(a: i16, b: i16) -> i16 {
    ((a as i32 + b as i32) / 2) as i16
}

/// Downmix interleaved samples with `channels` channels to mono
pub fn downmix_interleaved(samples: &[i16], channels: usize) -> Vec<i16> {
    if channels <= 1 {
        return samples.to_vec();
    }

    samples
        .chunks_exact(channels)
        .map(|frame| {
            let sum: i32 = frame.iter().map(|&s| s as i32).sum();
            (sum / channels as i32) as i16
        })
        .collect()
}
