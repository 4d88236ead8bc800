// cache.rs - Decode cache

//! Per-category decode cache.
//!
//! Each sound id owns one slot per category holding the samples decoded so
//! far and, while decoding is incomplete, the live decoder. Slots are only
//! touched by the mixer worker thread.

use std::collections::HashMap;
use std::sync::Arc;

use crate::sound::decoder::SoundDecoder;
use crate::sound::factory::DecoderFactory;
use crate::sound::mixer::types::{SoundCategory, SoundId};

/// Samples pulled from a decoder per `decode` call
const DECODE_CHUNK: usize = 4096;

/// Decoded samples and decode progress of one sound
pub struct CacheSlot {
    invalid: bool,
    total_samples: usize,
    samples: Vec<i16>,
    decoder: Option<Box<dyn SoundDecoder>>,
}

impl CacheSlot {
    fn new(decoder: Box<dyn SoundDecoder>) -> Self {
        let total_samples = decoder.total_samples();
        Self {
            invalid: false,
            total_samples,
            samples: Vec::with_capacity(total_samples.min(1 << 20)),
            decoder: Some(decoder),
        }
    }

    fn invalid() -> Self {
        Self {
            invalid: true,
            total_samples: 0,
            samples: Vec::new(),
            decoder: None,
        }
    }

    pub fn is_invalid(&self) -> bool {
        self.invalid
    }

    pub fn total_samples(&self) -> usize {
        self.total_samples
    }

    pub fn decoded_samples(&self) -> usize {
        self.samples.len()
    }

    /// Decoded samples so far
    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn has_decoder(&self) -> bool {
        self.decoder.is_some()
    }

    /// Decode until at least `through` samples are available or the stream
    /// ends. The decoder is released once the slot is complete.
    pub fn ensure_decoded(&mut self, through: usize) {
        let target = through.min(self.total_samples);

        while self.samples.len() < target {
            let Some(decoder) = self.decoder.as_mut() else {
                break;
            };

            let start = self.samples.len();
            let want = (target - start).max(DECODE_CHUNK).min(self.total_samples - start);
            self.samples.resize(start + want, 0);

            match decoder.decode(&mut self.samples[start..]) {
                Ok(0) => {
                    self.samples.truncate(start);
                    self.finish_early();
                }
                Ok(n) => self.samples.truncate(start + n),
                Err(e) => {
                    log::warn!("{} decoder failed after {} samples: {}", decoder.name(), start, e);
                    self.samples.truncate(start);
                    self.finish_early();
                }
            }
        }

        if self.samples.len() >= self.total_samples && self.decoder.is_some() {
            self.decoder = None;
        }
    }

    /// The stream ended short of its announced length
    fn finish_early(&mut self) {
        self.total_samples = self.samples.len();
        self.decoder = None;
    }
}

impl std::fmt::Debug for CacheSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheSlot")
            .field("invalid", &self.invalid)
            .field("total_samples", &self.total_samples)
            .field("decoded_samples", &self.samples.len())
            .field("decoder", &self.decoder.as_ref().map(|d| d.name()))
            .finish()
    }
}

/// Decode cache, one table per sound category
pub struct DecodeCache {
    factory: Arc<dyn DecoderFactory>,
    rate: u32,
    tables: [HashMap<SoundId, CacheSlot>; 3],
}

impl DecodeCache {
    /// Create an empty cache producing samples at `rate`
    pub fn new(factory: Arc<dyn DecoderFactory>, rate: u32) -> Self {
        Self {
            factory,
            rate,
            tables: Default::default(),
        }
    }

    pub fn rate(&self) -> u32 {
        self.rate
    }

    /// Return the slot for `id`, constructing its decoder from `data` on
    /// first use. Invalid slots yield `None` and are never retried.
    pub fn get_or_create(
        &mut self,
        category: SoundCategory,
        id: SoundId,
        data: &Arc<[u8]>,
    ) -> Option<&mut CacheSlot> {
        let factory = &self.factory;
        let rate = self.rate;
        let slot = self.tables[category.index()]
            .entry(id)
            .or_insert_with(|| match factory.create(category, Arc::clone(data), rate) {
                Ok(decoder) => {
                    log::debug!(
                        "Cached {:?} sound {} ({} decoder, {} samples)",
                        category,
                        id.0,
                        decoder.name(),
                        decoder.total_samples()
                    );
                    CacheSlot::new(decoder)
                }
                Err(e) => {
                    log::warn!("Invalid {:?} sound {}: {}", category, id.0, e);
                    CacheSlot::invalid()
                }
            });

        if slot.is_invalid() {
            None
        } else {
            Some(slot)
        }
    }

    /// Look up an existing slot
    pub fn get(&self, category: SoundCategory, id: SoundId) -> Option<&CacheSlot> {
        self.tables[category.index()].get(&id)
    }

    pub fn get_mut(&mut self, category: SoundCategory, id: SoundId) -> Option<&mut CacheSlot> {
        self.tables[category.index()].get_mut(&id)
    }

    /// Number of slots, valid or not, across all categories
    pub fn len(&self) -> usize {
        self.tables.iter().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every slot and decoder
    pub fn clear(&mut self) {
        for table in &mut self.tables {
            table.clear();
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use crate::sound::decoder::{DecodeError, DecodeResult, SoundDecoder};
    use crate::sound::factory::DecoderFactory;
    use crate::sound::mixer::types::SoundCategory;

    /// Decoder emitting a constant sample value; the data's first byte is the
    /// value (as i8 scaled to i16), the rest is the length in samples.
    pub struct ConstDecoder {
        value: i16,
        total: usize,
        produced: usize,
        chunk: usize,
    }

    impl SoundDecoder for ConstDecoder {
        fn name(&self) -> &'static str {
            "Const"
        }

        fn total_samples(&self) -> usize {
            self.total
        }

        fn decode(&mut self, buf: &mut [i16]) -> DecodeResult<usize> {
            let n = buf.len().min(self.total - self.produced).min(self.chunk);
            buf[..n].fill(self.value);
            self.produced += n;
            Ok(n)
        }

        fn is_finished(&self) -> bool {
            self.produced >= self.total
        }
    }

    /// Encode a constant sound for `CountingFactory`
    pub fn const_sound(value: i16, samples: u32) -> Arc<[u8]> {
        let mut data = value.to_le_bytes().to_vec();
        data.extend_from_slice(&samples.to_le_bytes());
        Arc::from(data)
    }

    /// Factory building `ConstDecoder`s and counting constructions
    #[derive(Default)]
    pub struct CountingFactory {
        pub created: AtomicUsize,
        /// Max samples per decode call; 0 means unlimited
        pub chunk: usize,
    }

    impl CountingFactory {
        pub fn created(&self) -> usize {
            self.created.load(Ordering::SeqCst)
        }
    }

    impl DecoderFactory for CountingFactory {
        fn probe(&self, _category: SoundCategory, data: &[u8]) -> DecodeResult<()> {
            if data.len() == 6 {
                Ok(())
            } else {
                Err(DecodeError::InvalidData("bad const sound".to_string()))
            }
        }

        fn create(
            &self,
            category: SoundCategory,
            data: Arc<[u8]>,
            _dst_rate: u32,
        ) -> DecodeResult<Box<dyn SoundDecoder>> {
            self.created.fetch_add(1, Ordering::SeqCst);
            self.probe(category, &data)?;
            let value = i16::from_le_bytes([data[0], data[1]]);
            let total = u32::from_le_bytes([data[2], data[3], data[4], data[5]]) as usize;
            Ok(Box::new(ConstDecoder {
                value,
                total,
                produced: 0,
                chunk: if self.chunk == 0 { usize::MAX } else { self.chunk },
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{const_sound, CountingFactory};
    use super::*;

    fn cache(factory: &Arc<CountingFactory>) -> DecodeCache {
        DecodeCache::new(Arc::clone(factory) as Arc<dyn DecoderFactory>, 22050)
    }

    #[test]
    fn test_slot_created_once() {
        let factory = Arc::new(CountingFactory::default());
        let mut cache = cache(&factory);
        let data = const_sound(100, 1000);

        assert!(cache.get_or_create(SoundCategory::ShortEffect, SoundId(1), &data).is_some());
        assert!(cache.get_or_create(SoundCategory::ShortEffect, SoundId(1), &data).is_some());
        assert_eq!(factory.created(), 1);
        assert_eq!(cache.len(), 1);

        // Same id in another category is a different slot
        assert!(cache.get_or_create(SoundCategory::StreamedPcm, SoundId(1), &data).is_some());
        assert_eq!(factory.created(), 2);
    }

    #[test]
    fn test_invalid_slot_never_retried() {
        let factory = Arc::new(CountingFactory::default());
        let mut cache = cache(&factory);
        let bad: Arc<[u8]> = Arc::from(vec![1u8, 2, 3]);

        assert!(cache.get_or_create(SoundCategory::Music, SoundId(7), &bad).is_none());
        assert!(cache.get_or_create(SoundCategory::Music, SoundId(7), &bad).is_none());
        assert_eq!(factory.created(), 1);
        assert!(cache.get(SoundCategory::Music, SoundId(7)).unwrap().is_invalid());

        // Even valid data does not revive the slot
        let good = const_sound(1, 10);
        assert!(cache.get_or_create(SoundCategory::Music, SoundId(7), &good).is_none());
        assert_eq!(factory.created(), 1);
    }

    #[test]
    fn test_ensure_decoded_is_lazy_and_releases_decoder() {
        let factory = Arc::new(CountingFactory {
            chunk: 100,
            ..Default::default()
        });
        let mut cache = cache(&factory);
        let data = const_sound(-5, 10_000);

        let slot = cache
            .get_or_create(SoundCategory::Music, SoundId(1), &data)
            .unwrap();
        assert_eq!(slot.decoded_samples(), 0);
        assert_eq!(slot.total_samples(), 10_000);

        slot.ensure_decoded(250);
        assert!(slot.decoded_samples() >= 250);
        assert!(slot.decoded_samples() <= slot.total_samples());
        assert!(slot.has_decoder());
        assert!(slot.samples().iter().all(|&s| s == -5));

        slot.ensure_decoded(usize::MAX);
        assert_eq!(slot.decoded_samples(), 10_000);
        assert!(!slot.has_decoder());
    }

    #[test]
    fn test_short_stream_truncates_total() {
        struct Short;
        impl SoundDecoder for Short {
            fn name(&self) -> &'static str {
                "Short"
            }
            fn total_samples(&self) -> usize {
                100
            }
            fn decode(&mut self, buf: &mut [i16]) -> crate::sound::decoder::DecodeResult<usize> {
                let _ = buf;
                Ok(0)
            }
            fn is_finished(&self) -> bool {
                true
            }
        }

        let mut slot = CacheSlot::new(Box::new(Short));
        slot.ensure_decoded(50);
        assert_eq!(slot.total_samples(), 0);
        assert!(!slot.has_decoder());
    }

    #[test]
    fn test_clear_drops_slots() {
        let factory = Arc::new(CountingFactory::default());
        let mut cache = cache(&factory);
        let data = const_sound(1, 10);
        cache.get_or_create(SoundCategory::ShortEffect, SoundId(3), &data);
        assert!(!cache.is_empty());

        cache.clear();
        assert!(cache.is_empty());
        cache.get_or_create(SoundCategory::ShortEffect, SoundId(3), &data);
        assert_eq!(factory.created(), 2);
    }
}
