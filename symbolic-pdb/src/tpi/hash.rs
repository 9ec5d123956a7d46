//! The auxiliary hash stream of the TPI stream.
//!
//! The hash stream holds two tables:
//!
//!  - One truncated name hash per type record, in index order. Grouping indices by this value
//!    yields hash buckets that map names to candidate records.
//!  - Sparse `(type index, byte offset)` samples taken every few kilobytes of records, which let
//!    [`TypeInformation::get`](super::TypeInformation::get) start close to a record instead of
//!    scanning from the first one.

use scroll::{Pread, LE};

use super::header::TypeStreamHeader;
use super::{TypeError, TypeErrorKind, TypeIndex};
use crate::msf::Stream;

/// Computes the name hash used to place records into buckets.
///
/// The UTF-8 bytes are folded into 32 bits four at a time, with a trailing two-byte and one-byte
/// remainder. The result is then lowercased bytewise and mixed. Reduce it modulo the bucket count
/// to obtain the bucket.
pub fn hash_name<S: AsRef<[u8]>>(name: S) -> u32 {
    let bytes = name.as_ref();
    let mut hash = 0u32;

    let mut words = bytes.chunks_exact(4);
    for word in &mut words {
        hash ^= u32::from_le_bytes([word[0], word[1], word[2], word[3]]);
    }

    let mut rest = words.remainder();
    if rest.len() >= 2 {
        hash ^= u32::from(u16::from_le_bytes([rest[0], rest[1]]));
        rest = &rest[2..];
    }
    if let Some(&byte) = rest.first() {
        hash ^= u32::from(byte);
    }

    hash |= 0x2020_2020;
    hash ^= hash >> 11;
    hash ^= hash >> 16;
    hash
}

/// A sampled position of a record in the TPI stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IndexOffset {
    /// The type index of the sampled record.
    pub index: TypeIndex,
    /// The offset of the record relative to the end of the TPI header.
    pub offset: u32,
}

/// The decoded hash stream.
#[derive(Clone, Debug, Default)]
pub struct TypeHashIndex {
    minimum_index: u32,
    type_count: u32,
    bucket_count: u32,
    /// `(bucket, index)` pairs sorted by bucket, then index.
    buckets: Vec<(u32, TypeIndex)>,
    samples: Vec<IndexOffset>,
}

fn invalid<E>(source: E) -> TypeError
where
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    TypeError::new(TypeErrorKind::InvalidHashStream, source)
}

impl TypeHashIndex {
    /// Decodes the tables referenced by the TPI header.
    #[tracing::instrument(level = "trace", name = "TypeHashIndex::parse", skip_all)]
    pub(crate) fn parse(stream: &Stream<'_>, header: &TypeStreamHeader) -> Result<Self, TypeError> {
        let minimum_index = header.minimum_index;
        let type_count = header.maximum_index.saturating_sub(header.minimum_index);
        let bucket_count = header.bucket_count;

        let (offset, size) = header
            .hash_values
            .to_range()
            .ok_or(TypeErrorKind::InvalidHashStream)?;
        if size != 0 && size != type_count as usize * 4 {
            return Err(invalid(format!(
                "{size} bytes of hash values for {type_count} types"
            )));
        }
        if size != 0 && bucket_count == 0 {
            return Err(invalid("hash values without buckets"));
        }

        let values = stream.read(offset, size).map_err(invalid)?;
        let mut buckets = Vec::with_capacity(type_count as usize);
        let mut out_of_range = 0usize;
        let mut pos = 0;
        for index in minimum_index..minimum_index + (size / 4) as u32 {
            let bucket: u32 = values.gread_with(&mut pos, LE).map_err(invalid)?;
            if bucket >= bucket_count {
                out_of_range += 1;
            }
            buckets.push((bucket, TypeIndex(index)));
        }
        buckets.sort_unstable();

        if out_of_range > 0 {
            tracing::warn!(
                out_of_range,
                bucket_count,
                "hash values outside of the bucket range"
            );
        }

        let (offset, size) = header
            .index_offsets
            .to_range()
            .ok_or(TypeErrorKind::InvalidHashStream)?;
        if size % 8 != 0 {
            return Err(invalid(format!("index offset table of {size} bytes")));
        }

        let raw = stream.read(offset, size).map_err(invalid)?;
        let mut samples = Vec::with_capacity(size / 8);
        let mut pos = 0;
        while pos < raw.len() {
            let sample = IndexOffset {
                index: TypeIndex(raw.gread_with(&mut pos, LE).map_err(invalid)?),
                offset: raw.gread_with(&mut pos, LE).map_err(invalid)?,
            };
            if let Some(previous) = samples.last() {
                let IndexOffset { index, offset } = *previous;
                if sample.index <= index || sample.offset <= offset {
                    return Err(invalid("index offset table is not sorted"));
                }
            }
            if sample.index.0 < minimum_index || sample.index.0 >= header.maximum_index {
                return Err(invalid(format!("sampled index {} out of range", sample.index)));
            }
            samples.push(sample);
        }

        Ok(TypeHashIndex {
            minimum_index,
            type_count,
            bucket_count,
            buckets,
            samples,
        })
    }

    /// The number of hash buckets.
    pub fn bucket_count(&self) -> u32 {
        self.bucket_count
    }

    /// The bucket a name hashes into, or `None` if there are no buckets.
    pub fn bucket_of<S: AsRef<[u8]>>(&self, name: S) -> Option<u32> {
        hash_name(name).checked_rem(self.bucket_count)
    }

    /// All indices in a bucket, in increasing order.
    pub fn bucket(&self, bucket: u32) -> impl Iterator<Item = TypeIndex> + '_ {
        let start = self.buckets.partition_point(|&(b, _)| b < bucket);
        let end = self.buckets.partition_point(|&(b, _)| b <= bucket);
        self.buckets[start..end].iter().map(|&(_, index)| index)
    }

    /// The indices of records whose name may equal `name`, in increasing order.
    ///
    /// This is a superset of the actual matches. Decode each candidate and compare its name.
    pub fn candidates(&self, name: &[u8]) -> impl Iterator<Item = TypeIndex> + '_ {
        self.bucket_of(name)
            .into_iter()
            .flat_map(move |bucket| self.bucket(bucket))
    }

    /// The sparse index offset samples.
    pub fn samples(&self) -> &[IndexOffset] {
        &self.samples
    }

    /// Finds the sample closest to, but not after, the given index.
    ///
    /// The search starts at a position proportional to where `index` lies in the index range and
    /// then moves forward or backward until it brackets `index`. Returns `None` if there are no
    /// samples or all samples come after `index`, in which case callers must scan from the first
    /// record.
    pub fn nearest_sample(&self, index: TypeIndex) -> Option<IndexOffset> {
        let samples = &self.samples;
        if samples.is_empty() || self.type_count == 0 || index.0 < self.minimum_index {
            return None;
        }

        let relative = u64::from(index.0 - self.minimum_index);
        let guess = samples.len() as u64 * relative / u64::from(self.type_count);
        let mut guess = (guess as usize).min(samples.len() - 1);

        while guess + 1 < samples.len() && samples[guess + 1].index <= index {
            guess += 1;
        }
        while guess > 0 && samples[guess].index > index {
            guess -= 1;
        }

        let sample = samples[guess];
        (sample.index <= index).then_some(sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use similar_asserts::assert_eq;

    #[test]
    fn test_hash_single_char() {
        assert_eq!(hash_name("a"), 0x2024_0441);
        // The lowercase mask makes single letters case-insensitive.
        assert_eq!(hash_name("A"), 0x2024_0441);
    }

    #[test]
    fn test_hash_chunk_boundaries() {
        assert_eq!(hash_name(""), 0x2024_0400);
        assert_eq!(hash_name("Yolo"), 0x6f61_ed95);
        assert_eq!(hash_name("Yolo_"), 0x6f61_edca);
        assert_eq!(hash_name("Yolo_z"), 0x6f61_b7c1);
        assert_eq!(hash_name("Yolo_zz"), 0x6f61_b79b);
        assert_eq!(hash_name("std::vector<int>"), 0x7b28_3cb8);
    }

    #[test]
    fn test_hash_buckets() {
        assert_eq!(hash_name("Yolo") % 0x3ffff, 133485);
        assert_eq!(hash_name("Yolo") % 4096, 3477);
        assert_eq!(hash_name("a") % 0x3ffff, 3146);
    }

    fn index(samples: &[(u32, u32)], type_count: u32) -> TypeHashIndex {
        TypeHashIndex {
            minimum_index: 0x1000,
            type_count,
            bucket_count: 16,
            buckets: vec![],
            samples: samples
                .iter()
                .map(|&(index, offset)| IndexOffset {
                    index: TypeIndex(index),
                    offset,
                })
                .collect(),
        }
    }

    #[test]
    fn test_nearest_sample_exact() {
        let hash = index(&[(0x1000, 0), (0x1010, 800), (0x1020, 1600)], 0x30);
        let sample = hash.nearest_sample(TypeIndex(0x1010)).unwrap();
        assert_eq!(sample.offset, 800);
    }

    #[test]
    fn test_nearest_sample_corrects_guess() {
        // Samples are skewed towards the start, so the proportional guess lands too far back.
        let hash = index(&[(0x1000, 0), (0x1001, 8), (0x1002, 16), (0x1040, 9000)], 0x50);
        assert_eq!(hash.nearest_sample(TypeIndex(0x1045)).unwrap().offset, 9000);
        assert_eq!(hash.nearest_sample(TypeIndex(0x1003)).unwrap().offset, 16);

        // Skewed towards the end, the guess lands too far ahead.
        let hash = index(&[(0x1000, 0), (0x1040, 8000), (0x1041, 8010), (0x1042, 8020)], 0x50);
        assert_eq!(hash.nearest_sample(TypeIndex(0x103f)).unwrap().offset, 0);
        assert_eq!(hash.nearest_sample(TypeIndex(0x104f)).unwrap().offset, 8020);
    }

    #[test]
    fn test_nearest_sample_before_first() {
        let hash = index(&[(0x1004, 32)], 0x10);
        assert_eq!(hash.nearest_sample(TypeIndex(0x1002)), None);
        assert_eq!(hash.nearest_sample(TypeIndex(0x1008)).unwrap().offset, 32);
    }

    #[test]
    fn test_no_samples() {
        let hash = index(&[], 0x10);
        assert_eq!(hash.nearest_sample(TypeIndex(0x1002)), None);
    }

    #[test]
    fn test_bucket_lookup() {
        let mut hash = index(&[], 4);
        hash.buckets = vec![
            (1, TypeIndex(0x1001)),
            (3, TypeIndex(0x1000)),
            (3, TypeIndex(0x1003)),
            (5, TypeIndex(0x1002)),
        ];
        let bucket: Vec<_> = hash.bucket(3).collect();
        assert_eq!(bucket, vec![TypeIndex(0x1000), TypeIndex(0x1003)]);
        assert_eq!(hash.bucket(4).count(), 0);
    }
}
