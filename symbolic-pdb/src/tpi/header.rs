use scroll::Pread;

/// A range of the hash stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pread)]
pub(crate) struct OffsetSize {
    pub offset: i32,
    pub size: i32,
}

impl OffsetSize {
    /// Returns the range as `(offset, size)` if both are non-negative.
    pub fn to_range(self) -> Option<(usize, usize)> {
        Some((
            usize::try_from(self.offset).ok()?,
            usize::try_from(self.size).ok()?,
        ))
    }
}

/// The header at the start of the TPI stream.
#[derive(Debug, Clone, Copy, Pread)]
pub(crate) struct TypeStreamHeader {
    pub version: u32,
    pub header_size: u32,
    pub minimum_index: u32,
    pub maximum_index: u32,
    pub records_size: u32,
    pub hash_stream: u16,
    pub _aux_hash_stream: u16,
    pub hash_key_size: u32,
    pub bucket_count: u32,
    pub hash_values: OffsetSize,
    pub index_offsets: OffsetSize,
    pub hash_adjustments: OffsetSize,
}

impl TypeStreamHeader {
    /// The number of bytes in the fixed header.
    pub const SIZE: usize = 56;

    /// The hash stream number, if the stream has one.
    pub fn hash_stream(&self) -> Option<u32> {
        (self.hash_stream != u16::MAX).then_some(self.hash_stream.into())
    }
}

/// Known TPI versions. Only the VC 7.0 layout and later are in use.
pub(crate) const KNOWN_VERSIONS: &[u32] = &[
    19950410, // V40
    19951122, // V41
    19961031, // V50
    19990903, // V70
    20040203, // V80
];
