//! Test helpers for `symbolic`.
//!
//! Builds small PDB files in memory: an MSF container with arbitrary streams, CodeView type
//! records and a TPI stream with its hash stream. The builders write exactly what the format
//! prescribes and do not validate their input, so tests can also produce broken files.
#![warn(missing_docs)]

/// The 32 byte magic at the start of an MSF 7.00 file, including NUL padding.
pub const MSF_MAGIC: &[u8; 32] = b"Microsoft C/C++ MSF 7.00\r\n\x1a\x44\x53\0\0\0";

/// The TPI version written by Visual C++ 8.0 and later.
pub const TPI_VERSION_V80: u32 = 20040203;

/// The PDB information stream version written by Visual C++ 7.0 and later.
pub const PDB_VERSION_VC70: u32 = 20000404;

fn push_u16(buf: &mut Vec<u8>, value: u16) {
    buf.extend_from_slice(&value.to_le_bytes());
}

fn push_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

/// Appends `F3 F2 F1` style padding until `len_with_header` is a multiple of 4.
fn pad(buf: &mut Vec<u8>, len_with_header: usize) {
    let missing = (4 - len_with_header % 4) % 4;
    for marker in (1..=missing as u8).rev() {
        buf.push(0xf0 + marker);
    }
}

/// Builds an MSF container from a list of streams.
///
/// Page 0 holds the header, pages 1 and 2 are reserved for the free page maps. Stream pages come
/// next in stream order, followed by the stream directory and its page list.
#[derive(Clone, Debug)]
pub struct MsfBuilder {
    page_size: usize,
    streams: Vec<Option<Vec<u8>>>,
    scatter: bool,
}

impl MsfBuilder {
    /// Creates an empty container with the given page size.
    pub fn new(page_size: u32) -> Self {
        MsfBuilder {
            page_size: page_size as usize,
            streams: Vec::new(),
            scatter: false,
        }
    }

    /// Appends a stream and returns its index.
    pub fn add_stream(&mut self, data: impl Into<Vec<u8>>) -> u32 {
        self.streams.push(Some(data.into()));
        self.streams.len() as u32 - 1
    }

    /// Appends a stream marked as absent in the directory and returns its index.
    pub fn add_absent_stream(&mut self) -> u32 {
        self.streams.push(None);
        self.streams.len() as u32 - 1
    }

    /// Replaces the stream at `index`, appending absent streams as needed.
    pub fn set_stream(&mut self, index: u32, data: impl Into<Vec<u8>>) {
        let index = index as usize;
        if self.streams.len() <= index {
            self.streams.resize(index + 1, None);
        }
        self.streams[index] = Some(data.into());
    }

    /// Stores the pages of every stream in descending order.
    pub fn scatter_pages(&mut self, scatter: bool) {
        self.scatter = scatter;
    }

    fn allocate(&self, pages: &mut Vec<Vec<u8>>, data: &[u8], scatter: bool) -> Vec<u32> {
        let count = (data.len() + self.page_size - 1) / self.page_size;
        let first = pages.len();
        pages.resize(first + count, vec![0; self.page_size]);

        let mut list: Vec<u32> = (first..first + count).map(|page| page as u32).collect();
        if scatter {
            list.reverse();
        }

        for (chunk, &page) in data.chunks(self.page_size).zip(&list) {
            pages[page as usize][..chunk.len()].copy_from_slice(chunk);
        }

        list
    }

    /// Serializes the container.
    pub fn build(&self) -> Vec<u8> {
        let mut pages = vec![vec![0; self.page_size]; 3];

        let mut lists = Vec::with_capacity(self.streams.len());
        for stream in &self.streams {
            let data = stream.as_deref().unwrap_or_default();
            lists.push(self.allocate(&mut pages, data, self.scatter));
        }

        let mut directory = Vec::new();
        push_u32(&mut directory, self.streams.len() as u32);
        for stream in &self.streams {
            push_u32(&mut directory, stream.as_ref().map_or(u32::MAX, |s| s.len() as u32));
        }
        for list in &lists {
            for &page in list {
                push_u32(&mut directory, page);
            }
        }

        let directory_pages = self.allocate(&mut pages, &directory, self.scatter);
        let mut list = Vec::new();
        for page in directory_pages {
            push_u32(&mut list, page);
        }
        let bootstrap = self.allocate(&mut pages, &list, false);

        let mut header = Vec::with_capacity(self.page_size);
        header.extend_from_slice(MSF_MAGIC);
        push_u32(&mut header, self.page_size as u32);
        push_u32(&mut header, 1);
        push_u32(&mut header, pages.len() as u32);
        push_u32(&mut header, directory.len() as u32);
        push_u32(&mut header, 0);
        for page in bootstrap {
            push_u32(&mut header, page);
        }
        assert!(header.len() <= self.page_size, "bootstrap list exceeds page 0");
        pages[0][..header.len()].copy_from_slice(&header);

        pages.concat()
    }
}

/// Builds a single type record: `length`, `leaf` and payload.
#[derive(Clone, Debug)]
pub struct RecordBuilder {
    leaf: u16,
    payload: Vec<u8>,
    padded: bool,
}

impl RecordBuilder {
    /// Starts a record of the given kind.
    pub fn new(leaf: u16) -> Self {
        RecordBuilder {
            leaf,
            payload: Vec::new(),
            padded: true,
        }
    }

    /// Appends raw bytes.
    pub fn bytes(mut self, bytes: &[u8]) -> Self {
        self.payload.extend_from_slice(bytes);
        self
    }

    /// Appends a byte.
    pub fn u8(mut self, value: u8) -> Self {
        self.payload.push(value);
        self
    }

    /// Appends a little-endian `u16`.
    pub fn u16(mut self, value: u16) -> Self {
        push_u16(&mut self.payload, value);
        self
    }

    /// Appends a little-endian `u32`.
    pub fn u32(mut self, value: u32) -> Self {
        push_u32(&mut self.payload, value);
        self
    }

    /// Appends a numeric leaf, using the smallest encoding for the value.
    pub fn numeric(mut self, value: u64) -> Self {
        encode_numeric(&mut self.payload, value);
        self
    }

    /// Appends a NUL-terminated string.
    pub fn cstring(mut self, value: &str) -> Self {
        self.payload.extend_from_slice(value.as_bytes());
        self.payload.push(0);
        self
    }

    /// Appends a length-prefixed string.
    pub fn pascal_string(mut self, value: &str) -> Self {
        self.payload.push(value.len() as u8);
        self.payload.extend_from_slice(value.as_bytes());
        self
    }

    /// Disables trailing alignment padding.
    pub fn unpadded(mut self) -> Self {
        self.padded = false;
        self
    }

    /// Serializes the record.
    pub fn build(mut self) -> Vec<u8> {
        if self.padded {
            let len = self.payload.len();
            pad(&mut self.payload, len);
        }

        let mut record = Vec::with_capacity(self.payload.len() + 4);
        push_u16(&mut record, self.payload.len() as u16 + 2);
        push_u16(&mut record, self.leaf);
        record.extend_from_slice(&self.payload);
        record
    }
}

fn encode_numeric(buf: &mut Vec<u8>, value: u64) {
    if value < 0x8000 {
        push_u16(buf, value as u16);
    } else if value <= u64::from(u32::MAX) {
        push_u16(buf, 0x8004);
        push_u32(buf, value as u32);
    } else {
        push_u16(buf, 0x800a);
        buf.extend_from_slice(&value.to_le_bytes());
    }
}

/// Builds an `LF_FIELDLIST` record, padding each entry to four bytes.
#[derive(Clone, Debug, Default)]
pub struct FieldListBuilder {
    payload: Vec<u8>,
}

impl FieldListBuilder {
    /// Starts an empty field list.
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(mut self, leaf: u16, write: impl FnOnce(&mut Vec<u8>)) -> Self {
        push_u16(&mut self.payload, leaf);
        write(&mut self.payload);
        let len = self.payload.len();
        pad(&mut self.payload, len);
        self
    }

    /// Appends an `LF_MEMBER` entry.
    pub fn member(self, attributes: u16, ty: u32, offset: u64, name: &str) -> Self {
        self.entry(0x150d, |buf| {
            push_u16(buf, attributes);
            push_u32(buf, ty);
            encode_numeric(buf, offset);
            buf.extend_from_slice(name.as_bytes());
            buf.push(0);
        })
    }

    /// Appends an `LF_STMEMBER` entry.
    pub fn static_member(self, attributes: u16, ty: u32, name: &str) -> Self {
        self.entry(0x150e, |buf| {
            push_u16(buf, attributes);
            push_u32(buf, ty);
            buf.extend_from_slice(name.as_bytes());
            buf.push(0);
        })
    }

    /// Appends an `LF_BCLASS` entry.
    pub fn base_class(self, attributes: u16, ty: u32, offset: u64) -> Self {
        self.entry(0x1400, |buf| {
            push_u16(buf, attributes);
            push_u32(buf, ty);
            encode_numeric(buf, offset);
        })
    }

    /// Appends an `LF_VBCLASS` entry.
    pub fn virtual_base_class(self, attributes: u16, ty: u32, base_pointer: u32) -> Self {
        self.entry(0x1401, |buf| {
            push_u16(buf, attributes);
            push_u32(buf, ty);
            push_u32(buf, base_pointer);
            encode_numeric(buf, 0);
            encode_numeric(buf, 1);
        })
    }

    /// Appends an `LF_ENUMERATE` entry.
    pub fn enumerate(self, attributes: u16, value: u64, name: &str) -> Self {
        self.entry(0x1502, |buf| {
            push_u16(buf, attributes);
            encode_numeric(buf, value);
            buf.extend_from_slice(name.as_bytes());
            buf.push(0);
        })
    }

    /// Appends an `LF_ONEMETHOD` entry. `vtable_offset` is written only if given.
    pub fn method(self, attributes: u16, ty: u32, vtable_offset: Option<u32>, name: &str) -> Self {
        self.entry(0x1511, |buf| {
            push_u16(buf, attributes);
            push_u32(buf, ty);
            if let Some(offset) = vtable_offset {
                push_u32(buf, offset);
            }
            buf.extend_from_slice(name.as_bytes());
            buf.push(0);
        })
    }

    /// Appends an `LF_METHOD` entry referencing a method list.
    pub fn overloaded_method(self, count: u16, method_list: u32, name: &str) -> Self {
        self.entry(0x150f, |buf| {
            push_u16(buf, count);
            push_u32(buf, method_list);
            buf.extend_from_slice(name.as_bytes());
            buf.push(0);
        })
    }

    /// Appends an `LF_NESTTYPE` entry.
    pub fn nested(self, ty: u32, name: &str) -> Self {
        self.entry(0x1510, |buf| {
            push_u16(buf, 0);
            push_u32(buf, ty);
            buf.extend_from_slice(name.as_bytes());
            buf.push(0);
        })
    }

    /// Appends an `LF_VFUNCTAB` entry.
    pub fn vtable(self, ty: u32) -> Self {
        self.entry(0x1409, |buf| {
            push_u16(buf, 0);
            push_u32(buf, ty);
        })
    }

    /// Appends an `LF_INDEX` entry continuing the list in another record.
    pub fn continuation(self, ty: u32) -> Self {
        self.entry(0x1404, |buf| {
            push_u16(buf, 0);
            push_u32(buf, ty);
        })
    }

    /// Serializes the field list record.
    pub fn build(self) -> Vec<u8> {
        RecordBuilder::new(0x1203).bytes(&self.payload).build()
    }
}

/// Builds a TPI stream and its hash stream.
///
/// Records receive consecutive indices starting at the minimum index. Named records are placed into
/// the bucket of their name; unnamed records into the bucket of their index.
#[derive(Clone, Debug)]
pub struct TypeStreamBuilder {
    minimum_index: u32,
    records: Vec<(Vec<u8>, Option<String>)>,
    bucket_count: u32,
    sample_interval: Option<usize>,
    hash_stream: u16,
    hash_key_size: u32,
    hash_adjustments: Vec<u8>,
}

/// The output of [`TypeStreamBuilder::build`].
#[derive(Clone, Debug)]
pub struct TypeStreams {
    /// The TPI stream.
    pub tpi: Vec<u8>,
    /// The hash stream.
    pub hash: Vec<u8>,
}

impl Default for TypeStreamBuilder {
    fn default() -> Self {
        TypeStreamBuilder {
            minimum_index: 0x1000,
            records: Vec::new(),
            bucket_count: 4096,
            sample_interval: Some(8192),
            hash_stream: 5,
            hash_key_size: 4,
            hash_adjustments: Vec::new(),
        }
    }
}

impl TypeStreamBuilder {
    /// Creates a builder with 4096 buckets and a sample every 8 KiB of records.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a record and returns its index.
    pub fn add(&mut self, record: Vec<u8>, name: Option<&str>) -> u32 {
        self.records.push((record, name.map(str::to_owned)));
        self.minimum_index + self.records.len() as u32 - 1
    }

    /// The index the next record will receive.
    pub fn next_index(&self) -> u32 {
        self.minimum_index + self.records.len() as u32
    }

    /// Sets the number of hash buckets. Zero omits the hash values.
    pub fn bucket_count(&mut self, count: u32) -> &mut Self {
        self.bucket_count = count;
        self
    }

    /// Sets the distance between index offset samples in bytes, or disables sampling.
    pub fn sample_interval(&mut self, interval: Option<usize>) -> &mut Self {
        self.sample_interval = interval;
        self
    }

    /// Sets the hash stream index written into the header.
    pub fn hash_stream(&mut self, index: u16) -> &mut Self {
        self.hash_stream = index;
        self
    }

    /// Overrides the hash key size written into the header.
    pub fn hash_key_size(&mut self, size: u32) -> &mut Self {
        self.hash_key_size = size;
        self
    }

    /// Adds a hash adjustment table to the hash stream.
    pub fn hash_adjustments(&mut self, table: Vec<u8>) -> &mut Self {
        self.hash_adjustments = table;
        self
    }

    /// Serializes both streams, hashing names with `hash`.
    pub fn build(&self, hash: impl Fn(&[u8]) -> u32) -> TypeStreams {
        let mut records = Vec::new();
        let mut samples = Vec::new();
        let mut values = Vec::new();
        let mut next_sample = 0;

        for (i, (record, name)) in self.records.iter().enumerate() {
            let index = self.minimum_index + i as u32;
            if let Some(interval) = self.sample_interval {
                if records.len() >= next_sample {
                    push_u32(&mut samples, index);
                    push_u32(&mut samples, records.len() as u32);
                    next_sample = records.len() + interval.max(1);
                }
            }

            if self.bucket_count > 0 {
                let value = match name {
                    Some(name) => hash(name.as_bytes()),
                    None => index,
                };
                push_u32(&mut values, value % self.bucket_count);
            }
            records.extend_from_slice(record);
        }

        let mut hash_stream = Vec::new();
        hash_stream.extend_from_slice(&values);
        hash_stream.extend_from_slice(&samples);
        hash_stream.extend_from_slice(&self.hash_adjustments);

        let mut tpi = Vec::with_capacity(56 + records.len());
        push_u32(&mut tpi, TPI_VERSION_V80);
        push_u32(&mut tpi, 56);
        push_u32(&mut tpi, self.minimum_index);
        push_u32(&mut tpi, self.next_index());
        push_u32(&mut tpi, records.len() as u32);
        push_u16(&mut tpi, self.hash_stream);
        push_u16(&mut tpi, u16::MAX);
        push_u32(&mut tpi, self.hash_key_size);
        push_u32(&mut tpi, self.bucket_count);
        push_u32(&mut tpi, 0);
        push_u32(&mut tpi, values.len() as u32);
        push_u32(&mut tpi, values.len() as u32);
        push_u32(&mut tpi, samples.len() as u32);
        push_u32(&mut tpi, (values.len() + samples.len()) as u32);
        push_u32(&mut tpi, self.hash_adjustments.len() as u32);
        tpi.extend_from_slice(&records);

        TypeStreams {
            tpi,
            hash: hash_stream,
        }
    }
}

/// Builds the PDB information stream.
#[derive(Clone, Debug)]
pub struct PdbInfoBuilder {
    /// The format version.
    pub version: u32,
    /// The creation timestamp.
    pub signature: u32,
    /// The age.
    pub age: u32,
    /// The GUID in its on-disk byte order.
    pub guid: [u8; 16],
    /// The serialized named stream map.
    pub names: Vec<u8>,
}

impl Default for PdbInfoBuilder {
    fn default() -> Self {
        PdbInfoBuilder {
            version: PDB_VERSION_VC70,
            signature: 0x5f3c_1a2b,
            age: 1,
            guid: [0; 16],
            names: Vec::new(),
        }
    }
}

impl PdbInfoBuilder {
    /// Serializes the stream.
    pub fn build(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(32 + self.names.len());
        push_u32(&mut buf, self.version);
        push_u32(&mut buf, self.signature);
        push_u32(&mut buf, self.age);
        buf.extend_from_slice(&self.guid);
        push_u32(&mut buf, self.names.len() as u32);
        buf.extend_from_slice(&self.names);
        buf
    }
}

/// Assembles a PDB with the information stream, the TPI stream and its hash stream.
///
/// Streams 0, 3 and 4 are empty. The hash stream is stored at the index recorded in the TPI
/// header, unless that index is `0xffff`.
pub fn build_pdb(
    page_size: u32,
    info: &PdbInfoBuilder,
    types: &TypeStreamBuilder,
    hash: impl Fn(&[u8]) -> u32,
) -> Vec<u8> {
    let streams = types.build(hash);
    let mut msf = MsfBuilder::new(page_size);
    msf.add_stream(Vec::new());
    msf.add_stream(info.build());
    msf.add_stream(streams.tpi);
    msf.add_stream(Vec::new());
    msf.add_stream(Vec::new());
    if types.hash_stream != u16::MAX {
        msf.set_stream(u32::from(types.hash_stream), streams.hash);
    }
    msf.build()
}
