//! ipip (17monipdb.datx) database reader
//!
//! # Format
//!
//! ```text
//! [Length prefix]                    4 bytes
//!   length: u32 BE                   // L
//!
//! [Index blob]                       L - 4 bytes, loaded into memory
//!   buckets: [u32 LE; 65536]         // first record per /16, 262144 bytes
//!   records: [Record; n]             // up to blob offset L - 262148
//!     ip:     u32 BE                 // last address of the range
//!     offset: u24 LE                 // data offset
//!     length: u16 BE                 // data length
//!   (remainder)                      // first bytes of the data region
//!
//! [Data region]                      starts at file position L - 262144
//!   tab-separated UTF-8 text
//! ```
//!
//! A lookup picks the bucket for the first two octets, scans forward for
//! the first record whose address is `>=` the target, and reads that
//! record's text from the data region.

use crate::address::Ipv4Address;
use crate::endian::{read_u16_be, read_u24_le, read_u32_be, read_u32_le, ReadFieldExt};
use crate::error::{LocationError, Result};
use crate::record::{IpipRecord, Lookup};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Size of the coarse bucket table
pub const BUCKET_TABLE_SIZE: usize = 262_144;

/// Number of buckets (one per first-two-octet pair)
pub const BUCKET_COUNT: usize = 65_536;

/// Size of one secondary index record
pub const INDEX_RECORD_SIZE: usize = 9;

/// Size of the length prefix
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Pointer to one text record in the data region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataPointer {
    /// Offset relative to the data region
    pub offset: u32,
    /// Length in bytes
    pub length: u16,
}

/// The in-memory index of an ipip database
#[derive(Debug, Clone)]
pub struct IpipIndex {
    length: u32,
    blob: Vec<u8>,
}

impl IpipIndex {
    /// Read the length prefix and the index blob.
    ///
    /// Leaves `reader` positioned after the blob.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let length = reader
            .read_u32_be("index length")
            .map_err(|e| LocationError::InvalidDatabase(format!("cannot read ipip length: {}", e)))?;
        if (length as usize) < LENGTH_PREFIX_SIZE {
            return Err(LocationError::InvalidDatabase(format!(
                "ipip index length {} is shorter than its own prefix",
                length
            )));
        }

        let blob_len = length as usize - LENGTH_PREFIX_SIZE;
        // The prefix is untrusted; let the reader grow the buffer past this
        let mut blob = Vec::with_capacity(blob_len.min(2 * BUCKET_TABLE_SIZE));
        reader
            .by_ref()
            .take(blob_len as u64)
            .read_to_end(&mut blob)
            .map_err(|e| LocationError::InvalidDatabase(format!("cannot read ipip index: {}", e)))?;

        let index = Self::from_parts(length, blob);
        if !index.is_complete() {
            log::warn!(
                "ipip index truncated: {} of {} bytes, lookups past the end will fail",
                index.blob.len(),
                blob_len
            );
        }
        Ok(index)
    }

    /// Build an index from an already loaded blob.
    ///
    /// A short blob is accepted; lookups that need the missing part fail
    /// with [`LocationError::TruncatedRead`].
    pub fn from_parts(length: u32, blob: Vec<u8>) -> Self {
        Self { length, blob }
    }

    /// Whether the bucket table and every record are present
    pub fn is_complete(&self) -> bool {
        self.records_end().is_some_and(|end| self.blob.len() >= end)
    }

    /// The length prefix `L`
    pub fn length(&self) -> u32 {
        self.length
    }

    /// Number of secondary index records
    pub fn record_count(&self) -> usize {
        self.records_end()
            .map(|end| (end - BUCKET_TABLE_SIZE) / INDEX_RECORD_SIZE)
            .unwrap_or(0)
    }

    /// Blob offset where the secondary records stop
    fn records_end(&self) -> Option<usize> {
        let end = (self.length as usize).checked_sub(BUCKET_TABLE_SIZE + LENGTH_PREFIX_SIZE)?;
        (end >= BUCKET_TABLE_SIZE).then_some(end)
    }

    /// First record to scan for addresses sharing `ip`'s first two octets
    pub fn bucket_start(&self, ip: Ipv4Address) -> Option<u32> {
        let [a, b, _, _] = ip.octets();
        let bucket = (usize::from(a) * 256 + usize::from(b)) * 4;
        read_u32_le(&self.blob, bucket)
    }

    /// Find the data pointer covering `ip`.
    ///
    /// `Ok(None)` means the scan ran off the end of the records. Reads that
    /// fall outside a truncated blob are errors.
    pub fn find(&self, ip: Ipv4Address) -> Result<Option<DataPointer>> {
        let target = ip.to_u32();
        let records_end = self.records_end().ok_or_else(|| {
            LocationError::InvalidDatabase(format!(
                "ipip index length {} leaves no room for the bucket table",
                self.length
            ))
        })?;
        let start_record = self
            .bucket_start(ip)
            .ok_or_else(|| truncated_index("bucket table", self.blob.len()))?;

        let mut pos = (start_record as usize)
            .saturating_mul(INDEX_RECORD_SIZE)
            .saturating_add(BUCKET_TABLE_SIZE);
        while pos < records_end {
            let record = self
                .blob
                .get(pos..pos + INDEX_RECORD_SIZE)
                .ok_or_else(|| truncated_index("index record", self.blob.len()))?;
            let record_ip = read_u32_be(record, 0).unwrap_or_default();
            if record_ip >= target {
                return Ok(Some(DataPointer {
                    offset: read_u24_le(record, 4).unwrap_or_default(),
                    length: read_u16_be(record, 7).unwrap_or_default(),
                }));
            }
            pos += INDEX_RECORD_SIZE;
        }
        Ok(None)
    }

    /// Absolute file position of a data pointer
    pub fn data_position(&self, pointer: DataPointer) -> u64 {
        u64::from(self.length) + u64::from(pointer.offset) - BUCKET_TABLE_SIZE as u64
    }
}

/// Lookup engine over any seekable byte source
pub struct IpipReader<R> {
    inner: R,
    index: IpipIndex,
}

impl<R: Read + Seek> IpipReader<R> {
    /// Load the index from the start of `inner`
    pub fn new(mut inner: R) -> Result<Self> {
        inner
            .seek(SeekFrom::Start(0))
            .map_err(|e| LocationError::InvalidDatabase(format!("cannot seek ipip index: {}", e)))?;
        let index = IpipIndex::read_from(&mut inner)?;
        Ok(Self { inner, index })
    }

    /// The loaded index
    pub fn index(&self) -> &IpipIndex {
        &self.index
    }

    /// Look up `ip`.
    ///
    /// The address type guarantees four in-range octets, so the only
    /// rejections are "not indexed" and structural read failures.
    pub fn lookup(&mut self, ip: Ipv4Address) -> Lookup<IpipRecord> {
        let pointer = match self.index.find(ip) {
            Ok(Some(pointer)) => pointer,
            Ok(None) => return Lookup::NoCoverage,
            Err(e) => {
                log::debug!("ipip lookup of {} failed: {}", ip, e);
                return Lookup::SystemError(e.to_string());
            }
        };

        match self.read_text(pointer) {
            Ok(text) => Lookup::Found(split_fields(&text)),
            Err(e) => {
                log::debug!("ipip lookup of {} failed: {}", ip, e);
                Lookup::SystemError(e.to_string())
            }
        }
    }

    fn read_text(&mut self, pointer: DataPointer) -> Result<String> {
        self.inner
            .seek(SeekFrom::Start(self.index.data_position(pointer)))?;
        let mut buf = vec![0u8; usize::from(pointer.length)];
        self.inner.read_exact(&mut buf).map_err(|_| {
            LocationError::TruncatedRead(format!(
                "ipip data record at {:#x} ({} bytes)",
                pointer.offset, pointer.length
            ))
        })?;

        Ok(match String::from_utf8(buf) {
            Ok(text) => text,
            Err(e) => {
                log::warn!("ipip data record at {:#x} is not valid UTF-8", pointer.offset);
                String::from_utf8_lossy(e.as_bytes()).into_owned()
            }
        })
    }
}

fn truncated_index(what: &str, loaded: usize) -> LocationError {
    LocationError::TruncatedRead(format!(
        "ipip {} lies past the {} loaded index bytes",
        what, loaded
    ))
}

fn split_fields(text: &str) -> IpipRecord {
    let bytes = text.as_bytes();
    let mut fields = Vec::new();
    let mut last = 0;
    for pos in memchr::memchr_iter(b'\t', bytes) {
        fields.push(text[last..pos].to_string());
        last = pos + 1;
    }
    fields.push(text[last..].to_string());
    IpipRecord { fields }
}

struct IpipState {
    path: PathBuf,
    reader: Option<IpipReader<File>>,
}

/// Thread-safe ipip decoder owning one lazily loaded index and file handle
pub struct IpipDecoder {
    state: Mutex<IpipState>,
}

impl IpipDecoder {
    /// Create a decoder; the index is loaded on first lookup
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            state: Mutex::new(IpipState {
                path: path.as_ref().to_path_buf(),
                reader: None,
            }),
        }
    }

    /// Current database path
    pub fn path(&self) -> PathBuf {
        self.lock().path.clone()
    }

    /// Whether the index is currently loaded
    pub fn is_loaded(&self) -> bool {
        self.lock().reader.is_some()
    }

    /// Point the decoder at another file, dropping the handle and index
    pub fn reconfigure<P: AsRef<Path>>(&self, path: P) {
        let mut state = self.lock();
        log::debug!(
            "ipip decoder reconfigured: {} -> {}",
            state.path.display(),
            path.as_ref().display()
        );
        state.reader = None;
        state.path = path.as_ref().to_path_buf();
    }

    /// Look up `ip`.
    ///
    /// Returns `Err(InvalidDatabase)` if the file cannot be opened or its
    /// length prefix is unusable. A truncated index only fails the lookups
    /// that reach past it, as `Lookup::SystemError`.
    pub fn lookup(&self, ip: Ipv4Address) -> Result<Lookup<IpipRecord>> {
        let mut guard = self.lock();
        let state = &mut *guard;

        let reader = match &mut state.reader {
            Some(reader) => reader,
            slot => slot.insert(open_reader(&state.path)?),
        };

        log::trace!("ipip lookup {}", ip);
        Ok(reader.lookup(ip))
    }

    fn lock(&self) -> MutexGuard<'_, IpipState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn open_reader(path: &Path) -> Result<IpipReader<File>> {
    let file = File::open(path).map_err(|e| {
        LocationError::InvalidDatabase(format!("cannot open {}: {}", path.display(), e))
    })?;
    let reader = IpipReader::new(file)?;
    log::debug!(
        "loaded ipip index {} ({} records)",
        path.display(),
        reader.index().record_count()
    );
    Ok(reader)
}
