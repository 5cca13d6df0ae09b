//! cz88 (qqwry.dat) database reader
//!
//! # Format
//!
//! ```text
//! [Header]                      8 bytes
//!   index_start: u32 LE         // offset of the first index record
//!   index_end:   u32 LE         // offset of the last index record
//!
//! [Data region]
//!   end_ip: u32 LE              // upper bound of the range
//!   body:                       // one of
//!     0x01 ptr:u24              //   whole body lives at ptr
//!     0x02 ptr:u24 area         //   country at ptr, area follows
//!     country\0 area            //   inline country, then area
//!   area:                       // one of
//!     0x02 ptr:u24              //   area string at ptr
//!     area\0                    //   inline
//!
//! [Index region]                7 bytes per record, sorted by start_ip
//!   start_ip: u32 LE
//!   data_offset: u24 LE         // points at the range's end_ip
//! ```
//!
//! Lookups binary-search the index for a record with
//! `start_ip <= target <= end_ip`, then chase the redirect flags to the two
//! NUL-terminated strings.

use crate::address::Ipv4Address;
use crate::encoding::{TextEncoding, TranscodePolicy, Transcoded};
use crate::endian::ReadFieldExt;
use crate::error::{LocationError, Result};
use crate::record::{Cz88Record, Lookup};
use memchr::memmem;
use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Size of the file header
pub const HEADER_SIZE: u64 = 8;

/// Size of one index record
pub const INDEX_RECORD_SIZE: u64 = 7;

/// Body flag: the whole record body is stored elsewhere
pub const REDIRECT_RECORD: u8 = 0x01;

/// Field flag: this string is stored elsewhere
pub const REDIRECT_FIELD: u8 = 0x02;

/// Vendor marker appended to many area strings
pub const VENDOR_MARKER: &[u8] = b"CZ88.NET";

/// Substring that flags advertisement rows instead of locations
const URL_MARKER: &[u8] = b"http:";

/// Parsed file header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cz88Header {
    /// Offset of the first index record
    pub index_start: u32,
    /// Offset of the last index record
    pub index_end: u32,
}

impl Cz88Header {
    /// Number of index records
    pub fn record_count(&self) -> u64 {
        u64::from(self.index_end - self.index_start) / INDEX_RECORD_SIZE + 1
    }

    fn record_offset(&self, record: u64) -> u64 {
        u64::from(self.index_start) + INDEX_RECORD_SIZE * record
    }
}

/// The index record bracketing a target address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexInterval {
    /// Position of the record in the index
    pub record: u64,
    /// First address of the range
    pub lower: u32,
    /// Last address of the range
    pub upper: u32,
}

impl IndexInterval {
    /// Whether `target` lies inside the interval
    pub fn contains(&self, target: u32) -> bool {
        self.lower <= target && target <= self.upper
    }
}

/// Lookup engine over any seekable byte source
///
/// Production code wraps a buffered file; tests and fuzz targets use an
/// in-memory cursor.
pub struct Cz88Reader<R> {
    inner: R,
    header: Cz88Header,
}

impl<R: BufRead + Seek> Cz88Reader<R> {
    /// Read and validate the header
    pub fn new(mut inner: R) -> Result<Self> {
        inner
            .seek(SeekFrom::Start(0))
            .map_err(|e| LocationError::InvalidDatabase(format!("cannot seek header: {}", e)))?;
        let index_start = inner
            .read_u32_le("header index start")
            .map_err(invalid_header)?;
        let index_end = inner
            .read_u32_le("header index end")
            .map_err(invalid_header)?;

        if index_end < index_start {
            return Err(LocationError::InvalidDatabase(format!(
                "index end {:#x} precedes index start {:#x}",
                index_end, index_start
            )));
        }

        Ok(Self {
            inner,
            header: Cz88Header {
                index_start,
                index_end,
            },
        })
    }

    /// The parsed header
    pub fn header(&self) -> Cz88Header {
        self.header
    }

    /// Binary-search the index for the record covering `target`.
    ///
    /// On success the reader is positioned at the record body (just past
    /// the range's end address). `Ok(None)` means no range covers the
    /// address.
    pub fn locate(&mut self, target: u32) -> Result<Option<IndexInterval>> {
        let mut begin = 0u64;
        let mut end = self.header.record_count();

        loop {
            let middle = (begin + end) / 2;
            self.seek(self.header.record_offset(middle))?;
            let lower = self.inner.read_u32_le("index start address")?;

            if lower > target {
                // Only possible below the first range
                if middle == begin {
                    return Ok(None);
                }
                end = middle;
                continue;
            }

            let data_offset = self.inner.read_u24_le("index data offset")?;
            self.seek(u64::from(data_offset))?;
            let upper = self.inner.read_u32_le("range end address")?;

            if upper >= target {
                return Ok(Some(IndexInterval {
                    record: middle,
                    lower,
                    upper,
                }));
            }
            if middle == begin {
                return Ok(None);
            }
            begin = middle;
        }
    }

    /// Look up `ip`, decoding text with `encoding`.
    ///
    /// Structural read failures are reported as [`Lookup::SystemError`] so
    /// the caller can still consult other sources.
    pub fn lookup(
        &mut self,
        ip: Ipv4Address,
        encoding: TextEncoding,
        policy: TranscodePolicy,
    ) -> Lookup<Cz88Record> {
        let fields = match self.locate(ip.to_u32()) {
            Ok(Some(_)) => self.read_body(),
            Ok(None) => return Lookup::NoCoverage,
            Err(e) => Err(e),
        };

        match fields {
            Ok((country, area)) => finish_record(&country, &area, encoding, policy),
            Err(e) => {
                log::debug!("cz88 lookup of {} failed: {}", ip, e);
                Lookup::SystemError(e.to_string())
            }
        }
    }

    /// Consume the reader, returning the underlying source
    pub fn into_inner(self) -> R {
        self.inner
    }

    fn seek(&mut self, offset: u64) -> Result<()> {
        self.inner.seek(SeekFrom::Start(offset))?;
        Ok(())
    }

    fn read_body(&mut self) -> Result<(Vec<u8>, Vec<u8>)> {
        let mut flag = self.inner.read_u8("record flag")?;
        if flag == REDIRECT_RECORD {
            let offset = self.inner.read_u24_le("record redirect")?;
            self.seek(u64::from(offset))?;
            flag = self.inner.read_u8("record flag")?;
        }

        if flag == REDIRECT_FIELD {
            let country_offset = self.inner.read_u24_le("country redirect")?;
            let area = self.read_area()?;
            self.seek(u64::from(country_offset))?;
            let country = self.read_cstring("country")?;
            Ok((country, area))
        } else {
            self.inner.seek(SeekFrom::Current(-1))?;
            let country = self.read_cstring("country")?;
            let area = self.read_area()?;
            Ok((country, area))
        }
    }

    fn read_area(&mut self) -> Result<Vec<u8>> {
        let flag = self.inner.read_u8("area flag")?;
        // Some releases mark area redirects with 0x01 as well
        if flag == REDIRECT_FIELD || flag == REDIRECT_RECORD {
            let offset = self.inner.read_u24_le("area redirect")?;
            self.seek(u64::from(offset))?;
        } else {
            self.inner.seek(SeekFrom::Current(-1))?;
        }
        self.read_cstring("area")
    }

    fn read_cstring(&mut self, what: &str) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.inner.read_until(0, &mut buf)?;
        if buf.pop() != Some(0) {
            return Err(LocationError::TruncatedRead(format!(
                "{} string is not terminated",
                what
            )));
        }
        Ok(buf)
    }
}

fn invalid_header(err: LocationError) -> LocationError {
    LocationError::InvalidDatabase(format!("cannot read qqwry header: {}", err))
}

/// Remove every occurrence of the vendor marker, then surrounding blanks
fn clean_field(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    let mut last = 0;
    for pos in memmem::find_iter(raw, VENDOR_MARKER) {
        out.extend_from_slice(&raw[last..pos]);
        last = pos + VENDOR_MARKER.len();
    }
    out.extend_from_slice(&raw[last..]);
    out.trim_ascii().to_vec()
}

fn finish_record(
    country: &[u8],
    area: &[u8],
    encoding: TextEncoding,
    policy: TranscodePolicy,
) -> Lookup<Cz88Record> {
    let country = clean_field(country);
    let area = clean_field(area);

    if memmem::find(&country, URL_MARKER).is_some() || memmem::find(&area, URL_MARKER).is_some() {
        return Lookup::NoCoverage;
    }
    if country.is_empty() && area.is_empty() {
        return Lookup::NoCoverage;
    }

    Lookup::Found(Cz88Record {
        country: Transcoded::decode_with_policy(&country, encoding, policy, "cz88 country"),
        area: Transcoded::decode_with_policy(&area, encoding, policy, "cz88 area"),
    })
}

/// Settings for a [`Cz88Decoder`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cz88Settings {
    /// Database file location
    pub path: PathBuf,
    /// Encoding of the string fields
    pub encoding: TextEncoding,
    /// Handling of fields that fail to transcode
    pub policy: TranscodePolicy,
}

impl Cz88Settings {
    /// Settings for a GB2312 database at `path`
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            encoding: TextEncoding::default(),
            policy: TranscodePolicy::default(),
        }
    }
}

struct Cz88State {
    settings: Cz88Settings,
    reader: Option<Cz88Reader<BufReader<File>>>,
}

/// Thread-safe qqwry decoder owning one lazily opened file handle
///
/// # Examples
///
/// ```no_run
/// use iplocate::cz88::{Cz88Decoder, Cz88Settings};
/// use iplocate::Ipv4Address;
///
/// let decoder = Cz88Decoder::new(Cz88Settings::new("db/qqwry.dat"));
/// let outcome = decoder.lookup("202.113.245.255".parse::<Ipv4Address>()?)?;
/// if let Some(record) = outcome.found() {
///     println!("{} / {}", record.country, record.area);
/// }
/// # Ok::<(), iplocate::LocationError>(())
/// ```
pub struct Cz88Decoder {
    state: Mutex<Cz88State>,
}

impl Cz88Decoder {
    /// Create a decoder; the file is opened on first lookup
    pub fn new(settings: Cz88Settings) -> Self {
        Self {
            state: Mutex::new(Cz88State {
                settings,
                reader: None,
            }),
        }
    }

    /// Current settings
    pub fn settings(&self) -> Cz88Settings {
        self.lock().settings.clone()
    }

    /// Whether a file handle is currently open
    pub fn is_open(&self) -> bool {
        self.lock().reader.is_some()
    }

    /// Replace the settings, closing any open handle.
    ///
    /// Waits for an in-flight lookup to finish first.
    pub fn reconfigure(&self, settings: Cz88Settings) {
        let mut state = self.lock();
        log::debug!(
            "cz88 decoder reconfigured: {} -> {}",
            state.settings.path.display(),
            settings.path.display()
        );
        state.reader = None;
        state.settings = settings;
    }

    /// Look up `ip`.
    ///
    /// Returns `Err(InvalidDatabase)` if the file cannot be opened or its
    /// header cannot be read; every other failure is a
    /// [`Lookup::SystemError`].
    pub fn lookup(&self, ip: Ipv4Address) -> Result<Lookup<Cz88Record>> {
        let mut guard = self.lock();
        let state = &mut *guard;

        let reader = match &mut state.reader {
            Some(reader) => reader,
            slot => slot.insert(open_reader(&state.settings.path)?),
        };

        log::trace!("cz88 lookup {}", ip);
        Ok(reader.lookup(ip, state.settings.encoding, state.settings.policy))
    }

    fn lock(&self) -> MutexGuard<'_, Cz88State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn open_reader(path: &Path) -> Result<Cz88Reader<BufReader<File>>> {
    let file = File::open(path).map_err(|e| {
        LocationError::InvalidDatabase(format!("cannot open {}: {}", path.display(), e))
    })?;
    let reader = Cz88Reader::new(BufReader::new(file))?;
    log::debug!(
        "opened cz88 database {} ({} index records)",
        path.display(),
        reader.header().record_count()
    );
    Ok(reader)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cz88_builder::Cz88Builder;
    use std::io::Cursor;

    fn addr(s: &str) -> Ipv4Address {
        s.parse().unwrap()
    }

    fn sample_reader(encoding: TextEncoding) -> Cz88Reader<Cursor<Vec<u8>>> {
        let mut builder = Cz88Builder::new(encoding);
        builder
            .add_range(addr("0.0.0.0"), addr("0.255.255.255"), "IANA保留地址", " CZ88.NET")
            .unwrap();
        builder
            .add_range(addr("1.0.0.0"), addr("1.0.0.255"), "澳大利亚", "亚太互联网络信息中心")
            .unwrap();
        builder
            .add_range(addr("1.0.1.0"), addr("1.0.3.255"), "福建省", "电信")
            .unwrap();
        builder
            .add_range(addr("1.0.8.0"), addr("1.0.15.255"), "广东省", "电信")
            .unwrap();
        builder
            .add_range(addr("202.113.240.0"), addr("202.113.247.255"), "天津市", "天津工程师范学院教育网")
            .unwrap();
        builder
            .add_range(addr("255.255.255.0"), addr("255.255.255.255"), "纯真网络", "http://www.cz88.net")
            .unwrap();
        let bytes = builder.build().unwrap();
        Cz88Reader::new(Cursor::new(bytes)).unwrap()
    }

    fn lookup_text(reader: &mut Cz88Reader<Cursor<Vec<u8>>>, ip: &str) -> Option<(String, String)> {
        reader
            .lookup(addr(ip), TextEncoding::Gb2312, TranscodePolicy::KeepRaw)
            .into_found()
            .map(|r| (r.country.to_string(), r.area.to_string()))
    }

    #[test]
    fn test_header() {
        let reader = sample_reader(TextEncoding::Gb2312);
        let header = reader.header();
        assert_eq!(header.record_count(), 6);
        assert_eq!((header.index_end - header.index_start) % 7, 0);
    }

    #[test]
    fn test_lookup_inline_and_redirected() {
        let mut reader = sample_reader(TextEncoding::Gb2312);

        assert_eq!(
            lookup_text(&mut reader, "202.113.245.255"),
            Some(("天津市".to_string(), "天津工程师范学院教育网".to_string()))
        );
        assert_eq!(
            lookup_text(&mut reader, "1.0.2.7"),
            Some(("福建省".to_string(), "电信".to_string()))
        );
        // "电信" was written once and redirected here
        assert_eq!(
            lookup_text(&mut reader, "1.0.8.0"),
            Some(("广东省".to_string(), "电信".to_string()))
        );
    }

    #[test]
    fn test_lookup_zero_address() {
        let mut reader = sample_reader(TextEncoding::Gb2312);
        // Vendor marker stripped and the remaining blank trimmed
        assert_eq!(
            lookup_text(&mut reader, "0.0.0.0"),
            Some(("IANA保留地址".to_string(), String::new()))
        );
    }

    #[test]
    fn test_lookup_gap_and_url_rows() {
        let mut reader = sample_reader(TextEncoding::Gb2312);
        assert_eq!(
            reader.lookup(addr("1.0.5.1"), TextEncoding::Gb2312, TranscodePolicy::KeepRaw),
            Lookup::NoCoverage
        );
        assert_eq!(
            reader.lookup(addr("255.255.255.255"), TextEncoding::Gb2312, TranscodePolicy::KeepRaw),
            Lookup::NoCoverage
        );
        assert_eq!(
            reader.lookup(addr("203.0.0.1"), TextEncoding::Gb2312, TranscodePolicy::KeepRaw),
            Lookup::NoCoverage
        );
    }

    #[test]
    fn test_locate_interval() {
        let mut reader = sample_reader(TextEncoding::Gb2312);
        let target = addr("1.0.9.9").to_u32();
        let interval = reader.locate(target).unwrap().unwrap();
        assert!(interval.contains(target));
        assert_eq!(interval.lower, addr("1.0.8.0").to_u32());
        assert_eq!(interval.upper, addr("1.0.15.255").to_u32());
        assert_eq!(interval.record, 3);
    }

    #[test]
    fn test_below_first_range_terminates() {
        let mut builder = Cz88Builder::new(TextEncoding::Utf8);
        builder
            .add_range(addr("10.0.0.0"), addr("10.255.255.255"), "局域网", "")
            .unwrap();
        let mut reader = Cz88Reader::new(Cursor::new(builder.build().unwrap())).unwrap();
        assert_eq!(reader.locate(addr("9.9.9.9").to_u32()).unwrap(), None);
        assert_eq!(reader.locate(addr("11.0.0.0").to_u32()).unwrap(), None);
        assert!(reader.locate(addr("10.1.2.3").to_u32()).unwrap().is_some());
    }

    #[test]
    fn test_short_header_is_invalid_database() {
        let err = Cz88Reader::new(Cursor::new(vec![0u8; 5])).err().unwrap();
        assert!(matches!(err, LocationError::InvalidDatabase(_)));

        // index end before index start
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&100u32.to_le_bytes());
        bytes.extend_from_slice(&50u32.to_le_bytes());
        let err = Cz88Reader::new(Cursor::new(bytes)).err().unwrap();
        assert!(matches!(err, LocationError::InvalidDatabase(_)));
    }

    #[test]
    fn test_truncated_file_is_system_error() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&8u32.to_le_bytes());
        bytes.extend_from_slice(&(8u32 + 7 * 100).to_le_bytes());
        bytes.extend_from_slice(&[0u8; 10]);
        let mut reader = Cz88Reader::new(Cursor::new(bytes)).unwrap();
        let outcome = reader.lookup(addr("8.8.8.8"), TextEncoding::Gb2312, TranscodePolicy::KeepRaw);
        assert!(outcome.is_system_error(), "{:?}", outcome);
    }

    #[test]
    fn test_unterminated_string_is_system_error() {
        // One index record at offset 8 pointing at a body that hits EOF
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&8u32.to_le_bytes());
        bytes.extend_from_slice(&8u32.to_le_bytes());
        bytes.extend_from_slice(&addr("1.0.0.0").to_u32().to_le_bytes());
        bytes.extend_from_slice(&[15, 0, 0]);
        bytes.extend_from_slice(&addr("1.0.0.255").to_u32().to_le_bytes());
        bytes.extend_from_slice(b"country");

        let mut reader = Cz88Reader::new(Cursor::new(bytes)).unwrap();
        let outcome = reader.lookup(addr("1.0.0.1"), TextEncoding::Utf8, TranscodePolicy::KeepRaw);
        assert!(outcome.is_system_error(), "{:?}", outcome);
    }

    #[test]
    fn test_area_flags_both_redirect() {
        // Inline country, then an area pointer tagged 0x01 or 0x02
        for flag in [REDIRECT_RECORD, REDIRECT_FIELD] {
            let mut bytes = Vec::new();
            bytes.extend_from_slice(&8u32.to_le_bytes());
            bytes.extend_from_slice(&8u32.to_le_bytes());
            bytes.extend_from_slice(&addr("1.0.0.0").to_u32().to_le_bytes());
            bytes.extend_from_slice(&[15, 0, 0]);
            bytes.extend_from_slice(&addr("1.0.0.255").to_u32().to_le_bytes());
            bytes.extend_from_slice(b"A\0");
            bytes.extend_from_slice(&[flag, 25, 0, 0]);
            bytes.extend_from_slice(b"B\0");

            let mut reader = Cz88Reader::new(Cursor::new(bytes)).unwrap();
            let record = reader
                .lookup(addr("1.0.0.1"), TextEncoding::Utf8, TranscodePolicy::KeepRaw)
                .into_found()
                .unwrap();
            assert_eq!(record.country.as_str(), Some("A"), "flag {:#x}", flag);
            assert_eq!(record.area.as_str(), Some("B"), "flag {:#x}", flag);
        }
    }

    #[test]
    fn test_clean_field() {
        assert_eq!(clean_field(b" CZ88.NET"), b"");
        assert_eq!(clean_field(b"abcCZ88.NETdefCZ88.NET"), b"abcdef");
        assert_eq!(clean_field(b"  plain "), b"plain");
    }

    #[test]
    fn test_transcode_failure_policy() {
        let mut builder = Cz88Builder::new(TextEncoding::Gb2312);
        builder
            .add_range_raw(addr("1.0.0.0"), addr("1.0.0.255"), "有效".as_bytes(), &[0xFF, 0xFF])
            .unwrap();
        let bytes = builder.build().unwrap();

        let mut reader = Cz88Reader::new(Cursor::new(bytes.clone())).unwrap();
        let kept = reader
            .lookup(addr("1.0.0.1"), TextEncoding::Gb2312, TranscodePolicy::KeepRaw)
            .into_found()
            .unwrap();
        assert_eq!(kept.area, Transcoded::Unconverted(vec![0xFF, 0xFF]));

        let mut reader = Cz88Reader::new(Cursor::new(bytes)).unwrap();
        let dropped = reader
            .lookup(addr("1.0.0.1"), TextEncoding::Gb2312, TranscodePolicy::DropField)
            .into_found()
            .unwrap();
        assert_eq!(dropped.area, Transcoded::Converted(String::new()));
    }

    #[test]
    fn test_decoder_missing_file() {
        let decoder = Cz88Decoder::new(Cz88Settings::new("/nonexistent/qqwry.dat"));
        let err = decoder.lookup(addr("1.2.3.4")).unwrap_err();
        assert!(matches!(err, LocationError::InvalidDatabase(_)));
        assert!(!decoder.is_open());
    }
}
