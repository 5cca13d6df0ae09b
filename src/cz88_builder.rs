//! cz88 (qqwry.dat) database builder
//!
//! Writes the layout documented in [`crate::cz88`]. Repeated strings are
//! stored once and referenced with `0x02` field redirects, and repeated
//! `(country, area)` pairs share one body through a `0x01` record redirect,
//! which is how the published files keep their size down.

use crate::address::Ipv4Address;
use crate::cz88::{HEADER_SIZE, INDEX_RECORD_SIZE, REDIRECT_FIELD, REDIRECT_RECORD};
use crate::encoding::TextEncoding;
use crate::endian::u24_to_le_bytes;
use crate::error::{LocationError, Result};
use rustc_hash::FxHashMap;
use std::path::Path;

#[derive(Debug, Clone)]
struct Cz88Range {
    start: u32,
    end: u32,
    country: Vec<u8>,
    area: Vec<u8>,
}

/// Builder for qqwry-format databases
///
/// # Example
/// ```rust
/// use iplocate::cz88_builder::Cz88Builder;
/// use iplocate::encoding::TextEncoding;
/// use iplocate::Ipv4Address;
///
/// let mut builder = Cz88Builder::new(TextEncoding::Gb2312);
/// builder.add_range(
///     Ipv4Address::new(1, 0, 1, 0),
///     Ipv4Address::new(1, 0, 3, 255),
///     "福建省",
///     "电信",
/// )?;
/// let bytes = builder.build()?;
/// assert!(bytes.len() > 8);
/// # Ok::<(), iplocate::LocationError>(())
/// ```
#[derive(Debug, Clone)]
pub struct Cz88Builder {
    encoding: TextEncoding,
    redirects: bool,
    ranges: Vec<Cz88Range>,
}

impl Cz88Builder {
    /// Create a builder writing text in `encoding`
    pub fn new(encoding: TextEncoding) -> Self {
        Self {
            encoding,
            redirects: true,
            ranges: Vec::new(),
        }
    }

    /// Enable or disable string and record sharing (enabled by default)
    pub fn with_redirects(mut self, enabled: bool) -> Self {
        self.redirects = enabled;
        self
    }

    /// Number of ranges added
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// Whether no ranges were added
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Add a range with UTF-8 text, encoded with the builder's encoding
    pub fn add_range(
        &mut self,
        start: Ipv4Address,
        end: Ipv4Address,
        country: &str,
        area: &str,
    ) -> Result<()> {
        let encode = |text: &str| {
            self.encoding.encode(text).map(|b| b.into_owned()).ok_or_else(|| {
                LocationError::Build(format!("{:?} cannot represent {:?}", self.encoding, text))
            })
        };
        let country = encode(country)?;
        let area = encode(area)?;
        self.add_range_raw(start, end, &country, &area)
    }

    /// Add a range with pre-encoded bytes, written verbatim
    pub fn add_range_raw(
        &mut self,
        start: Ipv4Address,
        end: Ipv4Address,
        country: &[u8],
        area: &[u8],
    ) -> Result<()> {
        if start > end {
            return Err(LocationError::Build(format!(
                "range start {} is after end {}",
                start, end
            )));
        }
        for text in [country, area] {
            if text.contains(&0) {
                return Err(LocationError::Build("text contains a NUL byte".to_string()));
            }
            if matches!(text.first(), Some(&REDIRECT_RECORD) | Some(&REDIRECT_FIELD)) {
                return Err(LocationError::Build(
                    "text starts with a redirect flag byte".to_string(),
                ));
            }
        }

        self.ranges.push(Cz88Range {
            start: start.to_u32(),
            end: end.to_u32(),
            country: country.to_vec(),
            area: area.to_vec(),
        });
        Ok(())
    }

    /// Serialize the database
    pub fn build(&self) -> Result<Vec<u8>> {
        if self.ranges.is_empty() {
            return Err(LocationError::Build(
                "a qqwry database needs at least one range".to_string(),
            ));
        }

        let mut ranges: Vec<&Cz88Range> = self.ranges.iter().collect();
        ranges.sort_by_key(|r| r.start);
        for pair in ranges.windows(2) {
            if pair[0].end >= pair[1].start {
                return Err(LocationError::Build(format!(
                    "ranges overlap at {}",
                    Ipv4Address::from(pair[1].start)
                )));
            }
        }

        let mut out = vec![0u8; HEADER_SIZE as usize];
        let mut index = Vec::with_capacity(ranges.len() * INDEX_RECORD_SIZE as usize);
        let mut strings: FxHashMap<&[u8], usize> = FxHashMap::default();
        let mut bodies: FxHashMap<(&[u8], &[u8]), usize> = FxHashMap::default();

        for range in ranges.iter().copied() {
            index.extend_from_slice(&range.start.to_le_bytes());
            index.extend_from_slice(&offset_bytes(out.len())?);
            out.extend_from_slice(&range.end.to_le_bytes());

            let key = (range.country.as_slice(), range.area.as_slice());
            if self.redirects {
                if let Some(&body) = bodies.get(&key) {
                    out.push(REDIRECT_RECORD);
                    out.extend_from_slice(&offset_bytes(body)?);
                    continue;
                }
            }

            let body = out.len();
            self.write_string(&mut out, &mut strings, &range.country)?;
            self.write_string(&mut out, &mut strings, &range.area)?;
            bodies.insert(key, body);
        }

        let index_start = out.len();
        let index_end = index_start + index.len() - INDEX_RECORD_SIZE as usize;
        out.extend_from_slice(&index);

        let header_value = |offset: usize| {
            u32::try_from(offset)
                .map_err(|_| LocationError::Build("database exceeds 4 GiB".to_string()))
        };
        out[0..4].copy_from_slice(&header_value(index_start)?.to_le_bytes());
        out[4..8].copy_from_slice(&header_value(index_end)?.to_le_bytes());

        Ok(out)
    }

    /// Serialize the database to `path`
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.build()?)?;
        Ok(())
    }

    fn write_string<'a>(
        &self,
        out: &mut Vec<u8>,
        strings: &mut FxHashMap<&'a [u8], usize>,
        text: &'a [u8],
    ) -> Result<()> {
        if self.redirects {
            if let Some(&offset) = strings.get(text) {
                out.push(REDIRECT_FIELD);
                out.extend_from_slice(&offset_bytes(offset)?);
                return Ok(());
            }
            strings.insert(text, out.len());
        }
        out.extend_from_slice(text);
        out.push(0);
        Ok(())
    }
}

fn offset_bytes(offset: usize) -> Result<[u8; 3]> {
    u32::try_from(offset)
        .ok()
        .and_then(u24_to_le_bytes)
        .ok_or_else(|| LocationError::Build(format!("offset {:#x} exceeds 24 bits", offset)))
}
