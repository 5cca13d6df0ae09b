//! ipip (datx) database builder
//!
//! Writes the layout documented in [`crate::ipip`]. Ranges are supplied as
//! `[start, end]` pairs; the format itself only stores upper bounds, so
//! holes between ranges are filled with `N/A` records and identical texts
//! share one copy in the data region.

use crate::address::Ipv4Address;
use crate::endian::u24_to_le_bytes;
use crate::error::{LocationError, Result};
use crate::ipip::{BUCKET_COUNT, BUCKET_TABLE_SIZE, INDEX_RECORD_SIZE, LENGTH_PREFIX_SIZE};
use rustc_hash::FxHashMap;
use std::path::Path;

/// Text written for addresses between two ranges
pub const GAP_TEXT: &str = "N/A\tN/A\tN/A";

#[derive(Debug, Clone)]
struct IpipRange {
    start: u32,
    end: u32,
    text: String,
}

/// Builder for datx-format databases
///
/// # Example
/// ```rust
/// use iplocate::ipip_builder::IpipBuilder;
/// use iplocate::Ipv4Address;
///
/// let mut builder = IpipBuilder::new();
/// builder.add_range(
///     Ipv4Address::new(202, 113, 240, 0),
///     Ipv4Address::new(202, 113, 247, 255),
///     &["中国", "天津", "天津"],
/// )?;
/// let bytes = builder.build()?;
/// assert!(bytes.len() > 262_144);
/// # Ok::<(), iplocate::LocationError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct IpipBuilder {
    ranges: Vec<IpipRange>,
}

impl IpipBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of ranges added
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// Whether no ranges were added
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Add a range whose record text is `fields` joined with tabs
    pub fn add_range(&mut self, start: Ipv4Address, end: Ipv4Address, fields: &[&str]) -> Result<()> {
        if fields.iter().any(|f| f.contains('\t')) {
            return Err(LocationError::Build("field contains a tab".to_string()));
        }
        self.add_range_text(start, end, &fields.join("\t"))
    }

    /// Add a range with pre-joined record text
    pub fn add_range_text(&mut self, start: Ipv4Address, end: Ipv4Address, text: &str) -> Result<()> {
        if start > end {
            return Err(LocationError::Build(format!(
                "range start {} is after end {}",
                start, end
            )));
        }
        if text.len() > usize::from(u16::MAX) {
            return Err(LocationError::Build(format!(
                "record text of {} bytes exceeds the 16-bit length field",
                text.len()
            )));
        }

        self.ranges.push(IpipRange {
            start: start.to_u32(),
            end: end.to_u32(),
            text: text.to_string(),
        });
        Ok(())
    }

    /// Serialize the database
    pub fn build(&self) -> Result<Vec<u8>> {
        let mut ranges: Vec<&IpipRange> = self.ranges.iter().collect();
        ranges.sort_by_key(|r| r.start);
        for pair in ranges.windows(2) {
            if pair[0].end >= pair[1].start {
                return Err(LocationError::Build(format!(
                    "ranges overlap at {}",
                    Ipv4Address::from(pair[1].start)
                )));
            }
        }

        // (upper bound, text) in ascending order, holes filled
        let mut records: Vec<(u32, &str)> = Vec::with_capacity(ranges.len() * 2);
        let mut next_start = 0u64;
        for range in ranges.iter().copied() {
            if u64::from(range.start) > next_start {
                records.push((range.start - 1, GAP_TEXT));
            }
            records.push((range.end, range.text.as_str()));
            next_start = u64::from(range.end) + 1;
        }

        let mut data = Vec::new();
        let mut pointers = Vec::with_capacity(records.len());
        let mut texts: FxHashMap<&str, usize> = FxHashMap::default();
        for &(_, text) in &records {
            let offset = *texts.entry(text).or_insert_with(|| {
                let offset = data.len();
                data.extend_from_slice(text.as_bytes());
                offset
            });
            let offset = u32::try_from(offset)
                .ok()
                .and_then(u24_to_le_bytes)
                .ok_or_else(|| {
                    LocationError::Build(format!("data offset {:#x} exceeds 24 bits", offset))
                })?;
            // Lengths were checked on insertion
            pointers.push((offset, text.len() as u16));
        }

        let records_len = records.len() * INDEX_RECORD_SIZE;
        let length = LENGTH_PREFIX_SIZE + 2 * BUCKET_TABLE_SIZE + records_len;
        let length = u32::try_from(length)
            .map_err(|_| LocationError::Build("index exceeds 4 GiB".to_string()))?;

        let mut out =
            Vec::with_capacity(LENGTH_PREFIX_SIZE + BUCKET_TABLE_SIZE + records_len + data.len());
        out.extend_from_slice(&length.to_be_bytes());

        let mut first = 0usize;
        for bucket in 0..BUCKET_COUNT {
            let base = (bucket as u32) << 16;
            while first < records.len() && records[first].0 < base {
                first += 1;
            }
            out.extend_from_slice(&(first as u32).to_le_bytes());
        }

        for (&(upper, _), &(offset, len)) in records.iter().zip(&pointers) {
            out.extend_from_slice(&upper.to_be_bytes());
            out.extend_from_slice(&offset);
            out.extend_from_slice(&len.to_be_bytes());
        }

        out.extend_from_slice(&data);
        Ok(out)
    }

    /// Serialize the database to `path`
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.build()?)?;
        Ok(())
    }
}
