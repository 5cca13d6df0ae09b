//! Merging of the two decoder outcomes
//!
//! ipip is the primary source for the geographic levels; qqwry contributes
//! the ISP. If ipip has nothing usable the merged result is empty no matter
//! what qqwry found.

use crate::record::{Cz88Record, GeoRecord, IpipRecord, Lookup};

/// Whether a field value means "no data".
///
/// Unset, empty, `"-"` and any casing of `"N/A"` all count.
pub fn is_invalid_entry(value: Option<&str>) -> bool {
    match value {
        None => true,
        Some(v) => v.is_empty() || v == "-" || v.eq_ignore_ascii_case("N/A"),
    }
}

/// Combines decoder outcomes into a canonical [`GeoRecord`]
pub struct RecordMerger;

impl RecordMerger {
    /// Merge the two outcomes.
    ///
    /// Returns `None` when ipip has no usable record.
    pub fn combine(ipip: &Lookup<IpipRecord>, cz88: &Lookup<Cz88Record>) -> Option<GeoRecord> {
        let primary = ipip.found().filter(|record| record.is_usable())?;

        let country = primary.country().unwrap_or_default().to_string();
        let mut province = primary.province().unwrap_or_default().to_string();
        let county = primary.county().unwrap_or_default().to_string();

        // Municipalities repeat the same name on both levels
        if province == country {
            province.clear();
        }

        Some(GeoRecord {
            country,
            province,
            county,
            isp: Self::isp(cz88).unwrap_or_default(),
        })
    }

    fn isp(cz88: &Lookup<Cz88Record>) -> Option<String> {
        let record = cz88.found()?;
        if record.country.as_str() == Some("-") {
            return None;
        }
        let area = record.area.to_string_lossy();
        if is_invalid_entry(Some(&area)) {
            return None;
        }
        Some(area.into_owned())
    }
}
