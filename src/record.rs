//! Lookup result types
//!
//! Each decoder reports a three-way [`Lookup`] outcome. The merger turns the
//! two outcomes into one canonical [`GeoRecord`].

use crate::encoding::Transcoded;
use serde::{Deserialize, Serialize};

/// Outcome of a single decoder lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    /// The address is covered and the record was decoded
    Found(T),
    /// The address is not covered by the database
    NoCoverage,
    /// The database structure could not be read (truncated or corrupt)
    SystemError(String),
}

impl<T> Lookup<T> {
    /// The record, if found
    pub fn found(&self) -> Option<&T> {
        match self {
            Lookup::Found(record) => Some(record),
            _ => None,
        }
    }

    /// Consume the outcome, keeping only a found record
    pub fn into_found(self) -> Option<T> {
        match self {
            Lookup::Found(record) => Some(record),
            _ => None,
        }
    }

    /// Whether a record was found
    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }

    /// Whether the lookup failed on a structural read
    pub fn is_system_error(&self) -> bool {
        matches!(self, Lookup::SystemError(_))
    }
}

/// A resolved qqwry entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cz88Record {
    /// Country (often a province/city name for Chinese addresses)
    pub country: Transcoded,
    /// Area; in practice the ISP or organisation
    pub area: Transcoded,
}

/// A tab-split ipip data record
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IpipRecord {
    /// Raw fields in file order
    pub fields: Vec<String>,
}

impl IpipRecord {
    /// Index of the country field
    pub const COUNTRY: usize = 0;
    /// Index of the province field
    pub const PROVINCE: usize = 1;
    /// Index of the county/city field
    pub const COUNTY: usize = 2;

    /// Minimum number of fields for a record to carry a location
    pub const MIN_FIELDS: usize = 3;

    /// Build a record by splitting `text` on tabs
    pub fn from_text(text: &str) -> Self {
        IpipRecord {
            fields: text.split('\t').map(str::to_string).collect(),
        }
    }

    /// Field by index
    pub fn field(&self, index: usize) -> Option<&str> {
        self.fields.get(index).map(String::as_str)
    }

    /// Country field
    pub fn country(&self) -> Option<&str> {
        self.field(Self::COUNTRY)
    }

    /// Province/region field
    pub fn province(&self) -> Option<&str> {
        self.field(Self::PROVINCE)
    }

    /// County/city field
    pub fn county(&self) -> Option<&str> {
        self.field(Self::COUNTY)
    }

    /// At least three fields and a first field that is not a sentinel
    pub fn is_usable(&self) -> bool {
        self.fields.len() >= Self::MIN_FIELDS && !crate::merge::is_invalid_entry(self.country())
    }
}

/// Canonical location record
///
/// Empty strings mean "no data" for that level.
#[derive(Debug, Clone, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
pub struct GeoRecord {
    /// Country
    pub country: String,
    /// Province or region; blank when identical to the country
    pub province: String,
    /// County or city
    pub county: String,
    /// Internet service provider or owning organisation
    pub isp: String,
}

impl GeoRecord {
    /// True when every field is empty
    pub fn is_empty(&self) -> bool {
        self.country.is_empty()
            && self.province.is_empty()
            && self.county.is_empty()
            && self.isp.is_empty()
    }

    /// The fields in canonical order
    pub fn as_array(&self) -> [&str; 4] {
        [
            self.country.as_str(),
            self.province.as_str(),
            self.county.as_str(),
            self.isp.as_str(),
        ]
    }
}
