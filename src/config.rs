//! Locator configuration
//!
//! [`LocatorOptions`] is the full configuration used at construction;
//! [`SetupOptions`] is a partial update applied later through
//! [`IpLocator::setup`](crate::IpLocator::setup). Both load from JSON, and
//! unspecified keys keep their defaults.

use crate::cz88::Cz88Settings;
use crate::encoding::{TextEncoding, TranscodePolicy};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default qqwry database location
pub const DEFAULT_CZ88_DB: &str = "db/qqwry.dat";

/// Default ipip database location
pub const DEFAULT_IPIP_DB: &str = "db/17monipdb.datx";

/// Full locator configuration
///
/// ```rust
/// use iplocate::LocatorOptions;
///
/// let options = LocatorOptions::from_json_str(r#"{"ipip_db": "/srv/geo/ipip.datx"}"#)?;
/// assert_eq!(options.ipip_db.to_str(), Some("/srv/geo/ipip.datx"));
/// assert_eq!(options.cz88_db.to_str(), Some("db/qqwry.dat"));
/// # Ok::<(), iplocate::LocationError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LocatorOptions {
    /// Path of the qqwry (cz88) database
    pub cz88_db: PathBuf,
    /// Whether the qqwry strings are UTF-8 rather than GB2312
    pub cz88_db_is_utf8: bool,
    /// Path of the ipip (datx) database
    pub ipip_db: PathBuf,
    /// What to do with qqwry fields that fail to transcode
    pub transcode_policy: TranscodePolicy,
}

impl Default for LocatorOptions {
    fn default() -> Self {
        Self {
            cz88_db: PathBuf::from(DEFAULT_CZ88_DB),
            cz88_db_is_utf8: false,
            ipip_db: PathBuf::from(DEFAULT_IPIP_DB),
            transcode_policy: TranscodePolicy::default(),
        }
    }
}

impl LocatorOptions {
    /// Options with both database paths set
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(cz88_db: P, ipip_db: Q) -> Self {
        Self {
            cz88_db: cz88_db.as_ref().to_path_buf(),
            ipip_db: ipip_db.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    /// Parse options from a JSON object
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load options from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Settings for the qqwry decoder
    pub fn cz88_settings(&self) -> Cz88Settings {
        Cz88Settings {
            path: self.cz88_db.clone(),
            encoding: TextEncoding::from_utf8_flag(self.cz88_db_is_utf8),
            policy: self.transcode_policy,
        }
    }

    /// Apply a partial update in place
    pub fn apply(&mut self, update: &SetupOptions) {
        if let Some(path) = &update.cz88_db {
            self.cz88_db = path.clone();
        }
        if let Some(is_utf8) = update.cz88_db_is_utf8 {
            self.cz88_db_is_utf8 = is_utf8;
        }
        if let Some(path) = &update.ipip_db {
            self.ipip_db = path.clone();
        }
        if let Some(policy) = update.transcode_policy {
            self.transcode_policy = policy;
        }
    }
}

/// Partial configuration update; `None` leaves a setting unchanged
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SetupOptions {
    /// New qqwry database path
    pub cz88_db: Option<PathBuf>,
    /// New qqwry string encoding flag
    pub cz88_db_is_utf8: Option<bool>,
    /// New ipip database path
    pub ipip_db: Option<PathBuf>,
    /// New transcoding policy
    pub transcode_policy: Option<TranscodePolicy>,
}

impl SetupOptions {
    /// Parse an update from a JSON object
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Whether the update changes nothing
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LocationError;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let options = LocatorOptions::default();
        assert_eq!(options.cz88_db, PathBuf::from("db/qqwry.dat"));
        assert_eq!(options.ipip_db, PathBuf::from("db/17monipdb.datx"));
        assert!(!options.cz88_db_is_utf8);
        assert_eq!(options.transcode_policy, TranscodePolicy::KeepRaw);
        assert_eq!(options.cz88_settings().encoding, TextEncoding::Gb2312);
    }

    #[test]
    fn test_from_json() {
        let options = LocatorOptions::from_json_str(
            r#"{"cz88_db": "a.dat", "cz88_db_is_utf8": true, "transcode_policy": "drop_field"}"#,
        )
        .unwrap();
        assert_eq!(options.cz88_db, PathBuf::from("a.dat"));
        assert_eq!(options.ipip_db, PathBuf::from(DEFAULT_IPIP_DB));
        let settings = options.cz88_settings();
        assert_eq!(settings.encoding, TextEncoding::Utf8);
        assert_eq!(settings.policy, TranscodePolicy::DropField);
    }

    #[test]
    fn test_from_json_rejects_unknown_keys() {
        assert!(matches!(
            LocatorOptions::from_json_str(r#"{"qqwry": "a.dat"}"#),
            Err(LocationError::Config(_))
        ));
    }

    #[test]
    fn test_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"ipip_db": "custom.datx"}}"#).unwrap();
        let options = LocatorOptions::from_json_file(file.path()).unwrap();
        assert_eq!(options.ipip_db, PathBuf::from("custom.datx"));

        assert!(LocatorOptions::from_json_file("/nonexistent/iplocate.json").is_err());
    }

    #[test]
    fn test_apply_partial_update() {
        let mut options = LocatorOptions::new("old.dat", "old.datx");
        let update = SetupOptions::from_json_str(r#"{"ipip_db": "new.datx"}"#).unwrap();
        assert!(!update.is_empty());
        options.apply(&update);
        assert_eq!(options.cz88_db, PathBuf::from("old.dat"));
        assert_eq!(options.ipip_db, PathBuf::from("new.datx"));
        assert!(SetupOptions::default().is_empty());
    }
}
