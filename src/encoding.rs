//! Character encoding utilities
//!
//! qqwry databases ship their text as GB2312 (some repackaged copies are
//! UTF-8). Decoding is done without replacement so a failed conversion is
//! visible to the caller as [`Transcoded::Unconverted`] rather than silently
//! turning into replacement characters.

use encoding_rs::GBK;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// Text encoding of the qqwry string fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextEncoding {
    /// Already UTF-8, no transcoding
    Utf8,
    /// Legacy GB2312 (decoded with the GBK superset)
    #[default]
    Gb2312,
}

impl TextEncoding {
    /// Map the `cz88_db_is_utf8` configuration flag
    pub fn from_utf8_flag(is_utf8: bool) -> Self {
        if is_utf8 {
            TextEncoding::Utf8
        } else {
            TextEncoding::Gb2312
        }
    }

    /// Encode UTF-8 text into this encoding.
    ///
    /// Returns `None` if some character has no representation.
    pub fn encode<'a>(&self, text: &'a str) -> Option<Cow<'a, [u8]>> {
        match self {
            TextEncoding::Utf8 => Some(Cow::Borrowed(text.as_bytes())),
            TextEncoding::Gb2312 => {
                let (bytes, _, had_errors) = GBK.encode(text);
                if had_errors {
                    None
                } else {
                    Some(bytes)
                }
            }
        }
    }
}

/// What to do with a field whose bytes could not be converted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscodePolicy {
    /// Keep the original bytes, tagged as unconverted
    #[default]
    KeepRaw,
    /// Replace the field with an empty string
    DropField,
}

/// Outcome of decoding one text field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transcoded {
    /// Successfully converted to UTF-8
    Converted(String),
    /// Conversion failed; the original bytes are kept
    Unconverted(Vec<u8>),
}

impl Transcoded {
    /// Decode `bytes` from `encoding`
    pub fn decode(bytes: &[u8], encoding: TextEncoding) -> Self {
        match encoding {
            TextEncoding::Utf8 => match std::str::from_utf8(bytes) {
                Ok(s) => Transcoded::Converted(s.to_string()),
                Err(_) => Transcoded::Unconverted(bytes.to_vec()),
            },
            TextEncoding::Gb2312 => {
                match GBK.decode_without_bom_handling_and_without_replacement(bytes) {
                    Some(s) => Transcoded::Converted(s.into_owned()),
                    None => Transcoded::Unconverted(bytes.to_vec()),
                }
            }
        }
    }

    /// Decode and apply `policy` to a failed conversion.
    ///
    /// `field` only names the field in the log line.
    pub fn decode_with_policy(
        bytes: &[u8],
        encoding: TextEncoding,
        policy: TranscodePolicy,
        field: &str,
    ) -> Self {
        match Transcoded::decode(bytes, encoding) {
            Transcoded::Unconverted(raw) => {
                log::warn!(
                    "{} field is not valid {:?} ({} bytes), policy {:?}",
                    field,
                    encoding,
                    raw.len(),
                    policy
                );
                match policy {
                    TranscodePolicy::KeepRaw => Transcoded::Unconverted(raw),
                    TranscodePolicy::DropField => Transcoded::Converted(String::new()),
                }
            }
            converted => converted,
        }
    }

    /// The UTF-8 text, if conversion succeeded
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Transcoded::Converted(s) => Some(s),
            Transcoded::Unconverted(_) => None,
        }
    }

    /// The text, with invalid sequences replaced when unconverted
    pub fn to_string_lossy(&self) -> Cow<'_, str> {
        match self {
            Transcoded::Converted(s) => Cow::Borrowed(s),
            Transcoded::Unconverted(raw) => String::from_utf8_lossy(raw),
        }
    }

    /// Whether conversion succeeded
    pub fn is_converted(&self) -> bool {
        matches!(self, Transcoded::Converted(_))
    }

    /// Whether the field carries no text at all
    pub fn is_empty(&self) -> bool {
        match self {
            Transcoded::Converted(s) => s.is_empty(),
            Transcoded::Unconverted(raw) => raw.is_empty(),
        }
    }
}

impl fmt::Display for Transcoded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_lossy())
    }
}
