//! iplocate - IPv4 geolocation from qqwry and ipip databases
//!
//! iplocate resolves an IPv4 address to a `{country, province, county, isp}`
//! record by decoding two legacy binary databases and merging their answers:
//!
//! - **ipip** (`.datx`): the primary source for the geographic levels
//! - **qqwry** (cz88, `.dat`): contributes the ISP / organisation
//!
//! # Quick Start
//!
//! ```rust
//! use iplocate::{Cz88Builder, IpLocator, IpipBuilder, Ipv4Address, LocatorOptions, TextEncoding};
//!
//! let dir = tempfile::tempdir()?;
//! let (start, end) = (Ipv4Address::new(202, 113, 240, 0), Ipv4Address::new(202, 113, 247, 255));
//!
//! let mut cz88 = Cz88Builder::new(TextEncoding::Gb2312);
//! cz88.add_range(start, end, "天津市", "天津工程师范学院教育网")?;
//! cz88.save(dir.path().join("qqwry.dat"))?;
//!
//! let mut ipip = IpipBuilder::new();
//! ipip.add_range(start, end, &["中国", "天津", "天津"])?;
//! ipip.save(dir.path().join("ipip.datx"))?;
//!
//! let locator = IpLocator::new(LocatorOptions::new(
//!     dir.path().join("qqwry.dat"),
//!     dir.path().join("ipip.datx"),
//! ));
//! let record = locator.lookup("202.113.245.255")?.expect("covered");
//! assert_eq!(record.country, "中国");
//! assert_eq!(record.province, "天津");
//! assert_eq!(record.isp, "天津工程师范学院教育网");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Architecture
//!
//! ```text
//!   query ──► Resolver ──► LookupCache ──hit──► GeoRecord
//!                              │ miss
//!                 ┌────────────┴────────────┐
//!                 ▼                         ▼
//!           IpipDecoder               Cz88Decoder
//!      (bucket table + scan)     (binary search + redirects)
//!                 │                         │
//!                 └──────► RecordMerger ◄───┘
//!                               │
//!                               ▼
//!                     Option<GeoRecord> (cached if Some)
//! ```
//!
//! Each decoder owns one lazily opened file handle behind its own mutex, so
//! an [`IpLocator`] can be shared between threads. Structural read failures
//! inside one database degrade that source to [`Lookup::SystemError`]
//! instead of failing the whole lookup.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod address;
pub mod cache;
pub mod config;
pub mod cz88;
pub mod cz88_builder;
pub mod encoding;
pub mod endian;
pub mod error;
pub mod ipip;
pub mod ipip_builder;
pub mod locator;
pub mod merge;
pub mod record;
pub mod resolver;

// Re-exports for Rust consumers

pub use crate::address::Ipv4Address;
pub use crate::cache::LookupCache;
pub use crate::config::{LocatorOptions, SetupOptions};
pub use crate::cz88::{Cz88Decoder, Cz88Settings};
pub use crate::cz88_builder::Cz88Builder;
pub use crate::encoding::{TextEncoding, TranscodePolicy, Transcoded};
pub use crate::error::{LocationError, Result};
pub use crate::ipip::IpipDecoder;
pub use crate::ipip_builder::IpipBuilder;
pub use crate::locator::IpLocator;
pub use crate::merge::RecordMerger;
pub use crate::record::{Cz88Record, GeoRecord, IpipRecord, Lookup};
pub use crate::resolver::{NumericResolver, Resolver, SystemResolver};

/// Library version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
