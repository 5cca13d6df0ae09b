//! Shared fixtures: small qqwry and ipip databases written to a temp dir

#![allow(dead_code)]

use iplocate::{
    Cz88Builder, IpLocator, IpipBuilder, Ipv4Address, LocatorOptions, NumericResolver,
    TextEncoding,
};
use std::path::PathBuf;
use tempfile::TempDir;

pub fn addr(s: &str) -> Ipv4Address {
    s.parse().unwrap()
}

/// qqwry rows: (start, end, country, area)
pub const CZ88_ROWS: &[(&str, &str, &str, &str)] = &[
    ("0.0.0.0", "0.255.255.255", "IANA保留地址", " CZ88.NET"),
    ("1.0.0.0", "1.0.0.255", "澳大利亚", "APNIC Debogon-prefix网络"),
    ("8.8.8.0", "8.8.8.255", "美国", "谷歌公司DNS服务器"),
    ("100.64.0.0", "100.127.255.255", "http://www.cz88.net", "广告"),
    ("202.113.240.0", "202.113.247.255", "天津市", "天津工程师范学院教育网"),
    ("223.5.5.0", "223.5.5.255", "浙江省杭州市", "阿里云AliDNS服务器"),
];

/// ipip rows: (start, end, fields)
pub const IPIP_ROWS: &[(&str, &str, &[&str])] = &[
    ("0.0.0.0", "0.255.255.255", &["保留地址", "保留地址", ""]),
    ("1.0.0.0", "1.0.0.255", &["澳大利亚", "澳大利亚", ""]),
    ("8.8.8.0", "8.8.8.255", &["GOOGLE.COM", "GOOGLE.COM", ""]),
    ("202.113.240.0", "202.113.247.255", &["中国", "天津", "天津"]),
    ("223.5.5.0", "223.5.5.255", &["中国", "浙江", "杭州"]),
];

pub fn cz88_builder(encoding: TextEncoding) -> Cz88Builder {
    let mut builder = Cz88Builder::new(encoding);
    for &(start, end, country, area) in CZ88_ROWS {
        builder
            .add_range(addr(start), addr(end), country, area)
            .unwrap();
    }
    builder
}

pub fn ipip_builder() -> IpipBuilder {
    let mut builder = IpipBuilder::new();
    for &(start, end, fields) in IPIP_ROWS {
        builder.add_range(addr(start), addr(end), fields).unwrap();
    }
    builder
}

/// Both databases written into one temp directory
pub struct Fixture {
    pub dir: TempDir,
    pub cz88: PathBuf,
    pub ipip: PathBuf,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_encoding(TextEncoding::Gb2312)
    }

    pub fn with_encoding(encoding: TextEncoding) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let cz88 = dir.path().join("qqwry.dat");
        let ipip = dir.path().join("17monipdb.datx");
        cz88_builder(encoding).save(&cz88).unwrap();
        ipip_builder().save(&ipip).unwrap();
        Fixture { dir, cz88, ipip }
    }

    /// Write extra files next to the fixture databases
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn options(&self) -> LocatorOptions {
        LocatorOptions::new(&self.cz88, &self.ipip)
    }

    pub fn locator(&self) -> IpLocator {
        IpLocator::with_resolver(self.options(), NumericResolver)
    }
}
