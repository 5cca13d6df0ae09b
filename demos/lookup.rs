//! Address Lookup Example
//!
//! Resolves addresses (or hostnames) against a qqwry and an ipip database
//! and prints the merged records as JSON lines.
//!
//! Usage:
//!   cargo run --example lookup -- [--config <options.json>] <address>...
//!   cargo run --example lookup -- --sample <address>...
//!
//! Without `--config` the default paths `db/qqwry.dat` and
//! `db/17monipdb.datx` are used. `--sample` builds two tiny databases in a
//! temporary directory instead.

use iplocate::{Cz88Builder, IpLocator, IpipBuilder, Ipv4Address, LocatorOptions, TextEncoding};
use std::env;
use std::path::Path;

fn build_sample(dir: &Path) -> iplocate::Result<LocatorOptions> {
    let rows = [
        ("202.113.240.0", "202.113.247.255", "天津市", "天津工程师范学院教育网", ["中国", "天津", "天津"]),
        ("223.5.5.0", "223.5.5.255", "浙江省杭州市", "阿里云AliDNS服务器", ["中国", "浙江", "杭州"]),
        ("8.8.8.0", "8.8.8.255", "美国", "谷歌公司DNS服务器", ["GOOGLE.COM", "GOOGLE.COM", ""]),
    ];

    let mut cz88 = Cz88Builder::new(TextEncoding::Gb2312);
    let mut ipip = IpipBuilder::new();
    for (start, end, country, area, fields) in rows {
        let start: Ipv4Address = start.parse()?;
        let end: Ipv4Address = end.parse()?;
        cz88.add_range(start, end, country, area)?;
        ipip.add_range(start, end, &fields)?;
    }

    let options = LocatorOptions::new(dir.join("qqwry.dat"), dir.join("17monipdb.datx"));
    cz88.save(&options.cz88_db)?;
    ipip.save(&options.ipip_db)?;
    Ok(options)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args: Vec<String> = env::args().skip(1).collect();
    let sample_dir = tempfile::tempdir()?;

    let options = match args.first().map(String::as_str) {
        Some("--config") if args.len() >= 2 => {
            let options = LocatorOptions::from_json_file(&args[1])?;
            args.drain(..2);
            options
        }
        Some("--sample") => {
            args.remove(0);
            build_sample(sample_dir.path())?
        }
        _ => LocatorOptions::default(),
    };

    if args.is_empty() {
        eprintln!("Usage: lookup [--config <options.json> | --sample] <address>...");
        std::process::exit(1);
    }

    let locator = IpLocator::new(options);
    for query in &args {
        match locator.lookup(query) {
            Ok(Some(record)) => println!("{}\t{}", query, serde_json::to_string(&record)?),
            Ok(None) => println!("{}\t(unknown)", query),
            Err(e) => eprintln!("{}\terror: {}", query, e),
        }
    }
    Ok(())
}
