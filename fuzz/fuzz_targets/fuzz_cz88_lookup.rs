#![no_main]
use iplocate::cz88::Cz88Reader;
use iplocate::{Ipv4Address, TextEncoding, TranscodePolicy};
use libfuzzer_sys::fuzz_target;
use std::io::Cursor;

fuzz_target!(|data: &[u8]| {
    // First four bytes pick the target, the rest is the database
    if data.len() < 4 {
        return;
    }
    let target = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
    let Ok(mut reader) = Cz88Reader::new(Cursor::new(data[4..].to_vec())) else {
        return;
    };
    for encoding in [TextEncoding::Gb2312, TextEncoding::Utf8] {
        let _ = reader.lookup(Ipv4Address::from(target), encoding, TranscodePolicy::KeepRaw);
    }
});
