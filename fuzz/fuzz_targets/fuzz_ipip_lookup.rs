#![no_main]
use iplocate::ipip::IpipReader;
use iplocate::Ipv4Address;
use libfuzzer_sys::fuzz_target;
use std::io::Cursor;

fuzz_target!(|data: &[u8]| {
    if data.len() < 4 {
        return;
    }
    let target = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
    // Pad so the bucket table is present and the scan itself gets exercised
    let mut bytes = data[4..].to_vec();
    bytes.resize(bytes.len().max(600_000), 0);
    if let Ok(mut reader) = IpipReader::new(Cursor::new(bytes)) {
        let _ = reader.lookup(Ipv4Address::from(target));
    }
});
