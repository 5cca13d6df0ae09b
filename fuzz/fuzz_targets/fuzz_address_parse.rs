#![no_main]
use iplocate::Ipv4Address;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        if let Ok(addr) = Ipv4Address::parse(text) {
            // Accepted input must round-trip through the canonical form
            assert_eq!(Ipv4Address::parse(&addr.to_string()).ok(), Some(addr));
        }
    }
});
