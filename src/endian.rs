//! Fixed-width unsigned field readers
//!
//! The two database formats mix byte orders freely: qqwry is little-endian
//! throughout, while the ipip index stores big-endian addresses next to
//! little-endian offsets. Everything here reads unsigned values directly,
//! so no sign correction is ever needed.
//!
//! Two flavours are provided:
//! - slice readers, bounds-checked and returning `Option`, for the
//!   in-memory ipip index blob
//! - stream readers over [`std::io::Read`], where a short read becomes
//!   [`LocationError::TruncatedRead`], for the seek-then-read qqwry walk
//!
//! ```rust
//! use iplocate::endian::{read_u24_le, read_u32_be};
//!
//! let buffer = [0x7f, 0x00, 0x00, 0x01, 0x10, 0x20, 0x30];
//! assert_eq!(read_u32_be(&buffer, 0), Some(0x7f000001));
//! assert_eq!(read_u24_le(&buffer, 4), Some(0x302010));
//! assert_eq!(read_u24_le(&buffer, 5), None);
//! ```

use crate::error::{LocationError, Result};
use std::io::Read;

#[inline(always)]
fn array_at<const N: usize>(buffer: &[u8], offset: usize) -> Option<[u8; N]> {
    let end = offset.checked_add(N)?;
    buffer.get(offset..end)?.try_into().ok()
}

/// Read a little-endian u32 at `offset`
#[inline]
pub fn read_u32_le(buffer: &[u8], offset: usize) -> Option<u32> {
    array_at::<4>(buffer, offset).map(u32::from_le_bytes)
}

/// Read a big-endian u32 at `offset`
#[inline]
pub fn read_u32_be(buffer: &[u8], offset: usize) -> Option<u32> {
    array_at::<4>(buffer, offset).map(u32::from_be_bytes)
}

/// Read a little-endian 24-bit value at `offset`, zero-extended
#[inline]
pub fn read_u24_le(buffer: &[u8], offset: usize) -> Option<u32> {
    array_at::<3>(buffer, offset).map(u24_from_le_bytes)
}

/// Read a big-endian u16 at `offset`
#[inline]
pub fn read_u16_be(buffer: &[u8], offset: usize) -> Option<u16> {
    array_at::<2>(buffer, offset).map(u16::from_be_bytes)
}

/// Zero-extend three little-endian bytes
#[inline(always)]
pub const fn u24_from_le_bytes(bytes: [u8; 3]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], 0])
}

/// Encode the low 24 bits of `value` little-endian
///
/// Returns `None` when the value does not fit.
#[inline]
pub const fn u24_to_le_bytes(value: u32) -> Option<[u8; 3]> {
    if value > 0x00FF_FFFF {
        return None;
    }
    let b = value.to_le_bytes();
    Some([b[0], b[1], b[2]])
}

/// Stream readers with truncation reporting
pub trait ReadFieldExt: Read {
    /// Read exactly `N` bytes, reporting what was being read on a short read
    fn read_field_bytes<const N: usize>(&mut self, what: &str) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.read_exact(&mut buf).map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => {
                LocationError::TruncatedRead(format!("{} ({} bytes)", what, N))
            }
            _ => LocationError::from(e),
        })?;
        Ok(buf)
    }

    /// Read a little-endian u32
    fn read_u32_le(&mut self, what: &str) -> Result<u32> {
        self.read_field_bytes::<4>(what).map(u32::from_le_bytes)
    }

    /// Read a big-endian u32
    fn read_u32_be(&mut self, what: &str) -> Result<u32> {
        self.read_field_bytes::<4>(what).map(u32::from_be_bytes)
    }

    /// Read a little-endian 24-bit value, zero-extended
    fn read_u24_le(&mut self, what: &str) -> Result<u32> {
        self.read_field_bytes::<3>(what).map(u24_from_le_bytes)
    }

    /// Read a single byte
    fn read_u8(&mut self, what: &str) -> Result<u8> {
        self.read_field_bytes::<1>(what).map(|b| b[0])
    }
}

impl<R: Read + ?Sized> ReadFieldExt for R {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_slice_readers() {
        let buffer = [0x78, 0x56, 0x34, 0x12, 0xAB, 0xCD];

        assert_eq!(read_u32_le(&buffer, 0), Some(0x12345678));
        assert_eq!(read_u32_be(&buffer, 0), Some(0x78563412));
        assert_eq!(read_u24_le(&buffer, 0), Some(0x345678));
        assert_eq!(read_u16_be(&buffer, 4), Some(0xABCD));

        // High bit set must stay positive
        assert_eq!(read_u32_le(&[0xFF, 0xFF, 0xFF, 0xFF], 0), Some(u32::MAX));
    }

    #[test]
    fn test_slice_readers_out_of_bounds() {
        let buffer = [0u8; 4];
        assert_eq!(read_u32_le(&buffer, 1), None);
        assert_eq!(read_u16_be(&buffer, 3), None);
        assert_eq!(read_u24_le(&buffer, usize::MAX), None);
    }

    #[test]
    fn test_u24_encoding() {
        assert_eq!(u24_to_le_bytes(0x123456), Some([0x56, 0x34, 0x12]));
        assert_eq!(u24_to_le_bytes(0x0100_0000), None);
        assert_eq!(u24_from_le_bytes([0xFF, 0xFF, 0xFF]), 0x00FF_FFFF);
    }

    #[test]
    fn test_stream_readers() {
        let mut cursor = Cursor::new(vec![0x01, 0x00, 0x00, 0x80, 0x02, 0x00, 0x01, 0x07]);
        assert_eq!(cursor.read_u32_le("ip").unwrap(), 0x8000_0001);
        assert_eq!(cursor.read_u24_le("offset").unwrap(), 0x010002);
        assert_eq!(cursor.read_u8("flag").unwrap(), 7);

        let err = cursor.read_u8("flag").unwrap_err();
        assert!(matches!(err, LocationError::TruncatedRead(_)));
    }
}
