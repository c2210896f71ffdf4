//! Bounds-checked typed access to marshalled byte buffers.
//!
//! Values are read and written in native byte order at arbitrary (unaligned)
//! offsets. Every access is checked against the buffer length first.

use crate::status::{Hresult, win32};
use crate::{Error, Result};

fn check(offset: usize, len: usize, size: usize) -> Result<std::ops::Range<usize>> {
    match offset.checked_add(len) {
        Some(end) if end <= size => Ok(offset..end),
        _ => Err(Error::OutOfBounds { offset, len, size }),
    }
}

/// Read-only view over a byte buffer.
#[derive(Debug, Clone, Copy)]
pub struct ByteView<'a> {
    bytes: &'a [u8],
}

impl<'a> ByteView<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    fn array<const N: usize>(&self, offset: usize) -> Result<[u8; N]> {
        let range = check(offset, N, self.bytes.len())?;
        let mut out = [0u8; N];
        out.copy_from_slice(&self.bytes[range]);
        Ok(out)
    }

    pub fn read_u8(&self, offset: usize) -> Result<u8> {
        Ok(self.array::<1>(offset)?[0])
    }

    pub fn read_i16(&self, offset: usize) -> Result<i16> {
        Ok(i16::from_ne_bytes(self.array(offset)?))
    }

    pub fn read_i32(&self, offset: usize) -> Result<i32> {
        Ok(i32::from_ne_bytes(self.array(offset)?))
    }

    pub fn read_i64(&self, offset: usize) -> Result<i64> {
        Ok(i64::from_ne_bytes(self.array(offset)?))
    }

    /// Copy `dst.len()` bytes starting at `offset` into `dst`.
    pub fn copy_out(&self, offset: usize, dst: &mut [u8]) -> Result<()> {
        let range = check(offset, dst.len(), self.bytes.len())?;
        dst.copy_from_slice(&self.bytes[range]);
        Ok(())
    }
}

/// Mutable view over a byte buffer.
#[derive(Debug)]
pub struct ByteViewMut<'a> {
    bytes: &'a mut [u8],
}

impl<'a> ByteViewMut<'a> {
    pub fn new(bytes: &'a mut [u8]) -> Self {
        Self { bytes }
    }

    pub fn as_view(&self) -> ByteView<'_> {
        ByteView::new(&*self.bytes)
    }

    fn put(&mut self, offset: usize, src: &[u8]) -> Result<()> {
        let range = check(offset, src.len(), self.bytes.len())?;
        self.bytes[range].copy_from_slice(src);
        Ok(())
    }

    pub fn write_u8(&mut self, offset: usize, value: u8) -> Result<()> {
        self.put(offset, &[value])
    }

    pub fn write_i16(&mut self, offset: usize, value: i16) -> Result<()> {
        self.put(offset, &value.to_ne_bytes())
    }

    pub fn write_i32(&mut self, offset: usize, value: i32) -> Result<()> {
        self.put(offset, &value.to_ne_bytes())
    }

    pub fn write_i64(&mut self, offset: usize, value: i64) -> Result<()> {
        self.put(offset, &value.to_ne_bytes())
    }

    /// Copy all of `src` into the buffer starting at `offset`.
    pub fn copy_in(&mut self, offset: usize, src: &[u8]) -> Result<()> {
        self.put(offset, src)
    }
}

/// Copy `s` plus a terminating NUL into a caller-supplied UTF-16 buffer.
///
/// Returns the number of code units written including the terminator. When
/// the buffer is too small nothing is written and the error carries
/// `ERROR_INSUFFICIENT_BUFFER` together with the required length.
pub fn write_wide_str(s: &str, buf: &mut [u16]) -> std::result::Result<usize, (Error, usize)> {
    let wide: Vec<u16> = s.encode_utf16().chain(std::iter::once(0)).collect();
    if wide.len() > buf.len() {
        let err = Error::com(
            "write_wide_str",
            Hresult::from_win32(win32::ERROR_INSUFFICIENT_BUFFER),
        );
        return Err((err, wide.len()));
    }
    buf[..wide.len()].copy_from_slice(&wide);
    Ok(wide.len())
}

/// Code units needed to hold `s` plus a terminating NUL.
pub fn wide_len(s: &str) -> usize {
    s.encode_utf16().count() + 1
}

/// Copy `s` into an optional caller buffer.
///
/// Without a buffer only the required length is reported, with `S_OK`.
/// Otherwise this behaves like [`write_wide_str`]. Returns the status and the
/// length written or required.
pub fn write_wide_out(s: &str, buf: Option<&mut [u16]>) -> (Hresult, usize) {
    match buf {
        None => (Hresult::S_OK, wide_len(s)),
        Some(buf) => match write_wide_str(s, buf) {
            Ok(written) => (Hresult::S_OK, written),
            Err((e, needed)) => (e.status(), needed),
        },
    }
}

/// Largest buffer [`read_wide_growing`] will try, in code units.
pub const MAX_WIDE_BUFFER: usize = 32768;

/// Read a string from an API that truncates to the buffer it is given.
///
/// `fill` writes into the buffer and returns the number of code units
/// written, not counting the terminator. A result that fills the whole buffer
/// is taken as truncated and retried with a buffer twice the size, up to
/// [`MAX_WIDE_BUFFER`]. Zero means failure.
pub fn read_wide_growing(initial: usize, mut fill: impl FnMut(&mut [u16]) -> usize) -> Option<String> {
    let mut buf = vec![0u16; initial.max(1)];
    loop {
        let len = fill(&mut buf);
        if len == 0 {
            return None;
        }
        if len < buf.len() {
            return Some(String::from_utf16_lossy(&buf[..len]));
        }
        if buf.len() >= MAX_WIDE_BUFFER {
            return None;
        }
        let next = (buf.len() * 2).min(MAX_WIDE_BUFFER);
        buf.resize(next, 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_reads_and_writes() {
        let mut bytes = [0u8; 16];
        let mut view = ByteViewMut::new(&mut bytes);
        view.write_u8(0, 0xFF).unwrap();
        view.write_i16(1, -2).unwrap();
        view.write_i32(3, 0x1234_5678).unwrap();
        view.write_i64(7, -42).unwrap();

        let read = view.as_view();
        assert_eq!(read.read_u8(0).unwrap(), 0xFF);
        assert_eq!(read.read_i16(1).unwrap(), -2);
        assert_eq!(read.read_i32(3).unwrap(), 0x1234_5678);
        assert_eq!(read.read_i64(7).unwrap(), -42);
    }

    #[test]
    fn test_out_of_bounds_is_an_error() {
        let bytes = [0u8; 4];
        let view = ByteView::new(&bytes);
        assert!(view.read_i32(0).is_ok());
        assert!(matches!(
            view.read_i32(1),
            Err(Error::OutOfBounds {
                offset: 1,
                len: 4,
                size: 4
            })
        ));
        assert!(view.read_u8(usize::MAX).is_err());
    }

    #[test]
    fn test_copy_in_and_out() {
        let mut bytes = [0u8; 8];
        let mut view = ByteViewMut::new(&mut bytes);
        view.copy_in(2, b"abc").unwrap();
        assert!(view.copy_in(6, b"abc").is_err());

        let mut out = [0u8; 3];
        view.as_view().copy_out(2, &mut out).unwrap();
        assert_eq!(&out, b"abc");
        // A failed write leaves the tail untouched.
        assert_eq!(&bytes[5..], &[0, 0, 0]);
    }

    #[test]
    fn test_write_wide_str_reports_required_length() {
        let mut buf = [0u16; 4];
        assert_eq!(write_wide_str("v4", &mut buf).unwrap(), 3);
        assert_eq!(&buf[..3], &[b'v' as u16, b'4' as u16, 0]);

        let (err, needed) = write_wide_str("v4.0.30319", &mut buf).unwrap_err();
        assert_eq!(needed, 11);
        assert_eq!(err.status().code(), 0x8007_007A);
    }

    #[test]
    fn test_write_wide_out_without_buffer_reports_length() {
        assert_eq!(write_wide_out("v2.0.50727", None), (Hresult::S_OK, 11));

        let mut empty: [u16; 0] = [];
        let (status, needed) = write_wide_out("v2.0.50727", Some(&mut empty));
        assert_eq!(status, Hresult::from_win32(win32::ERROR_INSUFFICIENT_BUFFER));
        assert_eq!(needed, 11);

        let mut buf = [0u16; 16];
        assert_eq!(write_wide_out("v2", Some(&mut buf)), (Hresult::S_OK, 3));
        assert_eq!(&buf[..3], &[b'v' as u16, b'2' as u16, 0]);
    }

    #[test]
    fn test_read_wide_growing_retries_truncated_reads() {
        let long = format!("C:\\{}\\mscoree.dll", "x".repeat(300));
        let wide: Vec<u16> = long.encode_utf16().collect();
        let mut sizes = Vec::new();

        let read = read_wide_growing(260, |buf| {
            sizes.push(buf.len());
            let n = wide.len().min(buf.len());
            buf[..n].copy_from_slice(&wide[..n]);
            n
        });

        assert_eq!(read.as_deref(), Some(long.as_str()));
        assert_eq!(sizes, vec![260, 520]);
    }

    #[test]
    fn test_read_wide_growing_gives_up() {
        assert_eq!(read_wide_growing(260, |_| 0), None);
        assert_eq!(read_wide_growing(260, |buf| buf.len()), None);
    }
}
