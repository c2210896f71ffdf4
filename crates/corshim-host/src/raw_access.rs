//! `ND_*` exports: unaligned reads, writes and copies at a byte offset.
//!
//! Callers pass a bare pointer and a signed offset, so each access builds a
//! view spanning exactly the bytes it touches.

#![allow(non_snake_case)]

use corshim_shared::marshal::{ByteView, ByteViewMut};
use std::ffi::c_void;

/// View of `len` bytes starting `offset` bytes from `ptr`.
unsafe fn view_at<'a>(ptr: *const c_void, offset: i32, len: usize) -> ByteView<'a> {
    ByteView::new(unsafe {
        std::slice::from_raw_parts((ptr as *const u8).offset(offset as isize), len)
    })
}

unsafe fn view_at_mut<'a>(ptr: *mut c_void, offset: i32, len: usize) -> ByteViewMut<'a> {
    ByteViewMut::new(unsafe {
        std::slice::from_raw_parts_mut((ptr as *mut u8).offset(offset as isize), len)
    })
}

// The views below are sized to the access, so the bounds checks cannot fail.

#[unsafe(no_mangle)]
pub unsafe extern "system" fn ND_RU1(ptr: *const c_void, offset: i32) -> i32 {
    let view = unsafe { view_at(ptr, offset, 1) };
    view.read_u8(0).map(i32::from).unwrap_or_default()
}

#[unsafe(no_mangle)]
pub unsafe extern "system" fn ND_RI2(ptr: *const c_void, offset: i32) -> i32 {
    let view = unsafe { view_at(ptr, offset, 2) };
    view.read_i16(0).map(i32::from).unwrap_or_default()
}

#[unsafe(no_mangle)]
pub unsafe extern "system" fn ND_RI4(ptr: *const c_void, offset: i32) -> i32 {
    let view = unsafe { view_at(ptr, offset, 4) };
    view.read_i32(0).unwrap_or_default()
}

#[unsafe(no_mangle)]
pub unsafe extern "system" fn ND_RI8(ptr: *const c_void, offset: i32) -> i64 {
    let view = unsafe { view_at(ptr, offset, 8) };
    view.read_i64(0).unwrap_or_default()
}

#[unsafe(no_mangle)]
pub unsafe extern "system" fn ND_WU1(ptr: *mut c_void, offset: i32, val: u8) {
    let _ = unsafe { view_at_mut(ptr, offset, 1) }.write_u8(0, val);
}

#[unsafe(no_mangle)]
pub unsafe extern "system" fn ND_WI2(ptr: *mut c_void, offset: i32, val: i16) {
    let _ = unsafe { view_at_mut(ptr, offset, 2) }.write_i16(0, val);
}

#[unsafe(no_mangle)]
pub unsafe extern "system" fn ND_WI4(ptr: *mut c_void, offset: i32, val: i32) {
    let _ = unsafe { view_at_mut(ptr, offset, 4) }.write_i32(0, val);
}

#[unsafe(no_mangle)]
pub unsafe extern "system" fn ND_WI8(ptr: *mut c_void, offset: i32, val: i64) {
    let _ = unsafe { view_at_mut(ptr, offset, 8) }.write_i64(0, val);
}

/// Copy `size` bytes from `src` to `dst + offset`.
#[unsafe(no_mangle)]
pub unsafe extern "system" fn ND_CopyObjDst(src: *const c_void, dst: *mut c_void, offset: i32, size: i32) {
    let Ok(size) = usize::try_from(size) else {
        return;
    };
    let src = unsafe { std::slice::from_raw_parts(src as *const u8, size) };
    let _ = unsafe { view_at_mut(dst, offset, size) }.copy_in(0, src);
}

/// Copy `size` bytes from `src + offset` to `dst`.
#[unsafe(no_mangle)]
pub unsafe extern "system" fn ND_CopyObjSrc(src: *const c_void, offset: i32, dst: *mut c_void, size: i32) {
    let Ok(size) = usize::try_from(size) else {
        return;
    };
    let dst = unsafe { std::slice::from_raw_parts_mut(dst as *mut u8, size) };
    let _ = unsafe { view_at(src, offset, size) }.copy_out(0, dst);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_at_unaligned_offsets() {
        let mut bytes = [0u8; 16];
        bytes[1] = 0xFE;
        bytes[3..5].copy_from_slice(&(-3i16).to_ne_bytes());
        bytes[7..15].copy_from_slice(&(-9i64).to_ne_bytes());
        let ptr = bytes.as_ptr() as *const c_void;

        unsafe {
            assert_eq!(ND_RU1(ptr, 1), 0xFE);
            assert_eq!(ND_RI2(ptr, 3), -3);
            assert_eq!(ND_RI8(ptr, 7), -9);
        }
    }

    #[test]
    fn test_writes_land_at_offset() {
        let mut bytes = [0u8; 16];
        let ptr = bytes.as_mut_ptr() as *mut c_void;

        unsafe {
            ND_WU1(ptr, 0, 0x7F);
            ND_WI2(ptr, 1, -2);
            ND_WI4(ptr, 3, 0x1234_5678);
            ND_WI8(ptr, 7, -42);

            let read = ptr as *const c_void;
            assert_eq!(ND_RU1(read, 0), 0x7F);
            assert_eq!(ND_RI2(read, 1), -2);
            assert_eq!(ND_RI4(read, 3), 0x1234_5678);
            assert_eq!(ND_RI8(read, 7), -42);
        }
    }

    #[test]
    fn test_negative_offset_reads_before_pointer() {
        let bytes = [1u8, 2, 3, 4];
        let ptr = unsafe { bytes.as_ptr().add(2) } as *const c_void;
        assert_eq!(unsafe { ND_RU1(ptr, -2) }, 1);
    }

    #[test]
    fn test_object_copies() {
        let src = *b"abcd";
        let mut dst = [0u8; 8];
        unsafe {
            ND_CopyObjDst(
                src.as_ptr() as *const c_void,
                dst.as_mut_ptr() as *mut c_void,
                2,
                4,
            );
        }
        assert_eq!(&dst, b"\0\0abcd\0\0");

        let mut out = [0u8; 3];
        unsafe {
            ND_CopyObjSrc(
                dst.as_ptr() as *const c_void,
                3,
                out.as_mut_ptr() as *mut c_void,
                3,
            );
        }
        assert_eq!(&out, b"bcd");
    }
}
