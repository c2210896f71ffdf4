//! COM status codes.
//!
//! [`Hresult`] is a platform-neutral mirror of the Win32 `HRESULT` so the
//! registration logic and its tests build everywhere. On Windows it converts
//! to and from `windows::core::HRESULT`.

use std::fmt;

/// Win32 error codes that the crate produces or inspects.
pub mod win32 {
    pub const ERROR_SUCCESS: u32 = 0;
    pub const ERROR_FILE_NOT_FOUND: u32 = 2;
    pub const ERROR_ACCESS_DENIED: u32 = 5;
    pub const ERROR_INVALID_PARAMETER: u32 = 87;
    pub const ERROR_CALL_NOT_IMPLEMENTED: u32 = 120;
    pub const ERROR_INSUFFICIENT_BUFFER: u32 = 122;
    pub const ERROR_KEY_DELETED: u32 = 1018;
}

/// A 32-bit COM status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Hresult(pub i32);

impl Hresult {
    pub const S_OK: Hresult = Hresult(0);
    pub const S_FALSE: Hresult = Hresult(1);
    pub const E_NOTIMPL: Hresult = Hresult(0x8000_4001_u32 as i32);
    pub const E_NOINTERFACE: Hresult = Hresult(0x8000_4002_u32 as i32);
    pub const E_POINTER: Hresult = Hresult(0x8000_4003_u32 as i32);
    pub const E_FAIL: Hresult = Hresult(0x8000_4005_u32 as i32);
    pub const E_HANDLE: Hresult = Hresult(0x8007_0006_u32 as i32);
    pub const E_INVALIDARG: Hresult = Hresult(0x8007_0057_u32 as i32);
    pub const CLASS_E_CLASSNOTAVAILABLE: Hresult = Hresult(0x8004_0111_u32 as i32);
    /// No runtime could be selected for the request.
    pub const CLR_E_SHIM_RUNTIME: Hresult = Hresult(0x8013_1700_u32 as i32);

    /// Equivalent of `HRESULT_FROM_WIN32`.
    pub const fn from_win32(code: u32) -> Self {
        if code as i32 <= 0 {
            Hresult(code as i32)
        } else {
            Hresult(((code & 0xFFFF) | (7 << 16) | 0x8000_0000) as i32)
        }
    }

    pub const fn is_ok(self) -> bool {
        self.0 >= 0
    }

    pub const fn is_err(self) -> bool {
        self.0 < 0
    }

    /// The raw code as an unsigned value, the way it is usually printed.
    pub const fn code(self) -> u32 {
        self.0 as u32
    }
}

impl fmt::Display for Hresult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.code())
    }
}

#[cfg(windows)]
impl From<windows::core::HRESULT> for Hresult {
    fn from(hr: windows::core::HRESULT) -> Self {
        Hresult(hr.0)
    }
}

#[cfg(windows)]
impl From<Hresult> for windows::core::HRESULT {
    fn from(hr: Hresult) -> Self {
        windows::core::HRESULT(hr.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_win32_matches_known_codes() {
        assert_eq!(Hresult::from_win32(win32::ERROR_SUCCESS), Hresult::S_OK);
        assert_eq!(Hresult::from_win32(6), Hresult::E_HANDLE);
        assert_eq!(
            Hresult::from_win32(win32::ERROR_INVALID_PARAMETER),
            Hresult::E_INVALIDARG
        );
        assert_eq!(
            Hresult::from_win32(win32::ERROR_ACCESS_DENIED).code(),
            0x8007_0005
        );
    }

    #[test]
    fn test_success_and_failure() {
        assert!(Hresult::S_OK.is_ok());
        assert!(Hresult::S_FALSE.is_ok());
        assert!(Hresult::E_FAIL.is_err());
        assert_eq!(Hresult::E_FAIL.to_string(), "0x80004005");
    }
}
