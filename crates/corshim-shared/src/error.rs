//! Error types for corshim.

use crate::guid::Clsid;
use crate::status::{Hresult, win32};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to open key '{path}': {status}")]
    KeyOpen { path: String, status: Hresult },

    #[error("Failed to write value under '{path}': {status}")]
    KeyWrite { path: String, status: Hresult },

    #[error("Failed to delete subtree '{path}': {status}")]
    SubtreeDelete { path: String, status: Hresult },

    #[error("Bulk registration failed: {0}")]
    BulkRegistration(Hresult),

    #[error("Runtime not found")]
    RuntimeNotFound,

    #[error("Class not available: {0}")]
    ClassNotAvailable(Clsid),

    #[error("Access of {len} bytes at offset {offset} exceeds buffer of {size} bytes")]
    OutOfBounds {
        offset: usize,
        len: usize,
        size: usize,
    },

    #[error("Invalid class identifier: {0}")]
    InvalidClsid(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("{context} failed: {status}")]
    Com {
        context: &'static str,
        status: Hresult,
    },

    #[cfg(windows)]
    #[error("Windows API error: {0}")]
    WindowsError(#[from] windows::core::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for a bare status code reported by an operation.
    pub fn com(context: &'static str, status: Hresult) -> Self {
        Error::Com { context, status }
    }

    /// The COM status this error surfaces as at the DLL boundary.
    pub fn status(&self) -> Hresult {
        match self {
            Error::KeyOpen { status, .. }
            | Error::KeyWrite { status, .. }
            | Error::SubtreeDelete { status, .. }
            | Error::Com { status, .. } => *status,
            Error::BulkRegistration(status) => *status,
            Error::RuntimeNotFound => Hresult::CLR_E_SHIM_RUNTIME,
            Error::ClassNotAvailable(_) => Hresult::CLASS_E_CLASSNOTAVAILABLE,
            Error::OutOfBounds { .. } | Error::InvalidClsid(_) | Error::Config(_) => {
                Hresult::E_INVALIDARG
            }
            #[cfg(windows)]
            Error::WindowsError(e) => e.code().into(),
            Error::IoError(e) => match e.raw_os_error() {
                Some(code) => Hresult::from_win32(code as u32),
                None => Hresult::E_FAIL,
            },
            Error::Json(_) | Error::Other(_) => Hresult::E_FAIL,
        }
    }

    /// Whether the error reports a key or value that does not exist.
    pub fn is_not_found(&self) -> bool {
        self.status() == Hresult::from_win32(win32::ERROR_FILE_NOT_FOUND)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_keep_native_status() {
        let err = Error::KeyWrite {
            path: "CLSID\\{X}".into(),
            status: Hresult::from_win32(win32::ERROR_ACCESS_DENIED),
        };
        assert_eq!(err.status().code(), 0x8007_0005);
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_lookup_errors_map_to_com_codes() {
        assert_eq!(
            Error::RuntimeNotFound.status(),
            Hresult::CLR_E_SHIM_RUNTIME
        );
        assert_eq!(
            Error::ClassNotAvailable(Clsid::nil()).status(),
            Hresult::CLASS_E_CLASSNOTAVAILABLE
        );
        assert_eq!(
            Error::OutOfBounds {
                offset: 4,
                len: 8,
                size: 8
            }
            .status(),
            Hresult::E_INVALIDARG
        );
    }
}
