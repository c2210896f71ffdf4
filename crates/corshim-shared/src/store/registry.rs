//! Windows registry backend.

use super::{Hive, KeyStore, join_path};
use crate::status::Hresult;
use crate::{Error, Result};
use std::ffi::c_void;
use windows::Win32::Foundation::{ERROR_FILE_NOT_FOUND, ERROR_SUCCESS, WIN32_ERROR};
use windows::Win32::System::Registry::{
    HKEY, HKEY_CLASSES_ROOT, HKEY_CURRENT_USER, HKEY_LOCAL_MACHINE, REG_SZ, RRF_RT_REG_SZ,
    RegCloseKey, RegCreateKeyW, RegDeleteTreeW, RegGetValueW, RegOpenKeyW, RegSetKeyValueW,
};
use windows::core::PCWSTR;

/// Null-terminated UTF-16 copy of `s`.
fn to_wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

fn status(err: WIN32_ERROR) -> Hresult {
    Hresult::from_win32(err.0)
}

/// Open registry key. Closed on drop unless it is a predefined root.
#[derive(Debug)]
pub struct RegistryKey {
    hkey: HKEY,
    owned: bool,
    path: String,
}

impl Drop for RegistryKey {
    fn drop(&mut self) {
        if self.owned {
            let _ = unsafe { RegCloseKey(self.hkey) };
        }
    }
}

/// The system registry.
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowsRegistry;

impl WindowsRegistry {
    pub fn new() -> Self {
        Self
    }
}

impl KeyStore for WindowsRegistry {
    type Key = RegistryKey;

    fn open_root(&self, hive: Hive) -> Result<RegistryKey> {
        let hkey = match hive {
            Hive::ClassesRoot => HKEY_CLASSES_ROOT,
            Hive::CurrentUser => HKEY_CURRENT_USER,
            Hive::LocalMachine => HKEY_LOCAL_MACHINE,
        };
        Ok(RegistryKey {
            hkey,
            owned: false,
            path: hive.name().to_string(),
        })
    }

    fn create_key(&self, parent: &RegistryKey, name: &str) -> Result<RegistryKey> {
        let path = join_path(&parent.path, name);
        let name_wide = to_wide(name);
        let mut hkey = HKEY::default();
        let ret = unsafe { RegCreateKeyW(parent.hkey, PCWSTR(name_wide.as_ptr()), &mut hkey) };
        if ret != ERROR_SUCCESS {
            return Err(Error::KeyOpen {
                path,
                status: status(ret),
            });
        }
        Ok(RegistryKey {
            hkey,
            owned: true,
            path,
        })
    }

    fn open_key(&self, parent: &RegistryKey, name: &str) -> Result<Option<RegistryKey>> {
        let path = join_path(&parent.path, name);
        let name_wide = to_wide(name);
        let mut hkey = HKEY::default();
        let ret = unsafe { RegOpenKeyW(parent.hkey, PCWSTR(name_wide.as_ptr()), &mut hkey) };
        if ret == ERROR_FILE_NOT_FOUND {
            return Ok(None);
        }
        if ret != ERROR_SUCCESS {
            return Err(Error::KeyOpen {
                path,
                status: status(ret),
            });
        }
        Ok(Some(RegistryKey {
            hkey,
            owned: true,
            path,
        }))
    }

    fn set_default_value(&self, key: &RegistryKey, value: &str) -> Result<()> {
        set_string(key, PCWSTR::null(), value)
    }

    fn set_named_value(&self, key: &RegistryKey, name: &str, value: &str) -> Result<()> {
        let name_wide = to_wide(name);
        set_string(key, PCWSTR(name_wide.as_ptr()), value)
    }

    fn query_value(&self, key: &RegistryKey, name: Option<&str>) -> Result<Option<String>> {
        let name_wide = name.map(to_wide);
        let value_name = name_wide
            .as_ref()
            .map(|w| PCWSTR(w.as_ptr()))
            .unwrap_or(PCWSTR::null());

        // First call sizes the buffer, second call fills it.
        let mut size: u32 = 0;
        let ret = unsafe {
            RegGetValueW(
                key.hkey,
                PCWSTR::null(),
                value_name,
                RRF_RT_REG_SZ,
                None,
                None,
                Some(&mut size as *mut u32),
            )
        };
        if ret == ERROR_FILE_NOT_FOUND {
            return Ok(None);
        }
        if ret != ERROR_SUCCESS {
            return Err(Error::KeyOpen {
                path: key.path.clone(),
                status: status(ret),
            });
        }

        let mut buf = vec![0u16; (size as usize).div_ceil(2)];
        let mut size = (buf.len() * 2) as u32;
        let ret = unsafe {
            RegGetValueW(
                key.hkey,
                PCWSTR::null(),
                value_name,
                RRF_RT_REG_SZ,
                None,
                Some(buf.as_mut_ptr() as *mut c_void),
                Some(&mut size as *mut u32),
            )
        };
        if ret != ERROR_SUCCESS {
            return Err(Error::KeyOpen {
                path: key.path.clone(),
                status: status(ret),
            });
        }

        let len = buf.iter().position(|&c| c == 0).unwrap_or(buf.len());
        Ok(Some(String::from_utf16_lossy(&buf[..len])))
    }

    fn delete_tree(&self, parent: &RegistryKey, name: &str) -> Result<()> {
        let name_wide = to_wide(name);
        let ret = unsafe { RegDeleteTreeW(parent.hkey, PCWSTR(name_wide.as_ptr())) };
        if ret == ERROR_SUCCESS || ret == ERROR_FILE_NOT_FOUND {
            return Ok(());
        }
        Err(Error::SubtreeDelete {
            path: join_path(&parent.path, name),
            status: status(ret),
        })
    }

    fn key_path(&self, key: &RegistryKey) -> String {
        key.path.clone()
    }
}

fn set_string(key: &RegistryKey, value_name: PCWSTR, value: &str) -> Result<()> {
    let data = to_wide(value);
    let ret = unsafe {
        RegSetKeyValueW(
            key.hkey,
            PCWSTR::null(),
            value_name,
            REG_SZ.0,
            Some(data.as_ptr() as *const c_void),
            (data.len() * std::mem::size_of::<u16>()) as u32,
        )
    };
    if ret != ERROR_SUCCESS {
        return Err(Error::KeyWrite {
            path: key.path.clone(),
            status: status(ret),
        });
    }
    Ok(())
}
