//! Location of the .NET Framework installation.

use corshim_shared::status::{Hresult, win32};
use corshim_shared::{Error, Hive, KeyStore, Result};

pub const NET_FRAMEWORK_KEY: &str = "SOFTWARE\\Microsoft\\.NETFramework";
pub const INSTALL_ROOT_VALUE: &str = "InstallRoot";

/// Read `InstallRoot` from the framework key, e.g. `C:\Windows\Microsoft.NET\Framework\`.
pub fn get_install_root<S: KeyStore>(store: &S) -> Result<String> {
    let root = store.open_root(Hive::LocalMachine)?;
    let not_found = || Error::KeyOpen {
        path: format!("{}\\{NET_FRAMEWORK_KEY}", Hive::LocalMachine),
        status: Hresult::from_win32(win32::ERROR_FILE_NOT_FOUND),
    };
    let key = store.open_key(&root, NET_FRAMEWORK_KEY)?.ok_or_else(not_found)?;
    store
        .query_value(&key, Some(INSTALL_ROOT_VALUE))?
        .ok_or_else(not_found)
}
