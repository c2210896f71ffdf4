//! Hierarchical key-value store abstraction.
//!
//! The store models the Windows registry: keys form a tree under a few
//! predefined roots, each key has an optional default value and any number
//! of named string values. Key handles close when dropped.
//!
//! - [`MemoryKeyStore`] - in-process tree, serializable to a JSON snapshot
//! - [`WindowsRegistry`] - the system registry (Windows only)

mod memory;
#[cfg(windows)]
mod registry;

pub use memory::{MemoryKey, MemoryKeyStore};
#[cfg(windows)]
pub use registry::{RegistryKey, WindowsRegistry};

use crate::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator used in multi-level key paths.
pub const PATH_SEPARATOR: char = '\\';

/// Predefined root keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Hive {
    ClassesRoot,
    CurrentUser,
    LocalMachine,
}

impl Hive {
    pub fn name(self) -> &'static str {
        match self {
            Hive::ClassesRoot => "HKEY_CLASSES_ROOT",
            Hive::CurrentUser => "HKEY_CURRENT_USER",
            Hive::LocalMachine => "HKEY_LOCAL_MACHINE",
        }
    }
}

impl fmt::Display for Hive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Operations the class registry and the host shim consume.
///
/// `name` arguments may contain [`PATH_SEPARATOR`] to address nested keys.
/// Every call is a single store operation; nothing is atomic across calls.
pub trait KeyStore: Send + Sync {
    /// Open handle type. Dropping it closes the key.
    type Key;

    /// Open one of the predefined roots.
    fn open_root(&self, hive: Hive) -> Result<Self::Key>;

    /// Open `name` below `parent`, creating any missing keys on the way.
    fn create_key(&self, parent: &Self::Key, name: &str) -> Result<Self::Key>;

    /// Open an existing key for reading. `Ok(None)` when it does not exist.
    fn open_key(&self, parent: &Self::Key, name: &str) -> Result<Option<Self::Key>>;

    /// Set the unnamed (default) string value of `key`.
    fn set_default_value(&self, key: &Self::Key, value: &str) -> Result<()>;

    /// Set a named string value on `key`.
    fn set_named_value(&self, key: &Self::Key, name: &str, value: &str) -> Result<()>;

    /// Read a string value; `None` as name reads the default value.
    fn query_value(&self, key: &Self::Key, name: Option<&str>) -> Result<Option<String>>;

    /// Delete `name` below `parent` together with all of its subkeys.
    /// A missing subtree is not an error.
    fn delete_tree(&self, parent: &Self::Key, name: &str) -> Result<()>;

    /// Human-readable path of an open key, used in error messages.
    fn key_path(&self, key: &Self::Key) -> String;
}

/// Join key path components with the store separator.
pub fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}{PATH_SEPARATOR}{name}")
    }
}
