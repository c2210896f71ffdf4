//! Registration layout and class manifests.

use crate::class_registry::RegistrationEntry;
use crate::store::Hive;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Key under which every class subtree lives.
pub const CLASS_ROOT_KEY: &str = "CLSID";

/// Server subkey for in-process servers.
pub const INPROC_SERVER_KEY: &str = "InprocServer32";

/// Named value carrying the threading model.
pub const THREADING_MODEL_VALUE: &str = "ThreadingModel";

/// Per-user class registrations live below this key in `HKEY_CURRENT_USER`.
pub const USER_CLASSES_KEY: &str = "Software\\Classes";

/// Threading model tag written next to the server path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ThreadingModel {
    Apartment,
    Free,
    #[default]
    Both,
    Neutral,
}

impl ThreadingModel {
    pub fn as_str(self) -> &'static str {
        match self {
            ThreadingModel::Apartment => "Apartment",
            ThreadingModel::Free => "Free",
            ThreadingModel::Both => "Both",
            ThreadingModel::Neutral => "Neutral",
        }
    }
}

impl fmt::Display for ThreadingModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where and how class records are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationLayout {
    /// Root hive the class root is created in.
    pub hive: Hive,
    /// Path of the class root below the hive.
    pub class_root: String,
    /// Name of the server subkey holding the server path.
    pub server_key: String,
    pub threading_model: ThreadingModel,
}

impl Default for RegistrationLayout {
    fn default() -> Self {
        Self {
            hive: Hive::ClassesRoot,
            class_root: CLASS_ROOT_KEY.to_string(),
            server_key: INPROC_SERVER_KEY.to_string(),
            threading_model: ThreadingModel::Both,
        }
    }
}

impl RegistrationLayout {
    /// Layout for registrations visible to the current user only.
    pub fn per_user() -> Self {
        Self {
            hive: Hive::CurrentUser,
            class_root: format!("{USER_CLASSES_KEY}\\{CLASS_ROOT_KEY}"),
            ..Self::default()
        }
    }
}

/// A class manifest: the server binary and the classes it hosts.
///
/// ```json
/// {
///   "server": "C:\\capture.dll",
///   "threading_model": "Both",
///   "classes": [
///     { "clsid": "{11111111-1111-1111-1111-111111111111}", "name": "Filter A" }
///   ]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassManifest {
    #[serde(default)]
    pub server: Option<String>,
    #[serde(default)]
    pub threading_model: ThreadingModel,
    pub classes: Vec<RegistrationEntry>,
}

impl ClassManifest {
    pub fn from_json(json: &str) -> Result<Self> {
        let manifest: ClassManifest = serde_json::from_str(json)?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    fn validate(&self) -> Result<()> {
        if let Some(server) = &self.server {
            if server.trim().is_empty() {
                return Err(Error::Config("server path is empty".into()));
            }
        }
        for (i, entry) in self.classes.iter().enumerate() {
            if self.classes[..i].iter().any(|e| e.clsid == entry.clsid) {
                return Err(Error::Config(format!(
                    "class {} is listed more than once",
                    entry.clsid
                )));
            }
        }
        Ok(())
    }

    /// Server path from the command line, falling back to the manifest.
    pub fn resolve_server(&self, override_path: Option<&str>) -> Result<String> {
        match override_path.or(self.server.as_deref()) {
            Some(path) if !path.trim().is_empty() => Ok(path.to_string()),
            _ => Err(Error::Config(
                "no server path given in manifest or on the command line".into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guid::Clsid;

    #[test]
    fn test_default_layout_targets_classes_root() {
        let layout = RegistrationLayout::default();
        assert_eq!(layout.hive, Hive::ClassesRoot);
        assert_eq!(layout.class_root, "CLSID");
        assert_eq!(layout.server_key, "InprocServer32");
        assert_eq!(layout.threading_model.as_str(), "Both");
    }

    #[test]
    fn test_per_user_layout() {
        let layout = RegistrationLayout::per_user();
        assert_eq!(layout.hive, Hive::CurrentUser);
        assert_eq!(layout.class_root, "Software\\Classes\\CLSID");
    }

    #[test]
    fn test_manifest_parses_with_defaults() {
        let manifest = ClassManifest::from_json(
            r#"{ "classes": [ { "clsid": "11111111-1111-1111-1111-111111111111", "name": "Filter A" } ] }"#,
        )
        .unwrap();
        assert_eq!(manifest.threading_model, ThreadingModel::Both);
        assert_eq!(manifest.classes.len(), 1);
        assert_eq!(
            manifest.classes[0].clsid,
            Clsid::from_u128(0x11111111_1111_1111_1111_111111111111)
        );
        assert!(manifest.resolve_server(None).is_err());
        assert_eq!(
            manifest.resolve_server(Some("C:\\capture.dll")).unwrap(),
            "C:\\capture.dll"
        );
    }

    #[test]
    fn test_manifest_rejects_duplicates() {
        let err = ClassManifest::from_json(
            r#"{ "server": "a.dll", "classes": [
                { "clsid": "{11111111-1111-1111-1111-111111111111}", "name": "A" },
                { "clsid": "11111111-1111-1111-1111-111111111111", "name": "B" }
            ] }"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
