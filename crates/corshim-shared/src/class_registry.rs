//! Table-driven COM class registration.
//!
//! Each [`RegistrationEntry`] becomes a subtree below the class root:
//!
//! ```text
//! CLSID\{clsid}                 (default) = display name
//! CLSID\{clsid}\InprocServer32  (default) = server path
//!                               ThreadingModel = Both
//! ```
//!
//! Registration writes the per-class records before handing over to the
//! [`BulkRegistrar`]; unregistration runs the bulk step first and removes the
//! records last, and only when the bulk step succeeded.
//!
//! Failures do not stop a pass. Within a pass every entry's outcome replaces
//! the previous one, so the status of the last entry is what the pass reports.
//! Across passes the last error observed is returned.

use crate::config::{RegistrationLayout, THREADING_MODEL_VALUE};
use crate::guid::Clsid;
use crate::store::KeyStore;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// One class to (un)register.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationEntry {
    pub clsid: Clsid,
    pub name: String,
}

impl RegistrationEntry {
    pub fn new(clsid: Clsid, name: impl Into<String>) -> Self {
        Self {
            clsid,
            name: name.into(),
        }
    }
}

/// What is currently stored for a class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerRecord {
    pub clsid: Clsid,
    pub name: Option<String>,
    pub server_path: Option<String>,
    pub threading_model: Option<String>,
}

/// Secondary registration step run alongside the per-class passes.
pub trait BulkRegistrar {
    fn bulk_register(&mut self, register: bool) -> Result<()>;
}

impl<F> BulkRegistrar for F
where
    F: FnMut(bool) -> Result<()>,
{
    fn bulk_register(&mut self, register: bool) -> Result<()> {
        self(register)
    }
}

/// Bulk step for servers that have nothing beyond their class records.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBulkRegistrar;

impl BulkRegistrar for NoBulkRegistrar {
    fn bulk_register(&mut self, register: bool) -> Result<()> {
        debug!(register, "No bulk registrar configured");
        Ok(())
    }
}

/// Most recent failure seen across the phases of one call.
#[derive(Default)]
struct LastError(Option<Error>);

impl LastError {
    fn record(&mut self, result: Result<()>) {
        if let Err(e) = result {
            self.0 = Some(e);
        }
    }

    fn into_result(self) -> Result<()> {
        match self.0 {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Writes and removes class records in a [`KeyStore`].
pub struct ClassRegistry<'a, S: KeyStore> {
    store: &'a S,
    layout: RegistrationLayout,
}

impl<'a, S: KeyStore> ClassRegistry<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self::with_layout(store, RegistrationLayout::default())
    }

    pub fn with_layout(store: &'a S, layout: RegistrationLayout) -> Self {
        Self { store, layout }
    }

    pub fn layout(&self) -> &RegistrationLayout {
        &self.layout
    }

    /// Register or unregister every entry and run the bulk step.
    pub fn apply_registration(
        &self,
        entries: &[RegistrationEntry],
        server_path: &str,
        register: bool,
        bulk: &mut dyn BulkRegistrar,
    ) -> Result<()> {
        info!(
            count = entries.len(),
            register,
            server = server_path,
            "Applying class registration"
        );

        let mut last = LastError::default();

        if register {
            last.record(self.register_all(entries, server_path));
        }

        let bulk_result = bulk.bulk_register(register);
        let bulk_ok = bulk_result.is_ok();
        if let Err(e) = &bulk_result {
            warn!(register, error = %e, "Bulk registration failed");
        }
        last.record(bulk_result);

        if !register && bulk_ok {
            last.record(self.unregister_all(entries));
        }

        last.into_result()
    }

    /// Write the record of every entry. Returns the outcome of the last entry.
    pub fn register_all(&self, entries: &[RegistrationEntry], server_path: &str) -> Result<()> {
        if server_path.trim().is_empty() {
            return Err(Error::Config("server path is empty".into()));
        }

        let root = self.open_class_root()?;
        let mut outcome = Ok(());
        for entry in entries {
            outcome = self.register_class(&root, entry, server_path);
            match &outcome {
                Ok(()) => debug!(clsid = %entry.clsid, name = %entry.name, "Registered class"),
                Err(e) => warn!(clsid = %entry.clsid, error = %e, "Failed to register class"),
            }
        }
        outcome
    }

    /// Delete the record of every entry. Missing records are fine.
    pub fn unregister_all(&self, entries: &[RegistrationEntry]) -> Result<()> {
        let root = self.open_class_root()?;
        let mut outcome = Ok(());
        for entry in entries {
            outcome = self.store.delete_tree(&root, &entry.clsid.key_name());
            match &outcome {
                Ok(()) => debug!(clsid = %entry.clsid, "Unregistered class"),
                Err(e) => warn!(clsid = %entry.clsid, error = %e, "Failed to unregister class"),
            }
        }
        outcome
    }

    /// Read back the record of `clsid`, `None` when it is not registered.
    pub fn read_record(&self, clsid: &Clsid) -> Result<Option<ServerRecord>> {
        let hive = self.store.open_root(self.layout.hive)?;
        let path = format!("{}\\{}", self.layout.class_root, clsid.key_name());
        let Some(key) = self.store.open_key(&hive, &path)? else {
            return Ok(None);
        };

        let name = self.store.query_value(&key, None)?;
        let (server_path, threading_model) =
            match self.store.open_key(&key, &self.layout.server_key)? {
                Some(server) => (
                    self.store.query_value(&server, None)?,
                    self.store
                        .query_value(&server, Some(THREADING_MODEL_VALUE))?,
                ),
                None => (None, None),
            };

        Ok(Some(ServerRecord {
            clsid: *clsid,
            name,
            server_path,
            threading_model,
        }))
    }

    pub fn is_registered(&self, clsid: &Clsid) -> Result<bool> {
        Ok(self.read_record(clsid)?.is_some())
    }

    fn open_class_root(&self) -> Result<S::Key> {
        let hive = self.store.open_root(self.layout.hive)?;
        self.store.create_key(&hive, &self.layout.class_root)
    }

    fn register_class(
        &self,
        root: &S::Key,
        entry: &RegistrationEntry,
        server_path: &str,
    ) -> Result<()> {
        let key = self.store.create_key(root, &entry.clsid.key_name())?;
        self.store.set_default_value(&key, &entry.name)?;

        let server = self.store.create_key(&key, &self.layout.server_key)?;
        self.store.set_default_value(&server, server_path)?;
        self.store.set_named_value(
            &server,
            THREADING_MODEL_VALUE,
            self.layout.threading_model.as_str(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::Hresult;
    use crate::store::{Hive, MemoryKeyStore};

    fn entry(n: u128, name: &str) -> RegistrationEntry {
        RegistrationEntry::new(Clsid::from_u128(n), name)
    }

    #[test]
    fn test_bulk_failure_overrides_register_pass() {
        let store = MemoryKeyStore::new();
        let registry = ClassRegistry::new(&store);
        let entries = [entry(1, "One")];

        let mut bulk = |_register: bool| -> Result<()> {
            Err(Error::BulkRegistration(Hresult::E_FAIL))
        };
        let err = registry
            .apply_registration(&entries, "one.dll", true, &mut bulk)
            .unwrap_err();

        assert!(matches!(err, Error::BulkRegistration(_)));
        // Records written before the bulk step stay in place.
        assert!(registry.is_registered(&entries[0].clsid).unwrap());
    }

    #[test]
    fn test_unregister_skipped_when_bulk_step_fails() {
        let store = MemoryKeyStore::new();
        let registry = ClassRegistry::new(&store);
        let entries = [entry(1, "One")];
        registry
            .apply_registration(&entries, "one.dll", true, &mut NoBulkRegistrar)
            .unwrap();

        let mut bulk = |_register: bool| -> Result<()> {
            Err(Error::BulkRegistration(Hresult::E_FAIL))
        };
        assert!(
            registry
                .apply_registration(&entries, "one.dll", false, &mut bulk)
                .is_err()
        );
        assert!(registry.is_registered(&entries[0].clsid).unwrap());
    }

    #[test]
    fn test_bulk_step_sees_register_flag() {
        let store = MemoryKeyStore::new();
        let registry = ClassRegistry::new(&store);
        let mut calls = Vec::new();
        let mut bulk = |register: bool| -> Result<()> {
            calls.push(register);
            Ok(())
        };

        registry
            .apply_registration(&[], "x.dll", true, &mut bulk)
            .unwrap();
        registry
            .apply_registration(&[], "x.dll", false, &mut bulk)
            .unwrap();
        assert_eq!(calls, vec![true, false]);
    }

    #[test]
    fn test_empty_server_path_rejected_for_register() {
        let store = MemoryKeyStore::new();
        let registry = ClassRegistry::new(&store);
        let err = registry.register_all(&[entry(1, "One")], "  ").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_per_user_layout_writes_under_current_user() {
        let store = MemoryKeyStore::new();
        let registry = ClassRegistry::with_layout(&store, RegistrationLayout::per_user());
        registry
            .register_all(&[entry(0xAB, "User Class")], "user.dll")
            .unwrap();

        assert!(store.contains_key(
            Hive::CurrentUser,
            "Software\\Classes\\CLSID\\{00000000-0000-0000-0000-0000000000AB}\\InprocServer32"
        ));
        assert!(!store.contains_key(Hive::ClassesRoot, "CLSID"));
    }

    #[test]
    fn test_read_record_of_unknown_class() {
        let store = MemoryKeyStore::new();
        let registry = ClassRegistry::new(&store);
        assert_eq!(registry.read_record(&Clsid::from_u128(7)).unwrap(), None);
    }
}
