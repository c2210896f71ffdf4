//! Command implementations, written against any [`KeyStore`].

use corshim_host::install_root::get_install_root;
use corshim_shared::{
    ClassManifest, ClassRegistry, Clsid, KeyStore, NoBulkRegistrar, RegistrationLayout, Result,
    ServerRecord,
};
use tracing::info;

/// Summary of a (un)registration run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    pub server: String,
    pub classes: usize,
}

/// Register or unregister every class of `manifest`.
///
/// The manifest's threading model replaces the one in `layout`. A server path
/// is only required when registering.
pub fn apply<S: KeyStore>(
    store: &S,
    manifest: &ClassManifest,
    server: Option<&str>,
    mut layout: RegistrationLayout,
    register: bool,
) -> Result<Applied> {
    let server = if register {
        manifest.resolve_server(server)?
    } else {
        server
            .or(manifest.server.as_deref())
            .unwrap_or_default()
            .to_string()
    };
    layout.threading_model = manifest.threading_model;

    let registry = ClassRegistry::with_layout(store, layout);
    registry.apply_registration(&manifest.classes, &server, register, &mut NoBulkRegistrar)?;

    info!(
        classes = manifest.classes.len(),
        register,
        "Class registration complete"
    );
    Ok(Applied {
        server,
        classes: manifest.classes.len(),
    })
}

pub fn show<S: KeyStore>(
    store: &S,
    clsid: &Clsid,
    layout: RegistrationLayout,
) -> Result<Option<ServerRecord>> {
    ClassRegistry::with_layout(store, layout).read_record(clsid)
}

pub fn install_root<S: KeyStore>(store: &S) -> Result<String> {
    get_install_root(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use corshim_host::install_root::{INSTALL_ROOT_VALUE, NET_FRAMEWORK_KEY};
    use corshim_shared::{Error, Hive, MemoryKeyStore};
    use tempfile::TempDir;

    const MANIFEST: &str = r#"{
        "server": "C:\\capture.dll",
        "threading_model": "Apartment",
        "classes": [
            { "clsid": "{11111111-1111-1111-1111-111111111111}", "name": "Filter A" },
            { "clsid": "{22222222-2222-2222-2222-222222222222}", "name": "Filter B" }
        ]
    }"#;

    fn filter_a() -> Clsid {
        "{11111111-1111-1111-1111-111111111111}".parse().unwrap()
    }

    #[test]
    fn test_register_and_show() {
        let store = MemoryKeyStore::new();
        let manifest = ClassManifest::from_json(MANIFEST).unwrap();

        let applied = apply(&store, &manifest, None, RegistrationLayout::default(), true).unwrap();
        assert_eq!(applied.server, "C:\\capture.dll");
        assert_eq!(applied.classes, 2);

        let record = show(&store, &filter_a(), RegistrationLayout::default())
            .unwrap()
            .unwrap();
        assert_eq!(record.name.as_deref(), Some("Filter A"));
        assert_eq!(record.threading_model.as_deref(), Some("Apartment"));

        apply(&store, &manifest, None, RegistrationLayout::default(), false).unwrap();
        assert_eq!(
            show(&store, &filter_a(), RegistrationLayout::default()).unwrap(),
            None
        );
    }

    #[test]
    fn test_server_override_and_per_user_layout() {
        let store = MemoryKeyStore::new();
        let manifest = ClassManifest::from_json(MANIFEST).unwrap();

        apply(
            &store,
            &manifest,
            Some("D:\\other.dll"),
            RegistrationLayout::per_user(),
            true,
        )
        .unwrap();

        assert!(store.contains_key(
            Hive::CurrentUser,
            "Software\\Classes\\CLSID\\{11111111-1111-1111-1111-111111111111}"
        ));
        assert!(store.subkey_names(Hive::ClassesRoot, "CLSID").is_empty());
        let record = show(&store, &filter_a(), RegistrationLayout::per_user())
            .unwrap()
            .unwrap();
        assert_eq!(record.server_path.as_deref(), Some("D:\\other.dll"));
    }

    #[test]
    fn test_missing_server_is_a_config_error() {
        let store = MemoryKeyStore::new();
        let manifest = ClassManifest::from_json(r#"{ "classes": [] }"#).unwrap();
        let err = apply(&store, &manifest, None, RegistrationLayout::default(), true).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_snapshot_survives_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        let manifest = ClassManifest::from_json(MANIFEST).unwrap();

        let store = MemoryKeyStore::load(&path).unwrap();
        apply(&store, &manifest, None, RegistrationLayout::default(), true).unwrap();
        store.save(&path).unwrap();

        let reloaded = MemoryKeyStore::load(&path).unwrap();
        let record = show(&reloaded, &filter_a(), RegistrationLayout::default())
            .unwrap()
            .unwrap();
        assert_eq!(record.server_path.as_deref(), Some("C:\\capture.dll"));
    }

    #[test]
    fn test_install_root() {
        let store = MemoryKeyStore::new();
        assert!(install_root(&store).is_err());

        let hklm = store.open_root(Hive::LocalMachine).unwrap();
        let key = store.create_key(&hklm, NET_FRAMEWORK_KEY).unwrap();
        store
            .set_named_value(&key, INSTALL_ROOT_VALUE, "C:\\Windows\\Microsoft.NET\\Framework\\")
            .unwrap();
        assert_eq!(
            install_root(&store).unwrap(),
            "C:\\Windows\\Microsoft.NET\\Framework\\"
        );
    }

    #[test]
    fn test_unregister_without_server_path() {
        let store = MemoryKeyStore::new();
        let manifest = ClassManifest::from_json(MANIFEST).unwrap();
        apply(&store, &manifest, None, RegistrationLayout::default(), true).unwrap();

        let classes_only = ClassManifest {
            server: None,
            ..manifest
        };
        let applied = apply(
            &store,
            &classes_only,
            None,
            RegistrationLayout::default(),
            false,
        )
        .unwrap();
        assert_eq!(applied.classes, 2);
        assert_eq!(
            show(&store, &filter_a(), RegistrationLayout::default()).unwrap(),
            None
        );
        assert!(store.subkey_names(Hive::ClassesRoot, "CLSID").is_empty());
    }
}
