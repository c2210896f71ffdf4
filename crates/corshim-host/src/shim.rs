//! The runtime-host shim.
//!
//! [`ShimHost`] answers the legacy hosting entry points by asking a
//! [`RuntimeResolver`] for a runtime and forwarding to it. It also owns the
//! class table used for object creation and for self-registration.

use crate::factory::ClassFactoryTable;
use crate::install_root::get_install_root;
use crate::loader::{LibraryLoader, ModuleHandle};
use crate::runtime::{ComObject, RuntimeRequest, RuntimeResolver};
use corshim_shared::{
    ClassRegistry, Clsid, Error, Hresult, KeyStore, NoBulkRegistrar, RegistrationLayout, Result,
};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Version `LoadLibraryShim` falls back to when no runtime can be resolved.
pub const DEFAULT_VERSION: &str = "v1.1.4322";

/// Version and directory of a resolved runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestedRuntime {
    pub version: String,
    pub directory: String,
}

pub struct ShimHost<S: KeyStore> {
    resolver: Arc<dyn RuntimeResolver>,
    store: S,
    loader: Box<dyn LibraryLoader>,
    classes: ClassFactoryTable,
    layout: RegistrationLayout,
}

impl<S: KeyStore> ShimHost<S> {
    pub fn new(
        resolver: Arc<dyn RuntimeResolver>,
        store: S,
        loader: Box<dyn LibraryLoader>,
    ) -> Self {
        let classes = ClassFactoryTable::for_resolver(Arc::clone(&resolver));
        Self {
            resolver,
            store,
            loader,
            classes,
            layout: RegistrationLayout::default(),
        }
    }

    /// Replace the class table built from the resolver.
    pub fn with_classes(mut self, classes: ClassFactoryTable) -> Self {
        self.classes = classes;
        self
    }

    pub fn with_layout(mut self, layout: RegistrationLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn classes(&self) -> &ClassFactoryTable {
        &self.classes
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn cor_bind_to_runtime_host(
        &self,
        version: Option<&str>,
        build_flavor: Option<&str>,
        host_config: Option<&Path>,
        startup_flags: u32,
        clsid: &Clsid,
        iid: &Clsid,
    ) -> Result<ComObject> {
        debug!(?version, ?build_flavor, ?host_config, startup_flags, %clsid, %iid, "CorBindToRuntimeHost");
        let request = RuntimeRequest::for_version(version)
            .with_config_file(host_config.map(Path::to_path_buf))
            .with_startup_flags(startup_flags);
        let info = self.resolver.get_runtime_info(&request)?;
        info.get_interface(clsid, iid)
    }

    pub fn cor_bind_to_runtime_ex(
        &self,
        version: Option<&str>,
        build_flavor: Option<&str>,
        startup_flags: u32,
        clsid: &Clsid,
        iid: &Clsid,
    ) -> Result<ComObject> {
        debug!(?version, ?build_flavor, startup_flags, %clsid, %iid, "CorBindToRuntimeEx");
        let request = RuntimeRequest::for_version(version).with_startup_flags(startup_flags);
        let info = self.resolver.get_runtime_info(&request)?;
        info.get_interface(clsid, iid)
    }

    pub fn cor_bind_to_current_runtime(
        &self,
        file: Option<&str>,
        clsid: &Clsid,
        iid: &Clsid,
    ) -> Result<ComObject> {
        warn!(?file, %clsid, %iid, "CorBindToCurrentRuntime: stub");
        Err(Error::com("CorBindToCurrentRuntime", Hresult::E_NOTIMPL))
    }

    /// Directory of the newest runtime.
    pub fn get_cor_system_directory(&self) -> Result<String> {
        self.resolver
            .get_runtime_info(&RuntimeRequest::latest())?
            .runtime_directory()
    }

    /// Version string of the newest runtime.
    pub fn get_cor_version(&self) -> Result<String> {
        self.resolver
            .get_runtime_info(&RuntimeRequest::latest())?
            .version_string()
    }

    /// The directory is only looked up once the version was obtained.
    pub fn get_requested_runtime_info(&self, request: &RuntimeRequest) -> Result<RequestedRuntime> {
        let info = self.resolver.get_runtime_info(request)?;
        let version = info.version_string()?;
        let directory = info.runtime_directory()?;
        Ok(RequestedRuntime { version, directory })
    }

    /// Full path `LoadLibraryShim` loads `dll_name` from.
    ///
    /// Without an install root the bare name is used. Without `version` the
    /// current runtime version is used, or [`DEFAULT_VERSION`] if there is none.
    pub fn library_shim_path(&self, dll_name: &str, version: Option<&str>) -> String {
        let root = match get_install_root(&self.store) {
            Ok(root) => root,
            Err(e) => {
                error!(error = %e, "Failed to read the framework install root");
                return dll_name.to_string();
            }
        };

        let version = match version {
            Some(version) => version.to_string(),
            None => self
                .get_cor_version()
                .unwrap_or_else(|_| DEFAULT_VERSION.to_string()),
        };

        format!("{root}{version}\\{dll_name}")
    }

    pub fn load_library_shim(&self, dll_name: &str, version: Option<&str>) -> Result<ModuleHandle> {
        let path = self.library_shim_path(dll_name, version);
        self.loader.load(&path).map_err(|e| {
            warn!(path, error = %e, "LoadLibraryShim failed");
            Error::com("LoadLibraryShim", Hresult::E_HANDLE)
        })
    }

    pub fn clr_create_instance(&self, clsid: &Clsid, iid: &Clsid) -> Result<ComObject> {
        self.classes.create_instance(clsid, iid)
    }

    /// Write or remove the records of every class this module exposes.
    pub fn register_server(&self, server_path: &str, register: bool) -> Result<()> {
        info!(server = server_path, register, "Updating server registration");
        ClassRegistry::with_layout(&self.store, self.layout.clone()).apply_registration(
            &self.classes.registration_entries(),
            server_path,
            register,
            &mut NoBulkRegistrar,
        )
    }

    /// Release every runtime. Called when the module is unloaded.
    pub fn shutdown(&self) {
        self.resolver.unload_all();
    }
}
