//! Runtime selection interfaces.
//!
//! The shim never picks a runtime itself. It describes what the caller asked
//! for in a [`RuntimeRequest`] and hands it to a [`RuntimeResolver`], which
//! returns a [`RuntimeInfo`] for the selected runtime.

use corshim_shared::{Clsid, Error, Result};
use std::any::Any;
use std::path::PathBuf;
use tracing::debug;

/// `RUNTIME_INFO_*` flags accepted by [`RuntimeRequest::runtime_info_flags`].
pub mod runtime_info {
    pub const UPGRADE_VERSION: u32 = 0x1;
    pub const REQUEST_IA64: u32 = 0x2;
    pub const REQUEST_AMD64: u32 = 0x4;
    pub const REQUEST_X86: u32 = 0x8;
    pub const DONT_RETURN_DIRECTORY: u32 = 0x10;
    pub const DONT_RETURN_VERSION: u32 = 0x20;
    pub const DONT_SHOW_ERROR_DIALOG: u32 = 0x40;
}

/// An object handed out by a runtime or a class constructor.
pub type ComObject = Box<dyn Any + Send>;

/// Address of a native COM interface, for objects that cross the DLL boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterfacePtr(pub usize);

/// What the caller asked for when binding to a runtime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeRequest {
    /// Executable whose configuration drives the selection.
    pub exe: Option<PathBuf>,
    /// Requested version string, e.g. `v2.0.50727`.
    pub version: Option<String>,
    /// Host configuration file.
    pub config_file: Option<PathBuf>,
    pub startup_flags: u32,
    pub runtime_info_flags: u32,
    /// Bind the way pre-4.0 hosting APIs do.
    pub legacy: bool,
}

impl RuntimeRequest {
    /// The request every legacy entry point issues when it has no version.
    pub fn latest() -> Self {
        Self {
            runtime_info_flags: runtime_info::UPGRADE_VERSION,
            legacy: true,
            ..Self::default()
        }
    }

    pub fn for_version(version: Option<&str>) -> Self {
        Self {
            version: version.map(str::to_string),
            legacy: true,
            ..Self::default()
        }
    }

    pub fn with_startup_flags(mut self, flags: u32) -> Self {
        self.startup_flags = flags;
        self
    }

    pub fn with_config_file(mut self, path: Option<PathBuf>) -> Self {
        self.config_file = path;
        self
    }
}

/// A selected runtime.
pub trait RuntimeInfo {
    fn version_string(&self) -> Result<String>;

    fn runtime_directory(&self) -> Result<String>;

    /// Create `clsid` inside this runtime and return its `iid` interface.
    fn get_interface(&self, clsid: &Clsid, iid: &Clsid) -> Result<ComObject>;
}

/// Selects runtimes and creates the meta host.
pub trait RuntimeResolver: Send + Sync {
    fn get_runtime_info(&self, request: &RuntimeRequest) -> Result<Box<dyn RuntimeInfo>>;

    /// Create the `CLRMetaHost` object and return its `iid` interface.
    fn create_meta_host(&self, iid: &Clsid) -> Result<ComObject>;

    /// Called once when the hosting module is unloaded.
    fn unload_all(&self) {}
}

/// Resolver used until a real one is installed. Nothing is ever found.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRuntimeResolver;

impl RuntimeResolver for NoRuntimeResolver {
    fn get_runtime_info(&self, request: &RuntimeRequest) -> Result<Box<dyn RuntimeInfo>> {
        debug!(?request, "No runtime resolver installed");
        Err(Error::RuntimeNotFound)
    }

    fn create_meta_host(&self, _iid: &Clsid) -> Result<ComObject> {
        Err(Error::RuntimeNotFound)
    }
}
