//! Runtime-host shim DLL.
//!
//! The legacy hosting entry points are answered by [`ShimHost`], which asks a
//! [`RuntimeResolver`] for a runtime and forwards to it. The classes this
//! module can create live in a [`ClassFactoryTable`], which also drives
//! `DllRegisterServer` and `DllUnregisterServer`.

pub mod factory;
pub mod guids;
pub mod install_root;
pub mod loader;
pub mod raw_access;
pub mod refs;
pub mod runtime;
pub mod shim;
pub mod stubs;

#[cfg(windows)]
pub mod exports;

pub use factory::{ClassFactory, ClassFactoryTable, ClassFactoryTableBuilder};
pub use loader::{LibraryLoader, ModuleHandle};
#[cfg(windows)]
pub use loader::SystemLoader;
pub use refs::{ModuleLock, ModuleRefs};
pub use runtime::{ComObject, InterfacePtr, NoRuntimeResolver, RuntimeInfo, RuntimeRequest, RuntimeResolver};
pub use shim::{DEFAULT_VERSION, RequestedRuntime, ShimHost};
