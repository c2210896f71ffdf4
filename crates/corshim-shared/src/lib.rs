//! Shared types for corshim.
//!
//! Class registration is written against the [`KeyStore`] trait so the same
//! logic drives the Windows registry and the in-memory store used by tests
//! and by the CLI snapshot mode.
//!
//! # Layout
//!
//! - [`ClassRegistry`] - writes and removes per-class server records
//! - [`store`] - key store trait and its backends
//! - [`marshal`] - bounds-checked accessors for ABI buffers

pub mod class_registry;
pub mod config;
pub mod error;
pub mod guid;
pub mod marshal;
pub mod status;
pub mod store;

pub use class_registry::{
    BulkRegistrar, ClassRegistry, NoBulkRegistrar, RegistrationEntry, ServerRecord,
};
pub use config::{ClassManifest, RegistrationLayout, ThreadingModel};
pub use error::{Error, Result};
pub use guid::Clsid;
pub use status::Hresult;
pub use store::{Hive, KeyStore, MemoryKeyStore};
#[cfg(windows)]
pub use store::WindowsRegistry;
