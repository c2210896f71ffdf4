//! Module reference count backing `DllCanUnloadNow`.
//!
//! The shim itself hands out no objects: interfaces returned by the bind and
//! create exports belong to the runtime the resolver selected, which keeps its
//! own module loaded. The count is raised only by objects implemented inside
//! this module, such as those of a resolver installed in-process, which hold a
//! [`ModuleLock`] from [`ModuleRefs::global`] for as long as they are alive.

use corshim_shared::Hresult;
use std::sync::atomic::{AtomicU32, Ordering};

static GLOBAL: ModuleRefs = ModuleRefs::new();

/// Count of outstanding locks on the module. Zero at load.
#[derive(Debug, Default)]
pub struct ModuleRefs {
    count: AtomicU32,
}

impl ModuleRefs {
    pub const fn new() -> Self {
        Self {
            count: AtomicU32::new(0),
        }
    }

    /// The process-wide instance.
    pub fn global() -> &'static ModuleRefs {
        &GLOBAL
    }

    pub fn add_ref(&self) -> u32 {
        self.count.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Drop one reference. Never goes below zero.
    pub fn release(&self) -> u32 {
        match self
            .count
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        {
            Ok(previous) => previous - 1,
            Err(_) => 0,
        }
    }

    /// Hold a reference for the lifetime of the returned guard.
    pub fn lock(&self) -> ModuleLock<'_> {
        self.add_ref();
        ModuleLock { refs: self }
    }

    pub fn count(&self) -> u32 {
        self.count.load(Ordering::SeqCst)
    }

    /// `S_OK` when nothing holds the module, `S_FALSE` otherwise.
    pub fn can_unload_now(&self) -> Hresult {
        if self.count() == 0 {
            Hresult::S_OK
        } else {
            Hresult::S_FALSE
        }
    }
}

/// Releases its reference on drop.
#[must_use = "the module is unlocked as soon as the guard is dropped"]
#[derive(Debug)]
pub struct ModuleLock<'a> {
    refs: &'a ModuleRefs,
}

impl Drop for ModuleLock<'_> {
    fn drop(&mut self) {
        self.refs.release();
    }
}
