//! Loading libraries for `LoadLibraryShim`.

use corshim_shared::Result;

/// Opaque handle of a loaded module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleHandle(pub usize);

pub trait LibraryLoader: Send + Sync {
    fn load(&self, path: &str) -> Result<ModuleHandle>;
}

#[cfg(windows)]
pub use system::SystemLoader;

#[cfg(windows)]
mod system {
    use super::{LibraryLoader, ModuleHandle};
    use corshim_shared::Result;
    use tracing::debug;
    use windows::Win32::System::LibraryLoader::LoadLibraryW;
    use windows::core::PCWSTR;

    /// Loads through `LoadLibraryW`.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemLoader;

    impl LibraryLoader for SystemLoader {
        fn load(&self, path: &str) -> Result<ModuleHandle> {
            let wide_path: Vec<u16> = path.encode_utf16().chain(std::iter::once(0)).collect();
            let module = unsafe { LoadLibraryW(PCWSTR(wide_path.as_ptr())) }?;
            debug!(path, "Loaded library");
            Ok(ModuleHandle(module.0 as usize))
        }
    }
}
