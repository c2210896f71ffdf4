//! Entry points kept for compatibility that do little or nothing.
//!
//! Each one logs at `warn` so unexpected callers show up in the trace.

use corshim_shared::status::{Hresult, win32};
use corshim_shared::{Clsid, Error, Result};
use tracing::{trace, warn};

/// Culture passed by [`load_string_rc`].
pub const DEFAULT_CULTURE: i32 = -1;

/// Load string resource `res_id` into `buffer`.
///
/// No resources are bundled: the buffer is cleared and a non-zero id reports
/// `E_NOTIMPL`, id zero `E_FAIL`. Returns the status and the length of the
/// string left in the buffer.
pub fn load_string_rc_ex(culture: i32, res_id: u32, buffer: &mut [u16], quiet: bool) -> (Hresult, usize) {
    let Some(first) = buffer.first_mut() else {
        return (Hresult::E_INVALIDARG, 0);
    };
    *first = 0;

    let status = if res_id != 0 {
        warn!(culture, res_id, len = buffer.len(), quiet, "LoadStringRCEx: semi-stub");
        Hresult::E_NOTIMPL
    } else {
        Hresult::E_FAIL
    };
    let len = buffer.iter().take_while(|&&c| c != 0).count();
    (status, len)
}

pub fn load_string_rc(res_id: u32, buffer: &mut [u16], quiet: bool) -> Hresult {
    load_string_rc_ex(DEFAULT_CULTURE, res_id, buffer, quiet).0
}

pub fn lock_clr_version() -> Hresult {
    warn!("LockClrVersion: stub");
    Hresult::S_OK
}

pub fn co_initialize_cor(flags: u32) -> Hresult {
    warn!(flags, "CoInitializeCor: stub");
    Hresult::S_OK
}

pub fn get_assembly_md_import(file_name: Option<&str>, iid: &Clsid) -> Hresult {
    warn!(?file_name, %iid, "GetAssemblyMDImport: stub");
    Hresult::from_win32(win32::ERROR_CALL_NOT_IMPLEMENTED)
}

pub fn get_version_from_process(process: usize) -> Result<String> {
    warn!(process, "GetVersionFromProcess: stub");
    Err(Error::com("GetVersionFromProcess", Hresult::E_NOTIMPL))
}

pub fn clr_create_managed_instance(type_name: Option<&str>, iid: &Clsid) -> Hresult {
    warn!(?type_name, %iid, "ClrCreateManagedInstance: stub");
    Hresult::E_NOTIMPL
}

/// Always reports the signature as unverified.
pub fn strong_name_signature_verification(file_name: Option<&str>, flags: u32) -> bool {
    warn!(?file_name, flags, "StrongNameSignatureVerification: stub");
    false
}

pub fn strong_name_signature_verification_ex(file_name: Option<&str>, force: bool) -> bool {
    warn!(?file_name, force, "StrongNameSignatureVerificationEx: stub");
    false
}

pub fn cor_validate_image(image_name: Option<&str>) -> Hresult {
    trace!(?image_name, "_CorValidateImage: stub");
    Hresult::E_FAIL
}

/// Running managed executables directly is not supported.
pub fn cor_exe_main2(image_name: Option<&str>, command_line: Option<&str>) -> i32 {
    warn!(?image_name, ?command_line, "Directly running .NET applications not supported");
    -1
}

/// Entry point of mixed-mode images. Always succeeds.
pub fn cor_dll_main(reason: u32) -> bool {
    warn!(reason, "_CorDllMain: stub");
    true
}

pub fn cor_image_unloading(image_base: usize) {
    trace!(image_base, "_CorImageUnloading: stub");
}

pub fn cor_exit_process(exit_code: i32) -> ! {
    warn!(exit_code, "CorExitProcess: stub");
    std::process::exit(exit_code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_string_rejects_empty_buffer() {
        let mut buffer: [u16; 0] = [];
        assert_eq!(
            load_string_rc_ex(0x409, 7, &mut buffer, true),
            (Hresult::E_INVALIDARG, 0)
        );
    }

    #[test]
    fn test_load_string_clears_buffer() {
        let mut buffer = [b'x' as u16; 8];
        assert_eq!(
            load_string_rc_ex(0x409, 7, &mut buffer, false),
            (Hresult::E_NOTIMPL, 0)
        );
        assert_eq!(buffer[0], 0);

        let mut buffer = [b'x' as u16; 8];
        assert_eq!(load_string_rc(0, &mut buffer, false), Hresult::E_FAIL);
        assert_eq!(buffer[0], 0);
    }

    #[test]
    fn test_stub_codes() {
        assert_eq!(lock_clr_version(), Hresult::S_OK);
        assert_eq!(co_initialize_cor(0), Hresult::S_OK);
        assert_eq!(
            get_assembly_md_import(Some("a.dll"), &Clsid::nil()).code(),
            0x8007_0078
        );
        assert_eq!(
            get_version_from_process(0).unwrap_err().status(),
            Hresult::E_NOTIMPL
        );
        assert_eq!(
            clr_create_managed_instance(None, &Clsid::nil()),
            Hresult::E_NOTIMPL
        );
        assert!(!strong_name_signature_verification(Some("a.dll"), 0));
        assert!(!strong_name_signature_verification_ex(Some("a.dll"), true));
        assert_eq!(cor_validate_image(None), Hresult::E_FAIL);
        assert_eq!(cor_exe_main2(None, None), -1);
        cor_image_unloading(0);
        assert!(cor_dll_main(1));
    }
}
