//! Exported entry points of the shim DLL.
//!
//! Every export converts its raw arguments, calls into the process-wide
//! [`ShimHost`] and converts the result back into an `HRESULT`.

#![allow(non_snake_case)]

use crate::loader::SystemLoader;
use crate::refs::ModuleRefs;
use crate::runtime::{ComObject, InterfacePtr, NoRuntimeResolver, RuntimeRequest, RuntimeResolver};
use crate::shim::ShimHost;
use crate::stubs;
use corshim_shared::marshal::{read_wide_growing, write_wide_out};
use corshim_shared::{Clsid, Hresult, Result, WindowsRegistry};
use std::ffi::c_void;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::{debug, error};
use windows::Win32::Foundation::HMODULE;
use windows::Win32::System::LibraryLoader::GetModuleFileNameW;
use windows::core::{GUID, HRESULT, PCWSTR};

const DLL_PROCESS_DETACH: u32 = 0;
const DLL_PROCESS_ATTACH: u32 = 1;
const MAX_PATH: usize = 260;

static HOST: OnceLock<ShimHost<WindowsRegistry>> = OnceLock::new();
static MODULE: AtomicUsize = AtomicUsize::new(0);

/// Install the host used by every export. Fails if one is already in use.
pub fn install_host(host: ShimHost<WindowsRegistry>) -> std::result::Result<(), ShimHost<WindowsRegistry>> {
    HOST.set(host)
}

/// Install a host built around `resolver` with the system registry and loader.
pub fn install_resolver(resolver: Arc<dyn RuntimeResolver>) -> bool {
    install_host(ShimHost::new(resolver, WindowsRegistry::new(), Box::new(SystemLoader))).is_ok()
}

fn host() -> &'static ShimHost<WindowsRegistry> {
    HOST.get_or_init(|| {
        ShimHost::new(
            Arc::new(NoRuntimeResolver),
            WindowsRegistry::new(),
            Box::new(SystemLoader),
        )
    })
}

fn to_hresult(result: Result<()>) -> HRESULT {
    match result {
        Ok(()) => Hresult::S_OK.into(),
        Err(e) => e.status().into(),
    }
}

/// Read a NUL-terminated wide string. `None` for a null pointer.
unsafe fn read_wide(s: PCWSTR) -> Option<String> {
    if s.is_null() {
        return None;
    }
    unsafe {
        let len = (0..).take_while(|&i| *s.0.add(i) != 0).count();
        Some(String::from_utf16_lossy(std::slice::from_raw_parts(s.0, len)))
    }
}

unsafe fn read_guid(guid: *const GUID) -> Option<Clsid> {
    if guid.is_null() {
        None
    } else {
        Some(Clsid::from(unsafe { *guid }))
    }
}

/// Copy `value` into a caller buffer of `cch` code units and report the
/// length needed, including the terminator, through `length`. A null buffer
/// only asks for the length.
unsafe fn write_string(value: Result<String>, buffer: *mut u16, cch: u32, length: *mut u32) -> HRESULT {
    let value = match value {
        Ok(value) => value,
        Err(e) => return e.status().into(),
    };

    let buf: Option<&mut [u16]> = if buffer.is_null() {
        None
    } else if cch == 0 {
        Some(Default::default())
    } else {
        Some(unsafe { std::slice::from_raw_parts_mut(buffer, cch as usize) })
    };

    let (status, written) = write_wide_out(&value, buf);
    if !length.is_null() {
        unsafe { *length = written as u32 };
    }
    status.into()
}

/// Hand an object created by the runtime back through `out`.
unsafe fn write_object(object: Result<ComObject>, out: *mut *mut c_void) -> HRESULT {
    match object {
        Ok(object) => match object.downcast::<InterfacePtr>() {
            Ok(ptr) => {
                unsafe { *out = ptr.0 as *mut c_void };
                Hresult::S_OK.into()
            }
            Err(_) => {
                error!("Runtime returned an object without a native interface");
                Hresult::E_NOINTERFACE.into()
            }
        },
        Err(e) => e.status().into(),
    }
}

/// Path of this DLL, used as the server path when registering.
fn module_path() -> Option<String> {
    let module = HMODULE(MODULE.load(Ordering::SeqCst) as *mut c_void);
    read_wide_growing(MAX_PATH, |buf| unsafe {
        GetModuleFileNameW(Some(module), buf) as usize
    })
}

/// DLL entry point for Windows.
#[unsafe(no_mangle)]
pub unsafe extern "system" fn DllMain(
    hinst_dll: *mut c_void,
    fdw_reason: u32,
    _lpv_reserved: *mut c_void,
) -> i32 {
    match fdw_reason {
        DLL_PROCESS_ATTACH => MODULE.store(hinst_dll as usize, Ordering::SeqCst),
        DLL_PROCESS_DETACH => {
            if let Some(host) = HOST.get() {
                host.shutdown();
            }
        }
        _ => {}
    }

    1 // TRUE
}

/// `S_OK` unless an in-module object holds a [`crate::ModuleLock`].
#[unsafe(no_mangle)]
pub unsafe extern "system" fn DllCanUnloadNow() -> HRESULT {
    ModuleRefs::global().can_unload_now().into()
}

fn register_self(register: bool) -> HRESULT {
    let Some(path) = module_path() else {
        error!("Failed to get the module path");
        return Hresult::E_FAIL.into();
    };
    to_hresult(host().register_server(&path, register))
}

#[unsafe(no_mangle)]
pub unsafe extern "system" fn DllRegisterServer() -> HRESULT {
    register_self(true)
}

#[unsafe(no_mangle)]
pub unsafe extern "system" fn DllUnregisterServer() -> HRESULT {
    register_self(false)
}

/// Only classes in the class table are known. No class factory objects are
/// provided, so a known class reports `E_NOTIMPL`.
#[unsafe(no_mangle)]
pub unsafe extern "system" fn DllGetClassObject(
    rclsid: *const GUID,
    _riid: *const GUID,
    ppv: *mut *mut c_void,
) -> HRESULT {
    if ppv.is_null() {
        return Hresult::E_INVALIDARG.into();
    }
    unsafe { *ppv = std::ptr::null_mut() };

    match unsafe { read_guid(rclsid) } {
        Some(clsid) if host().classes().get(&clsid).is_some() => {
            debug!(%clsid, "DllGetClassObject: no class factory");
            Hresult::E_NOTIMPL.into()
        }
        _ => Hresult::CLASS_E_CLASSNOTAVAILABLE.into(),
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "system" fn CLRCreateInstance(
    clsid: *const GUID,
    riid: *const GUID,
    pp_interface: *mut *mut c_void,
) -> HRESULT {
    if pp_interface.is_null() {
        return Hresult::E_POINTER.into();
    }
    let (Some(clsid), Some(iid)) = (unsafe { read_guid(clsid) }, unsafe { read_guid(riid) }) else {
        return Hresult::E_INVALIDARG.into();
    };
    unsafe { write_object(host().clr_create_instance(&clsid, &iid), pp_interface) }
}

#[unsafe(no_mangle)]
pub unsafe extern "system" fn CorBindToRuntimeHost(
    pwsz_version: PCWSTR,
    pwsz_build_flavor: PCWSTR,
    pwsz_host_config_file: PCWSTR,
    _p_reserved: *mut c_void,
    startup_flags: u32,
    rclsid: *const GUID,
    riid: *const GUID,
    ppv: *mut *mut c_void,
) -> HRESULT {
    if ppv.is_null() {
        return Hresult::E_POINTER.into();
    }
    unsafe { *ppv = std::ptr::null_mut() };
    let (Some(clsid), Some(iid)) = (unsafe { read_guid(rclsid) }, unsafe { read_guid(riid) }) else {
        return Hresult::E_INVALIDARG.into();
    };

    let version = unsafe { read_wide(pwsz_version) };
    let flavor = unsafe { read_wide(pwsz_build_flavor) };
    let config = unsafe { read_wide(pwsz_host_config_file) }.map(PathBuf::from);
    let object = host().cor_bind_to_runtime_host(
        version.as_deref(),
        flavor.as_deref(),
        config.as_deref(),
        startup_flags,
        &clsid,
        &iid,
    );
    unsafe { write_object(object, ppv) }
}

#[unsafe(no_mangle)]
pub unsafe extern "system" fn CorBindToRuntimeEx(
    sz_version: PCWSTR,
    sz_build_flavor: PCWSTR,
    startup_flags: u32,
    rclsid: *const GUID,
    riid: *const GUID,
    ppv: *mut *mut c_void,
) -> HRESULT {
    if ppv.is_null() {
        return Hresult::E_POINTER.into();
    }
    unsafe { *ppv = std::ptr::null_mut() };
    let (Some(clsid), Some(iid)) = (unsafe { read_guid(rclsid) }, unsafe { read_guid(riid) }) else {
        return Hresult::E_INVALIDARG.into();
    };

    let version = unsafe { read_wide(sz_version) };
    let flavor = unsafe { read_wide(sz_build_flavor) };
    let object = host().cor_bind_to_runtime_ex(
        version.as_deref(),
        flavor.as_deref(),
        startup_flags,
        &clsid,
        &iid,
    );
    unsafe { write_object(object, ppv) }
}

#[unsafe(no_mangle)]
pub unsafe extern "system" fn GetCORVersion(pbuffer: *mut u16, cch_buffer: u32, dw_length: *mut u32) -> HRESULT {
    if pbuffer.is_null() || dw_length.is_null() {
        return Hresult::E_POINTER.into();
    }
    unsafe { write_string(host().get_cor_version(), pbuffer, cch_buffer, dw_length) }
}

#[unsafe(no_mangle)]
pub unsafe extern "system" fn GetCORSystemDirectory(
    pbuffer: *mut u16,
    cch_buffer: u32,
    dw_length: *mut u32,
) -> HRESULT {
    if pbuffer.is_null() || dw_length.is_null() {
        return Hresult::E_POINTER.into();
    }
    unsafe { write_string(host().get_cor_system_directory(), pbuffer, cch_buffer, dw_length) }
}

#[unsafe(no_mangle)]
pub unsafe extern "system" fn GetRequestedRuntimeInfo(
    p_exe: PCWSTR,
    pwsz_version: PCWSTR,
    p_configuration_file: PCWSTR,
    startup_flags: u32,
    runtime_info_flags: u32,
    p_directory: *mut u16,
    dw_directory: u32,
    dw_directory_length: *mut u32,
    p_version: *mut u16,
    cch_buffer: u32,
    dw_length: *mut u32,
) -> HRESULT {
    let request = RuntimeRequest {
        exe: unsafe { read_wide(p_exe) }.map(PathBuf::from),
        version: unsafe { read_wide(pwsz_version) },
        config_file: unsafe { read_wide(p_configuration_file) }.map(PathBuf::from),
        startup_flags,
        runtime_info_flags,
        legacy: true,
    };

    let runtime = match host().get_requested_runtime_info(&request) {
        Ok(runtime) => runtime,
        Err(e) => return e.status().into(),
    };
    let hr = unsafe { write_string(Ok(runtime.version), p_version, cch_buffer, dw_length) };
    if hr.is_err() {
        return hr;
    }
    unsafe {
        write_string(
            Ok(runtime.directory),
            p_directory,
            dw_directory,
            dw_directory_length,
        )
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "system" fn LoadLibraryShim(
    sz_dll_name: PCWSTR,
    sz_version: PCWSTR,
    _pv_reserved: *mut c_void,
    ph_mod_dll: *mut *mut c_void,
) -> HRESULT {
    if ph_mod_dll.is_null() {
        return Hresult::E_POINTER.into();
    }
    let Some(dll_name) = (unsafe { read_wide(sz_dll_name) }) else {
        return Hresult::E_POINTER.into();
    };
    let version = unsafe { read_wide(sz_version) };

    match host().load_library_shim(&dll_name, version.as_deref()) {
        Ok(module) => {
            unsafe { *ph_mod_dll = module.0 as *mut c_void };
            Hresult::S_OK.into()
        }
        Err(e) => {
            unsafe { *ph_mod_dll = std::ptr::null_mut() };
            e.status().into()
        }
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "system" fn LoadStringRCEx(
    culture: i32,
    res_id: u32,
    p_buffer: *mut u16,
    i_buf_len: i32,
    b_quiet: i32,
    p_buf_len: *mut i32,
) -> HRESULT {
    if p_buffer.is_null() || i_buf_len <= 0 {
        return Hresult::E_INVALIDARG.into();
    }
    let buffer = unsafe { std::slice::from_raw_parts_mut(p_buffer, i_buf_len as usize) };
    let (status, len) = stubs::load_string_rc_ex(culture, res_id, buffer, b_quiet != 0);
    if !p_buf_len.is_null() {
        unsafe { *p_buf_len = len as i32 };
    }
    status.into()
}

#[unsafe(no_mangle)]
pub unsafe extern "system" fn LoadStringRC(res_id: u32, p_buffer: *mut u16, i_buf_len: i32, b_quiet: i32) -> HRESULT {
    unsafe {
        LoadStringRCEx(
            stubs::DEFAULT_CULTURE,
            res_id,
            p_buffer,
            i_buf_len,
            b_quiet,
            std::ptr::null_mut(),
        )
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "system" fn LockClrVersion(
    _host_callback: *mut c_void,
    _p_begin_host_setup: *mut c_void,
    _p_end_host_setup: *mut c_void,
) -> HRESULT {
    stubs::lock_clr_version().into()
}

#[unsafe(no_mangle)]
pub unsafe extern "system" fn CoInitializeCor(f_flags: u32) -> HRESULT {
    stubs::co_initialize_cor(f_flags).into()
}

#[unsafe(no_mangle)]
pub unsafe extern "system" fn CorExitProcess(exit_code: i32) {
    stubs::cor_exit_process(exit_code)
}

#[unsafe(no_mangle)]
pub unsafe extern "system" fn _CorDllMain(
    _hinst_dll: *mut c_void,
    fdw_reason: u32,
    _lpv_reserved: *mut c_void,
) -> i32 {
    stubs::cor_dll_main(fdw_reason) as i32
}

#[unsafe(no_mangle)]
pub unsafe extern "system" fn _CorExeMain2(
    _ptr_memory: *mut u8,
    _cnt_memory: u32,
    image_name: PCWSTR,
    _loader_name: PCWSTR,
    cmd_line: PCWSTR,
) -> i32 {
    let image_name = unsafe { read_wide(image_name) };
    let cmd_line = unsafe { read_wide(cmd_line) };
    stubs::cor_exe_main2(image_name.as_deref(), cmd_line.as_deref())
}

#[unsafe(no_mangle)]
pub unsafe extern "system" fn _CorImageUnloading(image_base: *mut c_void) {
    stubs::cor_image_unloading(image_base as usize)
}

#[unsafe(no_mangle)]
pub unsafe extern "system" fn _CorValidateImage(
    _image_base: *mut *mut c_void,
    image_name: PCWSTR,
) -> HRESULT {
    let image_name = unsafe { read_wide(image_name) };
    stubs::cor_validate_image(image_name.as_deref()).into()
}

#[unsafe(no_mangle)]
pub unsafe extern "system" fn CorBindToCurrentRuntime(
    filename: PCWSTR,
    rclsid: *const GUID,
    riid: *const GUID,
    ppv: *mut *mut c_void,
) -> HRESULT {
    if !ppv.is_null() {
        unsafe { *ppv = std::ptr::null_mut() };
    }
    let file = unsafe { read_wide(filename) };
    let clsid = unsafe { read_guid(rclsid) }.unwrap_or_else(Clsid::nil);
    let iid = unsafe { read_guid(riid) }.unwrap_or_else(Clsid::nil);
    match host().cor_bind_to_current_runtime(file.as_deref(), &clsid, &iid) {
        Ok(_) => Hresult::S_OK.into(),
        Err(e) => e.status().into(),
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "system" fn GetAssemblyMDImport(
    sz_file_name: PCWSTR,
    riid: *const GUID,
    _pp_iunk: *mut *mut c_void,
) -> HRESULT {
    let file_name = unsafe { read_wide(sz_file_name) };
    let iid = unsafe { read_guid(riid) }.unwrap_or_else(Clsid::nil);
    stubs::get_assembly_md_import(file_name.as_deref(), &iid).into()
}

#[unsafe(no_mangle)]
pub unsafe extern "system" fn GetVersionFromProcess(
    h_process: *mut c_void,
    p_version: *mut u16,
    cch_buffer: u32,
    dw_length: *mut u32,
) -> HRESULT {
    unsafe {
        write_string(
            stubs::get_version_from_process(h_process as usize),
            p_version,
            cch_buffer,
            dw_length,
        )
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "system" fn ClrCreateManagedInstance(
    p_type_name: PCWSTR,
    riid: *const GUID,
    pp_object: *mut *mut c_void,
) -> HRESULT {
    if !pp_object.is_null() {
        unsafe { *pp_object = std::ptr::null_mut() };
    }
    let type_name = unsafe { read_wide(p_type_name) };
    let iid = unsafe { read_guid(riid) }.unwrap_or_else(Clsid::nil);
    stubs::clr_create_managed_instance(type_name.as_deref(), &iid).into()
}

#[unsafe(no_mangle)]
pub unsafe extern "system" fn StrongNameSignatureVerification(
    filename: PCWSTR,
    in_flags: u32,
    _p_out_flags: *mut u32,
) -> i32 {
    let filename = unsafe { read_wide(filename) };
    stubs::strong_name_signature_verification(filename.as_deref(), in_flags) as i32
}

#[unsafe(no_mangle)]
pub unsafe extern "system" fn StrongNameSignatureVerificationEx(
    filename: PCWSTR,
    force_verification: i32,
    _p_verified: *mut i32,
) -> i32 {
    let filename = unsafe { read_wide(filename) };
    stubs::strong_name_signature_verification_ex(filename.as_deref(), force_verification != 0)
        as i32
}
