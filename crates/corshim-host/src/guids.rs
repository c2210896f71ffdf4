//! Class and interface identifiers of the CLR hosting API.

use corshim_shared::Clsid;

pub const CLSID_CLR_META_HOST: Clsid = Clsid::from_u128(0x9280188d_0e8e_4867_b30c_7fa83884e8de);
pub const IID_ICLR_META_HOST: Clsid = Clsid::from_u128(0xD332DB9E_B9B3_4125_8207_A14884F53216);
pub const IID_ICLR_RUNTIME_INFO: Clsid = Clsid::from_u128(0xBD39D1D2_BA2F_486a_89B0_B4B0CB466891);
pub const CLSID_COR_RUNTIME_HOST: Clsid = Clsid::from_u128(0xcb2f6723_ab3a_11d2_9c40_00c04fa30a3e);
pub const IID_ICOR_RUNTIME_HOST: Clsid = Clsid::from_u128(0xcb2f6722_ab3a_11d2_9c40_00c04fa30a3e);

/// Display name the meta host is registered under.
pub const CLR_META_HOST_NAME: &str = "CLR MetaHost";
