//! Class identifiers.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// A COM class identifier (CLSID / IID).
///
/// Displays in the registry form produced by `StringFromGUID2`:
/// braced, upper-case and hyphenated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Clsid(Uuid);

impl Clsid {
    pub const fn from_u128(value: u128) -> Self {
        Clsid(Uuid::from_u128(value))
    }

    pub const fn nil() -> Self {
        Clsid(Uuid::nil())
    }

    pub const fn as_u128(&self) -> u128 {
        self.0.as_u128()
    }

    /// Parse either the braced registry form or a bare hyphenated GUID.
    pub fn parse(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let bare = trimmed
            .strip_prefix('{')
            .and_then(|rest| rest.strip_suffix('}'))
            .unwrap_or(trimmed);
        Uuid::parse_str(bare)
            .map(Clsid)
            .map_err(|_| Error::InvalidClsid(s.to_string()))
    }

    /// The subkey name this class is stored under.
    pub fn key_name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Clsid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut buf = Uuid::encode_buffer();
        f.write_str(self.0.braced().encode_upper(&mut buf))
    }
}

impl FromStr for Clsid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Clsid::parse(s)
    }
}

impl TryFrom<String> for Clsid {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Clsid::parse(&s)
    }
}

impl From<Clsid> for String {
    fn from(clsid: Clsid) -> Self {
        clsid.to_string()
    }
}

#[cfg(windows)]
impl From<windows::core::GUID> for Clsid {
    fn from(guid: windows::core::GUID) -> Self {
        Clsid::from_u128(guid.to_u128())
    }
}

#[cfg(windows)]
impl From<Clsid> for windows::core::GUID {
    fn from(clsid: Clsid) -> Self {
        windows::core::GUID::from_u128(clsid.as_u128())
    }
}
