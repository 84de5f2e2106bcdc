//! Xbox 360 executable (`XEX2`) header decoding.
//!
//! Only the plain header area is read: the optional header table and the
//! structures it points to. The PE basefile behind `pe_data_offset` is
//! encrypted and compressed on retail discs and is left untouched.

use std::fmt;
use std::io::Cursor;
use std::path::Path;

use binrw::BinRead;
use bitflags::bitflags;
use log::debug;
use serde::{Serialize, Serializer};

use crate::error::{Error, Result, XexFault};

pub const XEX_MAGIC: &[u8; 4] = b"XEX2";
const HEADER_TABLE_OFFSET: u64 = 0x18;
const HEADER_ENTRY_SIZE: u64 = 8;

/// Optional header keys decoded by [`Xex`].
pub mod keys {
    pub const ENTRY_POINT: u32 = 0x0001_0100;
    pub const IMAGE_BASE_ADDRESS: u32 = 0x0001_0201;
    pub const ORIGINAL_PE_NAME: u32 = 0x0001_83FF;
    pub const SYSTEM_FLAGS: u32 = 0x0003_0000;
    pub const EXECUTION_INFO: u32 = 0x0004_0006;
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ModuleFlags: u32 {
        const TITLE = 0x01;
        const EXPORTS_TO_TITLE = 0x02;
        const SYSTEM_DEBUGGER = 0x04;
        const DLL_MODULE = 0x08;
        const MODULE_PATCH = 0x10;
        const PATCH_FULL = 0x20;
        const PATCH_DELTA = 0x40;
        const USER_MODE = 0x80;
    }
}

impl ModuleFlags {
    /// Lower-case names of the set flags, in bit order.
    pub fn names(&self) -> Vec<String> {
        self.iter_names().map(|(name, _)| name.to_lowercase()).collect()
    }
}

impl Serialize for ModuleFlags {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.names().serialize(serializer)
    }
}

macro_rules! hex_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, BinRead)]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{:08X}", self.0)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(
                &self,
                serializer: S,
            ) -> std::result::Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }
    };
}

hex_id!(TitleId);
hex_id!(MediaId);

impl TitleId {
    /// Two character alphanumeric publisher code held in the upper half, e.g. `MS` for `4D53xxxx`.
    pub fn publisher(&self) -> Option<String> {
        let [a, b, _, _] = self.0.to_be_bytes();
        if a.is_ascii_alphanumeric() && b.is_ascii_alphanumeric() {
            Some(format!("{}{}", a as char, b as char))
        } else {
            None
        }
    }

    pub fn game_number(&self) -> u16 {
        (self.0 & 0xffff) as u16
    }
}

/// Packed `major:4 minor:4 build:16 qfe:8` version number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead)]
pub struct Version(pub u32);

impl Version {
    pub fn major(&self) -> u8 {
        (self.0 >> 28) as u8
    }

    pub fn minor(&self) -> u8 {
        ((self.0 >> 24) & 0xf) as u8
    }

    pub fn build(&self) -> u16 {
        ((self.0 >> 8) & 0xffff) as u16
    }

    pub fn qfe(&self) -> u8 {
        (self.0 & 0xff) as u8
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}.{}", self.major(), self.minor(), self.build(), self.qfe())
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, BinRead)]
#[br(big)]
struct XexPrelude {
    _magic: [u8; 4],
    module_flags: u32,
    pe_data_offset: u32,
    _reserved: u32,
    security_info_offset: u32,
    header_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead)]
#[br(big)]
pub struct OptionalHeader {
    pub key: u32,
    pub value: u32,
}

impl OptionalHeader {
    /// Whether `value` holds the data itself rather than an offset to it.
    pub fn is_inline(&self) -> bool {
        matches!(self.key & 0xff, 0x00 | 0x01)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, Serialize)]
#[br(big)]
pub struct ExecutionInfo {
    pub media_id: MediaId,
    pub version: Version,
    pub base_version: Version,
    pub title_id: TitleId,
    pub platform: u8,
    pub executable_type: u8,
    pub disc_number: u8,
    pub disc_count: u8,
}

#[derive(Debug, BinRead)]
#[br(big)]
struct SizedName {
    size: u32,
    #[br(count = size.saturating_sub(4))]
    bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Xex {
    pub module_flags: ModuleFlags,
    pub pe_data_offset: u32,
    pub security_info_offset: u32,
    pub headers: Vec<OptionalHeader>,
    pub execution_info: ExecutionInfo,
    pub original_name: Option<String>,
    pub entry_point: Option<u32>,
    pub image_base: Option<u32>,
    pub system_flags: Option<u32>,
}

impl Xex {
    pub fn is_xex(data: &[u8]) -> bool {
        data.starts_with(XEX_MAGIC)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::parse(&data)
    }

    pub fn parse(data: &[u8]) -> Result<Self> {
        if !Self::is_xex(data) {
            return Err(Error::InvalidXex(XexFault::BadMagic));
        }

        let mut cursor = Cursor::new(data);
        let prelude = XexPrelude::read(&mut cursor)?;

        if prelude.pe_data_offset as u64 > data.len() as u64 {
            return Err(Error::InvalidXex(XexFault::CodeBeyondEnd));
        }
        if prelude.security_info_offset > prelude.pe_data_offset {
            return Err(Error::InvalidXex(XexFault::CertificateBeyondCode));
        }
        if prelude.header_count as u64 * HEADER_ENTRY_SIZE + HEADER_TABLE_OFFSET
            > prelude.pe_data_offset as u64
        {
            return Err(Error::InvalidXex(XexFault::HeaderTableSpill));
        }

        let headers = (0..prelude.header_count)
            .map(|_| OptionalHeader::read(&mut cursor))
            .collect::<binrw::BinResult<Vec<_>>>()?;
        debug!("Xex has {} optional headers", headers.len());

        let find = |key: u32| headers.iter().find(|h| h.key == key).copied();

        let execution_info = match find(keys::EXECUTION_INFO) {
            Some(header) => {
                cursor.set_position(header.value as u64);
                ExecutionInfo::read(&mut cursor)?
            }
            None => return Err(Error::MissingExecutionInfo),
        };

        let original_name = match find(keys::ORIGINAL_PE_NAME) {
            Some(header) => {
                cursor.set_position(header.value as u64);
                let name = SizedName::read(&mut cursor)?;
                let end = name.bytes.iter().position(|&b| b == 0).unwrap_or(name.bytes.len());
                Some(String::from_utf8_lossy(&name.bytes[..end]).to_string())
            }
            None => None,
        };

        Ok(Xex {
            module_flags: ModuleFlags::from_bits_retain(prelude.module_flags),
            pe_data_offset: prelude.pe_data_offset,
            security_info_offset: prelude.security_info_offset,
            execution_info,
            original_name,
            entry_point: find(keys::ENTRY_POINT).map(|h| h.value),
            image_base: find(keys::IMAGE_BASE_ADDRESS).map(|h| h.value),
            system_flags: find(keys::SYSTEM_FLAGS).map(|h| h.value),
            headers,
        })
    }

    pub fn header(&self, key: u32) -> Option<&OptionalHeader> {
        self.headers.iter().find(|h| h.key == key)
    }

    pub fn title_id(&self) -> TitleId {
        self.execution_info.title_id
    }

    pub fn media_id(&self) -> MediaId {
        self.execution_info.media_id
    }
}
