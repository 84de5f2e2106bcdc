use std::fmt;
use std::io::{Read, Seek, SeekFrom};

use binrw::BinRead;
use log::debug;
use serde::Serialize;

use crate::error::{Error, Result};

const HEADER_OFFSET: u64 = 0x10000;
const OFFSET_XGD3: u64 = 0x2080000;
const OFFSET_XGD2: u64 = 0xFD90000;
pub const SECTOR_SIZE: u32 = 2048;
pub const MEDIA_MAGIC: &str = "MICROSOFT*XBOX*MEDIA";

/// Disc layout, identified by where the XDVDFS volume starts in the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IsoFormat {
    #[serde(rename = "XGD2")]
    Xgd2,
    #[serde(rename = "XGD3")]
    Xgd3,
}

impl IsoFormat {
    pub fn root_offset(self) -> u64 {
        match self {
            Self::Xgd2 => OFFSET_XGD2,
            Self::Xgd3 => OFFSET_XGD3,
        }
    }
}

impl fmt::Display for IsoFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Xgd2 => write!(f, "XGD2"),
            Self::Xgd3 => write!(f, "XGD3"),
        }
    }
}

#[derive(Debug, BinRead)]
#[br(little, magic = b"MICROSOFT*XBOX*MEDIA")]
struct VolumeDescriptor {
    root_dir_sector: u32,
    root_dir_size: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IsoMeta {
    pub format: IsoFormat,
    pub root_offset: u64,
    pub root_dir_sector: u32,
    pub root_dir_size: u32,
    /// Length of the whole image file in bytes.
    pub image_size: u64,
}

impl IsoMeta {
    pub fn new(format: IsoFormat, root_dir_sector: u32, root_dir_size: u32, image_size: u64) -> Self {
        Self {
            format,
            root_offset: format.root_offset(),
            root_dir_sector,
            root_dir_size,
            image_size,
        }
    }

    pub fn identifier(&self) -> &'static str {
        MEDIA_MAGIC
    }

    pub fn sector_size(&self) -> u32 {
        SECTOR_SIZE
    }

    pub fn volume_size(&self) -> u64 {
        self.image_size.saturating_sub(self.root_offset)
    }

    pub fn volume_sectors(&self) -> u64 {
        self.volume_size() / SECTOR_SIZE as u64
    }

    /// Absolute image position of a volume sector.
    pub fn sector_position(&self, sector: u32) -> u64 {
        self.root_offset + sector as u64 * SECTOR_SIZE as u64
    }
}

fn find_descriptor<R: Read + Seek>(reader: &mut R, root_offset: u64) -> Result<Option<VolumeDescriptor>> {
    reader.seek(SeekFrom::Start(root_offset + HEADER_OFFSET))?;
    match VolumeDescriptor::read(reader) {
        Ok(descriptor) => Ok(Some(descriptor)),
        Err(e) if e.is_eof() => Ok(None),
        Err(e) if matches!(e.root_cause(), binrw::Error::BadMagic { .. }) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn get_iso_meta<R: Read + Seek>(reader: &mut R) -> Result<IsoMeta> {
    // an XDVDFS volume at the very start is an original Xbox image
    if find_descriptor(reader, 0)?.is_some() {
        return Err(Error::OriginalXbox);
    }

    for format in [IsoFormat::Xgd2, IsoFormat::Xgd3] {
        debug!("looking for {} volume at {:#x}", format, format.root_offset());
        if let Some(descriptor) = find_descriptor(reader, format.root_offset())? {
            let image_size = reader.seek(SeekFrom::End(0))?;
            debug!(
                "found {} volume, root directory at sector {} ({} bytes)",
                format, descriptor.root_dir_sector, descriptor.root_dir_size
            );
            return Ok(IsoMeta::new(
                format,
                descriptor.root_dir_sector,
                descriptor.root_dir_size,
                image_size,
            ));
        }
    }

    Err(Error::UnknownFormat)
}
