use serde::Serialize;

use crate::meta::{IsoFormat, IsoMeta};
use crate::xex::{MediaId, ModuleFlags, TitleId, Version, Xex};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IsoInfo {
    pub format: IsoFormat,
    pub identifier: String,
    pub sector_size: u32,
    pub root_offset: u64,
    pub root_dir_sector: u32,
    pub root_dir_size: u32,
    pub image_size: u64,
    pub volume_size: u64,
    pub volume_sectors: u64,
}

impl From<&IsoMeta> for IsoInfo {
    fn from(meta: &IsoMeta) -> Self {
        Self {
            format: meta.format,
            identifier: meta.identifier().to_string(),
            sector_size: meta.sector_size(),
            root_offset: meta.root_offset,
            root_dir_sector: meta.root_dir_sector,
            root_dir_size: meta.root_dir_size,
            image_size: meta.image_size,
            volume_size: meta.volume_size(),
            volume_sectors: meta.volume_sectors(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct XexInfo {
    pub media_id: MediaId,
    pub title_id: TitleId,
    pub publisher: Option<String>,
    pub version: Version,
    pub base_version: Version,
    pub platform: u8,
    pub executable_type: u8,
    pub disc_number: u8,
    pub disc_count: u8,
    pub module_flags: ModuleFlags,
    pub original_name: Option<String>,
}

impl From<&Xex> for XexInfo {
    fn from(xex: &Xex) -> Self {
        let info = &xex.execution_info;
        Self {
            media_id: info.media_id,
            title_id: info.title_id,
            publisher: info.title_id.publisher(),
            version: info.version,
            base_version: info.base_version,
            platform: info.platform,
            executable_type: info.executable_type,
            disc_number: info.disc_number,
            disc_count: info.disc_count,
            module_flags: xex.module_flags,
            original_name: xex.original_name.clone(),
        }
    }
}

/// Everything learned about one ISO image or Xex file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Properties {
    pub game_name: Option<String>,
    #[serde(flatten)]
    pub xex: XexInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iso: Option<IsoInfo>,
}

impl Properties {
    pub fn game_name(&self) -> Option<&str> {
        self.game_name.as_deref()
    }

    pub fn title_id(&self) -> TitleId {
        self.xex.title_id
    }

    pub fn media_id(&self) -> MediaId {
        self.xex.media_id
    }

    /// Flat `key -> value` rendering, in report order. Absent values are left out.
    pub fn to_map(&self) -> Vec<(&'static str, String)> {
        let mut map = Vec::new();
        let xex = &self.xex;

        if let Some(name) = &self.game_name {
            map.push(("game_name", name.clone()));
        }
        map.push(("title_id", xex.title_id.to_string()));
        if let Some(publisher) = &xex.publisher {
            map.push(("publisher", publisher.clone()));
        }
        map.push(("media_id", xex.media_id.to_string()));
        map.push(("version", xex.version.to_string()));
        map.push(("base_version", xex.base_version.to_string()));
        map.push(("platform", xex.platform.to_string()));
        map.push(("executable_type", xex.executable_type.to_string()));
        map.push(("disc_number", xex.disc_number.to_string()));
        map.push(("disc_count", xex.disc_count.to_string()));
        map.push(("module_flags", xex.module_flags.names().join(",")));
        if let Some(original_name) = &xex.original_name {
            map.push(("original_name", original_name.clone()));
        }

        if let Some(iso) = &self.iso {
            map.push(("format", iso.format.to_string()));
            map.push(("identifier", iso.identifier.clone()));
            map.push(("sector_size", iso.sector_size.to_string()));
            map.push(("root_offset", format!("{:#x}", iso.root_offset)));
            map.push(("root_dir_sector", iso.root_dir_sector.to_string()));
            map.push(("root_dir_size", iso.root_dir_size.to_string()));
            map.push(("image_size", iso.image_size.to_string()));
            map.push(("volume_size", iso.volume_size.to_string()));
            map.push(("volume_sectors", iso.volume_sectors.to_string()));
        }

        map
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.to_map()
            .into_iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v)
    }
}
