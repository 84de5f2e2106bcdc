use std::collections::HashSet;
use std::io::{Read, Seek, SeekFrom};

use binrw::BinRead;
use log::{debug, trace};

use crate::error::{Error, Result};
use crate::meta::IsoMeta;

const ATTR_DIRECTORY: u8 = 0x10;
const PADDING_OFFSET: u16 = 0xffff;
const MAX_DEPTH: usize = 64;

#[derive(Debug, Eq, Ord, PartialEq, PartialOrd, Clone, BinRead)]
#[br(little)]
pub struct DirEntry {
    pub left_offset: u16,
    pub right_offset: u16,
    pub sector: u32,
    pub size: u32,
    pub attributes: u8,
    name_len: u8,
    #[br(count = name_len)]
    #[br(map = |s: Vec<u8>| String::from_utf8_lossy(&s).to_string())]
    pub name: String,
    #[br(ignore)]
    pub subdir: Option<Vec<DirEntry>>,
}

impl DirEntry {
    pub fn is_dir(&self) -> bool {
        self.attributes & ATTR_DIRECTORY == ATTR_DIRECTORY
    }
}

/// Walk state shared by every directory of one tree.
struct TreeWalk<'a> {
    meta: &'a IsoMeta,
    dir_sectors: HashSet<u32>,
}

impl TreeWalk<'_> {
    fn parse_dir<R: Read + Seek>(
        &mut self,
        reader: &mut R,
        sector: u32,
        size: u32,
        depth: usize,
    ) -> Result<Vec<DirEntry>> {
        if depth > MAX_DEPTH {
            return Err(Error::CorruptDirectory(format!(
                "directories nested deeper than {} levels",
                MAX_DEPTH
            )));
        }

        let mut entries = Vec::<DirEntry>::new();
        if size == 0 {
            return Ok(entries);
        }

        // each directory sector belongs to exactly one parent record
        if !self.dir_sectors.insert(sector) {
            return Err(Error::CorruptDirectory(format!(
                "directory at sector {} is referenced twice",
                sector
            )));
        }

        let dir_position = self.meta.sector_position(sector);
        let mut visited = HashSet::<u16>::new();
        let mut pending = vec![0_u16];

        while let Some(offset) = pending.pop() {
            let relative = offset as u64 * 4;
            if relative >= size as u64 {
                return Err(Error::CorruptDirectory(format!(
                    "record offset {:#x} is outside the directory at sector {}",
                    relative, sector
                )));
            }
            if !visited.insert(offset) {
                return Err(Error::CorruptDirectory(format!(
                    "record offset {:#x} is referenced twice in the directory at sector {}",
                    relative, sector
                )));
            }

            reader.seek(SeekFrom::Start(dir_position + relative))?;
            let mut record = DirEntry::read(reader)?;

            if record.left_offset == PADDING_OFFSET {
                trace!("padding at offset {:#x} of sector {}", relative, sector);
                continue;
            }

            if record.right_offset != 0 {
                pending.push(record.right_offset);
            }
            if record.left_offset != 0 {
                pending.push(record.left_offset);
            }

            record.subdir = if record.is_dir() {
                Some(self.parse_dir(reader, record.sector, record.size, depth + 1)?)
            } else {
                None
            };

            entries.push(record);
        }
        entries.sort_by_key(|rec| rec.name.to_lowercase());

        Ok(entries)
    }
}

pub fn parse_root<R: Read + Seek>(reader: &mut R, meta: &IsoMeta) -> Result<Vec<DirEntry>> {
    debug!(
        "parsing root directory at sector {} ({} bytes)",
        meta.root_dir_sector, meta.root_dir_size
    );
    let mut walk = TreeWalk {
        meta,
        dir_sectors: HashSet::new(),
    };
    walk.parse_dir(reader, meta.root_dir_sector, meta.root_dir_size, 0)
}

/// Case-insensitive lookup of a name in one directory listing.
pub fn find<'a>(entries: &'a [DirEntry], name: &str) -> Option<&'a DirEntry> {
    entries.iter().find(|e| e.name.eq_ignore_ascii_case(name))
}

/// Resolves a `/` or `\` separated path below `entries`.
pub fn find_path<'a>(entries: &'a [DirEntry], path: &str) -> Option<&'a DirEntry> {
    let mut segments = path
        .split(['/', '\\'])
        .filter(|s| !s.is_empty())
        .peekable();

    let mut dir = entries;
    while let Some(segment) = segments.next() {
        let entry = find(dir, segment)?;
        if segments.peek().is_none() {
            return Some(entry);
        }
        dir = entry.subdir.as_deref()?;
    }
    None
}
