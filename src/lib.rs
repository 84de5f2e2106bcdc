//! Reads game metadata from Xbox360 disc images and executables.
//!
//! ```no_run
//! use xiso_info::{GameNameLookup, Xbox360Iso};
//!
//! let mut parser = Xbox360Iso::new().with_lookup(GameNameLookup::from_path("GameNameLookup.csv")?);
//! let props = parser.parse("game.iso")?;
//! for (key, value) in props.to_map() {
//!     println!("{}: {}", key, value);
//! }
//! # Ok::<(), xiso_info::Error>(())
//! ```

pub mod entry;
pub mod error;
pub mod lookup;
pub mod meta;
pub mod props;
pub mod xex;

use std::{
    fs::File,
    io::{BufReader, Read, Seek, SeekFrom},
    path::{Path, PathBuf},
};

use log::{debug, info, warn};

pub use entry::DirEntry;
pub use error::{Error, Result, XexFault};
pub use lookup::{
    Fetch, GameNameLookup, HttpFetch, LookupSettings, UpdatingLookup, DEFAULT_LOOKUP_FILE,
    DEFAULT_LOOKUP_URL,
};
pub use meta::{IsoFormat, IsoMeta, SECTOR_SIZE};
pub use props::{IsoInfo, Properties, XexInfo};
pub use xex::{ExecutionInfo, MediaId, ModuleFlags, TitleId, Version, Xex};

const DEFAULT_XEX: &str = "default.xex";

/// An opened Xbox360 disc image with its directory tree loaded.
pub struct XIso<R = BufReader<File>> {
    file_path: Option<PathBuf>,
    reader: R,
    pub meta: IsoMeta,
    pub root: Vec<DirEntry>,
}

impl XIso<BufReader<File>> {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let mut xiso = Self::from_reader(BufReader::new(file))?;
        xiso.file_path = Some(path.as_ref().to_path_buf());
        Ok(xiso)
    }
}

impl<R: Read + Seek> XIso<R> {
    pub fn from_reader(mut reader: R) -> Result<Self> {
        let meta = meta::get_iso_meta(&mut reader)?;
        let root = entry::parse_root(&mut reader, &meta)?;

        Ok(XIso {
            file_path: None,
            reader,
            meta,
            root,
        })
    }

    pub fn find(&self, path: &str) -> Option<&DirEntry> {
        entry::find_path(&self.root, path)
    }

    /// Reads the full content of a file entry.
    pub fn read_entry(&mut self, entry: &DirEntry) -> Result<Vec<u8>> {
        if entry.is_dir() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{} is a directory", entry.name),
            )));
        }

        let position = self.meta.sector_position(entry.sector);
        self.reader.seek(SeekFrom::Start(position))?;

        let mut buffer = Vec::with_capacity(entry.size as usize);
        (&mut self.reader)
            .take(entry.size as u64)
            .read_to_end(&mut buffer)?;
        if buffer.len() != entry.size as usize {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!(
                    "{} is truncated: expected {} bytes, got {}",
                    entry.name,
                    entry.size,
                    buffer.len()
                ),
            )));
        }

        Ok(buffer)
    }

    /// Contents of `default.xex` from the root directory, matched in any case.
    pub fn default_xex(&mut self) -> Result<Vec<u8>> {
        let entry = entry::find(&self.root, DEFAULT_XEX)
            .filter(|e| !e.is_dir())
            .cloned()
            .ok_or(Error::DefaultXexNotFound)?;
        debug!(
            "found {} at sector {} ({} bytes)",
            entry.name, entry.sector, entry.size
        );
        self.read_entry(&entry)
    }

    /// Paths of all files in the image, directories first visited in name order.
    pub fn file_paths(&self) -> Vec<String> {
        let mut paths = Vec::new();
        collect_paths(&self.root, "", &mut paths);
        paths
    }

    pub fn list(&self) {
        if let Some(path) = &self.file_path {
            println!("Printing content of {:?}", path);
        }
        let paths = self.file_paths();
        for path in &paths {
            println!("{}", path);
        }
        println!();
        println!("Number of files: {}", paths.len());
    }
}

fn collect_paths(entries: &[DirEntry], cur_dir: &str, paths: &mut Vec<String>) {
    for entry in entries.iter() {
        let path = format!("{}/{}", cur_dir, entry.name);
        if entry.is_dir() {
            if let Some(entries) = &entry.subdir {
                collect_paths(entries, &path, paths);
            }
        } else {
            paths.push(path);
        }
    }
}

/// Parses ISO images or bare Xex files into [`Properties`].
#[derive(Debug, Default)]
pub struct Xbox360Iso {
    names: Option<GameNames>,
}

#[derive(Debug)]
enum GameNames {
    Table(GameNameLookup),
    Updating(UpdatingLookup),
}

impl Xbox360Iso {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lookup(mut self, lookup: GameNameLookup) -> Self {
        self.names = Some(GameNames::Table(lookup));
        self
    }

    /// Resolves game names through a table that is downloaded and refreshed as needed.
    pub fn with_updating_lookup(mut self, lookup: UpdatingLookup) -> Self {
        self.names = Some(GameNames::Updating(lookup));
        self
    }

    pub fn parse<P: AsRef<Path>>(&mut self, path: P) -> Result<Properties> {
        debug!("parsing {:?}", path.as_ref());
        let file = File::open(path.as_ref())?;
        self.parse_reader(BufReader::new(file))
    }

    pub fn parse_reader<R: Read + Seek>(&mut self, mut reader: R) -> Result<Properties> {
        if starts_with_xex(&mut reader)? {
            debug!("input is a bare Xex");
            let mut data = Vec::new();
            reader.seek(SeekFrom::Start(0))?;
            reader.read_to_end(&mut data)?;
            let xex = Xex::parse(&data)?;
            return Ok(self.properties(&xex, None));
        }

        let mut xiso = XIso::from_reader(reader)?;
        let data = xiso.default_xex()?;
        let xex = Xex::parse(&data)?;

        Ok(self.properties(&xex, Some(IsoInfo::from(&xiso.meta))))
    }

    /// Game name for `media_id`. Table download or read failures are logged and yield `None`.
    pub fn game_name(&mut self, media_id: MediaId) -> Option<String> {
        let name = match self.names.as_mut()? {
            GameNames::Table(table) => table.game_name(media_id).map(str::to_string),
            GameNames::Updating(lookup) => match lookup.game_name(media_id) {
                Ok(name) => name,
                Err(e) => {
                    warn!("game name lookup failed: {}", e);
                    None
                }
            },
        };
        if name.is_none() {
            info!("no game name found for media id {}", media_id);
        }
        name
    }

    fn properties(&mut self, xex: &Xex, iso: Option<IsoInfo>) -> Properties {
        Properties {
            game_name: self.game_name(xex.media_id()),
            xex: XexInfo::from(xex),
            iso,
        }
    }
}

fn starts_with_xex<R: Read + Seek>(reader: &mut R) -> Result<bool> {
    let mut magic = Vec::with_capacity(4);
    reader.seek(SeekFrom::Start(0))?;
    reader.by_ref().take(4).read_to_end(&mut magic)?;
    Ok(Xex::is_xex(&magic))
}

/// Parses `path` without game name resolution.
pub fn parse<P: AsRef<Path>>(path: P) -> Result<Properties> {
    Xbox360Iso::new().parse(path)
}
