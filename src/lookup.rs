use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, info};

use crate::error::Result;
use crate::xex::MediaId;

pub const DEFAULT_LOOKUP_FILE: &str = "GameNameLookup.csv";
pub const DEFAULT_LOOKUP_URL: &str = "http://abgx360.net/Apps/Stealth360/GameNameLookup.csv";

/// Media ID to game name table in the `GameNameLookup.csv` layout.
///
/// Rows have no header and a varying number of columns. The game name is the
/// first column; a row matches when any of its columns ends with the media ID.
#[derive(Debug, Clone, Default)]
pub struct GameNameLookup {
    rows: Vec<Vec<String>>,
}

impl GameNameLookup {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref())?;
        let lookup = Self::from_reader(file)?;
        debug!("loaded {} rows from {:?}", lookup.len(), path.as_ref());
        Ok(lookup)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        let mut rows: Vec<Vec<String>> = Vec::new();
        for record in reader.records() {
            let record = record?;
            if record.is_empty() {
                continue;
            }
            rows.push(record.iter().map(|col| col.trim().to_string()).collect());
        }

        Ok(Self { rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn game_name(&self, media_id: MediaId) -> Option<&str> {
        let needle = media_id.to_string();
        self.rows
            .iter()
            .find(|row| row.iter().any(|col| ends_with_ignore_case(col, &needle)))
            .and_then(|row| row.first())
            .map(String::as_str)
    }
}

/// Where the table lives and when to fetch a fresh copy of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupSettings {
    pub local: PathBuf,
    pub url: String,
    /// Download before the first lookup even when a local copy exists.
    pub force_update: bool,
    pub download_if_missing: bool,
    /// Download again when a media ID is not found and the local copy is at least `min_age` old.
    pub update_if_no_match: bool,
    pub min_age: Duration,
}

impl Default for LookupSettings {
    fn default() -> Self {
        Self {
            local: PathBuf::from(DEFAULT_LOOKUP_FILE),
            url: DEFAULT_LOOKUP_URL.to_string(),
            force_update: false,
            download_if_missing: true,
            update_if_no_match: true,
            min_age: Duration::from_secs(60 * 60 * 24),
        }
    }
}

/// Source of table downloads.
pub trait Fetch {
    fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Blocking HTTP download.
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpFetch;

impl Fetch for HttpFetch {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let body = reqwest::blocking::get(url)?.error_for_status()?.bytes()?;
        Ok(body.to_vec())
    }
}

/// [`GameNameLookup`] backed by a local file that is downloaded and refreshed on demand.
///
/// The table is loaded on the first lookup and kept for later ones.
pub struct UpdatingLookup {
    settings: LookupSettings,
    fetcher: Box<dyn Fetch>,
    table: Option<GameNameLookup>,
}

impl UpdatingLookup {
    pub fn new(settings: LookupSettings) -> Self {
        Self::with_fetcher(settings, HttpFetch)
    }

    pub fn with_fetcher<F: Fetch + 'static>(settings: LookupSettings, fetcher: F) -> Self {
        Self {
            settings,
            fetcher: Box::new(fetcher),
            table: None,
        }
    }

    pub fn settings(&self) -> &LookupSettings {
        &self.settings
    }

    pub fn game_name(&mut self, media_id: MediaId) -> Result<Option<String>> {
        if self.table.is_none() {
            let missing = !self.settings.local.is_file();
            if self.settings.force_update || (missing && self.settings.download_if_missing) {
                self.download()?;
            }
            if !self.load()? {
                debug!("no game name table at {:?}", self.settings.local);
                return Ok(None);
            }

            let name = self.search(media_id);
            if name.is_none() && self.settings.update_if_no_match && self.is_stale()? {
                info!("media id {} not in table, refreshing {:?}", media_id, self.settings.local);
                self.download()?;
                self.load()?;
                return Ok(self.search(media_id));
            }
            return Ok(name);
        }

        Ok(self.search(media_id))
    }

    fn search(&self, media_id: MediaId) -> Option<String> {
        self.table
            .as_ref()
            .and_then(|table| table.game_name(media_id))
            .map(str::to_string)
    }

    fn download(&self) -> Result<()> {
        info!("downloading {} to {:?}", self.settings.url, self.settings.local);
        let body = self.fetcher.fetch(&self.settings.url)?;
        std::fs::write(&self.settings.local, body)?;
        Ok(())
    }

    fn load(&mut self) -> Result<bool> {
        if !self.settings.local.is_file() {
            return Ok(false);
        }
        self.table = Some(GameNameLookup::from_path(&self.settings.local)?);
        Ok(true)
    }

    fn is_stale(&self) -> Result<bool> {
        let modified = std::fs::metadata(&self.settings.local)?.modified()?;
        // timestamps in the future count as fresh
        let age = modified.elapsed().unwrap_or(Duration::ZERO);
        Ok(age >= self.settings.min_age)
    }
}

impl fmt::Debug for UpdatingLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdatingLookup")
            .field("settings", &self.settings)
            .field("loaded_rows", &self.table.as_ref().map(GameNameLookup::len))
            .finish()
    }
}

fn ends_with_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.len() >= needle.len()
        && haystack.as_bytes()[haystack.len() - needle.len()..].eq_ignore_ascii_case(needle.as_bytes())
}
