use crate::models::{AppError, Result};
use bytes::Bytes;
use std::io::{Cursor, Read};
use zip::result::ZipResult;
use zip::ZipArchive;

pub const GEOMETRY_EXT: &str = "shp";
pub const INDEX_EXT: &str = "shx";
pub const ATTRIBUTE_EXT: &str = "dbf";

/// Resource-fork folder macOS adds to archives it creates; never holds real layers.
const MACOS_METADATA_DIR: &str = "__MACOSX/";

#[derive(Debug, Clone)]
struct Entry {
    index: usize,
    name: String,
    lower: String,
}

/// The `.shp` entry of one layer and whichever siblings were found for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitEntries {
    /// Entry path without extension, original casing.
    pub base_name: String,
    pub geometry: usize,
    pub index: Option<usize>,
    pub attributes: Option<usize>,
}

impl UnitEntries {
    pub fn is_complete(&self) -> bool {
        self.index.is_some() && self.attributes.is_some()
    }

    pub fn missing_extensions(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.index.is_none() {
            missing.push(INDEX_EXT);
        }
        if self.attributes.is_none() {
            missing.push(ATTRIBUTE_EXT);
        }
        missing
    }
}

/// Read-only view over an uploaded ZIP held in memory.
pub struct ShapefileArchive {
    zip: ZipArchive<Cursor<Bytes>>,
    entries: Vec<Entry>,
}

impl ShapefileArchive {
    pub fn open(bytes: Bytes) -> Result<Self> {
        let mut zip = ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| AppError::MalformedArchive(e.to_string()))?;

        let mut entries = Vec::with_capacity(zip.len());
        for index in 0..zip.len() {
            let file = zip
                .by_index_raw(index)
                .map_err(|e| AppError::MalformedArchive(e.to_string()))?;
            if file.is_dir() || file.name().starts_with(MACOS_METADATA_DIR) {
                continue;
            }
            let name = file.name().to_string();
            entries.push(Entry {
                index,
                lower: name.to_ascii_lowercase(),
                name,
            });
        }

        Ok(Self { zip, entries })
    }

    /// One unit per geometry entry, in archive order.
    pub fn units(&self) -> Vec<UnitEntries> {
        let geometry_suffix = format!(".{}", GEOMETRY_EXT);

        self.entries
            .iter()
            .filter(|entry| {
                entry.lower.len() > geometry_suffix.len() && entry.lower.ends_with(&geometry_suffix)
            })
            .map(|entry| {
                let stem_len = entry.name.len() - geometry_suffix.len();
                let base_lower = &entry.lower[..entry.lower.len() - geometry_suffix.len()];
                UnitEntries {
                    base_name: entry.name[..stem_len].to_string(),
                    geometry: entry.index,
                    index: self.sibling(base_lower, INDEX_EXT),
                    attributes: self.sibling(base_lower, ATTRIBUTE_EXT),
                }
            })
            .collect()
    }

    fn sibling(&self, base_lower: &str, ext: &str) -> Option<usize> {
        let wanted = format!("{}.{}", base_lower, ext);
        self.entries
            .iter()
            .find(|entry| entry.lower == wanted)
            .map(|entry| entry.index)
    }

    /// Decompressing reader over one entry.
    pub fn open_entry(&mut self, index: usize) -> ZipResult<impl Read + '_> {
        self.zip.by_index(index)
    }
}
