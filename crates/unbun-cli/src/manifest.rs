//! `manifest.json` describing an extraction run

use crate::error::CliError;
use crate::writer::WrittenFile;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use unbun_graph::{EntryError, Extraction};

/// File name of the manifest inside the output directory
pub const MANIFEST_FILE: &str = "manifest.json";

/// Summary of one extraction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Input executable
    pub source: PathBuf,
    /// Layout the graph was stored in
    pub layout: String,
    /// Index of the entry point module, when recorded
    pub entry_point: Option<usize>,
    /// Number of records in the entry table
    pub total_entries: usize,
    /// Files written
    pub files: Vec<ManifestFile>,
    /// Records that failed to resolve
    pub skipped: Vec<SkippedEntry>,
}

/// One written file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestFile {
    /// Position in the entry table
    pub index: usize,
    /// Name as stored in the graph
    pub name: String,
    /// Classified kind
    pub kind: String,
    /// Output path, relative to the output directory
    pub path: String,
    /// Size in bytes as extracted
    pub size: usize,
    /// SHA-256 of the extracted content, hex encoded
    pub sha256: String,
}

/// One skipped record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedEntry {
    /// Position in the entry table
    pub index: usize,
    /// Why it was skipped
    pub reason: String,
}

impl From<&EntryError> for SkippedEntry {
    fn from(error: &EntryError) -> Self {
        Self {
            index: error.index,
            reason: error.error.to_string(),
        }
    }
}

impl Manifest {
    /// Build a manifest from an extraction and the files written for it
    pub fn new(source: &Path, extraction: &Extraction, written: &[WrittenFile]) -> Self {
        Self {
            source: source.to_path_buf(),
            layout: extraction.layout.to_string(),
            entry_point: extraction.entry_point,
            total_entries: extraction.total_entries,
            files: written
                .iter()
                .map(|file| ManifestFile {
                    index: file.index,
                    name: file.name.clone(),
                    kind: file.kind.to_string(),
                    path: file.file_name.clone(),
                    size: file.size,
                    sha256: file.sha256.clone(),
                })
                .collect(),
            skipped: extraction.skipped.iter().map(SkippedEntry::from).collect(),
        }
    }

    /// Write `manifest.json` into `dir`
    pub fn write(&self, dir: &Path) -> Result<PathBuf, CliError> {
        let path = dir.join(MANIFEST_FILE);
        let mut json = serde_json::to_vec_pretty(self)?;
        json.push(b'\n');
        std::fs::write(&path, json).map_err(|e| CliError::io(&path, e))?;
        Ok(path)
    }
}
