//! Writing extracted files to disk

use crate::error::CliError;
use crate::naming::{NameAllocator, output_name};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::debug;
use unbun_graph::{FileKind, ResolvedFile};

/// A file written to the output directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenFile {
    /// Position in the entry table
    pub index: usize,
    /// Name as stored in the graph
    pub name: String,
    /// Classified kind
    pub kind: FileKind,
    /// File name inside the output directory
    pub file_name: String,
    /// Full output path
    pub path: PathBuf,
    /// Bytes written
    pub size: usize,
    /// SHA-256 of the content, hex encoded
    pub sha256: String,
}

impl WrittenFile {
    /// Size in KiB, as shown to the user
    #[allow(clippy::cast_precision_loss)]
    pub fn size_kb(&self) -> f64 {
        self.size as f64 / 1024.0
    }
}

/// Writes resolved files into one directory under unique names
#[derive(Debug)]
pub struct OutputWriter {
    dir: PathBuf,
    names: NameAllocator,
}

impl OutputWriter {
    /// Create the output directory (and parents) if needed
    pub fn create(dir: &Path) -> Result<Self, CliError> {
        std::fs::create_dir_all(dir).map_err(|e| CliError::io(dir, e))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            names: NameAllocator::new(),
        })
    }

    /// Output directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Keep `file_name` free for a file written outside this writer
    pub fn reserve(&mut self, file_name: &str) {
        self.names.reserve(file_name);
    }

    /// Write one file, picking the next free name for it
    pub fn write(&mut self, file: &ResolvedFile) -> Result<WrittenFile, CliError> {
        let file_name = self
            .names
            .allocate(&output_name(&file.name, file.is_script()));
        let path = self.dir.join(&file_name);

        std::fs::write(&path, &file.content).map_err(|e| CliError::io(&path, e))?;
        debug!("Wrote entry {} to {}", file.index, path.display());

        Ok(WrittenFile {
            index: file.index,
            name: file.name.clone(),
            kind: file.kind,
            file_name,
            path,
            size: file.size(),
            sha256: hex::encode(Sha256::digest(&file.content)),
        })
    }
}
