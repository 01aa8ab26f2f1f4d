//! Executable loading

use crate::error::CliError;
use memmap2::{Mmap, MmapOptions};
use std::fs::File;
use std::ops::Deref;
use std::path::Path;
use tracing::debug;

/// Raw bytes of the input executable
#[derive(Debug)]
pub enum InputImage {
    /// Memory-mapped file
    Mapped(Mmap),
    /// Bytes held in memory (empty files cannot be mapped)
    Owned(Vec<u8>),
}

impl InputImage {
    /// Open and map an executable
    pub fn open(path: &Path) -> Result<Self, CliError> {
        let file = File::open(path).map_err(|e| CliError::io(path, e))?;
        let size = file.metadata().map_err(|e| CliError::io(path, e))?.len();

        if size == 0 {
            debug!("{} is empty, skipping memory map", path.display());
            return Ok(Self::Owned(Vec::new()));
        }

        // Read-only for the duration of one run
        #[allow(unsafe_code)]
        let mmap = unsafe { MmapOptions::new().map(&file) }.map_err(|e| CliError::io(path, e))?;

        debug!("Mapped {} ({} bytes)", path.display(), mmap.len());

        Ok(Self::Mapped(mmap))
    }

    /// The whole image
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Mapped(mmap) => &mmap[..],
            Self::Owned(bytes) => bytes.as_slice(),
        }
    }
}

impl Deref for InputImage {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_bytes()
    }
}
