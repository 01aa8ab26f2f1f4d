//! External code formatting

use crate::error::FormatError;
use std::io::ErrorKind;
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::debug;

/// Rewrites an extracted file in place
pub trait Formatter {
    /// Short name used in log output
    fn name(&self) -> &str;

    /// Format the file at `path`
    fn format(&self, path: &Path) -> Result<(), FormatError>;
}

/// The Prettier CLI, run with the babel parser
#[derive(Debug, Clone)]
pub struct Prettier {
    bin: String,
}

impl Prettier {
    /// Use the given Prettier executable
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }

    /// Executable that will be run
    pub fn bin(&self) -> &str {
        &self.bin
    }

    fn command(&self, path: &Path) -> Command {
        let mut command = Command::new(&self.bin);
        command
            .arg("--log-level=error")
            .arg("--parser=babel")
            .arg("--write")
            .arg(path)
            .stdin(Stdio::null());
        command
    }
}

impl Default for Prettier {
    fn default() -> Self {
        Self::new("prettier")
    }
}

impl Formatter for Prettier {
    fn name(&self) -> &str {
        "prettier"
    }

    fn format(&self, path: &Path) -> Result<(), FormatError> {
        debug!("Running {} on {}", self.bin, path.display());

        let status = self.command(path).status().map_err(|e| match e.kind() {
            ErrorKind::NotFound => FormatError::NotFound {
                bin: self.bin.clone(),
            },
            _ => FormatError::Io(e),
        })?;

        if status.success() {
            Ok(())
        } else {
            Err(FormatError::Failed {
                path: path.to_path_buf(),
                status,
            })
        }
    }
}
