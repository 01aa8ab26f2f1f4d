//! Command-line configuration.
//!
//! Options come from CLI arguments, with environment variable fallbacks for
//! the tuning knobs:
//! - `UNBUN_PRETTIER_BIN`
//! - `UNBUN_SEARCH_WINDOW`
//! - `UNBUN_MAX_ENTRIES`

use crate::error::ConfigError;
use clap::Parser;
use std::path::PathBuf;
use unbun_graph::{DEFAULT_SEARCH_WINDOW, ExtractOptions, MARKER, MAX_ENTRY_COUNT, Selection};

/// Extractor configuration loaded from CLI args and environment variables.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "unbun",
    about = "Extract JavaScript bundles from Bun standalone executables",
    version
)]
pub struct CliConfig {
    /// Path to the Bun-compiled executable
    pub binary: PathBuf,

    /// Destination directory
    #[arg(default_value = "extracted")]
    pub output: PathBuf,

    /// Skip Prettier formatting
    #[arg(long)]
    pub no_prettier: bool,

    /// Path to the Prettier CLI
    #[arg(long, env = "UNBUN_PRETTIER_BIN", default_value = "prettier")]
    pub prettier_bin: String,

    /// Number of trailing bytes searched for the module graph marker
    #[arg(long, env = "UNBUN_SEARCH_WINDOW", default_value_t = DEFAULT_SEARCH_WINDOW)]
    pub search_window: usize,

    /// Largest entry count accepted from the trailer
    #[arg(long, env = "UNBUN_MAX_ENTRIES", default_value_t = MAX_ENTRY_COUNT)]
    pub max_entries: usize,

    /// Write every packaged file, not just scripts
    #[arg(long)]
    pub all: bool,

    /// Also write manifest.json describing the extraction
    #[arg(long)]
    pub manifest: bool,
}

impl CliConfig {
    /// Parse configuration from command-line arguments.
    #[must_use]
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Whether scripts are run through the formatter
    pub const fn formatting_enabled(&self) -> bool {
        !self.no_prettier
    }

    /// Options handed to the extraction pipeline
    pub fn extract_options(&self) -> ExtractOptions {
        ExtractOptions {
            search_window: self.search_window,
            max_entries: self.max_entries,
            selection: if self.all {
                Selection::All
            } else {
                Selection::Scripts
            },
        }
    }

    /// Validate configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - The executable doesn't exist or is not a regular file
    /// - The search window cannot hold the marker
    /// - The entry cap is zero
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.binary.exists() {
            return Err(ConfigError::MissingInput(self.binary.clone()));
        }
        if !self.binary.is_file() {
            return Err(ConfigError::NotAFile(self.binary.clone()));
        }

        if self.search_window < MARKER.len() {
            return Err(ConfigError::InvalidValue {
                name: "search-window",
                reason: format!("must be at least {} bytes", MARKER.len()),
            });
        }

        if self.max_entries == 0 {
            return Err(ConfigError::InvalidValue {
                name: "max-entries",
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}
