//! Command-line extractor for Bun standalone executables.
//!
//! The `unbun` binary is a thin wrapper around [`run`]:
//! - `config`: CLI arguments and validation
//! - `input`: memory-mapped access to the executable
//! - `naming`: flattening module names into safe file names
//! - `writer`: writing extracted files with unique names
//! - `formatter`: optional Prettier pass over extracted scripts
//! - `manifest`: optional `manifest.json`
//!
//! # Example
//!
//! ```no_run
//! use unbun_cli::{CliConfig, run};
//!
//! fn main() -> anyhow::Result<()> {
//!     tracing_subscriber::fmt::init();
//!
//!     let config = CliConfig::from_args();
//!     let summary = run(&config)?;
//!     println!("{} files written", summary.written.len());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod formatter;
pub mod input;
pub mod manifest;
pub mod naming;
pub mod writer;

pub use config::CliConfig;
pub use error::{CliError, ConfigError, FormatError};
pub use formatter::{Formatter, Prettier};
pub use input::InputImage;
pub use manifest::{MANIFEST_FILE, Manifest};
pub use writer::{OutputWriter, WrittenFile};

use std::path::PathBuf;
use tracing::{info, warn};
use unbun_graph::extract_with;

/// What a run produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    /// Files written, in table order
    pub written: Vec<WrittenFile>,
    /// Records that failed to resolve
    pub skipped: usize,
    /// Scripts the formatter rewrote
    pub formatted: usize,
    /// Formatter failures, reported as warnings
    pub format_warnings: usize,
    /// Path of `manifest.json`, when written
    pub manifest: Option<PathBuf>,
}

/// Run an extraction with the formatter the configuration asks for
pub fn run(config: &CliConfig) -> Result<Summary, CliError> {
    let prettier = Prettier::new(config.prettier_bin.clone());
    let formatter = config
        .formatting_enabled()
        .then_some(&prettier as &dyn Formatter);
    run_with(config, formatter)
}

/// Run an extraction with an explicit formatter (or none)
pub fn run_with(config: &CliConfig, formatter: Option<&dyn Formatter>) -> Result<Summary, CliError> {
    config.validate()?;

    let image = InputImage::open(&config.binary)?;
    info!(
        "Reading {} ({} bytes)",
        config.binary.display(),
        image.len()
    );

    let extraction = extract_with(&image, &config.extract_options())?;
    if !extraction.has_scripts() {
        return Err(CliError::NoScripts);
    }

    let mut writer = OutputWriter::create(&config.output)?;
    if config.manifest {
        writer.reserve(MANIFEST_FILE);
    }
    let mut summary = Summary {
        written: Vec::with_capacity(extraction.files.len()),
        skipped: extraction.skipped.len(),
        formatted: 0,
        format_warnings: 0,
        manifest: None,
    };

    for file in &extraction.files {
        let written = writer.write(file)?;
        println!(
            "Saved {} ({:.1} KB)",
            written.path.display(),
            written.size_kb()
        );

        if let Some(formatter) = formatter.filter(|_| file.is_script()) {
            match formatter.format(&written.path) {
                Ok(()) => {
                    println!("  formatted with {}", formatter.name());
                    summary.formatted += 1;
                }
                Err(err) => {
                    warn!("{err}");
                    summary.format_warnings += 1;
                }
            }
        }

        summary.written.push(written);
    }

    if config.manifest {
        let manifest = Manifest::new(&config.binary, &extraction, &summary.written);
        summary.manifest = Some(manifest.write(writer.dir())?);
    }

    info!(
        "Wrote {} files to {} ({} skipped, {} formatter warnings)",
        summary.written.len(),
        writer.dir().display(),
        summary.skipped,
        summary.format_warnings
    );

    Ok(summary)
}
