//! Error types for the unbun command-line tool.
//!
//! All errors use thiserror for consistent error handling across the codebase.

use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;
use unbun_graph::GraphError;

/// Exit code for a successful run
pub const EXIT_SUCCESS: u8 = 0;

/// Exit code for any failure other than a missing module graph
pub const EXIT_FAILURE: u8 = 1;

/// Exit code when the input carries no module graph
pub const EXIT_NOT_A_GRAPH: u8 = 2;

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Input executable does not exist
    #[error("Executable not found: {}", .0.display())]
    MissingInput(PathBuf),

    /// Input path exists but is not a regular file
    #[error("Not a regular file: {}", .0.display())]
    NotAFile(PathBuf),

    /// Option value out of range
    #[error("Invalid value for {name}: {reason}")]
    InvalidValue {
        /// Option name
        name: &'static str,
        /// Why the value was rejected
        reason: String,
    },
}

/// Errors that abort a run.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Reading the input or writing output failed
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// File or directory involved
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Module graph could not be decoded
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// The graph holds no script records
    #[error("No JavaScript bundles found in module graph")]
    NoScripts,

    /// Manifest serialization failed
    #[error("Failed to serialize manifest: {0}")]
    Manifest(#[from] serde_json::Error),
}

impl CliError {
    /// Create an I/O error for a path
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Process exit code for this error
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Graph(err) if err.is_not_module_graph() => EXIT_NOT_A_GRAPH,
            _ => EXIT_FAILURE,
        }
    }
}

/// Formatter failures. These are reported as warnings and never abort a run.
#[derive(Debug, Error)]
pub enum FormatError {
    /// Formatter executable could not be started
    #[error("Formatter executable not found: {bin}")]
    NotFound {
        /// Executable that was looked up
        bin: String,
    },

    /// Formatter ran and reported failure
    #[error("Formatter failed on {} ({status})", path.display())]
    Failed {
        /// File being formatted
        path: PathBuf,
        /// Exit status of the formatter
        status: ExitStatus,
    },

    /// Any other failure to run the formatter
    #[error("Formatter I/O error: {0}")]
    Io(#[from] std::io::Error),
}
