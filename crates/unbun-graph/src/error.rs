//! Error types for module graph decoding
//!
//! Errors come in two tiers. [`GraphError`] is fatal: the marker is missing or
//! the trailer/table cannot be trusted, so nothing past that point is read.
//! [`RecordError`] belongs to a single entry record and never stops the other
//! records from resolving.

use crate::entry::ContentEncoding;
use thiserror::Error;

/// Result type for module graph operations
pub type GraphResult<T> = Result<T, GraphError>;

/// A read that would leave the bounds of the raw image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("offset {offset} + length {length} exceeds {available} bytes")]
pub struct OutOfBounds {
    /// Requested start offset
    pub offset: u64,
    /// Requested length
    pub length: u64,
    /// Size of the underlying buffer
    pub available: usize,
}

/// Fatal errors that abort an extraction
#[derive(Debug, Error)]
pub enum GraphError {
    /// Marker absent from the search window
    #[error("Not a module graph binary: marker not found in the last {scanned} bytes")]
    NotAModuleGraphBinary {
        /// Number of tail bytes that were examined
        scanned: usize,
    },

    /// Fewer bytes than the fixed trailer width remain after the marker
    #[error("Truncated trailer at offset {offset}: need {needed} bytes, {available} available")]
    TruncatedTrailer {
        /// Offset where the trailer starts
        offset: usize,
        /// Fixed trailer width
        needed: usize,
        /// Bytes left before end of file
        available: usize,
    },

    /// Trailer fields are inconsistent with the file
    #[error("Corrupt trailer: {reason}")]
    CorruptTrailer {
        /// Description of the inconsistency
        reason: String,
    },

    /// Trailer carries a version this decoder does not know
    #[error("Unsupported module graph layout version {0}")]
    UnsupportedLayout(u32),

    /// Entry table does not fit the file or has an unrecognized shape
    #[error("Corrupt entry table: {reason}")]
    CorruptEntryTable {
        /// Description of the inconsistency
        reason: String,
    },

    /// Bounds-checked read failed
    #[error("Read out of bounds: {0}")]
    OutOfBounds(#[from] OutOfBounds),

    /// Builder was asked for something the target layout cannot express
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// Binary read/write error
    #[error("Binary format error: {0}")]
    BinRead(#[from] binrw::Error),

    /// I/O error while encoding
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GraphError {
    /// Create a corrupt trailer error
    pub fn corrupt_trailer<S: Into<String>>(reason: S) -> Self {
        Self::CorruptTrailer {
            reason: reason.into(),
        }
    }

    /// Create a corrupt entry table error
    pub fn corrupt_table<S: Into<String>>(reason: S) -> Self {
        Self::CorruptEntryTable {
            reason: reason.into(),
        }
    }

    /// The input simply is not a module-graph-bearing executable
    pub fn is_not_module_graph(&self) -> bool {
        matches!(self, Self::NotAModuleGraphBinary { .. })
    }

    /// The input looked like a module graph but its structure is broken
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Self::TruncatedTrailer { .. }
                | Self::CorruptTrailer { .. }
                | Self::UnsupportedLayout(_)
                | Self::CorruptEntryTable { .. }
                | Self::OutOfBounds(_)
                | Self::BinRead(_)
        )
    }
}

/// Errors local to one entry record
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    /// Name or content span points outside the image
    #[error("{field} slice out of range: {bounds}")]
    SliceOutOfRange {
        /// Which span was bad ("name" or "content")
        field: &'static str,
        /// The offending bounds
        #[source]
        bounds: OutOfBounds,
    },

    /// Name bytes are not UTF-8
    #[error("Entry name is not valid UTF-8: {0}")]
    InvalidName(#[from] std::str::Utf8Error),

    /// Kind tag outside the documented set
    #[error("Unknown entry kind tag {0}")]
    UnknownKind(u8),

    /// Encoding flag outside the documented set
    #[error("Unknown content encoding {0}")]
    UnknownEncoding(u8),

    /// Content transform rejected the payload
    #[error("{encoding} decode failed: {reason}")]
    DecodeTransformFailed {
        /// Transform that failed
        encoding: ContentEncoding,
        /// Decoder message
        reason: String,
    },
}

impl RecordError {
    /// Create a transform failure
    pub fn decode_failed<S: Into<String>>(encoding: ContentEncoding, reason: S) -> Self {
        Self::DecodeTransformFailed {
            encoding,
            reason: reason.into(),
        }
    }
}

/// A [`RecordError`] tagged with the table index of the record
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("entry {index}: {error}")]
pub struct EntryError {
    /// Position of the record in the entry table
    pub index: usize,
    /// What went wrong
    #[source]
    pub error: RecordError,
}
