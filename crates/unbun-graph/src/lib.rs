//! Locator and decoder for the module graph embedded in Bun standalone executables
//!
#![allow(clippy::cast_possible_truncation)] // Intentional for binary format parsing
#![allow(clippy::cast_lossless)] // Sometimes clearer than From
#![allow(clippy::doc_markdown)] // Bun-specific terms don't need backticks
#![allow(clippy::module_name_repetitions)] // Clear naming is preferred
#![allow(clippy::return_self_not_must_use)] // Builder patterns
//! `bun build --compile` appends a serialized module graph to the runtime
//! executable, followed by the `\n---- Bun! ----\n` marker. This crate finds
//! that marker, decodes the trailer and entry table, and recovers every
//! packaged file with its name, kind and original content.
//!
//! # Layouts
//!
//! - **Standalone**: Bun's native layout. A 32-byte offsets block precedes the
//!   marker and describes a graph blob of NUL-terminated strings and 36-byte
//!   module records.
//! - **Versioned**: a 16-byte trailer follows the marker and points at a table
//!   of 26-byte records with absolute offsets and optional zlib/LZ4 content.
//!
//! # Example
//!
//! ```
//! use unbun_graph::{BuildLayout, FileKind, ModuleGraphBuilder, extract_script_files};
//!
//! let image = ModuleGraphBuilder::new(BuildLayout::Standalone)
//!     .with_prefix(b"\x7fELF".to_vec())
//!     .add_file("/$bunfs/root/app.js", FileKind::Script, b"console.log(1)")
//!     .build()?;
//!
//! let extraction = extract_script_files(&image)?;
//! assert_eq!(extraction.files.len(), 1);
//! assert_eq!(extraction.files[0].content, b"console.log(1)");
//! # Ok::<(), unbun_graph::GraphError>(())
//! ```
//!
//! # Failure model
//!
//! Structural problems (missing marker, bad trailer, table past end of file)
//! are fatal and returned as [`GraphError`]. Problems with a single record are
//! [`RecordError`]s: the record is skipped and reported in
//! [`Extraction::skipped`] while the rest of the table still resolves.

#![warn(missing_docs)]

pub mod builder;
pub mod codec;
pub mod entry;
pub mod error;
pub mod locate;
pub mod pipeline;
pub mod resolve;
pub mod source;
pub mod trailer;

pub use builder::{BuildLayout, ModuleGraphBuilder};
pub use entry::{ContentEncoding, EntryRecord, FileKind, KindTag, Span, TextEncoding};
pub use error::{EntryError, GraphError, GraphResult, OutOfBounds, RecordError};
pub use locate::{
    DEFAULT_SEARCH_WINDOW, FooterPosition, MARKER, locate, locate_before, locate_within,
};
pub use pipeline::{
    ExtractOptions, Extraction, Files, MAX_MARKER_CANDIDATES, ModuleGraph, Selection,
    extract_script_files, extract_with,
};
pub use resolve::{ResolvedFile, has_script_extension, resolve};
pub use source::ByteSource;
pub use trailer::{Layout, MAX_ENTRY_COUNT, Trailer};
