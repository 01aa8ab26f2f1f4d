//! Content resolution
//!
//! Turns an [`EntryRecord`] into an owned [`ResolvedFile`]: slices the name and
//! content out of the image, undoes the content transform and settles the
//! file kind. Every failure here is local to the record.

use crate::codec;
use crate::entry::{EntryRecord, FileKind, KindTag, Span, TextEncoding, loader};
use crate::error::RecordError;
use crate::source::ByteSource;

/// Extensions that mark a module as JavaScript or TypeScript source
pub const SCRIPT_EXTENSIONS: [&str; 6] = [".js", ".jsx", ".ts", ".tsx", ".mjs", ".cjs"];

/// Extension of serialized source maps
pub const SOURCEMAP_EXTENSION: &str = ".map";

/// A fully recovered packaged file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFile {
    /// Position of the record in the entry table
    pub index: usize,
    /// Name as stored in the graph
    pub name: String,
    /// Classified kind
    pub kind: FileKind,
    /// Decoded content
    pub content: Vec<u8>,
}

impl ResolvedFile {
    /// Whether this file is a script
    pub fn is_script(&self) -> bool {
        self.kind == FileKind::Script
    }

    /// Content size in bytes
    pub fn size(&self) -> usize {
        self.content.len()
    }
}

/// Whether `name` ends in one of [`SCRIPT_EXTENSIONS`]
pub fn has_script_extension(name: &str) -> bool {
    SCRIPT_EXTENSIONS.iter().any(|ext| name.ends_with(ext))
}

/// Classify a standalone module from its name, loader and text encoding
///
/// Binary modules are never scripts, whatever their name says.
pub fn classify_module(name: &str, loader_id: u8, encoding: TextEncoding) -> FileKind {
    if encoding == TextEncoding::Binary {
        return FileKind::Asset;
    }
    if has_script_extension(name) || matches!(loader_id, loader::JS | loader::TS) {
        return FileKind::Script;
    }
    if name.ends_with(SOURCEMAP_EXTENSION) {
        return FileKind::SourceMap;
    }
    FileKind::Asset
}

/// Resolve one record against the image
pub fn resolve(source: &ByteSource<'_>, record: &EntryRecord) -> Result<ResolvedFile, RecordError> {
    let explicit = match record.kind {
        KindTag::Explicit(tag) => Some(FileKind::from_tag(tag).ok_or(RecordError::UnknownKind(tag))?),
        KindTag::Module { .. } => None,
    };

    let name_bytes = read_span(source, record.name, "name", record.nul_terminated)?;
    let name = std::str::from_utf8(name_bytes)?.to_owned();

    let stored = read_span(source, record.content, "content", record.nul_terminated)?;
    let content = codec::decode(stored, record.encoding)?;

    let kind = match (explicit, record.kind) {
        (Some(kind), _) => kind,
        (None, KindTag::Module { loader, encoding }) => classify_module(&name, loader, encoding),
        (None, KindTag::Explicit(_)) => FileKind::Asset,
    };

    Ok(ResolvedFile {
        index: record.index,
        name,
        kind,
        content,
    })
}

fn read_span<'a>(
    source: &ByteSource<'a>,
    span: Span,
    field: &'static str,
    nul_terminated: bool,
) -> Result<&'a [u8], RecordError> {
    if span.is_empty() {
        return Ok(&[]);
    }
    let bytes = source
        .span(span)
        .map_err(|bounds| RecordError::SliceOutOfRange { field, bounds })?;
    match bytes.split_last() {
        Some((0, rest)) if nul_terminated => Ok(rest),
        _ => Ok(bytes),
    }
}
