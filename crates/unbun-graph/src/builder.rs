//! Module graph builder
//!
//! Produces images in either layout, for fixtures and tooling. The output is
//! exactly what [`ModuleGraph::parse`](crate::ModuleGraph::parse) reads back.

use crate::codec;
use crate::entry::{
    ContentEncoding, FileKind, ModuleRecord, StringPointer, TextEncoding, VERSIONED_RECORD_SIZE,
    VersionedRecord, loader,
};
use crate::error::{GraphError, GraphResult};
use crate::locate::MARKER;
use crate::trailer::{
    LAYOUT_VERSION, STANDALONE_OFFSETS_SIZE, StandaloneOffsets, VERSIONED_TRAILER_SIZE,
    VersionedTrailer,
};
use binrw::BinWrite;
use binrw::meta::WriteEndian;
use std::io::Cursor;

/// Layout produced by [`ModuleGraphBuilder::build`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildLayout {
    /// Bun's native layout
    Standalone,
    /// Versioned trailer after the marker
    Versioned,
}

#[derive(Debug, Clone)]
enum PendingEntry {
    Versioned {
        kind: u8,
        encoding: ContentEncoding,
        name: Vec<u8>,
        content: Vec<u8>,
        pre_encoded: bool,
    },
    Module {
        name: Vec<u8>,
        content: Vec<u8>,
        loader: u8,
        encoding: TextEncoding,
    },
}

/// Builder for module graph images
#[derive(Debug, Clone)]
pub struct ModuleGraphBuilder {
    layout: BuildLayout,
    prefix: Vec<u8>,
    entry_point: u32,
    size_suffix: bool,
    entries: Vec<PendingEntry>,
}

impl ModuleGraphBuilder {
    /// Create an empty builder
    pub const fn new(layout: BuildLayout) -> Self {
        Self {
            layout,
            prefix: Vec::new(),
            entry_point: 0,
            size_suffix: false,
            entries: Vec::new(),
        }
    }

    /// Bytes placed before the graph, standing in for native code
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<Vec<u8>>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Entry point module index (standalone only)
    #[must_use]
    pub const fn with_entry_point(mut self, index: u32) -> Self {
        self.entry_point = index;
        self
    }

    /// Append the u64 size suffix Linux builds carry (standalone only)
    #[must_use]
    pub const fn with_size_suffix(mut self, enabled: bool) -> Self {
        self.size_suffix = enabled;
        self
    }

    /// Add a file stored raw
    ///
    /// In the standalone layout the kind is expressed through the loader:
    /// scripts use the JS loader, source maps the JSON loader and assets are
    /// stored as binary files. A source map only reads back as one when its
    /// name ends in `.map`.
    #[must_use]
    pub fn add_file(self, name: &str, kind: FileKind, content: impl AsRef<[u8]>) -> Self {
        match self.layout {
            BuildLayout::Versioned => {
                self.add_encoded(name, kind, content, ContentEncoding::Raw)
            }
            BuildLayout::Standalone => {
                let (loader_id, encoding) = match kind {
                    FileKind::Script => (loader::JS, TextEncoding::Utf8),
                    FileKind::SourceMap => (loader::JSON, TextEncoding::Utf8),
                    FileKind::Asset => (loader::FILE, TextEncoding::Binary),
                };
                self.add_module(name, content, loader_id, encoding)
            }
        }
    }

    /// Add a file whose content is encoded at build time (versioned only)
    #[must_use]
    pub fn add_encoded(
        mut self,
        name: &str,
        kind: FileKind,
        content: impl AsRef<[u8]>,
        encoding: ContentEncoding,
    ) -> Self {
        self.entries.push(PendingEntry::Versioned {
            kind: kind.tag(),
            encoding,
            name: name.as_bytes().to_vec(),
            content: content.as_ref().to_vec(),
            pre_encoded: false,
        });
        self
    }

    /// Add a Bun module with an explicit loader and text encoding (standalone only)
    #[must_use]
    pub fn add_module(
        mut self,
        name: &str,
        content: impl AsRef<[u8]>,
        loader_id: u8,
        encoding: TextEncoding,
    ) -> Self {
        self.entries.push(PendingEntry::Module {
            name: name.as_bytes().to_vec(),
            content: content.as_ref().to_vec(),
            loader: loader_id,
            encoding,
        });
        self
    }

    /// Add a record with arbitrary tags and bytes stored verbatim (versioned only)
    #[must_use]
    pub fn add_raw(
        mut self,
        kind_tag: u8,
        encoding_tag: u8,
        name: impl AsRef<[u8]>,
        content: impl AsRef<[u8]>,
    ) -> Self {
        self.entries.push(PendingEntry::Versioned {
            kind: kind_tag,
            encoding: ContentEncoding::from_byte(encoding_tag),
            name: name.as_ref().to_vec(),
            content: content.as_ref().to_vec(),
            pre_encoded: true,
        });
        self
    }

    /// Number of entries added so far
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no entries were added
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialize the image
    pub fn build(&self) -> GraphResult<Vec<u8>> {
        match self.layout {
            BuildLayout::Versioned => self.build_versioned(),
            BuildLayout::Standalone => self.build_standalone(),
        }
    }

    /// `[prefix][marker][trailer][table][name pool][content pool]`
    fn build_versioned(&self) -> GraphResult<Vec<u8>> {
        let mut names = Vec::with_capacity(self.entries.len());
        let mut contents = Vec::with_capacity(self.entries.len());
        let mut records = Vec::with_capacity(self.entries.len());

        for entry in &self.entries {
            let PendingEntry::Versioned {
                kind,
                encoding,
                name,
                content,
                pre_encoded,
            } = entry
            else {
                return Err(GraphError::Unsupported(
                    "bun modules cannot be stored in the versioned layout".to_string(),
                ));
            };
            let stored = if *pre_encoded {
                content.clone()
            } else {
                codec::encode(content, *encoding)?
            };
            records.push((*kind, *encoding));
            names.push(name.as_slice());
            contents.push(stored);
        }

        let table_offset = self.prefix.len() + MARKER.len() + VERSIONED_TRAILER_SIZE;
        let names_offset = table_offset + records.len() * VERSIONED_RECORD_SIZE;
        let contents_offset = names_offset + names.iter().map(|n| n.len()).sum::<usize>();

        let mut table = Vec::new();
        let mut name_cursor = names_offset;
        let mut content_cursor = contents_offset;
        for ((kind, encoding), (name, content)) in records.iter().zip(names.iter().zip(&contents)) {
            let record = VersionedRecord {
                kind: *kind,
                name_offset: name_cursor as u64,
                name_length: to_u32(name.len(), "name length")?,
                content_offset: content_cursor as u64,
                content_length: to_u32(content.len(), "content length")?,
                encoding: encoding.as_byte(),
            };
            table.extend_from_slice(&write_le(&record)?);
            name_cursor += name.len();
            content_cursor += content.len();
        }

        let trailer = VersionedTrailer {
            entry_count: to_u32(records.len(), "entry count")?,
            table_offset: table_offset as u64,
            version: LAYOUT_VERSION,
        };

        let mut out = self.prefix.clone();
        out.extend_from_slice(MARKER);
        out.extend_from_slice(&write_le(&trailer)?);
        out.extend_from_slice(&table);
        for name in &names {
            out.extend_from_slice(name);
        }
        for content in &contents {
            out.extend_from_slice(content);
        }

        debug_assert_eq!(out.len(), content_cursor);

        Ok(out)
    }

    /// `[prefix][strings][module table][offsets][marker][size suffix?]`
    fn build_standalone(&self) -> GraphResult<Vec<u8>> {
        if self.entries.is_empty() {
            return Err(GraphError::Unsupported(
                "the standalone layout cannot represent an empty graph".to_string(),
            ));
        }

        let mut blob = Vec::new();
        let mut records = Vec::with_capacity(self.entries.len());

        for entry in &self.entries {
            let PendingEntry::Module {
                name,
                content,
                loader,
                encoding,
            } = entry
            else {
                return Err(GraphError::Unsupported(
                    "tagged or encoded records need the versioned layout".to_string(),
                ));
            };
            let name = push_string(&mut blob, name)?;
            let contents = push_string(&mut blob, content)?;
            records.push(ModuleRecord {
                name,
                contents,
                sourcemap: StringPointer::default(),
                bytecode: StringPointer::default(),
                encoding: encoding.as_byte(),
                loader: *loader,
                module_format: 0,
                side: 0,
            });
        }

        let modules_offset = to_u32(blob.len(), "module table offset")?;
        for record in &records {
            blob.extend_from_slice(&write_le(record)?);
        }
        let modules_length = to_u32(blob.len(), "graph size")? - modules_offset;

        let offsets = StandaloneOffsets {
            byte_count: blob.len() as u64,
            modules_offset,
            modules_length,
            entry_point_id: self.entry_point,
            exec_argv_offset: 0,
            exec_argv_length: 0,
            flags: 0,
        };

        let mut out = self.prefix.clone();
        out.extend_from_slice(&blob);
        let offsets = write_le(&offsets)?;
        debug_assert_eq!(offsets.len(), STANDALONE_OFFSETS_SIZE);
        out.extend_from_slice(&offsets);
        out.extend_from_slice(MARKER);
        if self.size_suffix {
            let total = out.len() as u64 + 8;
            out.extend_from_slice(&total.to_le_bytes());
        }

        Ok(out)
    }
}

fn push_string(blob: &mut Vec<u8>, bytes: &[u8]) -> GraphResult<StringPointer> {
    let pointer = StringPointer {
        offset: to_u32(blob.len(), "string offset")?,
        length: to_u32(bytes.len() + 1, "string length")?,
    };
    blob.extend_from_slice(bytes);
    blob.push(0);
    Ok(pointer)
}

fn to_u32(value: usize, what: &str) -> GraphResult<u32> {
    u32::try_from(value)
        .map_err(|_| GraphError::Unsupported(format!("{what} {value} does not fit in 32 bits")))
}

fn write_le<T>(value: &T) -> GraphResult<Vec<u8>>
where
    T: for<'a> BinWrite<Args<'a> = ()> + WriteEndian,
{
    let mut cursor = Cursor::new(Vec::new());
    value.write(&mut cursor)?;
    Ok(cursor.into_inner())
}
