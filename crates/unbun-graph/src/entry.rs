//! Entry table decoding
//!
//! Each layout stores a fixed-width record per packaged file. Records are
//! decoded into [`EntryRecord`] descriptors without touching the name or
//! content bytes; malformed values (unknown tags, bad spans) are kept as-is
//! and only rejected when the record is resolved, so one bad record never
//! hides the others.

use crate::error::{GraphError, GraphResult};
use crate::source::ByteSource;
use crate::trailer::{Layout, Trailer, check_table_fits};
use binrw::{BinRead, BinWrite};
use std::fmt;
use std::io::Cursor;

/// Width of a versioned entry record
pub const VERSIONED_RECORD_SIZE: usize = 26;

/// Width of a standalone module record (`CompiledModuleGraphFile`)
pub const STANDALONE_RECORD_SIZE: usize = 36;

/// Bun loader ids as stored in standalone module records
pub mod loader {
    /// `.jsx`
    pub const JSX: u8 = 0;
    /// `.js`
    pub const JS: u8 = 1;
    /// `.ts`
    pub const TS: u8 = 2;
    /// `.tsx`
    pub const TSX: u8 = 3;
    /// `.css`
    pub const CSS: u8 = 4;
    /// Opaque file asset
    pub const FILE: u8 = 5;
    /// `.json`
    pub const JSON: u8 = 6;
}

/// Absolute `(offset, length)` reference into the raw image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    /// Absolute start offset
    pub offset: u64,
    /// Length in bytes
    pub length: u64,
}

impl Span {
    /// Create a span
    pub const fn new(offset: u64, length: u64) -> Self {
        Self { offset, length }
    }

    /// Zero-length span
    pub const fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// One past the last byte, `None` on overflow
    pub const fn end(&self) -> Option<u64> {
        self.offset.checked_add(self.length)
    }
}

/// Kind of a resolved file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    /// JavaScript or TypeScript source
    Script,
    /// Any other packaged file
    Asset,
    /// Source map
    SourceMap,
}

impl FileKind {
    /// Kind tag used in versioned records
    pub const fn tag(self) -> u8 {
        match self {
            Self::Script => 1,
            Self::Asset => 2,
            Self::SourceMap => 3,
        }
    }

    /// Kind for a versioned record tag
    pub const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(Self::Script),
            2 => Some(Self::Asset),
            3 => Some(Self::SourceMap),
            _ => None,
        }
    }

    /// Lowercase name
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Script => "script",
            Self::Asset => "asset",
            Self::SourceMap => "sourcemap",
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transform applied to stored content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentEncoding {
    /// Stored verbatim
    Raw,
    /// zlib stream
    Zlib,
    /// 8-byte little-endian decompressed size followed by one LZ4 block
    Lz4,
    /// Flag outside the documented set
    Unknown(u8),
}

impl ContentEncoding {
    /// Parse from the record flag byte
    pub const fn from_byte(byte: u8) -> Self {
        match byte {
            0 => Self::Raw,
            1 => Self::Zlib,
            2 => Self::Lz4,
            other => Self::Unknown(other),
        }
    }

    /// Record flag byte
    pub const fn as_byte(self) -> u8 {
        match self {
            Self::Raw => 0,
            Self::Zlib => 1,
            Self::Lz4 => 2,
            Self::Unknown(other) => other,
        }
    }
}

impl fmt::Display for ContentEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Raw => f.write_str("raw"),
            Self::Zlib => f.write_str("zlib"),
            Self::Lz4 => f.write_str("lz4"),
            Self::Unknown(byte) => write!(f, "unknown({byte})"),
        }
    }
}

/// Bun's per-module text encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextEncoding {
    /// Arbitrary bytes
    Binary,
    /// Latin-1 text
    Latin1,
    /// UTF-8 text
    Utf8,
    /// Value outside the known set
    Other(u8),
}

impl TextEncoding {
    /// Parse from the record byte
    pub const fn from_byte(byte: u8) -> Self {
        match byte {
            0 => Self::Binary,
            1 => Self::Latin1,
            2 => Self::Utf8,
            other => Self::Other(other),
        }
    }

    /// Record byte
    pub const fn as_byte(self) -> u8 {
        match self {
            Self::Binary => 0,
            Self::Latin1 => 1,
            Self::Utf8 => 2,
            Self::Other(other) => other,
        }
    }
}

/// How a record describes its kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindTag {
    /// Explicit kind byte (versioned layout)
    Explicit(u8),
    /// Loader and text encoding, classified by name at resolve time (standalone layout)
    Module {
        /// Bun loader id, see [`loader`]
        loader: u8,
        /// Text encoding of the contents
        encoding: TextEncoding,
    },
}

/// Decoded entry record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryRecord {
    /// Position in the entry table
    pub index: usize,
    /// Kind information
    pub kind: KindTag,
    /// Name bytes
    pub name: Span,
    /// Content bytes
    pub content: Span,
    /// Transform applied to the content
    pub encoding: ContentEncoding,
    /// Strings carry one trailing NUL that is not part of the value
    pub nul_terminated: bool,
}

/// Versioned entry record (26 bytes, little-endian, absolute offsets)
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct VersionedRecord {
    /// Kind tag, see [`FileKind::tag`]
    pub kind: u8,
    /// Absolute name offset
    pub name_offset: u64,
    /// Name length
    pub name_length: u32,
    /// Absolute content offset
    pub content_offset: u64,
    /// Stored content length
    pub content_length: u32,
    /// Encoding flag, see [`ContentEncoding::as_byte`]
    pub encoding: u8,
}

impl VersionedRecord {
    fn into_entry(self, index: usize) -> EntryRecord {
        EntryRecord {
            index,
            kind: KindTag::Explicit(self.kind),
            name: Span::new(self.name_offset, u64::from(self.name_length)),
            content: Span::new(self.content_offset, u64::from(self.content_length)),
            encoding: ContentEncoding::from_byte(self.encoding),
            nul_terminated: false,
        }
    }
}

/// Bun `StringPointer`: offset and length relative to the graph blob
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, BinRead, BinWrite)]
#[brw(little)]
pub struct StringPointer {
    /// Offset from the start of the graph blob
    pub offset: u32,
    /// Length in bytes
    pub length: u32,
}

impl StringPointer {
    fn to_span(self, base: u64) -> Span {
        Span::new(base + u64::from(self.offset), u64::from(self.length))
    }
}

/// Bun `CompiledModuleGraphFile` record (36 bytes, little-endian)
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct ModuleRecord {
    /// Module path, usually under `/$bunfs/root/`
    pub name: StringPointer,
    /// Module source
    pub contents: StringPointer,
    /// Serialized source map
    pub sourcemap: StringPointer,
    /// Precompiled bytecode
    pub bytecode: StringPointer,
    /// Text encoding byte, see [`TextEncoding`]
    pub encoding: u8,
    /// Loader id, see [`loader`]
    pub loader: u8,
    /// ESM/CJS marker
    pub module_format: u8,
    /// Client/server marker
    pub side: u8,
}

impl ModuleRecord {
    fn into_entry(self, index: usize, base: u64) -> EntryRecord {
        EntryRecord {
            index,
            kind: KindTag::Module {
                loader: self.loader,
                encoding: TextEncoding::from_byte(self.encoding),
            },
            name: self.name.to_span(base),
            content: self.contents.to_span(base),
            encoding: ContentEncoding::Raw,
            nul_terminated: true,
        }
    }
}

/// Decode every record of the entry table, in table order
pub fn decode_table(source: &ByteSource<'_>, trailer: &Trailer) -> GraphResult<Vec<EntryRecord>> {
    check_table_fits(source, trailer)?;

    if trailer.record_size != trailer.layout.record_size() {
        return Err(GraphError::corrupt_table(format!(
            "record size {} does not match the {} layout",
            trailer.record_size, trailer.layout
        )));
    }

    let table = source.span(trailer.table_span())?;
    let mut records = Vec::with_capacity(trailer.entry_count);

    for (index, chunk) in table.chunks_exact(trailer.record_size).enumerate() {
        let mut cursor = Cursor::new(chunk);
        let record = match trailer.layout {
            Layout::Standalone => {
                ModuleRecord::read(&mut cursor)?.into_entry(index, trailer.pool_base)
            }
            Layout::Versioned(_) => VersionedRecord::read(&mut cursor)?.into_entry(index),
        };
        records.push(record);
    }

    Ok(records)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn write<T: for<'a> BinWrite<Args<'a> = ()> + binrw::meta::WriteEndian>(value: &T) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        value.write(&mut cursor).unwrap();
        cursor.into_inner()
    }

    #[test]
    fn test_record_sizes() {
        let versioned = VersionedRecord {
            kind: 1,
            name_offset: 0,
            name_length: 0,
            content_offset: 0,
            content_length: 0,
            encoding: 0,
        };
        assert_eq!(write(&versioned).len(), VERSIONED_RECORD_SIZE);

        let module = ModuleRecord {
            name: StringPointer::default(),
            contents: StringPointer::default(),
            sourcemap: StringPointer::default(),
            bytecode: StringPointer::default(),
            encoding: 2,
            loader: loader::JS,
            module_format: 0,
            side: 0,
        };
        assert_eq!(write(&module).len(), STANDALONE_RECORD_SIZE);
    }

    #[test]
    fn test_versioned_record_field_order() {
        let record = VersionedRecord {
            kind: 1,
            name_offset: 0x0102_0304_0506_0708,
            name_length: 0x0A0B_0C0D,
            content_offset: 0x1112_1314_1516_1718,
            content_length: 0x1A1B_1C1D,
            encoding: 2,
        };
        let bytes = write(&record);
        assert_eq!(bytes[0], 1);
        assert_eq!(&bytes[1..9], &0x0102_0304_0506_0708u64.to_le_bytes());
        assert_eq!(&bytes[9..13], &0x0A0B_0C0Du32.to_le_bytes());
        assert_eq!(&bytes[13..21], &0x1112_1314_1516_1718u64.to_le_bytes());
        assert_eq!(&bytes[21..25], &0x1A1B_1C1Du32.to_le_bytes());
        assert_eq!(bytes[25], 2);
    }

    #[test]
    fn test_module_record_spans_are_rebased() {
        let record = ModuleRecord {
            name: StringPointer {
                offset: 4,
                length: 10,
            },
            contents: StringPointer {
                offset: 20,
                length: 100,
            },
            sourcemap: StringPointer::default(),
            bytecode: StringPointer::default(),
            encoding: 2,
            loader: loader::TS,
            module_format: 1,
            side: 0,
        };
        let entry = record.into_entry(7, 1000);
        assert_eq!(entry.index, 7);
        assert_eq!(entry.name, Span::new(1004, 10));
        assert_eq!(entry.content, Span::new(1020, 100));
        assert_eq!(entry.encoding, ContentEncoding::Raw);
        assert!(entry.nul_terminated);
        assert_eq!(
            entry.kind,
            KindTag::Module {
                loader: loader::TS,
                encoding: TextEncoding::Utf8
            }
        );
    }

    #[test]
    fn test_decode_table_keeps_malformed_records() {
        let records = [
            VersionedRecord {
                kind: 1,
                name_offset: 0,
                name_length: 1,
                content_offset: 0,
                content_length: 1,
                encoding: 0,
            },
            VersionedRecord {
                kind: 99,
                name_offset: u64::MAX,
                name_length: 5,
                content_offset: 1 << 50,
                content_length: 5,
                encoding: 42,
            },
        ];
        let mut data = Vec::new();
        for record in &records {
            data.extend_from_slice(&write(record));
        }

        let source = ByteSource::new(&data);
        let trailer = Trailer {
            layout: Layout::Versioned(1),
            entry_count: 2,
            table_offset: 0,
            record_size: VERSIONED_RECORD_SIZE,
            pool_base: 0,
            entry_point: None,
        };
        let decoded = decode_table(&source, &trailer).unwrap();
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[1].kind, KindTag::Explicit(99));
        assert_eq!(decoded[1].encoding, ContentEncoding::Unknown(42));
        assert_eq!(decoded[1].name.end(), None);
    }

    #[test]
    fn test_decode_table_truncated() {
        let data = vec![0u8; VERSIONED_RECORD_SIZE + 3];
        let source = ByteSource::new(&data);
        let trailer = Trailer {
            layout: Layout::Versioned(1),
            entry_count: 2,
            table_offset: 0,
            record_size: VERSIONED_RECORD_SIZE,
            pool_base: 0,
            entry_point: None,
        };
        assert!(matches!(
            decode_table(&source, &trailer).unwrap_err(),
            GraphError::CorruptEntryTable { .. }
        ));
    }

    #[test]
    fn test_encoding_flags() {
        assert_eq!(ContentEncoding::from_byte(0), ContentEncoding::Raw);
        assert_eq!(ContentEncoding::from_byte(1), ContentEncoding::Zlib);
        assert_eq!(ContentEncoding::from_byte(2), ContentEncoding::Lz4);
        assert_eq!(ContentEncoding::from_byte(9), ContentEncoding::Unknown(9));
        assert_eq!(ContentEncoding::Unknown(9).as_byte(), 9);
        assert_eq!(ContentEncoding::Unknown(9).to_string(), "unknown(9)");
    }

    #[test]
    fn test_kind_tags() {
        for kind in [FileKind::Script, FileKind::Asset, FileKind::SourceMap] {
            assert_eq!(FileKind::from_tag(kind.tag()), Some(kind));
        }
        assert_eq!(FileKind::from_tag(0), None);
        assert_eq!(FileKind::from_tag(4), None);
    }
}
