//! Trailer decoding and layout selection
//!
//! Two layouts are recognized, told apart mostly by what follows the marker:
//!
//! ```text
//! Standalone (bun build --compile):
//! [native code][graph blob: byte_count bytes][offsets block: 32][marker][u64 size suffix | padding]
//!
//! Versioned:
//! [anything][marker][trailer: 16][... entry table and pools at absolute offsets ...]
//! ```
//!
//! In the standalone layout the offsets block sits directly in front of the
//! marker. Linux builds end the file with the marker and an 8-byte size;
//! Windows and macOS builds pad the section that holds the graph, so any
//! number of unrelated bytes may follow. Those images are tried as versioned
//! first and fall back to standalone when no valid versioned trailer is there.
//! String pointers in that layout are relative to the start of the graph blob.
//! In the versioned layout the trailer follows the marker and every offset is
//! absolute.

use crate::entry::{STANDALONE_RECORD_SIZE, Span, VERSIONED_RECORD_SIZE};
use crate::error::{GraphError, GraphResult};
use crate::locate::FooterPosition;
use crate::source::ByteSource;
use binrw::{BinRead, BinWrite};
use std::fmt;
use std::io::Cursor;
use tracing::debug;

/// Width of the versioned trailer that follows the marker
pub const VERSIONED_TRAILER_SIZE: usize = 16;

/// Width of the standalone offsets block that precedes the marker
pub const STANDALONE_OFFSETS_SIZE: usize = 32;

/// Size suffix some platforms append after the marker
pub const SIZE_SUFFIX_LEN: usize = 8;

/// The only versioned layout this decoder understands
pub const LAYOUT_VERSION: u32 = 1;

/// Upper bound on entry count, guarding against corrupt counts
pub const MAX_ENTRY_COUNT: usize = 1 << 20;

/// Versioned trailer (16 bytes, little-endian)
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct VersionedTrailer {
    /// Number of records in the entry table
    pub entry_count: u32,
    /// Absolute file offset of the entry table
    pub table_offset: u64,
    /// Layout version, must be [`LAYOUT_VERSION`]
    pub version: u32,
}

/// Bun's `Offsets` block (32 bytes, little-endian)
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct StandaloneOffsets {
    /// Length of the graph blob preceding this block
    pub byte_count: u64,
    /// Module table offset, relative to the blob start
    pub modules_offset: u32,
    /// Module table length in bytes
    pub modules_length: u32,
    /// Index of the entry point module
    pub entry_point_id: u32,
    /// Embedded `--compile-exec-argv` string offset
    pub exec_argv_offset: u32,
    /// Embedded `--compile-exec-argv` string length
    pub exec_argv_length: u32,
    /// Build flags
    pub flags: u32,
}

/// Which on-disk layout a trailer uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// Bun's native layout: offsets block before the marker
    Standalone,
    /// Versioned trailer after the marker
    Versioned(u32),
}

impl Layout {
    /// Width of one entry record in this layout
    pub const fn record_size(self) -> usize {
        match self {
            Self::Standalone => STANDALONE_RECORD_SIZE,
            Self::Versioned(_) => VERSIONED_RECORD_SIZE,
        }
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Standalone => write!(f, "standalone"),
            Self::Versioned(version) => write!(f, "versioned v{version}"),
        }
    }
}

/// Decoded trailer, normalized to absolute offsets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trailer {
    /// Layout the trailer was read from
    pub layout: Layout,
    /// Number of entry records
    pub entry_count: usize,
    /// Absolute offset of the entry table
    pub table_offset: u64,
    /// Width of one entry record
    pub record_size: usize,
    /// Absolute offset that record slice offsets are relative to
    pub pool_base: u64,
    /// Index of the entry point module, when the layout records one
    pub entry_point: Option<usize>,
}

impl Trailer {
    /// Decode the trailer belonging to a located marker
    pub fn decode(
        source: &ByteSource<'_>,
        position: &FooterPosition,
        max_entries: usize,
    ) -> GraphResult<Self> {
        let trailer = match position.trailing {
            0 | SIZE_SUFFIX_LEN => decode_standalone(source, position, max_entries)?,
            _ => match decode_versioned(source, position, max_entries) {
                Ok(trailer) => trailer,
                Err(versioned) => decode_standalone(source, position, max_entries)
                    .map_err(|standalone| {
                        debug!("Not a padded standalone graph either: {standalone}");
                        versioned
                    })?,
            },
        };

        debug!(
            "Decoded {} trailer: {} entries, table at {}",
            trailer.layout, trailer.entry_count, trailer.table_offset
        );

        Ok(trailer)
    }

    /// Length of the entry table in bytes
    pub const fn table_len(&self) -> u64 {
        self.entry_count as u64 * self.record_size as u64
    }

    /// The entry table as a span of the raw image
    pub const fn table_span(&self) -> Span {
        Span::new(self.table_offset, self.table_len())
    }
}

fn decode_versioned(
    source: &ByteSource<'_>,
    position: &FooterPosition,
    max_entries: usize,
) -> GraphResult<Trailer> {
    if position.trailing < VERSIONED_TRAILER_SIZE {
        return Err(GraphError::TruncatedTrailer {
            offset: position.trailer_start,
            needed: VERSIONED_TRAILER_SIZE,
            available: position.trailing,
        });
    }

    let bytes = source.slice(
        position.trailer_start as u64,
        VERSIONED_TRAILER_SIZE as u64,
    )?;
    let raw = VersionedTrailer::read(&mut Cursor::new(bytes))?;

    if raw.version != LAYOUT_VERSION {
        return Err(GraphError::UnsupportedLayout(raw.version));
    }

    let entry_count = raw.entry_count as usize;
    check_entry_count(entry_count, max_entries)?;

    if raw.table_offset > source.len() as u64 {
        return Err(GraphError::corrupt_trailer(format!(
            "table offset {} is past end of file ({} bytes)",
            raw.table_offset,
            source.len()
        )));
    }

    let trailer = Trailer {
        layout: Layout::Versioned(raw.version),
        entry_count,
        table_offset: raw.table_offset,
        record_size: VERSIONED_RECORD_SIZE,
        pool_base: 0,
        entry_point: None,
    };
    check_table_fits(source, &trailer)?;

    Ok(trailer)
}

fn decode_standalone(
    source: &ByteSource<'_>,
    position: &FooterPosition,
    max_entries: usize,
) -> GraphResult<Trailer> {
    let Some(offsets_start) = position
        .marker_offset
        .checked_sub(STANDALONE_OFFSETS_SIZE)
    else {
        return Err(GraphError::TruncatedTrailer {
            offset: 0,
            needed: STANDALONE_OFFSETS_SIZE,
            available: position.marker_offset,
        });
    };

    let bytes = source.slice(offsets_start as u64, STANDALONE_OFFSETS_SIZE as u64)?;
    let raw = StandaloneOffsets::read(&mut Cursor::new(bytes))?;

    if raw.byte_count == 0 || raw.byte_count > offsets_start as u64 {
        return Err(GraphError::corrupt_trailer(format!(
            "graph byte count {} does not fit before offset {}",
            raw.byte_count, offsets_start
        )));
    }
    let graph_start = offsets_start as u64 - raw.byte_count;

    let modules_end = u64::from(raw.modules_offset) + u64::from(raw.modules_length);
    if modules_end > raw.byte_count {
        return Err(GraphError::corrupt_table(format!(
            "module table {}..{} exceeds graph of {} bytes",
            raw.modules_offset, modules_end, raw.byte_count
        )));
    }

    let modules_length = raw.modules_length as usize;
    if modules_length % STANDALONE_RECORD_SIZE != 0 {
        return Err(GraphError::corrupt_table(format!(
            "module table length {modules_length} is not a multiple of the \
             {STANDALONE_RECORD_SIZE}-byte record width"
        )));
    }

    let entry_count = modules_length / STANDALONE_RECORD_SIZE;
    check_entry_count(entry_count, max_entries)?;

    let entry_point = Some(raw.entry_point_id as usize).filter(|&id| id < entry_count);

    let trailer = Trailer {
        layout: Layout::Standalone,
        entry_count,
        table_offset: graph_start + u64::from(raw.modules_offset),
        record_size: STANDALONE_RECORD_SIZE,
        pool_base: graph_start,
        entry_point,
    };
    check_table_fits(source, &trailer)?;

    Ok(trailer)
}

fn check_entry_count(entry_count: usize, max_entries: usize) -> GraphResult<()> {
    if entry_count > max_entries {
        return Err(GraphError::corrupt_trailer(format!(
            "entry count {entry_count} exceeds limit of {max_entries}"
        )));
    }
    Ok(())
}

/// Fail with `CorruptEntryTable` when the table runs past end of file
pub(crate) fn check_table_fits(source: &ByteSource<'_>, trailer: &Trailer) -> GraphResult<()> {
    let table = trailer.table_span();
    match table.end() {
        Some(end) if end <= source.len() as u64 => Ok(()),
        _ => Err(GraphError::corrupt_table(format!(
            "table at offset {} with {} records of {} bytes exceeds file length {}",
            trailer.table_offset,
            trailer.entry_count,
            trailer.record_size,
            source.len()
        ))),
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::locate::{MARKER, locate};
    use binrw::BinWrite;

    fn versioned_image(trailer: VersionedTrailer, extra: &[u8]) -> Vec<u8> {
        let mut data = vec![0xEE; 8];
        data.extend_from_slice(MARKER);
        let mut cursor = Cursor::new(Vec::new());
        trailer.write(&mut cursor).unwrap();
        data.extend_from_slice(&cursor.into_inner());
        data.extend_from_slice(extra);
        data
    }

    fn standalone_image(offsets: StandaloneOffsets, graph: &[u8]) -> Vec<u8> {
        let mut data = vec![0x7F, b'E', b'L', b'F'];
        data.extend_from_slice(graph);
        let mut cursor = Cursor::new(Vec::new());
        offsets.write(&mut cursor).unwrap();
        data.extend_from_slice(&cursor.into_inner());
        data.extend_from_slice(MARKER);
        data
    }

    fn decode(data: &[u8]) -> GraphResult<Trailer> {
        let source = ByteSource::new(data);
        let position = locate(&source)?;
        Trailer::decode(&source, &position, MAX_ENTRY_COUNT)
    }

    #[test]
    fn test_versioned_trailer_size() {
        let mut cursor = Cursor::new(Vec::new());
        VersionedTrailer {
            entry_count: 1,
            table_offset: 2,
            version: 3,
        }
        .write(&mut cursor)
        .unwrap();
        assert_eq!(cursor.into_inner().len(), VERSIONED_TRAILER_SIZE);
    }

    #[test]
    fn test_standalone_offsets_size() {
        let offsets = StandaloneOffsets {
            byte_count: 1,
            modules_offset: 2,
            modules_length: 3,
            entry_point_id: 4,
            exec_argv_offset: 5,
            exec_argv_length: 6,
            flags: 7,
        };
        let mut cursor = Cursor::new(Vec::new());
        offsets.write(&mut cursor).unwrap();
        let bytes = cursor.into_inner();
        assert_eq!(bytes.len(), STANDALONE_OFFSETS_SIZE);
        assert_eq!(&bytes[..8], &1u64.to_le_bytes());
    }

    #[test]
    fn test_decode_versioned() {
        // Table lives right after the trailer: 8 + 16 + 16 = 40
        let data = versioned_image(
            VersionedTrailer {
                entry_count: 2,
                table_offset: 40,
                version: LAYOUT_VERSION,
            },
            &[0u8; 2 * VERSIONED_RECORD_SIZE],
        );
        let trailer = decode(&data).unwrap();
        assert_eq!(trailer.layout, Layout::Versioned(1));
        assert_eq!(trailer.entry_count, 2);
        assert_eq!(trailer.table_offset, 40);
        assert_eq!(trailer.record_size, VERSIONED_RECORD_SIZE);
        assert_eq!(trailer.pool_base, 0);
        assert_eq!(trailer.entry_point, None);
    }

    #[test]
    fn test_versioned_table_past_end_is_corrupt_table() {
        let data = versioned_image(
            VersionedTrailer {
                entry_count: 3,
                table_offset: 40,
                version: LAYOUT_VERSION,
            },
            &[0u8; VERSIONED_RECORD_SIZE],
        );
        let err = decode(&data).unwrap_err();
        assert!(matches!(err, GraphError::CorruptEntryTable { .. }), "{err}");
    }

    #[test]
    fn test_versioned_table_offset_past_end_is_corrupt_trailer() {
        let data = versioned_image(
            VersionedTrailer {
                entry_count: 0,
                table_offset: 1 << 40,
                version: LAYOUT_VERSION,
            },
            &[0u8; 4],
        );
        let err = decode(&data).unwrap_err();
        assert!(matches!(err, GraphError::CorruptTrailer { .. }), "{err}");
    }

    #[test]
    fn test_versioned_unknown_version() {
        let data = versioned_image(
            VersionedTrailer {
                entry_count: 0,
                table_offset: 40,
                version: 7,
            },
            &[],
        );
        assert!(matches!(
            decode(&data).unwrap_err(),
            GraphError::UnsupportedLayout(7)
        ));
    }

    #[test]
    fn test_versioned_entry_count_cap() {
        let data = versioned_image(
            VersionedTrailer {
                entry_count: u32::MAX,
                table_offset: 40,
                version: LAYOUT_VERSION,
            },
            &[],
        );
        assert!(matches!(
            decode(&data).unwrap_err(),
            GraphError::CorruptTrailer { .. }
        ));
    }

    #[test]
    fn test_truncated_versioned_trailer() {
        let mut data = vec![0u8; 4];
        data.extend_from_slice(MARKER);
        data.extend_from_slice(&[1, 0, 0, 0, 9]);
        let err = decode(&data).unwrap_err();
        assert!(matches!(
            err,
            GraphError::TruncatedTrailer {
                offset: 20,
                needed: VERSIONED_TRAILER_SIZE,
                available: 5
            }
        ));
    }

    #[test]
    fn test_decode_standalone() {
        // Graph: 10 bytes of strings then one 36-byte record
        let graph = vec![0u8; 10 + STANDALONE_RECORD_SIZE];
        let data = standalone_image(
            StandaloneOffsets {
                byte_count: graph.len() as u64,
                modules_offset: 10,
                modules_length: STANDALONE_RECORD_SIZE as u32,
                entry_point_id: 0,
                exec_argv_offset: 0,
                exec_argv_length: 0,
                flags: 0,
            },
            &graph,
        );
        let trailer = decode(&data).unwrap();
        assert_eq!(trailer.layout, Layout::Standalone);
        assert_eq!(trailer.entry_count, 1);
        assert_eq!(trailer.pool_base, 4);
        assert_eq!(trailer.table_offset, 14);
        assert_eq!(trailer.entry_point, Some(0));
    }

    #[test]
    fn test_standalone_with_size_suffix() {
        let graph = vec![0u8; STANDALONE_RECORD_SIZE];
        let mut data = standalone_image(
            StandaloneOffsets {
                byte_count: graph.len() as u64,
                modules_offset: 0,
                modules_length: STANDALONE_RECORD_SIZE as u32,
                entry_point_id: 5,
                exec_argv_offset: 0,
                exec_argv_length: 0,
                flags: 0,
            },
            &graph,
        );
        data.extend_from_slice(&(data.len() as u64).to_le_bytes());
        let trailer = decode(&data).unwrap();
        assert_eq!(trailer.layout, Layout::Standalone);
        assert_eq!(trailer.entry_count, 1);
        // Entry point id out of range is dropped
        assert_eq!(trailer.entry_point, None);
    }

    #[test]
    fn test_standalone_followed_by_section_padding() {
        let graph = vec![0u8; STANDALONE_RECORD_SIZE];
        let mut data = standalone_image(
            StandaloneOffsets {
                byte_count: graph.len() as u64,
                modules_offset: 0,
                modules_length: STANDALONE_RECORD_SIZE as u32,
                entry_point_id: 0,
                exec_argv_offset: 0,
                exec_argv_length: 0,
                flags: 0,
            },
            &graph,
        );
        let marker_offset = data.len() - MARKER.len();
        data.extend_from_slice(&[0u8; 200]);

        let trailer = decode(&data).unwrap();
        assert_eq!(trailer.layout, Layout::Standalone);
        assert_eq!(trailer.entry_count, 1);
        assert_eq!(trailer.pool_base, 4);
        assert_eq!(
            trailer.table_offset + trailer.table_len(),
            (marker_offset - STANDALONE_OFFSETS_SIZE) as u64
        );
    }

    #[test]
    fn test_padding_without_offsets_block_reports_versioned_error() {
        let mut data = vec![0u8; 64];
        data.extend_from_slice(MARKER);
        data.extend_from_slice(&[0u8; 100]);
        assert!(matches!(
            decode(&data).unwrap_err(),
            GraphError::UnsupportedLayout(0)
        ));
    }

    #[test]
    fn test_standalone_zero_byte_count() {
        let data = standalone_image(
            StandaloneOffsets {
                byte_count: 0,
                modules_offset: 0,
                modules_length: 0,
                entry_point_id: 0,
                exec_argv_offset: 0,
                exec_argv_length: 0,
                flags: 0,
            },
            &[],
        );
        assert!(matches!(
            decode(&data).unwrap_err(),
            GraphError::CorruptTrailer { .. }
        ));
    }

    #[test]
    fn test_standalone_unrecognized_record_width() {
        let graph = vec![0u8; 52];
        let data = standalone_image(
            StandaloneOffsets {
                byte_count: 52,
                modules_offset: 0,
                modules_length: 52,
                entry_point_id: 0,
                exec_argv_offset: 0,
                exec_argv_length: 0,
                flags: 0,
            },
            &graph,
        );
        assert!(matches!(
            decode(&data).unwrap_err(),
            GraphError::CorruptEntryTable { .. }
        ));
    }

    #[test]
    fn test_standalone_marker_at_start() {
        let data = MARKER.to_vec();
        assert!(matches!(
            decode(&data).unwrap_err(),
            GraphError::TruncatedTrailer {
                needed: STANDALONE_OFFSETS_SIZE,
                available: 0,
                ..
            }
        ));
    }

    #[test]
    fn test_layout_display() {
        assert_eq!(Layout::Standalone.to_string(), "standalone");
        assert_eq!(Layout::Versioned(1).to_string(), "versioned v1");
    }
}
