//! Marker search near the end of the executable

use crate::error::{GraphError, GraphResult};
use crate::source::ByteSource;
use tracing::debug;

/// Marker Bun writes next to the module graph trailer
pub const MARKER: &[u8; 16] = b"\n---- Bun! ----\n";

/// Default number of tail bytes searched for the marker (16 MiB)
///
/// The marker sits at or very near the end of the file, but a versioned
/// trailer may be followed by its table and pools, so the window leaves room
/// for those.
pub const DEFAULT_SEARCH_WINDOW: usize = 16 * 1024 * 1024;

/// Where the marker was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FooterPosition {
    /// Start offset of the marker
    pub marker_offset: usize,
    /// First byte after the marker, where a versioned trailer begins
    pub trailer_start: usize,
    /// Bytes between the end of the marker and end of file
    pub trailing: usize,
    /// Tail bytes examined to find the marker
    pub scanned: usize,
}

/// Locate the marker with the default search window
pub fn locate(source: &ByteSource<'_>) -> GraphResult<FooterPosition> {
    locate_within(source, DEFAULT_SEARCH_WINDOW)
}

/// Locate the last marker whose start lies within the final `window` bytes
pub fn locate_within(source: &ByteSource<'_>, window: usize) -> GraphResult<FooterPosition> {
    let scan = source.scan_last(MARKER, window);
    let Some(marker_offset) = scan.offset else {
        return Err(GraphError::NotAModuleGraphBinary {
            scanned: scan.scanned,
        });
    };

    let position = footer_position(source, marker_offset, scan.scanned);
    debug!(
        "Found module graph marker at offset {} ({} trailing bytes, {} bytes scanned)",
        position.marker_offset, position.trailing, position.scanned
    );

    Ok(position)
}

/// Locate the next marker that starts before `previous`, within the same window
pub fn locate_before(
    source: &ByteSource<'_>,
    window: usize,
    previous: &FooterPosition,
) -> Option<FooterPosition> {
    // Occurrences may overlap by all but one byte
    let end = previous.marker_offset + MARKER.len() - 1;
    let scan = source.scan_last_before(MARKER, window, end);
    let scanned = scan.scanned;
    scan.offset
        .map(|marker_offset| footer_position(source, marker_offset, scanned))
}

fn footer_position(
    source: &ByteSource<'_>,
    marker_offset: usize,
    scanned: usize,
) -> FooterPosition {
    let trailer_start = marker_offset + MARKER.len();
    FooterPosition {
        marker_offset,
        trailer_start,
        trailing: source.len() - trailer_start,
        scanned,
    }
}
