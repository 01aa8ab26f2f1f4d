//! End-to-end extraction
//!
//! [`ModuleGraph::parse`] does all the structural work up front (marker,
//! trailer, entry table) so fatal errors surface before any content is
//! touched. Content is then resolved lazily, record by record, through
//! [`ModuleGraph::files`] and [`ModuleGraph::scripts`].

use crate::entry::{EntryRecord, FileKind, decode_table};
use crate::error::{EntryError, GraphResult};
use crate::locate::{DEFAULT_SEARCH_WINDOW, FooterPosition, locate_before, locate_within};
use crate::resolve::{ResolvedFile, resolve};
use crate::source::ByteSource;
use crate::trailer::{Layout, MAX_ENTRY_COUNT, Trailer};
use tracing::{debug, info, warn};

/// Most marker occurrences tried before giving up on an image
pub const MAX_MARKER_CANDIDATES: usize = 16;

/// Which records an extraction keeps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Selection {
    /// Only script records
    #[default]
    Scripts,
    /// Every record that resolves
    All,
}

/// Tunables for an extraction run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Tail bytes searched for the marker
    pub search_window: usize,
    /// Largest accepted entry count
    pub max_entries: usize,
    /// Records to keep
    pub selection: Selection,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            search_window: DEFAULT_SEARCH_WINDOW,
            max_entries: MAX_ENTRY_COUNT,
            selection: Selection::Scripts,
        }
    }
}

impl ExtractOptions {
    /// Keep every resolvable record
    #[must_use]
    pub const fn all(mut self) -> Self {
        self.selection = Selection::All;
        self
    }
}

/// A located and structurally validated module graph
#[derive(Debug, Clone)]
pub struct ModuleGraph<'a> {
    source: ByteSource<'a>,
    position: FooterPosition,
    trailer: Trailer,
    records: Vec<EntryRecord>,
}

impl<'a> ModuleGraph<'a> {
    /// Parse with default options
    pub fn parse(data: &'a [u8]) -> GraphResult<Self> {
        Self::parse_with(data, &ExtractOptions::default())
    }

    /// Locate the marker, decode the trailer and the entry table
    ///
    /// The last marker in the search window is tried first. When it does not
    /// decode, up to [`MAX_MARKER_CANDIDATES`] earlier copies are tried before
    /// the error for the last one is returned.
    pub fn parse_with(data: &'a [u8], options: &ExtractOptions) -> GraphResult<Self> {
        let source = ByteSource::new(data);
        let last = locate_within(&source, options.search_window)?;
        let err = match Self::parse_at(source, last, options.max_entries) {
            Ok(graph) => return Ok(graph),
            Err(err) => err,
        };

        // Packaged files may contain the marker text themselves
        let mut position = last;
        for _ in 1..MAX_MARKER_CANDIDATES {
            let Some(earlier) = locate_before(&source, options.search_window, &position) else {
                break;
            };
            debug!(
                "Marker at offset {} did not decode ({err}), trying offset {}",
                position.marker_offset, earlier.marker_offset
            );
            if let Ok(graph) = Self::parse_at(source, earlier, options.max_entries) {
                return Ok(graph);
            }
            position = earlier;
        }

        Err(err)
    }

    fn parse_at(
        source: ByteSource<'a>,
        position: FooterPosition,
        max_entries: usize,
    ) -> GraphResult<Self> {
        let trailer = Trailer::decode(&source, &position, max_entries)?;
        let records = decode_table(&source, &trailer)?;

        debug!(
            "Decoded {} entry records from {} layout",
            records.len(),
            trailer.layout
        );

        Ok(Self {
            source,
            position,
            trailer,
            records,
        })
    }

    /// Layout the graph was stored in
    pub const fn layout(&self) -> Layout {
        self.trailer.layout
    }

    /// Decoded trailer
    pub const fn trailer(&self) -> &Trailer {
        &self.trailer
    }

    /// Where the marker was found
    pub const fn position(&self) -> &FooterPosition {
        &self.position
    }

    /// Entry records in table order
    pub fn records(&self) -> &[EntryRecord] {
        &self.records
    }

    /// Number of entry records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Index of the entry point module, when recorded
    pub const fn entry_point(&self) -> Option<usize> {
        self.trailer.entry_point
    }

    /// Resolve every record lazily, in table order
    pub fn files(&self) -> Files<'_, 'a> {
        Files {
            graph: self,
            next: 0,
            kind: None,
        }
    }

    /// Resolve lazily, keeping scripts and record errors
    pub fn scripts(&self) -> Files<'_, 'a> {
        Files {
            graph: self,
            next: 0,
            kind: Some(FileKind::Script),
        }
    }
}

/// Lazy iterator over resolved records
///
/// Record errors are always yielded, whatever the kind filter, so callers can
/// count and report them.
#[derive(Debug, Clone)]
pub struct Files<'g, 'a> {
    graph: &'g ModuleGraph<'a>,
    next: usize,
    kind: Option<FileKind>,
}

impl Iterator for Files<'_, '_> {
    type Item = Result<ResolvedFile, EntryError>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(record) = self.graph.records.get(self.next) {
            self.next += 1;
            match resolve(&self.graph.source, record) {
                Ok(file) if self.kind.is_none_or(|kind| kind == file.kind) => {
                    return Some(Ok(file));
                }
                Ok(_) => {}
                Err(error) => {
                    return Some(Err(EntryError {
                        index: record.index,
                        error,
                    }));
                }
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.graph.records.len() - self.next))
    }
}

/// Outcome of an extraction run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    /// Selected files in table order
    pub files: Vec<ResolvedFile>,
    /// Records that failed to resolve
    pub skipped: Vec<EntryError>,
    /// Number of records in the entry table
    pub total_entries: usize,
    /// Layout the graph was stored in
    pub layout: Layout,
    /// Index of the entry point module, when recorded
    pub entry_point: Option<usize>,
}

impl Extraction {
    /// Whether at least one script was extracted
    pub fn has_scripts(&self) -> bool {
        self.files.iter().any(ResolvedFile::is_script)
    }

    /// The entry point file, if it was extracted
    pub fn entry_file(&self) -> Option<&ResolvedFile> {
        let index = self.entry_point?;
        self.files.iter().find(|file| file.index == index)
    }
}

/// Extract every script file with default options
pub fn extract_script_files(data: &[u8]) -> GraphResult<Extraction> {
    extract_with(data, &ExtractOptions::default())
}

/// Extract with explicit options
pub fn extract_with(data: &[u8], options: &ExtractOptions) -> GraphResult<Extraction> {
    let graph = ModuleGraph::parse_with(data, options)?;

    let iter = match options.selection {
        Selection::Scripts => graph.scripts(),
        Selection::All => graph.files(),
    };

    let mut files = Vec::new();
    let mut skipped = Vec::new();
    for result in iter {
        match result {
            Ok(file) => files.push(file),
            Err(error) => {
                warn!("Skipping {error}");
                skipped.push(error);
            }
        }
    }

    info!(
        "Extracted {} of {} entries ({} skipped, {} layout)",
        files.len(),
        graph.len(),
        skipped.len(),
        graph.layout()
    );

    Ok(Extraction {
        files,
        skipped,
        total_entries: graph.len(),
        layout: graph.layout(),
        entry_point: graph.entry_point(),
    })
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::builder::{BuildLayout, ModuleGraphBuilder};
    use crate::entry::{TextEncoding, loader};
    use crate::error::RecordError;

    fn sample() -> Vec<u8> {
        ModuleGraphBuilder::new(BuildLayout::Versioned)
            .with_prefix(vec![0x7F; 32])
            .add_file("main.js", FileKind::Script, b"console.log('hi')")
            .add_file("logo.svg", FileKind::Asset, b"<svg/>")
            .add_raw(7, 0, "weird.bin", b"??")
            .add_file("util.js", FileKind::Script, b"export {}")
            .build()
            .unwrap()
    }

    #[test]
    fn test_scripts_yields_errors_and_scripts_only() {
        let data = sample();
        let graph = ModuleGraph::parse(&data).unwrap();
        assert_eq!(graph.len(), 4);
        assert_eq!(graph.layout(), Layout::Versioned(1));

        let results: Vec<_> = graph.scripts().collect();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().name, "main.js");
        assert_eq!(
            results[1].as_ref().unwrap_err(),
            &EntryError {
                index: 2,
                error: RecordError::UnknownKind(7)
            }
        );
        assert_eq!(results[2].as_ref().unwrap().name, "util.js");
    }

    #[test]
    fn test_files_is_lazy_and_ordered() {
        let data = sample();
        let graph = ModuleGraph::parse(&data).unwrap();
        let mut files = graph.files();
        assert_eq!(files.next().unwrap().unwrap().index, 0);
        assert_eq!(files.next().unwrap().unwrap().index, 1);
        assert!(files.next().unwrap().is_err());
        assert_eq!(files.next().unwrap().unwrap().index, 3);
        assert!(files.next().is_none());
    }

    #[test]
    fn test_extract_selection() {
        let data = sample();
        let scripts = extract_script_files(&data).unwrap();
        assert_eq!(scripts.files.len(), 2);
        assert_eq!(scripts.skipped.len(), 1);
        assert_eq!(scripts.total_entries, 4);
        assert!(scripts.has_scripts());

        let all = extract_with(&data, &ExtractOptions::default().all()).unwrap();
        assert_eq!(all.files.len(), 3);
        assert_eq!(all.files[1].kind, FileKind::Asset);
    }

    #[test]
    fn test_extract_is_deterministic() {
        let data = sample();
        assert_eq!(
            extract_script_files(&data).unwrap(),
            extract_script_files(&data).unwrap()
        );
    }

    #[test]
    fn test_entry_file() {
        let data = ModuleGraphBuilder::new(BuildLayout::Standalone)
            .add_module("/$bunfs/root/a.js", b"a()", loader::JS, TextEncoding::Utf8)
            .add_module("/$bunfs/root/b.js", b"b()", loader::JS, TextEncoding::Utf8)
            .with_entry_point(1)
            .build()
            .unwrap();
        let extraction = extract_script_files(&data).unwrap();
        assert_eq!(extraction.entry_point, Some(1));
        assert_eq!(extraction.entry_file().unwrap().name, "/$bunfs/root/b.js");
    }
}
