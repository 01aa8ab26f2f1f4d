//! Bounds-checked view over the raw executable bytes

use crate::entry::Span;
use crate::error::OutOfBounds;

/// Random-access view over a raw image
///
/// The image is borrowed, never copied: callers hand in a whole-file buffer or
/// a memory map and every read goes through [`ByteSource::slice`].
#[derive(Debug, Clone, Copy)]
pub struct ByteSource<'a> {
    data: &'a [u8],
}

/// Outcome of a bounded backward marker search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerScan {
    /// Start offset of the last occurrence, if any
    pub offset: Option<usize>,
    /// Tail bytes examined before the search stopped
    pub scanned: usize,
}

impl<'a> ByteSource<'a> {
    /// Wrap a byte buffer
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// Total length in bytes
    pub const fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the image is empty
    pub const fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Borrow `length` bytes starting at `offset`
    pub fn slice(&self, offset: u64, length: u64) -> Result<&'a [u8], OutOfBounds> {
        let bounds = OutOfBounds {
            offset,
            length,
            available: self.data.len(),
        };
        let end = offset.checked_add(length).ok_or(bounds)?;
        let start = usize::try_from(offset).map_err(|_| bounds)?;
        let end = usize::try_from(end).map_err(|_| bounds)?;
        self.data.get(start..end).ok_or(bounds)
    }

    /// Borrow the bytes a [`Span`] refers to
    pub fn span(&self, span: Span) -> Result<&'a [u8], OutOfBounds> {
        self.slice(span.offset, span.length)
    }

    /// Last occurrence of `marker` starting within the final `window` bytes
    pub fn find_last(&self, marker: &[u8], window: usize) -> Option<usize> {
        self.scan_last(marker, window).offset
    }

    /// Backward search for `marker`, reporting how much of the tail was read
    ///
    /// Only the final `window` bytes are considered, so a missing marker costs
    /// at most `window` bytes no matter how large the image is.
    pub fn scan_last(&self, marker: &[u8], window: usize) -> MarkerScan {
        self.scan_last_before(marker, window, self.data.len())
    }

    /// Like [`ByteSource::scan_last`], but only matches ending at or before `end`
    pub fn scan_last_before(&self, marker: &[u8], window: usize, end: usize) -> MarkerScan {
        let window_start = self.data.len().saturating_sub(window);
        let end = end.clamp(window_start, self.data.len());
        let haystack = &self.data[window_start..end];
        let scanned_all = self.data.len() - window_start;

        if marker.is_empty() || haystack.len() < marker.len() {
            return MarkerScan {
                offset: None,
                scanned: scanned_all,
            };
        }

        match haystack.windows(marker.len()).rposition(|w| w == marker) {
            Some(pos) => MarkerScan {
                offset: Some(window_start + pos),
                scanned: scanned_all - pos,
            },
            None => MarkerScan {
                offset: None,
                scanned: scanned_all,
            },
        }
    }
}

impl<'a> From<&'a [u8]> for ByteSource<'a> {
    fn from(data: &'a [u8]) -> Self {
        Self::new(data)
    }
}
