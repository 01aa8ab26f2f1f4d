//! Output file naming
//!
//! Module names inside a Bun executable are virtual paths such as
//! `/$bunfs/root/src/cli.js` (or `B:/~BUN/root/...` on Windows builds). They
//! are flattened into single file names that are safe on common filesystems.

use std::collections::HashSet;
use unbun_graph::has_script_extension;

/// Virtual filesystem roots Bun prefixes module names with
pub const VIRTUAL_ROOTS: [&str; 2] = ["/$bunfs/root/", "B:/~BUN/root/"];

/// Name used when nothing is left after sanitizing
pub const FALLBACK_NAME: &str = "bundle";

/// Extension appended to scripts that lack one
pub const SCRIPT_SUFFIX: &str = ".js";

/// Flatten a module name into a single safe file name
pub fn sanitize(name: &str) -> String {
    let relative = VIRTUAL_ROOTS
        .iter()
        .find_map(|root| name.strip_prefix(root))
        .unwrap_or(name);

    let flattened: String = relative
        .trim_matches(|c| c == '/' || c == '\\')
        .chars()
        .map(|c| if is_unsafe(c) { '_' } else { c })
        .collect();

    if matches!(flattened.as_str(), "" | "." | "..") {
        FALLBACK_NAME.to_string()
    } else {
        flattened
    }
}

fn is_unsafe(c: char) -> bool {
    matches!(c, '/' | '\\' | '<' | '>' | ':' | '"' | '|' | '?' | '*') || c.is_control()
}

/// Output file name for a module
pub fn output_name(name: &str, is_script: bool) -> String {
    let base = sanitize(name);
    if is_script && !has_script_extension(&base) {
        format!("{base}{SCRIPT_SUFFIX}")
    } else {
        base
    }
}

/// Hands out unique file names in the order they are requested
#[derive(Debug, Default)]
pub struct NameAllocator {
    used: HashSet<String>,
}

impl NameAllocator {
    /// Create an empty allocator
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve `name`, adding `_1`, `_2`, ... before the extension on collision
    pub fn allocate(&mut self, name: &str) -> String {
        if self.used.insert(name.to_string()) {
            return name.to_string();
        }

        let (stem, extension) = split_extension(name);
        let mut counter = 1usize;
        loop {
            let candidate = format!("{stem}_{counter}{extension}");
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
            counter += 1;
        }
    }

    /// Mark `name` as taken without handing it out
    pub fn reserve(&mut self, name: &str) {
        self.used.insert(name.to_string());
    }

    /// Number of names handed out
    pub fn len(&self) -> usize {
        self.used.len()
    }

    /// Whether no names were handed out
    pub fn is_empty(&self) -> bool {
        self.used.is_empty()
    }
}

/// Split at the last dot, keeping leading dots in the stem
fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(pos) if pos > 0 => name.split_at(pos),
        _ => (name, ""),
    }
}
