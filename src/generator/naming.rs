//! Output file naming.

use std::collections::{HashMap, HashSet};

/// Used when the naming field is missing, empty, or sanitizes to nothing.
pub const FALLBACK_NAME: &str = "unnamed";

/// Longest base name, in characters.
pub const MAX_NAME_CHARS: usize = 200;

const ILLEGAL_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Make a record value safe to use as a file stem.
///
/// Characters illegal on common filesystems become `_`, surrounding
/// whitespace is trimmed and the result is cut to `MAX_NAME_CHARS`.
pub fn sanitize_filename(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|ch| if ILLEGAL_CHARS.contains(&ch) { '_' } else { ch })
        .collect();

    let cleaned: String = replaced.trim().chars().take(MAX_NAME_CHARS).collect();

    if cleaned.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        cleaned
    }
}

/// Base name for a naming-field value; absent or empty values fall back.
pub fn base_filename(value: Option<&str>) -> String {
    match value {
        Some(value) if !value.is_empty() => sanitize_filename(value),
        _ => FALLBACK_NAME.to_string(),
    }
}

/// Hands out unique stems for one batch run.
///
/// The first use of a base name is returned unchanged; later uses get `_2`,
/// `_3`, ... A suffixed candidate that some earlier record already received
/// verbatim is skipped, so every issued name is distinct.
#[derive(Debug, Default)]
pub struct FilenameRegistry {
    counters: HashMap<String, usize>,
    issued: HashSet<String>,
}

impl FilenameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve(&mut self, base: &str) -> String {
        let counter = self.counters.entry(base.to_string()).or_insert(0);
        *counter += 1;

        let mut candidate = if *counter == 1 {
            base.to_string()
        } else {
            format!("{base}_{counter}")
        };

        while self.issued.contains(&candidate) {
            *counter += 1;
            candidate = format!("{base}_{counter}");
        }

        self.issued.insert(candidate.clone());
        candidate
    }

    /// Number of names handed out so far.
    pub fn len(&self) -> usize {
        self.issued.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issued.is_empty()
    }
}
