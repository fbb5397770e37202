//! Table-reference extraction from GoldenGate extract parameter text.
//!
//! Extract configs embed parameter-file fragments as free-form strings
//! (`"TABLE hr.employees, COLS (...);"`). The extractor pulls the table
//! names back out of those fragments. The regex approach cannot tell a
//! commented-out statement from a live one; it is isolated behind
//! [`TableRefExtractor`] so a real parameter-file parser can replace it
//! without touching the pipeline.

use std::collections::BTreeSet;

use regex::Regex;

/// Scans one string scalar and adds every referenced table name to `out`.
///
/// Implementations must normalize names: schema prefix stripped, uppercase.
pub trait TableRefExtractor {
    fn extract(&self, text: &str, out: &mut BTreeSet<String>);
}

/// Matches the literal token `TABLE`, whitespace, then a dotted identifier.
/// Case-insensitive; only the final dot-segment of the identifier is kept.
pub struct RegexTableExtractor {
    pattern: Regex,
}

impl RegexTableExtractor {
    pub fn new() -> Self {
        // Compiled from a literal, cannot fail at runtime.
        let pattern = Regex::new(r"(?i)\bTABLE\s+([\w.]+)").unwrap();
        Self { pattern }
    }
}

impl Default for RegexTableExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl TableRefExtractor for RegexTableExtractor {
    fn extract(&self, text: &str, out: &mut BTreeSet<String>) {
        for caps in self.pattern.captures_iter(text) {
            let identifier = &caps[1];
            // Last non-empty segment; a trailing dot would otherwise yield "".
            if let Some(name) = identifier.rsplit('.').find(|s| !s.is_empty()) {
                out.insert(name.to_uppercase());
            }
        }
    }
}

/// Sorted, deduplicated, non-empty list of uppercase table names.
///
/// The run submission requires a non-empty table list; constructing one
/// through [`TableList::from_set`] makes that a type-level guarantee.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableList(Vec<String>);

impl TableList {
    /// Returns `None` for an empty set. BTreeSet iteration order gives
    /// the sorted output directly.
    pub fn from_set(names: BTreeSet<String>) -> Option<Self> {
        if names.is_empty() {
            None
        } else {
            Some(Self(names.into_iter().collect()))
        }
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }

    /// Comma-joined form used as the job parameter value.
    pub fn joined(&self) -> String {
        self.0.join(",")
    }

    pub fn count(&self) -> usize {
        self.0.len()
    }
}
