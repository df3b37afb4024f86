use std::collections::HashMap;
use std::sync::Arc;

/// Row and metric labels renamed between report versions, legacy -> canonical.
pub const METRIC_NAME_ALIASES: &[(&str, &str)] = &[
    ("Redo size (bytes):", "Redo size:"),
    ("Logical read (blocks):", "Logical reads:"),
    ("Physical read (blocks):", "Physical reads:"),
    ("Physical write (blocks):", "Physical writes:"),
    ("Parses (SQL):", "Parses:"),
    ("Hard parses (SQL):", "Hard parses:"),
    ("Executes (SQL):", "Executes:"),
];

/// Column header text mangled by some report versions, raw -> canonical.
pub const COLUMN_HEADER_ALIASES: &[(&str, &str)] = &[("D B Time (s)", "DB Time (s)")];

/// Static legacy-to-canonical label mapping. Cloning is cheap.
#[derive(Clone, Debug, Default)]
pub struct AliasTable {
    entries: Arc<HashMap<String, String>>,
}

impl AliasTable {
    pub fn new(pairs: &[(&str, &str)]) -> Self {
        let entries = pairs
            .iter()
            .map(|(from, to)| (from.to_string(), to.to_string()))
            .collect();
        Self {
            entries: Arc::new(entries),
        }
    }

    pub fn metric_names() -> Self {
        Self::new(METRIC_NAME_ALIASES)
    }

    pub fn column_headers() -> Self {
        Self::new(COLUMN_HEADER_ALIASES)
    }

    /// Returns the canonical label, or the label itself when no alias is registered.
    pub fn canonical<'a>(&'a self, label: &'a str) -> &'a str {
        self.entries.get(label).map(String::as_str).unwrap_or(label)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
