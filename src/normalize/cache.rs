use std::collections::HashSet;

/// Process-lifetime set of strings that have already been handled.
///
/// Used twice by the pipeline: once for raw fragment text (so a line feeds the
/// merge logic at most once) and once for normalized question keys (so a
/// question is answered at most once). Nothing is ever evicted.
#[derive(Debug, Default, Clone)]
pub struct SeenCache {
    entries: HashSet<String>,
}

impl SeenCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, text: &str) -> bool {
        self.entries.contains(text)
    }

    /// Mark `text` as seen. Returns true if it was not seen before.
    pub fn insert(&mut self, text: &str) -> bool {
        if self.entries.contains(text) {
            return false;
        }
        self.entries.insert(text.to_string())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
