//! Per-tab navigation history (spec §4.6 "History").

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub url: String,
    pub title: String,
    pub scroll_y: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct History {
    entries: Vec<HistoryEntry>,
    index: Option<usize>,
    max_length: usize,
}

impl History {
    pub fn new(max_length: usize) -> Self {
        Self {
            entries: Vec::new(),
            index: None,
            max_length,
        }
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn current(&self) -> Option<&HistoryEntry> {
        self.index.and_then(|i| self.entries.get(i))
    }

    /// Navigate to a new url. If the current index isn't at the tip, the
    /// tail is truncated first (spec §4.6).
    pub fn navigate(&mut self, url: &str, title: &str) {
        if let Some(index) = self.index {
            self.entries.truncate(index + 1);
        }
        self.entries.push(HistoryEntry {
            url: url.to_string(),
            title: title.to_string(),
            scroll_y: 0.0,
        });
        self.index = Some(self.entries.len() - 1);

        while self.entries.len() > self.max_length {
            self.entries.remove(0);
            self.index = self.index.map(|i| i.saturating_sub(1));
        }
    }

    fn snapshot_scroll(&mut self, scroll_y: f64) {
        if let Some(index) = self.index {
            if let Some(entry) = self.entries.get_mut(index) {
                entry.scroll_y = scroll_y;
            }
        }
    }

    /// Snapshot `scroll_y` into the current entry, then move back one.
    /// Returns the entry now in view, if any.
    pub fn navigate_back(&mut self, scroll_y: f64) -> Option<&HistoryEntry> {
        self.snapshot_scroll(scroll_y);
        match self.index {
            Some(index) if index > 0 => {
                self.index = Some(index - 1);
                self.current()
            },
            _ => None,
        }
    }

    pub fn navigate_forward(&mut self, scroll_y: f64) -> Option<&HistoryEntry> {
        self.snapshot_scroll(scroll_y);
        match self.index {
            Some(index) if index + 1 < self.entries.len() => {
                self.index = Some(index + 1);
                self.current()
            },
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn navigate_from_non_tip_truncates_tail() {
        let mut history = History::new(50);
        history.navigate("a", "A");
        history.navigate("b", "B");
        history.navigate_back(0.0);
        history.navigate("c", "C");
        assert_eq!(history.entries().len(), 2);
        assert_eq!(history.entries()[1].url, "c");
    }

    #[test]
    fn trims_oldest_when_over_max_length() {
        let mut history = History::new(2);
        history.navigate("a", "A");
        history.navigate("b", "B");
        history.navigate("c", "C");
        assert_eq!(history.entries().len(), 2);
        assert_eq!(history.entries()[0].url, "b");
    }

    #[test]
    fn back_and_forward_snapshot_scroll_position() {
        let mut history = History::new(50);
        history.navigate("a", "A");
        history.navigate("b", "B");
        history.navigate_back(42.0);
        assert_eq!(history.entries()[1].scroll_y, 42.0);
        let forward = history.navigate_forward(0.0).unwrap();
        assert_eq!(forward.url, "b");
    }
}
