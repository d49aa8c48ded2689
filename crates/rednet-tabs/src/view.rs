//! Scroll/zoom, find-in-page and load metrics (spec §4.6).

use rednet_types::Timestamp;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScrollZoom {
    pub x: f64,
    pub y: f64,
    pub zoom: f64,
}

impl Default for ScrollZoom {
    fn default() -> Self {
        Self { x: 0.0, y: 0.0, zoom: 1.0 }
    }
}

impl ScrollZoom {
    pub fn set_scroll(&mut self, x: f64, y: f64, max_y: f64) {
        self.x = x.max(0.0);
        self.y = y.clamp(0.0, max_y.max(0.0));
    }

    pub fn set_zoom(&mut self, zoom: f64) {
        self.zoom = zoom.clamp(0.5, 3.0);
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FindInPage {
    pub query: String,
    pub current_match: usize,
    pub total_matches: usize,
}

impl FindInPage {
    pub fn start(&mut self, query: &str, total_matches: usize) {
        self.query = query.to_string();
        self.total_matches = total_matches;
        self.current_match = 0;
    }

    pub fn next(&mut self) {
        if self.total_matches > 0 {
            self.current_match = (self.current_match + 1) % self.total_matches;
        }
    }

    pub fn previous(&mut self) {
        if self.total_matches > 0 {
            self.current_match = (self.current_match + self.total_matches - 1) % self.total_matches;
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoadMetrics {
    pub load_start: Option<Timestamp>,
    pub load_end: Option<Timestamp>,
    pub render_time: Option<Timestamp>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zoom_clamps_to_bounds() {
        let mut sz = ScrollZoom::default();
        sz.set_zoom(10.0);
        assert_eq!(sz.zoom, 3.0);
        sz.set_zoom(0.0);
        assert_eq!(sz.zoom, 0.5);
    }

    #[test]
    fn scroll_clamps_y_to_max() {
        let mut sz = ScrollZoom::default();
        sz.set_scroll(5.0, 500.0, 100.0);
        assert_eq!(sz.y, 100.0);
    }

    #[test]
    fn find_in_page_cycles_modulo_total() {
        let mut find = FindInPage::default();
        find.start("shop", 3);
        find.next();
        find.next();
        find.next();
        assert_eq!(find.current_match, 0);
        find.previous();
        assert_eq!(find.current_match, 2);
    }
}
