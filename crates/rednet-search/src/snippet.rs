//! A ~150-char window around the first occurrence of any query term,
//! with an ellipsis where the window was truncated.

pub fn snippet(content: &str, terms: &[String], length: usize) -> String {
    if content.is_empty() {
        return String::new();
    }

    let lower = content.to_lowercase();
    let found_at = terms
        .iter()
        .filter(|term| !term.is_empty())
        .filter_map(|term| lower.find(term.as_str()))
        .min();

    let center = found_at.unwrap_or(0);
    let half = length / 2;
    let start = clamp_to_char_boundary(content, center.saturating_sub(half));
    let end = clamp_to_char_boundary(content, (start + length).min(content.len()));

    let mut text = content[start..end].to_string();
    if end < content.len() {
        text.push_str("...");
    }
    if start > 0 {
        text = format!("...{text}");
    }
    text
}

fn clamp_to_char_boundary(s: &str, mut idx: usize) -> usize {
    idx = idx.min(s.len());
    while idx < s.len() && !s.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_content_is_returned_whole_without_ellipsis() {
        let text = snippet("the quick brown fox", &["quick".to_string()], 150);
        assert_eq!(text, "the quick brown fox");
    }

    #[test]
    fn long_content_is_windowed_around_the_match_with_ellipsis() {
        let filler = "x".repeat(500);
        let content = format!("{filler} needle {filler}");
        let text = snippet(&content, &["needle".to_string()], 40);
        assert!(text.starts_with("..."));
        assert!(text.ends_with("..."));
        assert!(text.contains("needle"));
    }

    #[test]
    fn no_match_falls_back_to_the_start_of_the_content() {
        let filler = "x".repeat(500);
        let text = snippet(&filler, &["absent".to_string()], 40);
        assert!(!text.starts_with("..."));
        assert!(text.ends_with("..."));
    }
}
