//! The markup parser is an external collaborator: Handlers only needs
//! `parse(bytes) -> AST` and `head.title`, so it is expressed as a trait
//! object rather than a concrete parser implementation living in this
//! crate. [`SimpleMarkupParser`] is a minimal reference implementation
//! good enough to drive the dispatch/processing logic and its tests; a
//! real renderer-paired parser can be swapped in at construction.

use serde::{Deserialize, Serialize};

use crate::error::HandlerError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkupDocument {
    pub title: Option<String>,
    /// Opaque AST payload; the renderer on the other side of this
    /// boundary is the thing that knows how to interpret it.
    pub ast: serde_json::Value,
}

pub trait MarkupParser: Send + Sync {
    fn parse(&self, bytes: &[u8]) -> Result<MarkupDocument, HandlerError>;
}

/// A minimal `<title>...</title>` + body-text reference parser.
pub struct SimpleMarkupParser;

impl MarkupParser for SimpleMarkupParser {
    fn parse(&self, bytes: &[u8]) -> Result<MarkupDocument, HandlerError> {
        let text = std::str::from_utf8(bytes).map_err(|e| HandlerError::Parse(e.to_string()))?;

        if !looks_like_markup(text) {
            return Err(HandlerError::Parse("no recognized markup tags".to_string()));
        }

        let title = extract_tag(text, "title");
        let body = strip_tag(text, "title");

        Ok(MarkupDocument {
            title,
            ast: serde_json::json!({ "body": body }),
        })
    }
}

/// A document only counts as markup if it contains at least one `<tag>`;
/// otherwise callers (Handlers C8's dynamic-content path in particular) are
/// expected to fall back to treating it as plain text.
fn looks_like_markup(text: &str) -> bool {
    let Some(open) = text.find('<') else { return false };
    let Some(close) = text[open..].find('>') else { return false };
    close > open
}

fn extract_tag(text: &str, tag: &str) -> Option<String> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let start = text.find(&open)? + open.len();
    let end = text[start..].find(&close)? + start;
    Some(text[start..end].trim().to_string())
}

fn strip_tag(text: &str, tag: &str) -> String {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    match (text.find(&open), text.find(&close)) {
        (Some(start), Some(end)) if end >= start => {
            let mut out = String::with_capacity(text.len());
            out.push_str(&text[..start]);
            out.push_str(&text[end + close.len()..]);
            out.trim().to_string()
        },
        _ => text.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_the_title_and_the_remaining_body() {
        let doc = SimpleMarkupParser
            .parse(b"<title>Welcome</title>\nHello, rednet.")
            .unwrap();
        assert_eq!(doc.title.as_deref(), Some("Welcome"));
        assert_eq!(doc.ast["body"], "Hello, rednet.");
    }

    #[test]
    fn tolerates_a_tagged_document_with_no_title() {
        let doc = SimpleMarkupParser.parse(b"<p>just body text</p>").unwrap();
        assert_eq!(doc.title, None);
    }

    #[test]
    fn plain_text_with_no_tags_is_not_valid_markup() {
        let err = SimpleMarkupParser.parse(b"just body text").unwrap_err();
        assert!(matches!(err, HandlerError::Parse(_)));
    }

    #[test]
    fn rejects_non_utf8_bytes() {
        let err = SimpleMarkupParser.parse(&[0xff, 0xfe, 0xfd]).unwrap_err();
        assert!(matches!(err, HandlerError::Parse(_)));
    }
}
