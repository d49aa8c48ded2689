//! Content-type inference by file extension.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Markup,
    MarkupLike,
    Dynamic,
    Text,
}

/// Infer a [`ContentType`] from a path's extension.
pub fn infer(path: &str) -> ContentType {
    let ext = path.rsplit('.').next().unwrap_or("").to_lowercase();
    match ext.as_str() {
        "rwml" => ContentType::Markup,
        "lua" => ContentType::Dynamic,
        "html" | "htm" => ContentType::MarkupLike,
        _ => ContentType::Text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infers_known_extensions() {
        assert_eq!(infer("index.rwml"), ContentType::Markup);
        assert_eq!(infer("script.lua"), ContentType::Dynamic);
        assert_eq!(infer("page.html"), ContentType::MarkupLike);
        assert_eq!(infer("notes.txt"), ContentType::Text);
        assert_eq!(infer("no_extension"), ContentType::Text);
    }
}
