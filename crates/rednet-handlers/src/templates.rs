//! `rdnt://<builtin>/<path>` resolves to a local template generator — an
//! external collaborator, so it is a trait here rather than a fixed set of
//! pages. [`StaticTemplates`] is a minimal in-memory reference
//! implementation backing the "new tab", "error", and "about" builtins a
//! real browser shell would register against at startup.

use std::collections::HashMap;

use crate::error::HandlerError;

pub trait BuiltinTemplates: Send + Sync {
    fn render(&self, builtin: &str, path: &str) -> Result<Vec<u8>, HandlerError>;
}

#[derive(Default)]
pub struct StaticTemplates {
    pages: HashMap<String, Vec<u8>>,
}

impl StaticTemplates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, builtin: impl Into<String>, content: impl Into<Vec<u8>>) {
        self.pages.insert(builtin.into(), content.into());
    }
}

impl BuiltinTemplates for StaticTemplates {
    fn render(&self, builtin: &str, _path: &str) -> Result<Vec<u8>, HandlerError> {
        self.pages.get(builtin).cloned().ok_or(HandlerError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_a_registered_builtin() {
        let mut templates = StaticTemplates::new();
        templates.register("home", b"<title>Home</title>".to_vec());
        let bytes = templates.render("home", "/").unwrap();
        assert_eq!(bytes, b"<title>Home</title>");
    }

    #[test]
    fn unregistered_builtin_is_not_found() {
        let templates = StaticTemplates::new();
        assert!(matches!(templates.render("missing", "/"), Err(HandlerError::NotFound)));
    }
}
