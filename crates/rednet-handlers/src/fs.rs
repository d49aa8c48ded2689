//! Local filesystem fetch: direct read, with an `index.<ext>` fallback when
//! the resolved path is a directory.

use std::path::{Path, PathBuf};

use crate::error::HandlerError;

/// Resolve `request_path` against `root` and read its bytes. If the
/// resolved path is a directory, try `index.<ext>` for each extension in
/// `index_extensions`, in order, returning the first one that exists.
pub fn read(root: &Path, index_extensions: &[String], request_path: &str) -> Result<(Vec<u8>, PathBuf), HandlerError> {
    let relative = request_path.trim_start_matches('/');
    let resolved = root.join(relative);

    if resolved.is_dir() {
        for ext in index_extensions {
            let candidate = resolved.join(format!("index.{ext}"));
            if candidate.is_file() {
                let bytes = std::fs::read(&candidate).map_err(|_| HandlerError::NotFound)?;
                return Ok((bytes, candidate));
            }
        }
        return Err(HandlerError::NotFound);
    }

    let bytes = std::fs::read(&resolved).map_err(|_| HandlerError::NotFound)?;
    Ok((bytes, resolved))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_a_direct_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("page.rwml"), b"<title>Hi</title>").unwrap();
        let (bytes, path) = read(dir.path(), &["rwml".to_string()], "/page.rwml").unwrap();
        assert_eq!(bytes, b"<title>Hi</title>");
        assert!(path.ends_with("page.rwml"));
    }

    #[test]
    fn falls_back_to_index_for_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("blog")).unwrap();
        std::fs::write(dir.path().join("blog/index.html"), b"<title>Blog</title>").unwrap();
        let index_extensions = vec!["rwml".to_string(), "html".to_string()];
        let (bytes, path) = read(dir.path(), &index_extensions, "/blog").unwrap();
        assert_eq!(bytes, b"<title>Blog</title>");
        assert!(path.ends_with("blog/index.html"));
    }

    #[test]
    fn missing_path_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            read(dir.path(), &["rwml".to_string()], "/missing.txt"),
            Err(HandlerError::NotFound)
        ));
    }
}
