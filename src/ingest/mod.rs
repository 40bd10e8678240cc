//! Document ingestion
//!
//! Loads Markdown files from a data directory and tags each with a category
//! taken from the directory that holds it:
//!
//! ```text
//! data/
//!   hr/benefits.md      -> category "hr"
//!   eng/oncall.md       -> category "eng"
//!   welcome.md          -> category "data"
//! ```
//!
//! Symlinked directories are not followed.

use crate::index::DocumentChunk;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

pub mod splitter;

pub use splitter::TextSplitter;

/// Extension of files picked up by the loader
pub const DOCUMENT_EXTENSION: &str = "md";

/// Ingestion errors
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Load every `.md` file under `root`, sorted by path
pub fn load_directory(root: &Path) -> Result<Vec<DocumentChunk>, IngestError> {
    let mut paths = Vec::new();
    collect_markdown(root, &mut paths)?;
    paths.sort();

    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
        let content = fs::read_to_string(&path).map_err(|source| IngestError::Io {
            path: path.clone(),
            source,
        })?;
        let mut document = DocumentChunk::new(content, path.display().to_string());
        document.category = category_for(&path);
        documents.push(document);
    }

    debug!(documents = documents.len(), root = %root.display(), "Loaded documents");
    Ok(documents)
}

/// Load `root` and split every document into chunks
pub fn ingest(root: &Path, splitter: &TextSplitter) -> Result<Vec<DocumentChunk>, IngestError> {
    let documents = load_directory(root)?;
    Ok(splitter.split_documents(&documents))
}

fn collect_markdown(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), IngestError> {
    let io_err = |source| IngestError::Io {
        path: dir.to_path_buf(),
        source,
    };

    for entry in fs::read_dir(dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        let file_type = entry.file_type().map_err(io_err)?;
        let path = entry.path();

        if file_type.is_dir() {
            collect_markdown(&path, out)?;
        } else if file_type.is_symlink() && path.is_dir() {
            debug!(path = %path.display(), "Skipping symlinked directory");
        } else if path.is_file() && path.extension().is_some_and(|ext| ext == DOCUMENT_EXTENSION) {
            out.push(path);
        }
    }
    Ok(())
}

/// Name of the directory holding `path`.
///
/// `None` only when the parent has no usable name even after resolving it,
/// e.g. a file directly under `/`.
fn category_for(path: &Path) -> Option<String> {
    let parent = match path.parent()? {
        p if p.as_os_str().is_empty() => Path::new("."),
        p => p,
    };
    let name = match parent.file_name() {
        Some(name) => name.to_os_string(),
        None => fs::canonicalize(parent).ok()?.file_name()?.to_os_string(),
    };
    Some(name.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// Corpus rooted at `<tmp>/data`
    fn fixture() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("data");
        fs::create_dir_all(root.join("hr")).unwrap();
        fs::create_dir_all(root.join("eng/runbooks")).unwrap();
        fs::write(root.join("hr/benefits.md"), "Dental plan details").unwrap();
        fs::write(root.join("eng/runbooks/deploy.md"), "Run the deploy script").unwrap();
        fs::write(root.join("welcome.md"), "Hello everyone").unwrap();
        fs::write(root.join("hr/notes.txt"), "ignored").unwrap();
        (dir, root)
    }

    #[test]
    fn test_load_directory_assigns_categories() {
        let (_dir, root) = fixture();
        let docs = load_directory(&root).unwrap();

        assert_eq!(docs.len(), 3);
        let by_content = |text: &str| docs.iter().find(|d| d.content == text).unwrap();
        assert_eq!(by_content("Dental plan details").category.as_deref(), Some("hr"));
        assert_eq!(
            by_content("Run the deploy script").category.as_deref(),
            Some("runbooks")
        );
        assert_eq!(by_content("Hello everyone").category.as_deref(), Some("data"));
        assert!(docs.iter().all(|d| d.category.is_some()));
    }

    #[test]
    fn test_relative_root_still_categorizes_root_files() {
        let (_dir, root) = fixture();
        let relative = root.join(".");
        let docs = load_directory(&relative).unwrap();

        let welcome = docs.iter().find(|d| d.content == "Hello everyone").unwrap();
        assert_eq!(welcome.category.as_deref(), Some("data"));
    }

    #[test]
    fn test_category_resolves_current_directory() {
        let cwd = std::env::current_dir().unwrap();
        let expected = cwd.file_name().map(|n| n.to_string_lossy().into_owned());

        assert_eq!(category_for(Path::new("./welcome.md")), expected);
        assert_eq!(category_for(Path::new("welcome.md")), expected);
        assert_eq!(category_for(Path::new("/welcome.md")), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_loop_is_not_followed() {
        let (_dir, root) = fixture();
        std::os::unix::fs::symlink(&root, root.join("hr/loop")).unwrap();

        let docs = load_directory(&root).unwrap();

        assert_eq!(docs.len(), 3);
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let dir = TempDir::new().unwrap();
        let result = load_directory(&dir.path().join("nope"));
        assert!(matches!(result, Err(IngestError::Io { .. })));
    }

    #[test]
    fn test_ingest_keeps_metadata_on_chunks() {
        let (_dir, root) = fixture();
        let splitter = TextSplitter::new(10, 2);
        let chunks = ingest(&root, &splitter).unwrap();

        assert!(chunks.len() > 3);
        assert!(chunks
            .iter()
            .filter(|c| c.source_path.ends_with("benefits.md"))
            .all(|c| c.category.as_deref() == Some("hr")));
    }
}
