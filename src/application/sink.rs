//! Deterministic document naming and write-once persistence.
//!
//! File presence is the only export state: a document that exists on disk is
//! never fetched, rendered or written again.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::domain::{AppError, ConversationSummary, Result};

use super::parser::parse_timestamp;

/// Characters that are illegal in file names on at least one platform.
const ILLEGAL_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*', '\n', '\r'];

/// Slug used when nothing survives sanitization.
const FALLBACK_SLUG: &str = "untitled";

/// Upper bound for a whole file or directory name, in bytes.
///
/// Filesystems cap names by bytes (255 on most), not by characters.
pub const MAX_NAME_BYTES: usize = 200;

/// Sanitizes a title (or assistant/folder name) into a file-name component.
///
/// At most `max_len` characters and [`MAX_NAME_BYTES`] bytes. Names made only
/// of dots would resolve to the current or parent directory and fall back to
/// `untitled`.
#[must_use]
pub fn safe_filename(title: &str, max_len: usize) -> String {
    slugify(title, max_len, MAX_NAME_BYTES)
}

fn slugify(title: &str, max_chars: usize, max_bytes: usize) -> String {
    let stripped: String = title.chars().filter(|c| !ILLEGAL_CHARS.contains(c)).collect();
    let mut slug = String::new();
    for c in stripped.trim().replace(' ', "_").chars().take(max_chars) {
        if slug.len() + c.len_utf8() > max_bytes {
            break;
        }
        slug.push(c);
    }

    if slug.chars().all(|c| c == '.') {
        FALLBACK_SLUG.to_string()
    } else {
        slug
    }
}

/// What happened to one conversation at the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkOutcome {
    /// A new document was written.
    Saved,
    /// The document already existed; nothing was fetched.
    Skipped,
}

/// Writes documents into one output directory.
#[derive(Debug, Clone)]
pub struct DocumentSink {
    dir: PathBuf,
    max_slug_len: usize,
}

impl DocumentSink {
    /// Opens the sink, creating the directory if needed.
    ///
    /// # Errors
    /// Returns error if the directory cannot be created.
    pub fn open(dir: &Path, max_slug_len: usize) -> Result<Self> {
        fs::create_dir_all(dir).map_err(|e| {
            AppError::io(format!("Failed to create directory {}", dir.display()), e)
        })?;

        Ok(Self {
            dir: dir.to_path_buf(),
            max_slug_len,
        })
    }

    /// Output directory of this sink.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the document for a conversation:
    /// `<dir>/<YYYY-MM-DD>_<slug>[_archived].md`.
    ///
    /// The slug is shortened so the whole name stays within [`MAX_NAME_BYTES`].
    ///
    /// # Errors
    /// Returns error if the creation timestamp cannot be parsed.
    pub fn path_for(&self, summary: &ConversationSummary) -> Result<PathBuf> {
        let date = parse_timestamp(&summary.created)?
            .format("%Y-%m-%d")
            .to_string();
        let suffix = if summary.archived { "_archived.md" } else { ".md" };
        let budget = MAX_NAME_BYTES.saturating_sub(date.len() + 1 + suffix.len());
        let slug = slugify(&summary.title, self.max_slug_len, budget);

        Ok(self.dir.join(format!("{date}_{slug}{suffix}")))
    }

    /// Whether a document is already present at `path`.
    #[must_use]
    pub fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    /// Writes `contents` to `path` in one step.
    ///
    /// The text goes to a temporary sibling first and is then moved into
    /// place, so an interrupted run leaves either nothing or the full file.
    /// An existing file is never replaced.
    ///
    /// # Errors
    /// Returns error if the file cannot be written or already exists.
    pub fn write(&self, path: &Path, contents: &str) -> Result<()> {
        let mut tmp = NamedTempFile::new_in(&self.dir)
            .map_err(|e| AppError::io("Failed to create temporary file", e))?;
        tmp.write_all(contents.as_bytes())
            .map_err(|e| AppError::io("Failed to write document", e))?;
        tmp.persist_noclobber(path).map_err(|e| {
            AppError::io(format!("Failed to persist {}", path.display()), e.error)
        })?;

        tracing::debug!(path = %path.display(), bytes = contents.len(), "Document written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    use crate::domain::Timestamp;

    #[test]
    fn test_safe_filename_strips_illegal_chars() {
        let slug = safe_filename("My/Chat: \"Plans\"?", 80);
        assert_eq!(slug, "MyChat_Plans");
        for c in ['<', '>', ':', '"', '/', '\\', '|', '?', '*', ' '] {
            assert!(!slug.contains(c), "slug contains {c:?}");
        }
    }

    #[test]
    fn test_safe_filename_truncates_on_char_boundary() {
        let title = "é".repeat(100);
        let slug = safe_filename(&title, 80);
        assert_eq!(slug.chars().count(), 80);

        assert_eq!(safe_filename("a b c d", 3), "a_b");
    }

    #[test]
    fn test_safe_filename_fallback() {
        assert_eq!(safe_filename("", 80), "untitled");
        assert_eq!(safe_filename("  ???  ", 80), "untitled");
        assert_eq!(safe_filename("line\r\nbreak", 80), "linebreak");
    }

    #[test]
    fn test_safe_filename_rejects_dot_names() {
        assert_eq!(safe_filename(".", 80), "untitled");
        assert_eq!(safe_filename("..", 80), "untitled");
        assert_eq!(safe_filename(" ... ", 80), "untitled");
        assert_eq!(safe_filename("..notes", 80), "..notes");
        assert_eq!(safe_filename("v1.2", 80), "v1.2");
    }

    #[test]
    fn test_safe_filename_respects_byte_limit() {
        let slug = safe_filename(&"🚀".repeat(80), 80);
        assert!(slug.len() <= MAX_NAME_BYTES);
        assert_eq!(slug, "🚀".repeat(MAX_NAME_BYTES / 4));
    }

    #[test]
    fn test_long_multibyte_archived_title_fits() {
        let dir = tempdir().unwrap();
        let sink = DocumentSink::open(dir.path(), 80).unwrap();
        let summary = ConversationSummary::new("c1", "漢".repeat(100))
            .created_at(Timestamp::Iso("2024-02-03T12:00:00".into()))
            .archived();

        let path = sink.path_for(&summary).unwrap();
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.len() <= MAX_NAME_BYTES, "{} bytes", name.len());
        assert!(name.starts_with("2024-02-03_漢"));
        assert!(name.ends_with("漢_archived.md"));

        sink.write(&path, "# long\n").unwrap();
        assert!(sink.exists(&path));
    }

    #[test]
    fn test_path_for() {
        let dir = tempdir().unwrap();
        let sink = DocumentSink::open(dir.path(), 80).unwrap();

        let summary = ConversationSummary::new("c1", "Weekly plan")
            .created_at(Timestamp::Iso("2024-02-03T12:00:00".into()));
        assert_eq!(
            sink.path_for(&summary).unwrap(),
            dir.path().join("2024-02-03_Weekly_plan.md")
        );

        let archived = summary.archived();
        assert_eq!(
            sink.path_for(&archived).unwrap(),
            dir.path().join("2024-02-03_Weekly_plan_archived.md")
        );
    }

    #[test]
    fn test_open_creates_nested_directory() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("gpts").join("Writer");
        let sink = DocumentSink::open(&nested, 80).unwrap();
        assert!(nested.is_dir());
        assert_eq!(sink.dir(), nested.as_path());
    }

    #[test]
    fn test_write_once() {
        let dir = tempdir().unwrap();
        let sink = DocumentSink::open(dir.path(), 80).unwrap();
        let path = dir.path().join("2024-01-01_note.md");

        assert!(!sink.exists(&path));
        sink.write(&path, "# note\n").unwrap();
        assert!(sink.exists(&path));
        assert_eq!(fs::read_to_string(&path).unwrap(), "# note\n");

        // A second write must not replace the first document
        assert!(sink.write(&path, "# changed\n").is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), "# note\n");

        // No temporary files are left behind
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
