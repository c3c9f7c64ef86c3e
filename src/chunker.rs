//! Splits Markdown and PDF documents into labeled, retrievable chunks.

use std::fs;
use std::path::Path;

use crc32fast::Hasher as Crc32;
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

/// A retrievable unit of document text plus provenance metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Display label; paged PDFs include the page, e.g. `manual.pdf (Page 3)`.
    pub filename: String,
    /// Chunk body, non-empty after trimming. Split sections keep their `## `
    /// header marker so context is not lost.
    pub text: String,
    /// Source file path (lineage only, not used for retrieval).
    pub path: String,
    /// Content fingerprint used as the dedup key across indexing runs.
    pub fingerprint: u32,
    /// Embedding vector, attached only after the embedding stage.
    pub vector: Option<Vec<f32>>,
}

impl Chunk {
    /// Builds a chunk and derives its content fingerprint.
    pub fn new(filename: String, text: String, path: String) -> Self {
        let fingerprint = fingerprint(&text);
        Self {
            filename,
            text,
            path,
            fingerprint,
            vector: None,
        }
    }
}

/// CRC32 of the whitespace-normalized chunk text.
///
/// Normalization keeps the fingerprint stable across incidental reformatting
/// (trailing spaces, wrapped lines) while any wording change produces a new key.
pub fn fingerprint(text: &str) -> u32 {
    let mut hasher = Crc32::new();
    hasher.update(normalize(text).as_bytes());
    hasher.finalize()
}

fn normalize(text: &str) -> String {
    let mut buf = String::with_capacity(text.len());
    let mut last_space = false;
    for ch in text.trim().chars() {
        if ch.is_whitespace() {
            if !last_space {
                buf.push(' ');
            }
            last_space = true;
        } else {
            buf.push(ch);
            last_space = false;
        }
    }
    buf
}

/// Walks a directory tree and turns supported files into chunk sequences.
///
/// Unsupported extensions are ignored. An unreadable file is skipped with a
/// warning; it never aborts the walk.
#[derive(Debug, Clone, Default)]
pub struct Chunker;

impl Chunker {
    /// Builds a new chunker.
    pub fn new() -> Self {
        Self
    }

    /// Lazily yields chunks for every supported file under `root`.
    ///
    /// Chunk order matches document order within a file; file order across the
    /// tree is filesystem order and must not be relied upon.
    pub fn chunks<'a>(&'a self, root: &Path) -> impl Iterator<Item = Chunk> + 'a {
        WalkDir::new(root)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .flat_map(move |entry| self.chunk_file(entry.path()))
    }

    /// Chunks a single file according to its extension.
    pub fn chunk_file(&self, path: &Path) -> Vec<Chunk> {
        let Some(filename) = path.file_name().and_then(|name| name.to_str()) else {
            return Vec::new();
        };
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase());
        match extension.as_deref() {
            Some("md") => self.chunk_markdown_file(path, filename),
            Some("pdf") => self.chunk_pdf_file(path, filename),
            _ => Vec::new(),
        }
    }

    fn chunk_markdown_file(&self, path: &Path, filename: &str) -> Vec<Chunk> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                eprintln!("warning: skipping unreadable markdown {}: {}", filename, err);
                return Vec::new();
            }
        };
        chunk_markdown(&content, filename, &path.display().to_string())
    }

    fn chunk_pdf_file(&self, path: &Path, filename: &str) -> Vec<Chunk> {
        let pages = match pdf_extract::extract_text_by_pages(path) {
            Ok(pages) => pages,
            Err(err) => {
                eprintln!("warning: skipping unreadable PDF {}: {}", filename, err);
                return Vec::new();
            }
        };
        let source = path.display().to_string();
        let mut chunks = Vec::new();
        for (index, page) in pages.iter().enumerate() {
            let body = page.trim();
            if body.is_empty() {
                continue;
            }
            let page_number = index + 1;
            chunks.push(Chunk::new(
                format!("{} (Page {})", filename, page_number),
                format!("## {} - Page {}\n{}", filename, page_number, body),
                source.clone(),
            ));
        }
        chunks
    }
}

/// Splits Markdown wherever a level-2 header begins a line.
///
/// Each section gets its `## ` marker re-prepended except a possible headerless
/// preamble before the first header; whitespace-only sections are dropped.
fn chunk_markdown(content: &str, filename: &str, path: &str) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    for (index, section) in content.split("\n## ").enumerate() {
        let text = if index > 0 {
            format!("## {}", section)
        } else {
            section.to_string()
        };
        let trimmed = text.trim();
        if trimmed.is_empty() {
            continue;
        }
        chunks.push(Chunk::new(
            filename.to_string(),
            trimmed.to_string(),
            path.to_string(),
        ));
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;

    #[test]
    fn splits_markdown_on_level_two_headers() {
        let content = "Intro paragraph.\n\n## First\nBody one.\n\n## Second\nBody two.\n";
        let chunks = chunk_markdown(content, "doc.md", "/tmp/doc.md");
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].text, "Intro paragraph.");
        assert!(chunks[1].text.starts_with("## First"));
        assert!(chunks[2].text.starts_with("## Second"));
        assert!(chunks.iter().all(|c| c.filename == "doc.md"));
    }

    #[test]
    fn omits_preamble_when_document_opens_with_header() {
        let content = "## Only\nBody.\n";
        let chunks = chunk_markdown(content, "doc.md", "/tmp/doc.md");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "## Only\nBody.");
    }

    #[test]
    fn drops_whitespace_only_sections() {
        let content = "\n## Empty\n   \n\n## Full\ncontent\n";
        let chunks = chunk_markdown(content, "doc.md", "/tmp/doc.md");
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["## Empty", "## Full\ncontent"]);
    }

    #[test]
    fn fingerprint_is_stable_across_whitespace() {
        assert_eq!(
            fingerprint("## Title\nSome  body text"),
            fingerprint("  ## Title Some body\ttext  ")
        );
        assert_ne!(fingerprint("alpha"), fingerprint("beta"));
    }

    #[test]
    fn walks_nested_directories_and_ignores_unsupported_files() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("sub");
        fs::create_dir(&nested).unwrap();
        fs::write(dir.path().join("top.md"), "## A\none\n").unwrap();
        fs::write(nested.join("deep.md"), "## B\ntwo\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let chunker = Chunker::new();
        let mut filenames: Vec<String> = chunker
            .chunks(dir.path())
            .map(|chunk| chunk.filename)
            .collect();
        filenames.sort();
        assert_eq!(filenames, vec!["deep.md", "top.md"]);
    }

    #[test]
    fn corrupt_pdf_is_skipped_without_aborting_the_walk() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("broken.pdf"), b"not a real pdf").unwrap();
        fs::write(dir.path().join("good.md"), "## Fine\nstill here\n").unwrap();

        let chunker = Chunker::new();
        let chunks: Vec<Chunk> = chunker.chunks(dir.path()).collect();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].filename, "good.md");
    }
}
