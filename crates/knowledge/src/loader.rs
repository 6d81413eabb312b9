//! Source document loading and page extraction.

use crate::types::PageText;
use medrag_core::{AppError, AppResult};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use walkdir::WalkDir;

/// Page separator emitted by `pdftotext`.
const FORM_FEED: char = '\u{c}';

/// Document kind, detected from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Text,
}

impl DocumentKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(Self::Pdf),
            "txt" | "text" | "md" | "markdown" => Some(Self::Text),
            _ => None,
        }
    }
}

/// Load a source document (or directory of documents) as pages.
///
/// Directory sources are walked in file-name order and every supported file
/// is loaded; unsupported files are skipped. A single file with an unknown
/// extension is read as UTF-8 text.
pub async fn load_document(path: &Path) -> AppResult<Vec<PageText>> {
    if !path.exists() {
        return Err(AppError::DocumentLoad(format!(
            "Source document not found: {}",
            path.display()
        )));
    }

    if path.is_dir() {
        let mut pages = Vec::new();
        for file in collect_files(path)? {
            pages.extend(load_file(&file).await?);
        }
        tracing::debug!("Loaded {} pages from directory {:?}", pages.len(), path);
        return Ok(pages);
    }

    load_file(path).await
}

fn collect_files(dir: &Path) -> AppResult<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            AppError::DocumentLoad(format!("Failed to walk {}: {}", dir.display(), e))
        })?;

        if entry.file_type().is_file() && DocumentKind::from_path(entry.path()).is_some() {
            files.push(entry.into_path());
        }
    }

    Ok(files)
}

async fn load_file(path: &Path) -> AppResult<Vec<PageText>> {
    let source_id = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());

    let text = match DocumentKind::from_path(path) {
        Some(DocumentKind::Pdf) => extract_pdf_text(path).await?,
        _ => tokio::fs::read_to_string(path).await.map_err(|e| {
            AppError::DocumentLoad(format!("Failed to read {}: {}", path.display(), e))
        })?,
    };

    let pages = split_into_pages(&source_id, &text);
    tracing::debug!("Loaded {} pages from {:?}", pages.len(), path);
    Ok(pages)
}

/// Run `pdftotext` and capture its stdout.
async fn extract_pdf_text(path: &Path) -> AppResult<String> {
    tracing::debug!("Extracting PDF text from {:?} using pdftotext", path);

    let output = Command::new("pdftotext")
        .arg("-layout")
        .arg("-enc")
        .arg("UTF-8")
        .arg(path)
        .arg("-")
        .output()
        .await
        .map_err(|e| {
            AppError::DocumentLoad(format!(
                "pdftotext command failed: {} (is poppler installed?)",
                e
            ))
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(AppError::DocumentLoad(format!(
            "pdftotext failed for {}: {}",
            path.display(),
            stderr.trim()
        )));
    }

    String::from_utf8(output.stdout).map_err(|e| {
        AppError::DocumentLoad(format!(
            "pdftotext produced invalid UTF-8 for {}: {}",
            path.display(),
            e
        ))
    })
}

/// Split extracted text into form-feed separated pages.
///
/// `pdftotext` terminates every page with a form feed, so the empty segment
/// after the last one is not a page.
pub fn split_into_pages(source_id: &str, text: &str) -> Vec<PageText> {
    let body = text.strip_suffix(FORM_FEED).unwrap_or(text);

    body.split(FORM_FEED)
        .enumerate()
        .map(|(page, text)| PageText::new(source_id, page as u32, text))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_document_kind_from_path() {
        assert_eq!(
            DocumentKind::from_path(Path::new("oncology.PDF")),
            Some(DocumentKind::Pdf)
        );
        assert_eq!(
            DocumentKind::from_path(Path::new("notes.md")),
            Some(DocumentKind::Text)
        );
        assert_eq!(DocumentKind::from_path(Path::new("scan.tiff")), None);
        assert_eq!(DocumentKind::from_path(Path::new("README")), None);
    }

    #[test]
    fn test_split_into_pages_drops_trailing_form_feed() {
        let pages = split_into_pages("doc.pdf", "first\u{c}second\u{c}");
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0], PageText::new("doc.pdf", 0, "first"));
        assert_eq!(pages[1], PageText::new("doc.pdf", 1, "second"));
    }

    #[test]
    fn test_split_into_pages_keeps_empty_pages() {
        let pages = split_into_pages("doc.pdf", "a\u{c}\u{c}c");
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[1].text, "");
        assert_eq!(pages[2].page, 2);
    }

    #[tokio::test]
    async fn test_load_text_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("neurology.txt");
        std::fs::write(&path, "Migraine is a primary headache disorder.").unwrap();

        let pages = load_document(&path).await.unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].source_id, "neurology.txt");
        assert_eq!(pages[0].page, 0);
    }

    #[tokio::test]
    async fn test_load_missing_document() {
        let temp = TempDir::new().unwrap();
        let result = load_document(&temp.path().join("oncology.pdf")).await;
        assert!(matches!(result, Err(AppError::DocumentLoad(_))));
    }

    #[tokio::test]
    async fn test_load_invalid_utf8() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("broken.txt");
        std::fs::write(&path, [0xff, 0xfe, 0xfd]).unwrap();

        let result = load_document(&path).await;
        assert!(matches!(result, Err(AppError::DocumentLoad(_))));
    }

    #[tokio::test]
    async fn test_load_directory_in_name_order() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("b.txt"), "second").unwrap();
        std::fs::write(temp.path().join("a.md"), "first").unwrap();
        std::fs::write(temp.path().join("image.png"), [0u8, 1, 2]).unwrap();

        let pages = load_document(temp.path()).await.unwrap();
        let sources: Vec<&str> = pages.iter().map(|p| p.source_id.as_str()).collect();
        assert_eq!(sources, vec!["a.md", "b.txt"]);
    }
}
