//! Recursive text chunking with configurable size and overlap.
//!
//! Pages are split with `text-splitter`, which cuts at the strongest semantic
//! level that fits (paragraph, line, sentence, word, then grapheme). Chunks are
//! measured in characters and never trimmed, so consecutive spans tile the page
//! without gaps.

use crate::types::{Chunk, PageText};
use medrag_core::config::ChunkingSettings;
use sha2::{Digest, Sha256};
use text_splitter::{ChunkConfig, TextSplitter};

/// Character range `[start, end)` of a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Split text into spans of at most `chunk_size` characters.
///
/// Consecutive spans overlap by at most `overlap` characters and never leave a
/// gap. Blank text yields no spans.
pub fn split_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<Span> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let chunk_size = chunk_size.max(1);
    let overlap = overlap.min(chunk_size - 1);
    let config = ChunkConfig::new(chunk_size)
        .with_overlap(overlap)
        .unwrap_or_else(|_| ChunkConfig::new(chunk_size))
        .with_trim(false);
    let splitter = TextSplitter::new(config);

    let offsets = byte_offsets(text);
    let to_char = |byte: usize| offsets.partition_point(|&b| b < byte);

    let spans = splitter
        .chunk_indices(text)
        .map(|(byte, chunk)| Span {
            start: to_char(byte),
            end: to_char(byte + chunk.len()),
        })
        .filter(|span| !span.is_empty())
        .collect();

    close_gaps(spans, offsets.len() - 1, chunk_size)
}

/// Chunk every page of a document.
///
/// Positions run across pages, so they are unique within the document.
pub fn split_pages(pages: &[PageText], settings: &ChunkingSettings) -> Vec<Chunk> {
    let mut chunks = Vec::new();

    for page in pages {
        let spans = split_text(&page.text, settings.chunk_size, settings.chunk_overlap);
        if spans.is_empty() {
            continue;
        }

        let offsets = byte_offsets(&page.text);
        for span in spans {
            let text = &page.text[offsets[span.start]..offsets[span.end]];
            chunks.push(Chunk {
                position: chunks.len() as u32,
                source_id: page.source_id.clone(),
                page: page.page,
                start: span.start,
                end: span.end,
                text: text.to_string(),
                hash: hash_text(text),
            });
        }
    }

    tracing::debug!(
        "Chunked {} pages into {} chunks (size: {}, overlap: {})",
        pages.len(),
        chunks.len(),
        settings.chunk_size,
        settings.chunk_overlap
    );

    chunks
}

/// SHA-256 of a text, hex encoded.
pub fn hash_text(text: &str) -> String {
    format!("{:x}", Sha256::digest(text.as_bytes()))
}

/// Byte offset of every character, plus the total length.
fn byte_offsets(text: &str) -> Vec<usize> {
    text.char_indices()
        .map(|(offset, _)| offset)
        .chain(std::iter::once(text.len()))
        .collect()
}

/// Cover runs the splitter skipped (whitespace between chunks) so the spans
/// tile `[0, len)` exactly. A gap joins the previous span, else the next one,
/// else becomes spans of its own.
fn close_gaps(spans: Vec<Span>, len: usize, chunk_size: usize) -> Vec<Span> {
    let mut tiled: Vec<Span> = Vec::with_capacity(spans.len());
    let mut covered = 0;

    for mut span in spans {
        if span.start > covered {
            match tiled.last_mut() {
                Some(prev) if span.start - prev.start <= chunk_size => prev.end = span.start,
                _ if span.end - covered <= chunk_size => span.start = covered,
                _ => tiled.extend(hard_cut(covered, span.start, chunk_size)),
            }
        }
        covered = covered.max(span.end);
        tiled.push(span);
    }

    if covered < len {
        match tiled.last_mut() {
            Some(last) if len - last.start <= chunk_size => last.end = len,
            _ => tiled.extend(hard_cut(covered, len, chunk_size)),
        }
    }

    tiled
}

fn hard_cut(start: usize, end: usize, chunk_size: usize) -> Vec<Span> {
    (start..end)
        .step_by(chunk_size)
        .map(|s| Span {
            start: s,
            end: (s + chunk_size).min(end),
        })
        .collect()
}
