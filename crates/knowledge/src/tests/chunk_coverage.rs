//! Chunk tiling over a grid of sizes and overlaps.

use crate::chunker::{split_pages, split_text};
use crate::types::PageText;
use medrag_core::config::ChunkingSettings;

const SAMPLE: &str = "Glioblastoma multiforme is the most common primary brain tumour in adults.\n\n\
Standard care is maximal safe resection, followed by radiotherapy with concurrent \
and adjuvant temozolomide. Median survival remains around fifteen months.\n\
Résumé: tumeurs cérébrales, traitement combiné.\n\n\
Supportivecareincludessteroidsforoedemaandanticonvulsantsforseizures.";

fn check_tiling(text: &str, size: usize, overlap: usize) {
    let len = text.chars().count();
    let spans = split_text(text, size, overlap);
    let label = format!("size {} overlap {}", size, overlap);

    assert!(!spans.is_empty(), "{}", label);
    assert_eq!(spans[0].start, 0, "{}", label);
    assert_eq!(spans[spans.len() - 1].end, len, "{}", label);

    for span in &spans {
        assert!(!span.is_empty(), "{}", label);
        assert!(span.len() <= size, "{}: {:?}", label, span);
    }

    for pair in spans.windows(2) {
        let (prev, next) = (pair[0], pair[1]);
        assert!(next.start > prev.start, "{}: {:?} {:?}", label, prev, next);
        assert!(next.start <= prev.end, "{}: gap {:?} {:?}", label, prev, next);
        assert!(
            prev.end - next.start <= overlap,
            "{}: overlap {:?} {:?}",
            label,
            prev,
            next
        );
    }
}

#[test]
fn test_spans_tile_text_for_every_setting() {
    for size in [1, 2, 5, 13, 40, 64, 100, 250, 1000] {
        for overlap in [0, 1, 3, 10, 39, 200] {
            if overlap >= size {
                continue;
            }
            check_tiling(SAMPLE, size, overlap);
        }
    }
}

#[test]
fn test_chunks_reassemble_page_text() {
    let settings = ChunkingSettings {
        chunk_size: 50,
        chunk_overlap: 12,
    };
    let pages = vec![
        PageText::new("neurology.pdf", 0, SAMPLE),
        PageText::new("neurology.pdf", 1, "  \n "),
        PageText::new("neurology.pdf", 2, "Short final page."),
    ];

    let chunks = split_pages(&pages, &settings);
    assert!(chunks.iter().all(|c| c.page != 1));

    // Rebuild page 0 by appending the non-overlapping tail of each chunk.
    let mut rebuilt: Vec<char> = Vec::new();
    for chunk in chunks.iter().filter(|c| c.page == 0) {
        let chars: Vec<char> = chunk.text.chars().collect();
        let skip = rebuilt.len() - chunk.start;
        rebuilt.extend_from_slice(&chars[skip..]);
    }
    assert_eq!(rebuilt.into_iter().collect::<String>(), SAMPLE);

    let last = chunks.last().unwrap();
    assert_eq!(last.page, 2);
    assert_eq!(last.text, "Short final page.");
    assert_eq!(last.position as usize, chunks.len() - 1);
}
