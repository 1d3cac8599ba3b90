use crv_core::text::truncate_chars;
use unicode_segmentation::UnicodeSegmentation;

/// Page text beyond this many characters is ignored before sentence splitting.
pub const MAX_CHUNK_INPUT_CHARS: usize = 500_000;

/// UAX #29 sentences, trimmed; whitespace-only pieces are dropped.
///
/// The rules know nothing about abbreviations: "Dr. Smith" or "the U.S. Army" split after the
/// period, so abbreviation-heavy pages yield some sentence fragments.
pub fn split_sentences(text: &str) -> Vec<&str> {
    text.split_sentence_bounds()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Split `text` into windows of up to `sentences_per_passage` sentences, stepping
/// `sliding_distance` sentences at a time.
///
/// Sentences longer than `filter_sentence_len` characters are dropped first. A missing, zero or
/// oversized sliding distance falls back to `sentences_per_passage`, giving disjoint windows.
pub fn chunk_text(
    text: &str,
    sentences_per_passage: usize,
    filter_sentence_len: usize,
    sliding_distance: Option<usize>,
) -> Vec<String> {
    if sentences_per_passage == 0 {
        return Vec::new();
    }
    let step = match sliding_distance {
        Some(d) if d > 0 && d <= sentences_per_passage => d,
        _ => sentences_per_passage,
    };

    let sents: Vec<&str> = split_sentences(truncate_chars(text, MAX_CHUNK_INPUT_CHARS))
        .into_iter()
        .filter(|s| s.chars().count() <= filter_sentence_len)
        .collect();

    (0..sents.len())
        .step_by(step)
        .map(|start| {
            let end = (start + sentences_per_passage).min(sents.len());
            sents[start..end].join(" ")
        })
        .collect()
}
