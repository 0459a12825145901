//! Document chunking
//!
//! Two splitters feed the three collections: overlapping raw chunks for
//! the `documents` view and natural paragraphs for the paragraph-summary
//! view. All offsets are computed in characters, never raw bytes.

use regex::Regex;
use std::sync::OnceLock;

/// Fraction of the chunk size searched around the target for a sentence end
const BOUNDARY_TOLERANCE: f32 = 0.15;

/// Paragraphs shorter than this many words merge into the next one
const MIN_PARAGRAPH_WORDS: usize = 40;

/// Paragraphs longer than this many words are split at sentence ends
const MAX_PARAGRAPH_WORDS: usize = 400;

/// Split text into overlapping chunks, preferring sentence boundaries.
///
/// A cut point is searched within +-15% of `size`; when no sentence end
/// (`.`, `?`, `!` followed by whitespace) falls in that window the chunk is
/// hard-cut at `size`. Consecutive chunks share exactly `overlap`
/// characters. Empty or whitespace-only input yields an empty list.
pub fn split_into_chunks(text: &str, size: usize, overlap: usize) -> Vec<String> {
    if text.trim().is_empty() || size == 0 {
        return Vec::new();
    }

    let chars: Vec<char> = text.chars().collect();
    let total = chars.len();
    if total <= size {
        return vec![text.to_string()];
    }

    let tolerance = ((size as f32) * BOUNDARY_TOLERANCE) as usize;
    let mut chunks = Vec::new();
    let mut start = 0usize;

    loop {
        let hard_end = (start + size).min(total);
        let end = if hard_end < total {
            let window_lo = start + size.saturating_sub(tolerance);
            let window_hi = (start + size + tolerance).min(total);
            find_sentence_end(&chars, window_lo, window_hi).unwrap_or(hard_end)
        } else {
            total
        };

        chunks.push(chars[start..end].iter().collect::<String>());

        if end >= total {
            break;
        }

        let next = end.saturating_sub(overlap);
        // Always make forward progress, even with degenerate parameters
        start = if next > start { next } else { end };
    }

    chunks
}

/// Last sentence-ending position in `[lo, hi)`, exclusive end of the cut.
///
/// A sentence end is `.`, `?` or `!` followed by whitespace (or the end of
/// input). Returns the index one past the punctuation mark.
fn find_sentence_end(chars: &[char], lo: usize, hi: usize) -> Option<usize> {
    if lo >= hi || hi > chars.len() {
        return None;
    }
    for i in (lo..hi).rev() {
        if matches!(chars[i], '.' | '?' | '!') {
            let followed_by_space = chars.get(i + 1).map(|c| c.is_whitespace()).unwrap_or(true);
            if followed_by_space {
                return Some(i + 1);
            }
        }
    }
    None
}

/// Split text into natural paragraphs.
///
/// A boundary is two or more consecutive line terminators. Paragraphs
/// under 40 words merge forward into the next one; paragraphs over 400
/// words are split at sentence boundaries into pieces of at most 400
/// words. The trailing paragraph is kept even when short.
pub fn split_into_paragraphs(text: &str) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    static BOUNDARY: OnceLock<Regex> = OnceLock::new();
    let boundary =
        BOUNDARY.get_or_init(|| Regex::new(r"\r?\n[ \t]*\r?\n").expect("static regex"));
    let raw: Vec<String> = boundary
        .split(text)
        .map(normalize_whitespace)
        .filter(|p| !p.is_empty())
        .collect();

    // Merge short paragraphs forward
    let mut merged: Vec<String> = Vec::new();
    let mut pending = String::new();
    for (i, para) in raw.iter().enumerate() {
        if pending.is_empty() {
            pending = para.clone();
        } else {
            pending.push(' ');
            pending.push_str(para);
        }
        let is_last = i + 1 == raw.len();
        if word_count(&pending) >= MIN_PARAGRAPH_WORDS || is_last {
            merged.push(std::mem::take(&mut pending));
        }
    }

    // Split oversized paragraphs at sentence ends
    let mut result = Vec::new();
    for para in merged {
        if word_count(&para) > MAX_PARAGRAPH_WORDS {
            result.extend(split_long_paragraph(&para));
        } else {
            result.push(para);
        }
    }
    result
}

fn split_long_paragraph(paragraph: &str) -> Vec<String> {
    let sentences = split_sentences(paragraph);
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut current_words = 0usize;

    for sentence in sentences {
        let words = word_count(&sentence);
        if current_words + words > MAX_PARAGRAPH_WORDS && !current.is_empty() {
            pieces.push(std::mem::take(&mut current));
            current_words = 0;
        }
        if words > MAX_PARAGRAPH_WORDS {
            // A single runaway sentence is cut by word count
            for piece in hard_split_words(&sentence, MAX_PARAGRAPH_WORDS) {
                pieces.push(piece);
            }
            continue;
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&sentence);
        current_words += words;
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

/// Split text into sentences on `.`, `?`, `!` followed by whitespace.
fn split_sentences(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut sentences = Vec::new();
    let mut start = 0usize;

    for i in 0..chars.len() {
        if matches!(chars[i], '.' | '?' | '!') {
            let at_end = i + 1 == chars.len();
            let followed_by_space = chars.get(i + 1).map(|c| c.is_whitespace()).unwrap_or(false);
            if at_end || followed_by_space {
                let sentence: String = chars[start..=i].iter().collect();
                let sentence = sentence.trim().to_string();
                if !sentence.is_empty() {
                    sentences.push(sentence);
                }
                start = i + 1;
            }
        }
    }
    if start < chars.len() {
        let tail: String = chars[start..].iter().collect();
        let tail = tail.trim().to_string();
        if !tail.is_empty() {
            sentences.push(tail);
        }
    }
    sentences
}

fn hard_split_words(text: &str, max_words: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    words
        .chunks(max_words)
        .map(|piece| piece.join(" "))
        .collect()
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_yields_no_chunks() {
        assert!(split_into_chunks("", 1000, 100).is_empty());
        assert!(split_into_chunks("   \n\t  ", 1000, 100).is_empty());
        assert!(split_into_paragraphs("").is_empty());
        assert!(split_into_paragraphs("  \n\n  ").is_empty());
    }

    #[test]
    fn test_small_content_single_chunk() {
        let content = "Small content.";
        let chunks = split_into_chunks(content, 100, 20);
        assert_eq!(chunks, vec![content.to_string()]);
    }

    #[test]
    fn test_chunks_overlap_exactly() {
        let content = "abcdefghij".repeat(30); // 300 chars, no sentence ends
        let chunks = split_into_chunks(&content, 100, 10);
        assert!(chunks.len() >= 3);
        for pair in chunks.windows(2) {
            let prev: Vec<char> = pair[0].chars().collect();
            let next: Vec<char> = pair[1].chars().collect();
            let tail: String = prev[prev.len() - 10..].iter().collect();
            let head: String = next[..10].iter().collect();
            assert_eq!(tail, head);
        }
    }

    #[test]
    fn test_chunk_count_for_hard_cuts() {
        let len = 1000usize;
        let (size, overlap) = (100usize, 10usize);
        let content = "x".repeat(len);
        let chunks = split_into_chunks(&content, size, overlap);
        let expected = (len - overlap + (size - overlap) - 1) / (size - overlap);
        assert_eq!(chunks.len(), expected);
    }

    #[test]
    fn test_prefers_sentence_boundary() {
        let sentence = "This sentence has exactly forty five characters. ";
        let content = sentence.repeat(10);
        let chunks = split_into_chunks(&content, 100, 10);
        // Cuts should land just after a period, inside the tolerance window
        for chunk in &chunks[..chunks.len() - 1] {
            assert!(
                chunk.trim_end().ends_with('.'),
                "chunk does not end at a sentence: {:?}",
                chunk
            );
        }
    }

    #[test]
    fn test_reconstruction_from_prefixes() {
        let content = "The cat sat on the mat. The dog barked loudly. ".repeat(20);
        let overlap = 20;
        let chunks = split_into_chunks(&content, 120, overlap);

        let mut rebuilt = String::new();
        rebuilt.push_str(&chunks[0]);
        for chunk in &chunks[1..] {
            let chars: Vec<char> = chunk.chars().collect();
            rebuilt.push_str(&chars[overlap..].iter().collect::<String>());
        }
        assert_eq!(rebuilt, content);
    }

    #[test]
    fn test_chunks_handle_unicode() {
        let content = "Hello 世界! This is a test with emoji 🎉 and accents é here. ".repeat(20);
        let chunks = split_into_chunks(&content, 80, 10);
        assert!(!chunks.is_empty());
        for chunk in &chunks {
            assert!(!chunk.is_empty());
        }
    }

    #[test]
    fn test_paragraph_boundary_detection() {
        let text = format!(
            "{}\n\n{}\r\n\r\n{}",
            "first paragraph word ".repeat(3).trim(),
            "second paragraph word ".repeat(3).trim(),
            "third paragraph word ".repeat(3).trim(),
        );
        // All three are short, so they merge into a single paragraph
        let paragraphs = split_into_paragraphs(&text);
        assert_eq!(paragraphs.len(), 1);
        assert!(paragraphs[0].contains("first"));
        assert!(paragraphs[0].contains("third"));
    }

    #[test]
    fn test_short_paragraphs_merge_forward() {
        let short = "Only a few words here.";
        let long = "word ".repeat(60);
        let text = format!("{short}\n\n{long}");
        let paragraphs = split_into_paragraphs(&text);
        assert_eq!(paragraphs.len(), 1);
        assert!(paragraphs[0].starts_with("Only a few words here."));
    }

    #[test]
    fn test_long_paragraph_split_at_sentences() {
        let sentence = "Ten little words make up this one short test sentence. ";
        let text = sentence.repeat(90); // ~900 words, one paragraph
        let paragraphs = split_into_paragraphs(&text);
        assert!(paragraphs.len() >= 2);
        for para in &paragraphs {
            assert!(word_count(para) <= MAX_PARAGRAPH_WORDS);
        }
    }

    #[test]
    fn test_last_short_paragraph_kept() {
        let long = "word ".repeat(60);
        let text = format!("{long}\n\nShort tail.");
        let paragraphs = split_into_paragraphs(&text);
        assert_eq!(paragraphs.len(), 2);
        assert_eq!(paragraphs[1], "Short tail.");
    }

    #[test]
    fn test_paragraph_whitespace_normalized() {
        let text = "several   words\twith \n odd    spacing here and more words to pass the merge threshold plus filler filler filler filler filler filler filler filler filler filler filler filler filler filler filler filler filler filler filler filler filler filler filler filler filler filler filler filler filler";
        let paragraphs = split_into_paragraphs(text);
        assert_eq!(paragraphs.len(), 1);
        assert!(!paragraphs[0].contains('\t'));
        assert!(!paragraphs[0].contains("  "));
    }
}
