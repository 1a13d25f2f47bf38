//! Split narration text into synthesis-sized chunks at natural pauses.
//!
//! Lengths are counted in characters, not bytes.

pub const DEFAULT_MAX_CHARS: usize = 380;

/// Break markers in priority order. The cut goes after the marker.
const BREAK_MARKERS: [&str; 9] = [
    ", ", " and ", " but ", " because ", " so ", ". ", " - ", "; ", " ",
];

/// Split `text` into ordered chunks of at most `max_chars` characters.
///
/// Text that already fits is returned untouched as a single chunk. Longer
/// text is cut at the highest-priority marker found past the middle of
/// each window, then at the last space, then hard at `max_chars`. Chunks
/// are trimmed and never empty.
pub fn segment(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    if text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text.trim();

    while remaining.chars().count() > max_chars {
        let window = &remaining[..byte_offset(remaining, max_chars)];
        let (cut, resume) = find_break(window, max_chars);

        let chunk = remaining[..cut].trim();
        if !chunk.is_empty() {
            chunks.push(chunk.to_string());
        }
        remaining = remaining[resume..].trim();
    }

    if !remaining.is_empty() {
        chunks.push(remaining.to_string());
    }
    chunks
}

/// Returns (end of chunk, start of remainder) as byte offsets into `window`.
fn find_break(window: &str, max_chars: usize) -> (usize, usize) {
    let min_chars = max_chars / 2;

    for marker in BREAK_MARKERS {
        if let Some(pos) = window.rfind(marker) {
            if window[..pos].chars().count() > min_chars {
                let end = pos + marker.len();
                return (end, end);
            }
        }
    }

    match window.rfind(' ') {
        Some(pos) if pos > 0 => (pos, pos + 1),
        _ => (window.len(), window.len()),
    }
}

/// Byte offset of the `n`th character (or the end of `s`).
fn byte_offset(s: &str, n: usize) -> usize {
    s.char_indices().nth(n).map_or(s.len(), |(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collapse(s: &str) -> String {
        s.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    fn sample_paragraph() -> String {
        let sentence = "Prefer borrowing over cloning when the callee only reads the data, \
                        and keep lock scopes short because holding a guard across an await \
                        point can deadlock the executor. ";
        sentence.repeat(6)
    }

    #[test]
    fn short_text_is_single_identical_chunk() {
        let text = "  Use a mutex here.  ";
        assert_eq!(segment(text, 380), vec![text.to_string()]);
    }

    #[test]
    fn text_of_exact_max_length_is_not_split() {
        let text = "a".repeat(380);
        assert_eq!(segment(&text, 380), vec![text]);
    }

    #[test]
    fn long_text_chunks_fit_and_reconstruct() {
        let text = sample_paragraph();
        let chunks = segment(&text, DEFAULT_MAX_CHARS);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(!chunk.is_empty());
            assert_eq!(chunk, chunk.trim());
            assert!(chunk.chars().count() <= DEFAULT_MAX_CHARS, "chunk too long: {chunk}");
        }
        assert_eq!(collapse(&chunks.join(" ")), collapse(&text));
    }

    #[test]
    fn comma_beats_later_space() {
        // Comma sits past the midpoint; plain spaces follow it.
        let text = format!("{}, tail words here {}", "x".repeat(18), "y".repeat(10));
        let chunks = segment(&text, 30);
        assert_eq!(chunks[0], format!("{},", "x".repeat(18)));
        assert_eq!(chunks[1], format!("tail words here {}", "y".repeat(10)));
    }

    #[test]
    fn early_marker_is_ignored() {
        // The comma is before the midpoint, so the last space wins.
        let text = "ab, cdefghijklmnop qrstuv wxyz0123456789";
        let chunks = segment(text, 30);
        assert_eq!(chunks[0], "ab, cdefghijklmnop qrstuv");
        assert_eq!(chunks[1], "wxyz0123456789");
    }

    #[test]
    fn conjunction_marker_stays_with_first_chunk() {
        let text = format!("{} and {}", "a".repeat(20), "b".repeat(20));
        let chunks = segment(&text, 30);
        assert_eq!(chunks[0], format!("{} and", "a".repeat(20)));
        assert_eq!(chunks[1], "b".repeat(20));
    }

    #[test]
    fn unbroken_token_is_hard_cut() {
        let text = "z".repeat(25);
        let chunks = segment(&text, 10);
        assert_eq!(chunks, vec!["z".repeat(10), "z".repeat(10), "z".repeat(5)]);
    }

    #[test]
    fn multibyte_text_splits_on_char_boundaries() {
        let text = "héllo wörld ".repeat(20);
        let chunks = segment(&text, 25);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 25);
        }
        assert_eq!(collapse(&chunks.join(" ")), collapse(&text));
    }

    #[test]
    fn every_iteration_makes_progress() {
        let text = " ".repeat(5) + &"word ".repeat(100);
        let chunks = segment(&text, 7);
        assert!(chunks.iter().all(|c| !c.is_empty() && c.chars().count() <= 7));
        assert_eq!(chunks.len(), 100);
    }
}
