use common::error::AppError;

/// Boundary preference order used when looking for a cut inside the window.
const SEPARATORS: [&str; 4] = ["\n\n", "\n", ". ", " "];

/// Splits document text into overlapping, bounded-length chunks.
///
/// Chunks are pure substrings of the input: every character of the document
/// appears in at least one chunk, consecutive chunks share exactly `overlap`
/// characters, and the output is deterministic for identical input and
/// parameters. Lengths are measured in characters, not bytes, so multi-byte
/// input never gets cut mid-codepoint.
#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    max_len: usize,
    overlap: usize,
}

impl Chunker {
    pub fn new(max_len: usize, overlap: usize) -> Result<Self, AppError> {
        if max_len == 0 {
            return Err(AppError::Configuration(
                "chunk length must be greater than zero".into(),
            ));
        }
        if overlap >= max_len {
            return Err(AppError::Configuration(format!(
                "chunk overlap {overlap} must be smaller than chunk length {max_len}"
            )));
        }
        Ok(Self { max_len, overlap })
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Produces the ordered chunk sequence for `text`.
    ///
    /// Empty input yields an empty sequence, not an error.
    pub fn split(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        let total = chars.len();
        if total == 0 {
            return Vec::new();
        }
        if total <= self.max_len {
            return vec![text.to_owned()];
        }

        let mut chunks = Vec::new();
        let mut start = 0usize;
        loop {
            let window_end = (start + self.max_len).min(total);
            let cut = if window_end == total {
                total
            } else {
                self.cut_point(&chars, start, window_end)
            };
            chunks.push(chars[start..cut].iter().collect());
            if cut == total {
                break;
            }
            start = cut - self.overlap;
        }
        chunks
    }

    // A usable cut must land strictly past the overlap region, otherwise the
    // next chunk would not make progress. When no boundary qualifies, the
    // window edge becomes a hard cut.
    fn cut_point(&self, chars: &[char], start: usize, window_end: usize) -> usize {
        let floor = start + self.overlap + 1;
        for separator in SEPARATORS {
            if let Some(cut) = last_separator_end(chars, floor, window_end, separator) {
                return cut;
            }
        }
        window_end
    }
}

// Greatest position in [floor, window_end] where `separator` ends, keeping
// the separator inside the emitted chunk so no characters are dropped.
fn last_separator_end(
    chars: &[char],
    floor: usize,
    window_end: usize,
    separator: &str,
) -> Option<usize> {
    let sep: Vec<char> = separator.chars().collect();
    let mut cut = window_end;
    while cut >= floor && cut >= sep.len() {
        if chars[cut - sep.len()..cut] == sep[..] {
            return Some(cut);
        }
        cut -= 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reconstruct(chunks: &[String], overlap: usize) -> String {
        let mut text: String = chunks.first().cloned().unwrap_or_default();
        for chunk in chunks.iter().skip(1) {
            let chars: Vec<char> = chunk.chars().collect();
            text.extend(chars[overlap..].iter());
        }
        text
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        let chunker = Chunker::new(20, 5).expect("valid config");
        assert!(chunker.split("").is_empty());
    }

    #[test]
    fn short_input_is_a_single_chunk() {
        let chunker = Chunker::new(100, 10).expect("valid config");
        let chunks = chunker.split("short text");
        assert_eq!(chunks, vec!["short text".to_owned()]);
    }

    #[test]
    fn overlap_must_be_smaller_than_chunk_length() {
        assert!(matches!(
            Chunker::new(20, 20),
            Err(AppError::Configuration(_))
        ));
        assert!(matches!(Chunker::new(0, 0), Err(AppError::Configuration(_))));
    }

    #[test]
    fn boundaryless_text_falls_back_to_hard_cuts() {
        // 50 characters without a single separator: windows advance by
        // max_len - overlap, so cuts land at 20/35 and the tail is absorbed.
        let text: String = std::iter::repeat('x').take(50).collect();
        let chunker = Chunker::new(20, 5).expect("valid config");

        let chunks = chunker.split(&text);

        assert_eq!(chunks.len(), 3);
        assert_eq!(
            chunks.iter().map(String::len).collect::<Vec<_>>(),
            vec![20, 20, 20]
        );
        for pair in chunks.windows(2) {
            assert_eq!(&pair[0][pair[0].len() - 5..], &pair[1][..5]);
        }
        assert_eq!(reconstruct(&chunks, 5), text);
    }

    #[test]
    fn paragraph_boundary_is_preferred_over_word_boundary() {
        let text = "aaaa aaaa\n\nbbbb bbbb cccc";
        let chunker = Chunker::new(15, 3).expect("valid config");

        let chunks = chunker.split(text);

        assert!(chunks[0].ends_with("\n\n"), "chunks: {chunks:?}");
        assert_eq!(reconstruct(&chunks, 3), text);
    }

    #[test]
    fn sentence_boundary_is_used_when_no_newline_exists() {
        let text = "First sentence here. Second sentence continues well past the limit.";
        let chunker = Chunker::new(30, 4).expect("valid config");

        let chunks = chunker.split(text);

        assert!(chunks[0].ends_with(". "), "chunks: {chunks:?}");
        assert_eq!(reconstruct(&chunks, 4), text);
    }

    #[test]
    fn every_chunk_respects_the_length_bound() {
        let text = "Lorem ipsum dolor sit amet, consectetur adipiscing elit. \
                    Sed do eiusmod tempor incididunt ut labore et dolore magna aliqua. \
                    Ut enim ad minim veniam, quis nostrud exercitation ullamco.";
        let chunker = Chunker::new(40, 8).expect("valid config");

        let chunks = chunker.split(text);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 40, "oversized chunk: {chunk:?}");
        }
        assert_eq!(reconstruct(&chunks, 8), text);
    }

    #[test]
    fn splitting_is_deterministic() {
        let text = "alpha beta gamma delta epsilon zeta eta theta iota kappa";
        let chunker = Chunker::new(18, 4).expect("valid config");
        assert_eq!(chunker.split(text), chunker.split(text));
    }

    #[test]
    fn multibyte_text_is_never_cut_mid_codepoint() {
        let text: String = std::iter::repeat('ä').take(45).collect();
        let chunker = Chunker::new(20, 5).expect("valid config");

        let chunks = chunker.split(&text);

        assert_eq!(reconstruct(&chunks, 5), text);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 20);
        }
    }
}
