use serde::Serialize;

/// Free-text generation output (summaries, podcast scripts) with the word
/// count callers display alongside it.
#[derive(Debug, Clone, Serialize)]
pub struct TextArtifact {
    pub text: String,
    pub word_count: usize,
}

impl TextArtifact {
    pub fn new(text: String) -> Self {
        let word_count = text.split_whitespace().count();
        Self { text, word_count }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_count_ignores_repeated_whitespace() {
        let artifact = TextArtifact::new("one  two\n three".to_owned());
        assert_eq!(artifact.word_count, 3);
    }

    #[test]
    fn empty_text_has_zero_words() {
        assert_eq!(TextArtifact::new(String::new()).word_count, 0);
    }
}
