//! Text -> fixed-length id sequence for the BiLSTM-CRF tagger

use tracing::{debug, warn};

use crate::toolkit::NlpPipeline;
use crate::vocab::Vocabulary;
use geoloc_core::Result;

/// Encoded tagger input for one text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedSequence {
    /// Token ids, right-padded with the PAD id to the maximum length
    pub ids: Vec<u32>,
    /// `true` for real tokens, `false` for padding
    pub mask: Vec<bool>,
    /// Retained tokens, one per `true` mask entry
    pub tokens: Vec<String>,
    /// Whether tokens beyond the maximum length were dropped
    pub truncated: bool,
}

impl EncodedSequence {
    /// Number of real (non-padding) positions
    pub fn real_len(&self) -> usize {
        self.tokens.len()
    }
}

/// Tokenizes, maps to ids, pads/truncates and builds the validity mask
#[derive(Debug, Clone, Copy)]
pub struct Preprocessor {
    max_len: usize,
}

impl Preprocessor {
    pub fn new(max_len: usize) -> Self {
        Self { max_len }
    }

    /// Tokenize with the shared pipeline tokenizer, dropping blank tokens
    pub fn tokenize(&self, pipeline: &dyn NlpPipeline, text: &str) -> Result<Vec<String>> {
        Ok(pipeline
            .tokenize(text)?
            .into_iter()
            .map(|t| t.text)
            .filter(|t| !t.trim().is_empty())
            .collect())
    }

    /// Encode `tokens`, truncating to the maximum length.
    ///
    /// Tokens past the limit are discarded; there is no windowed inference.
    pub fn encode(&self, vocab: &Vocabulary, mut tokens: Vec<String>) -> EncodedSequence {
        let truncated = tokens.len() > self.max_len;
        if truncated {
            warn!(
                tokens = tokens.len(),
                max_len = self.max_len,
                kept = %tokens[..self.max_len].join(" "),
                "input truncated for BiLSTM-CRF tagging"
            );
            tokens.truncate(self.max_len);
        }

        let real = tokens.len();
        let mut ids: Vec<u32> = tokens.iter().map(|t| vocab.lookup_word(t)).collect();
        ids.resize(self.max_len, vocab.pad_id());

        let mut mask = vec![true; real];
        mask.resize(self.max_len, false);

        debug!(real, padded = self.max_len - real, "encoded tagger input");
        EncodedSequence {
            ids,
            mask,
            tokens,
            truncated,
        }
    }

    /// Tokenize and encode; `None` when the text has no tokens
    pub fn run(
        &self,
        pipeline: &dyn NlpPipeline,
        vocab: &Vocabulary,
        text: &str,
    ) -> Result<Option<EncodedSequence>> {
        let tokens = self.tokenize(pipeline, text)?;
        if tokens.is_empty() {
            return Ok(None);
        }
        Ok(Some(self.encode(vocab, tokens)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::Tokenizer;
    use crate::toolkit::RulePipeline;
    use crate::vocab::ReservedTokens;
    use std::collections::HashMap;

    fn vocab() -> Vocabulary {
        let map: HashMap<String, u32> = [("<PAD>", 0), ("<UNK>", 1), ("I", 2), ("visited", 3), ("London", 4)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        Vocabulary::from_map(map, &ReservedTokens::default())
    }

    fn tokens(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_short_sequence_is_padded() {
        let encoded = Preprocessor::new(6).encode(&vocab(), tokens(&["I", "visited", "London", "today"]));
        assert_eq!(encoded.ids, vec![2, 3, 4, 1, 0, 0]);
        assert_eq!(encoded.mask, vec![true, true, true, true, false, false]);
        assert_eq!(encoded.real_len(), 4);
        assert!(!encoded.truncated);
    }

    #[test]
    fn test_long_sequence_is_truncated() {
        let words: Vec<String> = (0..150).map(|i| format!("w{i}")).collect();
        let encoded = Preprocessor::new(100).encode(&vocab(), words);
        assert_eq!(encoded.ids.len(), 100);
        assert!(encoded.mask.iter().all(|m| *m));
        assert_eq!(encoded.tokens.len(), 100);
        assert_eq!(encoded.tokens[99], "w99");
        assert!(encoded.truncated);
    }

    #[test]
    fn test_exact_length_is_not_truncated() {
        let encoded = Preprocessor::new(3).encode(&vocab(), tokens(&["I", "visited", "London"]));
        assert_eq!(encoded.ids, vec![2, 3, 4]);
        assert_eq!(encoded.mask, vec![true; 3]);
        assert!(!encoded.truncated);
    }

    #[test]
    fn test_run_without_tokens_short_circuits() {
        let pipeline = RulePipeline::new("test", Tokenizer::new(), Vec::new()).unwrap();
        let result = Preprocessor::new(100).run(&pipeline, &vocab(), " \t\n").unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_run_mask_true_count_matches_tokens() {
        let pipeline = RulePipeline::new("test", Tokenizer::new(), Vec::new()).unwrap();
        let encoded = Preprocessor::new(100)
            .run(&pipeline, &vocab(), "I visited London.")
            .unwrap()
            .unwrap();
        assert_eq!(encoded.tokens, vec!["I", "visited", "London", "."]);
        assert_eq!(encoded.mask.iter().filter(|m| **m).count(), encoded.real_len());
        assert_eq!(&encoded.ids[..4], &[2, 3, 4, 1]);
    }
}
