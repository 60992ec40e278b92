//! Vocabulary and tag-set mappings for the BiLSTM-CRF tagger
//!
//! Both mappings are loaded once from JSON artifacts and are read-only
//! afterwards.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use serde::de::DeserializeOwned;
use tracing::{error, info, warn};

use geoloc_core::{GeolocError, ModelConfig, Result};

/// Reserved vocabulary entries and the ids they are pinned to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservedTokens {
    pub pad_token: String,
    pub unk_token: String,
    pub pad_idx: u32,
    pub unk_idx: u32,
}

impl Default for ReservedTokens {
    fn default() -> Self {
        Self::from(&ModelConfig::default())
    }
}

impl From<&ModelConfig> for ReservedTokens {
    fn from(config: &ModelConfig) -> Self {
        Self {
            pad_token: config.pad_token.clone(),
            unk_token: config.unk_token.clone(),
            pad_idx: config.pad_idx,
            unk_idx: config.unk_idx,
        }
    }
}

// ============================================================================
// Vocabulary
// ============================================================================

/// Surface token -> id mapping with PAD/UNK pinned to their reserved ids
#[derive(Debug, Clone)]
pub struct Vocabulary {
    word2idx: HashMap<String, u32>,
    pad_idx: u32,
    unk_idx: u32,
}

impl Vocabulary {
    /// Build a vocabulary, forcing the reserved entries onto their ids.
    ///
    /// A PAD/UNK entry that is missing or sits at the wrong id is corrected
    /// in place with a warning.
    pub fn from_map(mut word2idx: HashMap<String, u32>, reserved: &ReservedTokens) -> Self {
        if word2idx.get(&reserved.pad_token) != Some(&reserved.pad_idx) {
            warn!(
                token = %reserved.pad_token,
                current = ?word2idx.get(&reserved.pad_token),
                forced = reserved.pad_idx,
                "padding token missing or misplaced in vocabulary, forcing reserved id"
            );
            word2idx.insert(reserved.pad_token.clone(), reserved.pad_idx);
        }

        if word2idx.get(&reserved.unk_token) != Some(&reserved.unk_idx) {
            warn!(
                token = %reserved.unk_token,
                current = ?word2idx.get(&reserved.unk_token),
                forced = reserved.unk_idx,
                "unknown token missing or misplaced in vocabulary, forcing reserved id"
            );
            let squatter = word2idx
                .iter()
                .find(|(token, idx)| **idx == reserved.unk_idx && **token != reserved.unk_token)
                .map(|(token, _)| token.clone());
            if let Some(token) = squatter {
                error!(
                    id = reserved.unk_idx,
                    %token,
                    "reserved unknown-token id is already taken by another token"
                );
            }
            word2idx.insert(reserved.unk_token.clone(), reserved.unk_idx);
        }

        Self {
            word2idx,
            pad_idx: reserved.pad_idx,
            unk_idx: reserved.unk_idx,
        }
    }

    /// Load a vocabulary from a JSON object artifact
    pub fn load(path: &Path, reserved: &ReservedTokens) -> Result<Self> {
        info!(path = %path.display(), "loading vocabulary");
        let word2idx: HashMap<String, u32> = read_json(path)?;
        Ok(Self::from_map(word2idx, reserved))
    }

    /// Id of `token`, or the UNK id when it is out of vocabulary
    pub fn lookup_word(&self, token: &str) -> u32 {
        self.word2idx.get(token).copied().unwrap_or(self.unk_idx)
    }

    pub fn pad_id(&self) -> u32 {
        self.pad_idx
    }

    pub fn unk_id(&self) -> u32 {
        self.unk_idx
    }

    /// Number of entries, used as the embedding table size
    pub fn len(&self) -> usize {
        self.word2idx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.word2idx.is_empty()
    }
}

// ============================================================================
// Tags
// ============================================================================

/// Label emitted by the tagger for one token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    /// Outside any location span ("O")
    Outside,
    /// First token of a location span ("B-LOC")
    BeginLocation,
    /// Continuation of a location span ("I-LOC")
    InsideLocation,
    /// A label the tag set knows but location extraction ignores
    Other,
}

impl Tag {
    pub const OUTSIDE: &'static str = "O";
    pub const BEGIN_LOCATION: &'static str = "B-LOC";
    pub const INSIDE_LOCATION: &'static str = "I-LOC";

    /// Classify a raw label
    pub fn from_label(label: &str) -> Self {
        match label {
            Self::OUTSIDE => Self::Outside,
            Self::BEGIN_LOCATION => Self::BeginLocation,
            Self::INSIDE_LOCATION => Self::InsideLocation,
            _ => Self::Other,
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Outside => write!(f, "{}", Self::OUTSIDE),
            Self::BeginLocation => write!(f, "{}", Self::BEGIN_LOCATION),
            Self::InsideLocation => write!(f, "{}", Self::INSIDE_LOCATION),
            Self::Other => write!(f, "other"),
        }
    }
}

/// Tag label <-> id mapping
#[derive(Debug, Clone)]
pub struct TagSet {
    tag2idx: HashMap<String, usize>,
    idx2label: HashMap<usize, String>,
}

impl TagSet {
    /// Build a tag set, requiring the outside and location labels
    pub fn from_map(tag2idx: HashMap<String, usize>) -> std::result::Result<Self, String> {
        for required in [Tag::OUTSIDE, Tag::BEGIN_LOCATION, Tag::INSIDE_LOCATION] {
            if !tag2idx.contains_key(required) {
                return Err(format!("tag set has no '{required}' label"));
            }
        }

        let mut idx2label = HashMap::with_capacity(tag2idx.len());
        for (label, idx) in &tag2idx {
            if let Some(previous) = idx2label.insert(*idx, label.clone()) {
                warn!(id = idx, %previous, %label, "tag id assigned to more than one label");
            }
        }
        info!(tags = idx2label.len(), "built id -> tag mapping");

        Ok(Self { tag2idx, idx2label })
    }

    /// Load a tag set from a JSON object artifact
    pub fn load(path: &Path) -> Result<Self> {
        info!(path = %path.display(), "loading tag set");
        let tag2idx: HashMap<String, usize> = read_json(path)?;
        Self::from_map(tag2idx).map_err(|message| GeolocError::artifact(path, message))
    }

    /// Label for `id`; unknown ids read as the outside label
    pub fn lookup_tag_name(&self, id: usize) -> &str {
        self.idx2label
            .get(&id)
            .map(String::as_str)
            .unwrap_or(Tag::OUTSIDE)
    }

    /// Typed tag for `id`; unknown ids read as [`Tag::Outside`]
    pub fn lookup_tag(&self, id: usize) -> Tag {
        Tag::from_label(self.lookup_tag_name(id))
    }

    /// Number of tags, used as the CRF state count
    pub fn len(&self) -> usize {
        self.tag2idx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tag2idx.is_empty()
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| GeolocError::artifact(path, format!("failed to read: {e}")))?;
    serde_json::from_str(&content)
        .map_err(|e| GeolocError::artifact(path, format!("failed to parse: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: &[(&str, u32)]) -> HashMap<String, u32> {
        entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_lookup_word_falls_back_to_unk() {
        let vocab = Vocabulary::from_map(
            map(&[("<PAD>", 0), ("<UNK>", 1), ("Paris", 2)]),
            &ReservedTokens::default(),
        );
        assert_eq!(vocab.lookup_word("Paris"), 2);
        assert_eq!(vocab.lookup_word("Atlantis"), 1);
        assert_eq!(vocab.len(), 3);
    }

    #[test]
    fn test_missing_reserved_tokens_are_inserted() {
        let vocab = Vocabulary::from_map(map(&[("Rome", 2)]), &ReservedTokens::default());
        assert_eq!(vocab.lookup_word("<PAD>"), 0);
        assert_eq!(vocab.lookup_word("<UNK>"), 1);
        assert_eq!(vocab.pad_id(), 0);
        assert_eq!(vocab.len(), 3);
    }

    #[test]
    fn test_misplaced_reserved_tokens_are_corrected() {
        let vocab = Vocabulary::from_map(
            map(&[("<PAD>", 7), ("<UNK>", 8), ("Oslo", 2)]),
            &ReservedTokens::default(),
        );
        assert_eq!(vocab.lookup_word("<PAD>"), 0);
        assert_eq!(vocab.lookup_word("<UNK>"), 1);
        assert_eq!(vocab.len(), 3);
    }

    #[test]
    fn test_tag_lookup_defaults_to_outside() {
        let tags = TagSet::from_map(
            [("O", 0), ("B-LOC", 1), ("I-LOC", 2), ("<PAD>", 3)]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        )
        .unwrap();

        assert_eq!(tags.lookup_tag(1), Tag::BeginLocation);
        assert_eq!(tags.lookup_tag(2), Tag::InsideLocation);
        assert_eq!(tags.lookup_tag(3), Tag::Other);
        assert_eq!(tags.lookup_tag(42), Tag::Outside);
        assert_eq!(tags.lookup_tag_name(42), "O");
        assert_eq!(tags.len(), 4);
    }

    #[test]
    fn test_tag_set_requires_location_labels() {
        let result = TagSet::from_map(
            [("O", 0), ("B-PER", 1)]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_load_unreadable_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ner_word2idx.json");
        std::fs::write(&path, "not json").unwrap();

        let err = Vocabulary::load(&path, &ReservedTokens::default()).unwrap_err();
        assert!(matches!(err, GeolocError::Artifact { .. }));

        let missing = dir.path().join("missing.json");
        assert!(TagSet::load(&missing).is_err());
    }
}
