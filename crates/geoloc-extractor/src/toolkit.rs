//! General-purpose NER toolkit pipeline
//!
//! A toolkit model is a directory holding:
//! - `meta.json` (optional): pipeline name, version and language
//! - `patterns.jsonl`: one entity pattern per line, either a phrase
//!   (`{"label": "GPE", "pattern": "New York"}`) or a token pattern
//!   (`{"label": "LOC", "pattern": [{"LOWER": "lake"}, {"LOWER": "tahoe"}]}`)
//! - `tokenizer.json` (optional): extra `special_cases` for the tokenizer
//!
//! Patterns are matched left to right over the token sequence; at each
//! position the longest match wins and matches never overlap.

use std::collections::HashMap;
use std::path::Path;

use regex::Regex;
use serde::Deserialize;
use tracing::{debug, info};

use crate::tokenizer::{Token, Tokenizer};
use crate::ExtractedEntity;
use geoloc_core::{GeolocError, Result};

// ============================================================================
// Pipeline trait
// ============================================================================

/// End-to-end NLP pipeline: tokenization plus entity recognition
pub trait NlpPipeline: Send + Sync {
    /// Pipeline name, for logs and status reports
    fn name(&self) -> &str;

    /// Tokenize `text`
    fn tokenize(&self, text: &str) -> Result<Vec<Token>>;

    /// Recognise entities in `text`
    fn entities(&self, text: &str) -> Result<Vec<ExtractedEntity>>;
}

// ============================================================================
// Artifact formats
// ============================================================================

/// Contents of `meta.json`
#[derive(Debug, Clone, Deserialize)]
pub struct ToolkitMeta {
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default = "default_lang")]
    pub lang: String,
    #[serde(default)]
    pub labels: Vec<String>,
}

fn default_lang() -> String {
    "en".to_string()
}

#[derive(Debug, Default, Deserialize)]
struct TokenizerSettings {
    #[serde(default)]
    special_cases: Vec<String>,
}

/// One line of `patterns.jsonl`
#[derive(Debug, Clone, Deserialize)]
pub struct EntityPattern {
    pub label: String,
    pub pattern: PatternSpec,
}

impl EntityPattern {
    /// Phrase pattern matching the exact token texts of `phrase`
    pub fn phrase(label: impl Into<String>, phrase: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            pattern: PatternSpec::Phrase(phrase.into()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PatternSpec {
    Phrase(String),
    Tokens(Vec<TokenSpec>),
}

/// Attributes one token must satisfy; every present attribute must hold
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenSpec {
    #[serde(rename = "ORTH", default)]
    pub orth: Option<String>,
    #[serde(rename = "LOWER", default)]
    pub lower: Option<String>,
    #[serde(rename = "TEXT", default)]
    pub text: Option<TextSpec>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TextSpec {
    Exact(String),
    Regex {
        #[serde(rename = "REGEX")]
        regex: String,
    },
}

// ============================================================================
// Compiled patterns
// ============================================================================

#[derive(Debug, Clone)]
enum TokenMatcher {
    Orth(String),
    Lower(String),
    Regex(Regex),
}

impl TokenMatcher {
    fn matches(&self, token: &str) -> bool {
        match self {
            Self::Orth(orth) => token == orth,
            Self::Lower(lower) => token.to_lowercase() == *lower,
            Self::Regex(regex) => regex.is_match(token),
        }
    }

    /// Lowercased key usable for first-token indexing
    fn index_key(&self) -> Option<String> {
        match self {
            Self::Orth(orth) => Some(orth.to_lowercase()),
            Self::Lower(lower) => Some(lower.clone()),
            Self::Regex(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
struct CompiledPattern {
    label: String,
    tokens: Vec<Vec<TokenMatcher>>,
}

impl CompiledPattern {
    fn compile(pattern: EntityPattern, tokenizer: &Tokenizer) -> std::result::Result<Self, String> {
        let tokens = match pattern.pattern {
            PatternSpec::Phrase(phrase) => tokenizer
                .tokenize(&phrase)
                .into_iter()
                .map(|t| vec![TokenMatcher::Orth(t.text)])
                .collect::<Vec<_>>(),
            PatternSpec::Tokens(specs) => specs
                .into_iter()
                .map(compile_token_spec)
                .collect::<std::result::Result<Vec<_>, _>>()?,
        };

        if tokens.is_empty() {
            return Err(format!("pattern for label '{}' is empty", pattern.label));
        }

        Ok(Self {
            label: pattern.label,
            tokens,
        })
    }

    /// Number of tokens matched when the pattern starts at `tokens[start]`
    fn match_at(&self, tokens: &[Token], start: usize) -> Option<usize> {
        let window = tokens.get(start..start + self.tokens.len())?;
        window
            .iter()
            .zip(&self.tokens)
            .all(|(token, matchers)| matchers.iter().all(|m| m.matches(&token.text)))
            .then_some(self.tokens.len())
    }
}

fn compile_token_spec(spec: TokenSpec) -> std::result::Result<Vec<TokenMatcher>, String> {
    let mut matchers = Vec::new();
    if let Some(orth) = spec.orth {
        matchers.push(TokenMatcher::Orth(orth));
    }
    if let Some(lower) = spec.lower {
        matchers.push(TokenMatcher::Lower(lower.to_lowercase()));
    }
    match spec.text {
        Some(TextSpec::Exact(text)) => matchers.push(TokenMatcher::Orth(text)),
        Some(TextSpec::Regex { regex }) => {
            let compiled =
                Regex::new(&regex).map_err(|e| format!("invalid REGEX '{regex}': {e}"))?;
            matchers.push(TokenMatcher::Regex(compiled));
        }
        None => {}
    }

    if matchers.is_empty() {
        return Err("token pattern needs one of ORTH, LOWER or TEXT".to_string());
    }
    Ok(matchers)
}

// ============================================================================
// Rule pipeline
// ============================================================================

/// Toolkit pipeline driven by tokenizer rules and entity patterns
pub struct RulePipeline {
    name: String,
    tokenizer: Tokenizer,
    patterns: Vec<CompiledPattern>,
    /// Lowercased first-token text -> pattern indices
    index: HashMap<String, Vec<usize>>,
    /// Patterns whose first token is a regex
    unindexed: Vec<usize>,
}

impl RulePipeline {
    /// Build a pipeline from in-memory patterns
    pub fn new(
        name: impl Into<String>,
        tokenizer: Tokenizer,
        patterns: Vec<EntityPattern>,
    ) -> std::result::Result<Self, String> {
        let mut compiled = Vec::with_capacity(patterns.len());
        for pattern in patterns {
            compiled.push(CompiledPattern::compile(pattern, &tokenizer)?);
        }

        let mut index: HashMap<String, Vec<usize>> = HashMap::new();
        let mut unindexed = Vec::new();
        for (i, pattern) in compiled.iter().enumerate() {
            let key = pattern.tokens[0].iter().find_map(TokenMatcher::index_key);
            match key {
                Some(key) => index.entry(key).or_default().push(i),
                None => unindexed.push(i),
            }
        }

        Ok(Self {
            name: name.into(),
            tokenizer,
            patterns: compiled,
            index,
            unindexed,
        })
    }

    /// Load a toolkit model directory
    pub fn load(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(GeolocError::artifact(dir, "toolkit model directory not found"));
        }

        let meta_path = dir.join("meta.json");
        let meta = if meta_path.exists() {
            let content = read_artifact(&meta_path)?;
            serde_json::from_str::<ToolkitMeta>(&content)
                .map_err(|e| GeolocError::artifact(&meta_path, format!("failed to parse: {e}")))?
        } else {
            ToolkitMeta {
                name: dir
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "toolkit".to_string()),
                version: String::new(),
                lang: default_lang(),
                labels: Vec::new(),
            }
        };

        let tokenizer_path = dir.join("tokenizer.json");
        let settings = if tokenizer_path.exists() {
            let content = read_artifact(&tokenizer_path)?;
            serde_json::from_str::<TokenizerSettings>(&content).map_err(|e| {
                GeolocError::artifact(&tokenizer_path, format!("failed to parse: {e}"))
            })?
        } else {
            TokenizerSettings::default()
        };
        let tokenizer = Tokenizer::new().with_special_cases(settings.special_cases);

        let patterns_path = dir.join("patterns.jsonl");
        let content = read_artifact(&patterns_path)?;
        let mut patterns = Vec::new();
        for (line_no, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let pattern: EntityPattern = serde_json::from_str(line).map_err(|e| {
                GeolocError::artifact(&patterns_path, format!("line {}: {e}", line_no + 1))
            })?;
            patterns.push(pattern);
        }

        if !meta.labels.is_empty() {
            if let Some(undeclared) = patterns.iter().find(|p| !meta.labels.contains(&p.label)) {
                return Err(GeolocError::artifact(
                    &patterns_path,
                    format!("label '{}' is not declared in meta.json", undeclared.label),
                ));
            }
        }

        let pipeline = Self::new(meta.name.clone(), tokenizer, patterns)
            .map_err(|message| GeolocError::artifact(&patterns_path, message))?;

        info!(
            name = %meta.name,
            version = %meta.version,
            lang = %meta.lang,
            labels = ?meta.labels,
            patterns = pipeline.patterns.len(),
            "toolkit pipeline loaded"
        );
        Ok(pipeline)
    }

    /// Longest pattern starting at `tokens[start]`, earliest pattern on ties
    fn longest_match(&self, tokens: &[Token], start: usize) -> Option<(usize, &CompiledPattern)> {
        let key = tokens[start].text.to_lowercase();
        let candidates = self
            .index
            .get(&key)
            .into_iter()
            .flatten()
            .chain(&self.unindexed);

        let mut best: Option<(usize, usize)> = None;
        for &i in candidates {
            if let Some(len) = self.patterns[i].match_at(tokens, start) {
                let better = match best {
                    None => true,
                    Some((best_len, best_i)) => len > best_len || (len == best_len && i < best_i),
                };
                if better {
                    best = Some((len, i));
                }
            }
        }
        best.map(|(len, i)| (len, &self.patterns[i]))
    }
}

impl NlpPipeline for RulePipeline {
    fn name(&self) -> &str {
        &self.name
    }

    fn tokenize(&self, text: &str) -> Result<Vec<Token>> {
        Ok(self.tokenizer.tokenize(text))
    }

    fn entities(&self, text: &str) -> Result<Vec<ExtractedEntity>> {
        let tokens = self.tokenizer.tokenize(text);
        let mut entities = Vec::new();
        let mut i = 0;

        while i < tokens.len() {
            match self.longest_match(&tokens, i) {
                Some((len, pattern)) => {
                    let start = tokens[i].start;
                    let end = tokens[i + len - 1].end;
                    entities.push(ExtractedEntity {
                        text: text[start..end].to_string(),
                        label: pattern.label.clone(),
                        start,
                        end,
                    });
                    i += len;
                }
                None => i += 1,
            }
        }

        debug!(pipeline = %self.name, entities = entities.len(), "entity recognition finished");
        Ok(entities)
    }
}

fn read_artifact(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .map_err(|e| GeolocError::artifact(path, format!("failed to read: {e}")))
}
