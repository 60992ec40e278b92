//! Rule-based word tokenizer shared by both extraction paths
//!
//! Text is split on whitespace first; every chunk is then peeled from the
//! outside in: prefix punctuation, suffix punctuation and clitics, and
//! finally infix hyphens and slashes. Special cases (abbreviations such as
//! "St." or "U.S.") and chunks that look like URLs, e-mail addresses or
//! numbers are never split.

use std::collections::HashSet;

use serde::Serialize;

/// A token with its byte span in the source text
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    pub text: String,
    /// Byte offset of the first character
    pub start: usize,
    /// Byte offset one past the last character
    pub end: usize,
    /// Position in the token sequence
    pub index: usize,
}

const PREFIXES: &[char] = &[
    '(', '[', '{', '"', '\'', '“', '‘', '«', '¿', '¡', '$', '£', '€', '#', '`',
];

const SUFFIXES: &[char] = &[
    '.', ',', ';', ':', '!', '?', ')', ']', '}', '"', '\'', '”', '’', '»', '%', '…',
];

const CLITICS: &[&str] = &[
    "n't", "n’t", "'s", "’s", "'ll", "’ll", "'re", "’re", "'ve", "’ve", "'m", "’m", "'d", "’d",
];

const DEFAULT_SPECIAL_CASES: &[&str] = &[
    "St.", "Ste.", "Mt.", "Ft.", "Pt.", "Ave.", "Blvd.", "Rd.", "Dr.", "Mr.", "Mrs.", "Ms.",
    "Jr.", "Sr.", "Prof.", "Gen.", "Gov.", "Sen.", "Rep.", "Inc.", "Ltd.", "Co.", "Corp.",
    "vs.", "etc.", "e.g.", "i.e.", "a.m.", "p.m.", "Jan.", "Feb.", "Mar.", "Apr.", "Aug.",
    "Sept.", "Sep.", "Oct.", "Nov.", "Dec.", "Ala.", "Ariz.", "Calif.", "Colo.", "Conn.",
    "Fla.", "Ga.", "Ill.", "Ind.", "Kan.", "Ky.", "La.", "Mass.", "Md.", "Mich.", "Minn.",
    "Miss.", "Mo.", "Mont.", "Neb.", "Nev.", "Okla.", "Ore.", "Pa.", "Tenn.", "Va.", "Wash.",
    "Wis.", "Wyo.",
];

/// Whitespace-first tokenizer with prefix/suffix/infix rules
#[derive(Debug, Clone)]
pub struct Tokenizer {
    special_cases: HashSet<String>,
}

impl Tokenizer {
    /// Create a tokenizer with the default English special cases
    pub fn new() -> Self {
        Self {
            special_cases: DEFAULT_SPECIAL_CASES.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Add chunks that must never be split
    pub fn with_special_cases<I, S>(mut self, cases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.special_cases.extend(cases.into_iter().map(Into::into));
        self
    }

    /// Split `text` into tokens; whitespace never appears inside a token
    pub fn tokenize(&self, text: &str) -> Vec<Token> {
        let mut spans = Vec::new();
        let mut chunk_start = None;

        for (idx, ch) in text.char_indices() {
            if ch.is_whitespace() {
                if let Some(start) = chunk_start.take() {
                    self.split_chunk(text, start, idx, &mut spans);
                }
            } else if chunk_start.is_none() {
                chunk_start = Some(idx);
            }
        }
        if let Some(start) = chunk_start {
            self.split_chunk(text, start, text.len(), &mut spans);
        }

        spans
            .into_iter()
            .enumerate()
            .map(|(index, (start, end))| Token {
                text: text[start..end].to_string(),
                start,
                end,
                index,
            })
            .collect()
    }

    /// Split one whitespace-free chunk `text[start..end]`
    fn split_chunk(&self, text: &str, mut start: usize, mut end: usize, out: &mut Vec<(usize, usize)>) {
        let mut suffixes = Vec::new();

        while start < end {
            let piece = &text[start..end];

            if self.is_protected(piece) {
                out.push((start, end));
                break;
            }

            if let Some(ch) = piece.chars().next().filter(|c| PREFIXES.contains(c)) {
                if piece.len() > ch.len_utf8() {
                    out.push((start, start + ch.len_utf8()));
                    start += ch.len_utf8();
                    continue;
                }
            }

            if let Some(len) = self.suffix_len(piece) {
                suffixes.push((end - len, end));
                end -= len;
                continue;
            }

            split_infixes(piece, start, out);
            break;
        }

        out.extend(suffixes.into_iter().rev());
    }

    fn is_protected(&self, piece: &str) -> bool {
        self.special_cases.contains(piece)
            || is_initialism(piece)
            || is_url_or_email(piece)
            || is_number(piece)
            || (piece.chars().count() > 1 && piece.chars().all(|c| c == '.'))
    }

    /// Length in bytes of the suffix to peel off `piece`, if any
    fn suffix_len(&self, piece: &str) -> Option<usize> {
        if piece.len() > 3 && piece.ends_with("...") {
            return Some(3);
        }

        let lower = piece.to_lowercase();
        for clitic in CLITICS {
            if lower.len() == piece.len()
                && lower.ends_with(clitic)
                && piece.len() > clitic.len()
            {
                return Some(clitic.len());
            }
        }

        let last = piece.chars().next_back()?;
        if SUFFIXES.contains(&last) && piece.len() > last.len_utf8() {
            return Some(last.len_utf8());
        }
        None
    }
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Emit `piece` (starting at byte `base`) split around infix hyphens,
/// slashes and double dashes
fn split_infixes(piece: &str, base: usize, out: &mut Vec<(usize, usize)>) {
    let chars: Vec<(usize, char)> = piece.char_indices().collect();
    let mut token_start = 0;
    let mut i = 0;

    while i < chars.len() {
        let (offset, ch) = chars[i];
        let prev = i.checked_sub(1).map(|p| chars[p].1);
        let next = chars.get(i + 1).map(|&(_, c)| c);

        let infix_len = if piece[offset..].starts_with("--") && offset > token_start {
            2
        } else if ch == '-' && prev.is_some_and(char::is_alphabetic) && next.is_some_and(char::is_alphabetic) {
            1
        } else if ch == '/'
            && prev.is_some_and(char::is_alphanumeric)
            && next.is_some_and(char::is_alphabetic)
        {
            1
        } else {
            0
        };

        if infix_len > 0 {
            if offset > token_start {
                out.push((base + token_start, base + offset));
            }
            out.push((base + offset, base + offset + infix_len));
            token_start = offset + infix_len;
            i += infix_len;
        } else {
            i += 1;
        }
    }

    if token_start < piece.len() {
        out.push((base + token_start, base + piece.len()));
    }
}

/// "J." or "U.S." style abbreviations
fn is_initialism(piece: &str) -> bool {
    let mut chars = piece.chars();
    let mut pairs = 0;
    loop {
        match (chars.next(), chars.next()) {
            (None, _) => return pairs > 0,
            (Some(letter), Some('.')) if letter.is_uppercase() => pairs += 1,
            _ => return false,
        }
    }
}

fn is_url_or_email(piece: &str) -> bool {
    let lower = piece.to_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("www.") {
        return true;
    }
    match piece.split_once('@') {
        Some((user, domain)) => {
            !user.is_empty()
                && domain.contains('.')
                && !domain.ends_with('.')
                && domain.chars().all(|c| c.is_alphanumeric() || c == '.' || c == '-')
        }
        None => false,
    }
}

/// Integers and decimals with optional sign and group separators
fn is_number(piece: &str) -> bool {
    let digits = piece.strip_prefix(['+', '-']).unwrap_or(piece);
    let mut saw_digit = false;
    let mut prev_sep = true;
    for ch in digits.chars() {
        if ch.is_ascii_digit() {
            saw_digit = true;
            prev_sep = false;
        } else if matches!(ch, '.' | ',' | ':') && !prev_sep {
            prev_sep = true;
        } else {
            return false;
        }
    }
    saw_digit && !prev_sep
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(text: &str) -> Vec<String> {
        Tokenizer::new()
            .tokenize(text)
            .into_iter()
            .map(|t| t.text)
            .collect()
    }

    #[test]
    fn test_sentence_punctuation() {
        assert_eq!(
            texts("We visited Berlin and Rome last summer."),
            vec!["We", "visited", "Berlin", "and", "Rome", "last", "summer", "."]
        );
    }

    #[test]
    fn test_prefix_and_suffix_runs() {
        assert_eq!(
            texts("(\"Lisbon\"), then Porto!"),
            vec!["(", "\"", "Lisbon", "\"", ")", ",", "then", "Porto", "!"]
        );
    }

    #[test]
    fn test_clitics() {
        assert_eq!(
            texts("Paris's museums don't close"),
            vec!["Paris", "'s", "museums", "do", "n't", "close"]
        );
    }

    #[test]
    fn test_special_cases_and_initialisms() {
        assert_eq!(
            texts("St. Louis is in the U.S. today."),
            vec!["St.", "Louis", "is", "in", "the", "U.S.", "today", "."]
        );
    }

    #[test]
    fn test_custom_special_case() {
        let tokenizer = Tokenizer::new().with_special_cases(["Wash.D.C."]);
        let tokens: Vec<String> = tokenizer
            .tokenize("to Wash.D.C. now")
            .into_iter()
            .map(|t| t.text)
            .collect();
        assert_eq!(tokens, vec!["to", "Wash.D.C.", "now"]);
    }

    #[test]
    fn test_infix_hyphen_and_slash() {
        assert_eq!(
            texts("Stratford-upon-Avon and/or Bath"),
            vec!["Stratford", "-", "upon", "-", "Avon", "and", "/", "or", "Bath"]
        );
    }

    #[test]
    fn test_numbers_urls_and_ellipsis_are_kept() {
        assert_eq!(
            texts("It cost 1,250.50 at https://example.com/a-b ..."),
            vec!["It", "cost", "1,250.50", "at", "https://example.com/a-b", "..."]
        );
        assert_eq!(texts("Wait..."), vec!["Wait", "..."]);
    }

    #[test]
    fn test_offsets_match_source() {
        let text = "  Héllo,\tMünchen  (Bayern) ";
        let tokens = Tokenizer::new().tokenize(text);
        for (i, token) in tokens.iter().enumerate() {
            assert_eq!(&text[token.start..token.end], token.text);
            assert_eq!(token.index, i);
        }
        let words: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(words, vec!["Héllo", ",", "München", "(", "Bayern", ")"]);
    }

    #[test]
    fn test_whitespace_only() {
        assert!(Tokenizer::new().tokenize(" \n\t ").is_empty());
        assert!(Tokenizer::new().tokenize("").is_empty());
    }
}
