//! Keyword matcher: finds keyword phrases in free-text case notes.

use regex::{Regex, RegexBuilder};

use super::error::AuditError;
use crate::models::{Keyword, MatchedNote, Note};

/// Upper bound for the compiled alternation. Large keyword lists with
/// Unicode case folding outgrow the regex crate's default limit.
const PATTERN_SIZE_LIMIT: usize = 64 * (1 << 20);

/// Literal phrases matched case-insensitively on whole-word boundaries.
///
/// Blank entries are dropped and exact repeats collapse to their first
/// occurrence; the set is never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordSet {
    keywords: Vec<String>,
}

impl KeywordSet {
    pub fn new<I, S>(keywords: I) -> Result<Self, AuditError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        let mut blank = 0usize;
        for keyword in keywords {
            let keyword = keyword.into();
            if keyword.trim().is_empty() {
                blank += 1;
                continue;
            }
            if !unique.contains(&keyword) {
                unique.push(keyword);
            }
        }

        if blank > 0 {
            tracing::warn!(blank, "Ignoring blank keywords");
        }
        if unique.is_empty() {
            return Err(AuditError::InvalidInput("the keyword list cannot be empty".into()));
        }
        Ok(Self { keywords: unique })
    }

    pub fn from_rows(rows: &[Keyword]) -> Result<Self, AuditError> {
        Self::new(rows.iter().map(|row| row.keyword.clone()))
    }

    pub fn len(&self) -> usize {
        self.keywords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.keywords.iter().map(String::as_str)
    }
}

/// One compiled `\b(?:k1|k2|...)\b` pattern over an escaped keyword set.
///
/// Alternatives keep keyword-set order, so at any position the first listed
/// keyword that fits wins.
#[derive(Debug, Clone)]
pub struct KeywordMatcher {
    pattern: Regex,
}

impl KeywordMatcher {
    pub fn new(keywords: &KeywordSet) -> Result<Self, AuditError> {
        // An empty alternation matches the empty string at every boundary.
        if keywords.is_empty() {
            return Err(AuditError::InvalidInput("the keyword list cannot be empty".into()));
        }
        let alternation = keywords
            .iter()
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join("|");

        let pattern = RegexBuilder::new(&format!(r"\b(?:{alternation})\b"))
            .case_insensitive(true)
            .size_limit(PATTERN_SIZE_LIMIT)
            .build()
            .map_err(|e| AuditError::InvalidInput(format!("keyword pattern: {e}")))?;

        Ok(Self { pattern })
    }

    /// All non-overlapping matches in `text`, in order, as written in the text.
    pub fn find_all(&self, text: &str) -> Vec<String> {
        self.pattern
            .find_iter(text)
            .map(|m| m.as_str().to_string())
            .collect()
    }

    /// Keep only notes whose text matches; notes without text never match.
    pub fn match_notes(&self, notes: Vec<Note>) -> Vec<MatchedNote> {
        notes
            .into_iter()
            .filter_map(|note| {
                let matched_keywords = match note.text.as_deref() {
                    Some(text) => self.find_all(text),
                    None => return None,
                };
                if matched_keywords.is_empty() {
                    return None;
                }
                Some(MatchedNote {
                    note,
                    matched_keywords,
                })
            })
            .collect()
    }
}

/// Compile `keywords` and scan `notes` in one call.
pub fn match_notes(notes: Vec<Note>, keywords: &KeywordSet) -> Result<Vec<MatchedNote>, AuditError> {
    let matcher = KeywordMatcher::new(keywords)?;
    let scanned = notes.len();
    let matched = matcher.match_notes(notes);
    tracing::debug!(scanned, matched = matched.len(), keywords = keywords.len(), "Keyword scan complete");
    Ok(matched)
}
