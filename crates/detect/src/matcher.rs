//! Lexicon term search over taggable text runs.

use lexicon::{Lexicon, Term};
use markup::Span;
use regex::{Regex, RegexBuilder};

use crate::error::DetectError;

/// True when `start..end` in `source` sits on word boundaries: not preceded
/// by a letter, digit or backslash and not followed by a letter or digit.
pub(crate) fn on_word_boundary(source: &str, start: usize, end: usize) -> bool {
    let before_ok = source[..start]
        .chars()
        .next_back()
        .is_none_or(|c| !c.is_alphanumeric() && c != '\\');
    let after_ok = source[end..]
        .chars()
        .next()
        .is_none_or(|c| !c.is_alphanumeric());
    before_ok && after_ok
}

struct TermPattern {
    term: Term,
    regex: Regex,
}

/// A raw lexicon hit inside a text run.
#[derive(Debug, Clone, PartialEq)]
pub struct TermHit {
    pub span: Span,
    pub term: Term,
    /// Position of the term in longest-first order; lower wins ties.
    pub priority: usize,
}

/// Compiled patterns for every lexicon string, longest first.
pub struct TermMatcher {
    patterns: Vec<TermPattern>,
}

impl std::fmt::Debug for TermMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TermMatcher")
            .field("patterns", &self.patterns.len())
            .finish()
    }
}

impl TermMatcher {
    pub fn new(lexicon: &Lexicon, min_term_chars: usize) -> Result<Self, DetectError> {
        let mut patterns = Vec::new();
        for term in lexicon.terms() {
            if term.text.chars().count() < min_term_chars {
                continue;
            }
            // Whitespace inside a term matches any whitespace run so terms may wrap lines.
            let pattern = term
                .text
                .split_whitespace()
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join(r"\s+");
            let regex = RegexBuilder::new(&pattern)
                .case_insensitive(!term.index_type.is_case_sensitive())
                .build()
                .map_err(|e| DetectError::Pattern {
                    term: term.text.clone(),
                    message: e.to_string(),
                })?;
            patterns.push(TermPattern { term, regex });
        }
        Ok(Self { patterns })
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Every boundary-respecting hit of every term in `run` (which must lie
    /// inside `source`). Hits may overlap; callers resolve them.
    pub fn find_all(&self, source: &str, run: Span) -> Vec<TermHit> {
        let text = run.slice(source);
        let mut hits = Vec::new();
        for (priority, pattern) in self.patterns.iter().enumerate() {
            for m in pattern.regex.find_iter(text) {
                let start = run.start + m.start();
                let end = run.start + m.end();
                if on_word_boundary(source, start, end) {
                    hits.push(TermHit {
                        span: Span::new(start, end),
                        term: pattern.term.clone(),
                        priority,
                    });
                }
            }
        }
        hits
    }
}
