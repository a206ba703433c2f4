//! Heuristic candidates for phrases the lexicon does not know.

use markup::{IndexType, Span};
use once_cell::sync::Lazy;
use regex::Regex;
use unicode_segmentation::UnicodeSegmentation;

use crate::config::DetectConfig;

/// Affixes (`-ness`, `un-`) and starred reconstructions (`*bʰer-`).
static LEXICAL_SHAPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\*\p{L}+-?|-\p{L}+|\p{L}+-").expect("lexical shape pattern compiles")
});

#[derive(Debug, Clone, PartialEq)]
pub struct HeuristicHit {
    pub span: Span,
    pub index_type: IndexType,
    pub confidence: f32,
}

fn is_capitalised(word: &str) -> bool {
    let mut chars = word.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    first.is_uppercase()
        && word.chars().any(char::is_lowercase)
        && word.chars().all(|c| c.is_alphabetic() || c == '\'' || c == '’')
}

/// Capitalised word sequences of two or more words joined by plain spaces.
pub fn names(source: &str, run: Span, config: &DetectConfig) -> Vec<HeuristicHit> {
    let text = run.slice(source);
    let words: Vec<(usize, &str)> = text
        .split_word_bound_indices()
        .filter(|(_, w)| w.chars().any(char::is_alphanumeric))
        .collect();
    let confidence = config.name_confidence.min(config.heuristic_cap);

    let mut hits = Vec::new();
    let mut group: Vec<(usize, &str)> = Vec::new();
    let mut flush = |group: &mut Vec<(usize, &str)>| {
        let skip = group
            .iter()
            .take_while(|(_, w)| config.stopwords.iter().any(|s| s == w))
            .count();
        let kept = &group[skip..];
        if kept.len() >= 2 && kept.len() <= config.max_name_words {
            let (first_off, _) = kept[0];
            let (last_off, last) = kept[kept.len() - 1];
            hits.push(HeuristicHit {
                span: Span::new(run.start + first_off, run.start + last_off + last.len()),
                index_type: IndexType::Name,
                confidence,
            });
        }
        group.clear();
    };

    for (offset, word) in words {
        if !is_capitalised(word) {
            flush(&mut group);
            continue;
        }
        let joined_by_space = group.last().is_some_and(|&(prev_off, prev)| {
            let gap = &text[prev_off + prev.len()..offset];
            !gap.is_empty() && gap.chars().all(|c| c == ' ')
        });
        if !group.is_empty() && !joined_by_space {
            flush(&mut group);
        }
        group.push((offset, word));
    }
    flush(&mut group);
    hits
}

fn boundary_before(c: Option<char>) -> bool {
    c.is_none_or(|c| c.is_whitespace() || "([{`'\"".contains(c))
}

fn boundary_after(c: Option<char>) -> bool {
    c.is_none_or(|c| c.is_whitespace() || ",.;:!?)]}'\"".contains(c))
}

/// Morpheme and reconstruction shapes standing on their own.
pub fn lexical_items(source: &str, run: Span, config: &DetectConfig) -> Vec<HeuristicHit> {
    let text = run.slice(source);
    let confidence = config.lexical_confidence.min(config.heuristic_cap);
    LEXICAL_SHAPE
        .find_iter(text)
        .filter_map(|m| {
            let start = run.start + m.start();
            let end = run.start + m.end();
            let before = source[..start].chars().next_back();
            let after = source[end..].chars().next();
            (boundary_before(before) && boundary_after(after)).then(|| HeuristicHit {
                span: Span::new(start, end),
                index_type: IndexType::Lexical,
                confidence,
            })
        })
        .collect()
}
