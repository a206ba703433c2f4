//! Prose snippets shown to the reviewer.

use regex::RegexBuilder;

use markup::Span;

fn floor_boundary(text: &str, mut offset: usize) -> usize {
    offset = offset.min(text.len());
    while !text.is_char_boundary(offset) {
        offset -= 1;
    }
    offset
}

fn ceil_boundary(text: &str, mut offset: usize) -> usize {
    offset = offset.min(text.len());
    while !text.is_char_boundary(offset) {
        offset += 1;
    }
    offset
}

fn collapse(parts: &[&str]) -> String {
    parts
        .iter()
        .flat_map(|p| p.split_whitespace())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Up to `limit` snippets around case-insensitive matches of `term`, each
/// extended by `window` bytes either side and whitespace-collapsed. Terms
/// shorter than three characters match too much to be useful and yield
/// nothing.
pub fn find_contexts(content: &str, term: &str, window: usize, limit: usize) -> Vec<String> {
    if term.trim().chars().count() < 3 || limit == 0 {
        return Vec::new();
    }
    let Ok(pattern) = RegexBuilder::new(&regex::escape(term.trim()))
        .case_insensitive(true)
        .build()
    else {
        return Vec::new();
    };
    pattern
        .find_iter(content)
        .take(limit)
        .map(|m| {
            let start = floor_boundary(content, m.start().saturating_sub(window));
            let end = ceil_boundary(content, m.end().saturating_add(window));
            collapse(&[&content[start..end]])
        })
        .collect()
}

/// Text around a tag with the tag itself cut out.
pub fn tag_context(content: &str, span: Span, window: usize) -> String {
    let left = floor_boundary(content, span.start.saturating_sub(window));
    let right = ceil_boundary(content, span.end.saturating_add(window));
    collapse(&[&content[left..span.start], &content[span.end..right]])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contexts_are_case_insensitive_and_collapsed() {
        let text = "x  Vowel\nharmony. Later vowel ends.";
        let found = find_contexts(text, "vowel", 3, 5);
        assert_eq!(found, vec!["x Vowel ha", "er vowel en"]);
    }

    #[test]
    fn short_terms_are_ignored() {
        assert!(find_contexts("an an an", "an", 10, 3).is_empty());
    }

    #[test]
    fn limit_is_respected() {
        assert_eq!(find_contexts("abc abc abc", "abc", 0, 2).len(), 2);
    }

    #[test]
    fn windows_snap_to_characters() {
        let text = "ééé grammar ééé";
        let found = find_contexts(text, "grammar", 2, 1);
        assert_eq!(found, vec!["é grammar é"]);
    }

    #[test]
    fn tag_text_is_cut_out() {
        let text = "the grammar\\sindex{grammar} of it";
        let start = text.find('\\').unwrap();
        let span = Span::new(start, text.find(" of").unwrap());
        assert_eq!(tag_context(text, span, 100), "the grammar of it");
    }
}
