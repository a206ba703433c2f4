//! Removal of tags a reviewer dropped.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// A tag to remove, as recorded when it was reviewed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRemoval {
    pub start: usize,
    pub end: usize,
    /// Full tag text, backslash to closing brace.
    pub text: String,
    /// 1-based line, used when the source moved since review.
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovalOutcome {
    pub text: String,
    pub removed: usize,
    /// Removals whose tag could not be found.
    pub missing: Vec<TagRemoval>,
}

/// Remove reviewed tags from `source`.
///
/// A removal applies at its recorded span only when the span still holds
/// exactly the tag text. Otherwise the first copy of the text on the
/// recorded line is removed; failing that, the removal is reported missing.
pub fn remove_tags(source: &str, removals: &[TagRemoval]) -> RemovalOutcome {
    let mut exact: Vec<&TagRemoval> = Vec::new();
    let mut fallback: Vec<&TagRemoval> = Vec::new();
    for removal in removals {
        let holds = removal.start < removal.end
            && source.get(removal.start..removal.end) == Some(removal.text.as_str());
        if holds {
            exact.push(removal);
        } else {
            fallback.push(removal);
        }
    }

    exact.sort_by_key(|r| (r.start, r.end));
    exact.dedup_by_key(|r| (r.start, r.end));
    let mut text = String::with_capacity(source.len());
    let mut cursor = 0;
    let mut removed = 0;
    for removal in exact {
        if removal.start < cursor {
            fallback.push(removal);
            continue;
        }
        text.push_str(&source[cursor..removal.start]);
        cursor = removal.end;
        removed += 1;
    }
    text.push_str(&source[cursor..]);

    let mut missing = Vec::new();
    if !fallback.is_empty() {
        let mut lines: Vec<String> = text.split_inclusive('\n').map(str::to_owned).collect();
        for removal in fallback {
            let found = removal.line >= 1
                && !removal.text.is_empty()
                && lines
                    .get_mut(removal.line - 1)
                    .is_some_and(|line| match line.find(&removal.text) {
                        Some(at) => {
                            line.replace_range(at..at + removal.text.len(), "");
                            true
                        }
                        None => false,
                    });
            if found {
                debug!(line = removal.line, tag = %removal.text, "tag removed by line");
                removed += 1;
            } else {
                warn!(line = removal.line, tag = %removal.text, "reviewed tag not found");
                missing.push(removal.clone());
            }
        }
        text = lines.concat();
    }

    RemovalOutcome {
        text,
        removed,
        missing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn removal(source: &str, tag: &str, line: usize) -> TagRemoval {
        let start = source.find(tag).unwrap();
        TagRemoval {
            start,
            end: start + tag.len(),
            text: tag.to_owned(),
            line,
        }
    }

    #[test]
    fn removes_by_exact_span() {
        let src = "a\\sindex{a} b\\sindex{b}";
        let out = remove_tags(src, &[removal(src, "\\sindex{b}", 1)]);
        assert_eq!(out.text, "a\\sindex{a} b");
        assert_eq!(out.removed, 1);
    }

    #[test]
    fn falls_back_to_recorded_line() {
        let src = "intro\na\\sindex{a} b";
        let mut stale = removal(src, "\\sindex{a}", 2);
        stale.start += 3;
        stale.end += 3;
        let out = remove_tags(src, &[stale]);
        assert_eq!(out.text, "intro\na b");
        assert!(out.missing.is_empty());
    }

    #[test]
    fn reports_tags_that_are_gone() {
        let src = "nothing here";
        let gone = TagRemoval {
            start: 0,
            end: 4,
            text: "\\sindex{x}".into(),
            line: 1,
        };
        let out = remove_tags(src, &[gone.clone()]);
        assert_eq!(out.text, src);
        assert_eq!(out.missing, vec![gone]);
    }
}
