//! Tag removal: the inverse of writing.

use markup::{classify, parse, SkipRegistry};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::WriterError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StripOutcome {
    pub text: String,
    pub removed: usize,
}

/// Remove every recognised index tag from `source`. Inline variants
/// (`\isi`, `\ini`, `\ili`) leave their visible text behind.
///
/// Stripping the output of a writer run over a tag-free document gives the
/// document back byte for byte.
pub fn strip_tags(source: &str, registry: &SkipRegistry) -> Result<StripOutcome, WriterError> {
    let doc = parse(source, registry)?;
    let regions = classify(&doc);

    let mut text = String::with_capacity(source.len());
    let mut cursor = 0;
    let mut removed = 0;
    for tag in &regions.existing_tags {
        if tag.span.start < cursor {
            // Nested in a tag already removed.
            continue;
        }
        text.push_str(&source[cursor..tag.span.start]);
        if tag.inline {
            text.push_str(tag.argument.key.visible_text());
        }
        cursor = tag.span.end;
        removed += 1;
    }
    text.push_str(&source[cursor..]);
    debug!(removed, "tags stripped");
    Ok(StripOutcome { text, removed })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strip(src: &str) -> StripOutcome {
        strip_tags(src, &SkipRegistry::default()).unwrap()
    }

    #[test]
    fn removes_plain_and_keeps_inline_text() {
        let out = strip("a grammar\\sindex{grammar} of \\isi{Turkish}\\il{languages!Turkish}.");
        assert_eq!(out.text, "a grammar of Turkish.");
        assert_eq!(out.removed, 3);
    }

    #[test]
    fn leaves_verbatim_and_comments_alone() {
        let src = "% \\sindex{x}\n\\begin{verbatim}\\sindex{y}\\end{verbatim}";
        let out = strip(src);
        assert_eq!(out.text, src);
        assert_eq!(out.removed, 0);
    }

    #[test]
    fn malformed_documents_are_reported() {
        assert!(matches!(
            strip_tags("{unclosed", &SkipRegistry::default()),
            Err(WriterError::Markup(_))
        ));
    }
}
