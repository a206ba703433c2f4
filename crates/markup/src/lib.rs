//! texindex markup layer.
//!
//! Turns LaTeX source into a read-only tree and answers the one question the
//! rest of the pipeline cares about: where may an index tag go?
//!
//! ## What we do
//!
//! - Structural parse into an arena [`Document`] (groups, environments,
//!   macro calls with adjacent arguments, math, verbatim, comments, text)
//! - Region classification: taggable text runs, existing index tags, and
//!   inline `% texindex:` directives
//! - Outline lookups: line/column, paragraph index, sectioning scope
//! - The index-tag vocabulary: command sets, makeindex argument syntax,
//!   parsing and rendering
//!
//! ## Pure function guarantee
//!
//! Parsing and classification depend only on the source text and the
//! [`SkipRegistry`]. No I/O, no clock, no environment.
//!
//! ## Invariants worth knowing
//!
//! - Sibling node spans are disjoint and ordered; the arena is in document order
//! - Nothing inside math, verbatim, comments, excluded environments, or the
//!   arguments of skip/opaque/sectioning/tag macros is ever taggable
//! - A malformed document fails as a whole; nothing is guessed

mod classify;
mod config;
mod document;
mod error;
mod outline;
mod parser;
mod span;
mod tag;

pub use crate::classify::{classify, Directive, DirectiveKind, ExistingTag, Regions, TaggableSpan};
pub use crate::config::{SkipManifest, SkipRegistry, UnknownMacros};
pub use crate::document::{Ancestors, Document, Node, NodeId, NodeKind};
pub use crate::error::MarkupError;
pub use crate::outline::{Outline, ScopePath, SectionLevel};
pub use crate::parser::parse;
pub use crate::span::Span;
pub use crate::tag::{
    escape, recognize_command, CommandSet, CrossRelation, IndexKey, IndexType, KeySegment,
    RangeMark, Relation, Tag, TagArgument, TagBody,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chapter_round_trip_of_regions() {
        let src = "\\chapter{Phonology}\n\
                   The \\emph{vowel harmony} of Turkish is well studied.\n\
                   \\begin{equation}\nx = vowel\n\\end{equation}\n\
                   % vowel harmony again\n\
                   \\begin{lstlisting}\nvowel harmony\n\\end{lstlisting}\n\
                   Vowel harmony\\sindex{vowel harmony} recurs.\n";
        let doc = parse(src, &SkipRegistry::default()).expect("document parses");
        let regions = classify(&doc);
        let outline = Outline::build(&doc);

        let prose: Vec<&str> = regions.taggable.iter().map(|t| t.span.slice(src)).collect();
        let joined = prose.concat();
        assert_eq!(joined.matches("owel harmony").count(), 2);
        assert!(!joined.contains("x = vowel"));

        assert_eq!(regions.existing_tags.len(), 1);
        let tag = &regions.existing_tags[0];
        assert_eq!(tag.argument.key, IndexKey::plain("vowel harmony"));
        assert_eq!(outline.line_of(tag.span.start), 10);
        assert_eq!(outline.scope_of(tag.span.start), ScopePath([0, 1, 0, 0, 0]));
    }

    #[test]
    fn malformed_document_is_rejected_whole() {
        let err = parse("\\begin{itemize}\n\\item one\n", &SkipRegistry::default())
            .expect_err("unclosed environment");
        assert_eq!(err.offset(), Some(0));
    }
}
