//! Line, paragraph and sectioning lookups for a parsed document.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::document::{Document, NodeKind};

/// Sectioning depth, outermost first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum SectionLevel {
    Part,
    Chapter,
    #[default]
    Section,
    Subsection,
    Subsubsection,
}

impl SectionLevel {
    pub fn depth(self) -> usize {
        match self {
            SectionLevel::Part => 0,
            SectionLevel::Chapter => 1,
            SectionLevel::Section => 2,
            SectionLevel::Subsection => 3,
            SectionLevel::Subsubsection => 4,
        }
    }

    /// Level of a sectioning macro, starred forms included.
    pub fn from_macro(name: &str) -> Option<SectionLevel> {
        match name.strip_suffix('*').unwrap_or(name) {
            "part" => Some(SectionLevel::Part),
            "chapter" => Some(SectionLevel::Chapter),
            "section" => Some(SectionLevel::Section),
            "subsection" => Some(SectionLevel::Subsection),
            "subsubsection" => Some(SectionLevel::Subsubsection),
            _ => None,
        }
    }
}

/// Sectioning counters `[part, chapter, section, subsection, subsubsection]`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct ScopePath(pub [u32; 5]);

impl ScopePath {
    /// Scope with every level deeper than `level` zeroed.
    pub fn truncate(&self, level: SectionLevel) -> ScopePath {
        let mut out = *self;
        for counter in out.0.iter_mut().skip(level.depth() + 1) {
            *counter = 0;
        }
        out
    }

    fn advance(&mut self, level: SectionLevel) {
        let depth = level.depth();
        self.0[depth] += 1;
        for counter in self.0.iter_mut().skip(depth + 1) {
            *counter = 0;
        }
    }
}

impl fmt::Display for ScopePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(u32::to_string).collect();
        f.write_str(&parts.join("."))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outline {
    line_starts: Vec<usize>,
    paragraph_breaks: Vec<usize>,
    marks: Vec<(usize, ScopePath)>,
}

impl Outline {
    pub fn build(doc: &Document) -> Outline {
        let source = doc.source();

        let mut line_starts = vec![0];
        line_starts.extend(
            source
                .bytes()
                .enumerate()
                .filter(|(_, b)| *b == b'\n')
                .map(|(i, _)| i + 1),
        );

        // A run of blank lines is one break; `\par` is another.
        let mut paragraph_breaks = Vec::new();
        let mut previous_blank = true;
        for (i, &start) in line_starts.iter().enumerate() {
            let end = line_starts.get(i + 1).copied().unwrap_or(source.len());
            let blank = source[start..end].trim().is_empty();
            if blank && !previous_blank {
                paragraph_breaks.push(start);
            }
            previous_blank = blank;
        }

        let mut marks = Vec::new();
        let mut scope = ScopePath::default();
        for (id, node) in doc.nodes() {
            let NodeKind::MacroCall { name } = &node.kind else {
                continue;
            };
            let inside_argument = doc
                .ancestors(id)
                .any(|a| matches!(doc.node(a).kind, NodeKind::Argument { .. }));
            if inside_argument {
                continue;
            }
            if name == "par" {
                paragraph_breaks.push(node.span.start);
            } else if let Some(level) = SectionLevel::from_macro(name) {
                scope.advance(level);
                marks.push((node.span.start, scope));
                paragraph_breaks.push(node.span.start);
            }
        }
        paragraph_breaks.sort_unstable();
        paragraph_breaks.dedup();

        Outline {
            line_starts,
            paragraph_breaks,
            marks,
        }
    }

    /// 1-based line and byte column of `offset`.
    pub fn line_col(&self, offset: usize) -> (usize, usize) {
        let line_idx = self
            .line_starts
            .partition_point(|&start| start <= offset)
            .saturating_sub(1);
        (line_idx + 1, offset - self.line_starts[line_idx] + 1)
    }

    pub fn line_of(&self, offset: usize) -> usize {
        self.line_col(offset).0
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Paragraph index (0-based) containing `offset`.
    pub fn paragraph_of(&self, offset: usize) -> u32 {
        self.paragraph_breaks
            .partition_point(|&brk| brk <= offset) as u32
    }

    pub fn scope_of(&self, offset: usize) -> ScopePath {
        let idx = self.marks.partition_point(|(start, _)| *start <= offset);
        if idx == 0 {
            ScopePath::default()
        } else {
            self.marks[idx - 1].1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{parse, SkipRegistry};

    fn outline(src: &str) -> Outline {
        Outline::build(&parse(src, &SkipRegistry::default()).unwrap())
    }

    #[test]
    fn line_and_column() {
        let o = outline("ab\ncd\n\nef");
        assert_eq!(o.line_col(0), (1, 1));
        assert_eq!(o.line_col(4), (2, 2));
        assert_eq!(o.line_col(7), (4, 1));
    }

    #[test]
    fn blank_line_runs_count_once() {
        let src = "one\n\n\n\ntwo\n\nthree";
        let o = outline(src);
        assert_eq!(o.paragraph_of(0), 0);
        assert_eq!(o.paragraph_of(src.find("two").unwrap()), 1);
        assert_eq!(o.paragraph_of(src.find("three").unwrap()), 2);
    }

    #[test]
    fn par_macro_breaks_paragraph() {
        let src = r"one \par two";
        let o = outline(src);
        assert_eq!(o.paragraph_of(src.find("two").unwrap()), 1);
    }

    #[test]
    fn scopes_follow_sectioning() {
        let src = "\\chapter{A}\na\n\\section{B}\nb\n\\subsection{C}\nc\n\\section*{D}\nd\n\\chapter{E}\ne";
        let o = outline(src);
        let at = |s: &str| o.scope_of(src.find(s).unwrap());
        assert_eq!(at("\na\n"), ScopePath([0, 1, 0, 0, 0]));
        assert_eq!(at("\nb\n"), ScopePath([0, 1, 1, 0, 0]));
        assert_eq!(at("\nc\n"), ScopePath([0, 1, 1, 1, 0]));
        assert_eq!(at("\nd\n"), ScopePath([0, 1, 2, 0, 0]));
        assert_eq!(at("\ne"), ScopePath([0, 2, 0, 0, 0]));
        assert_eq!(
            at("\nc\n").truncate(SectionLevel::Section),
            ScopePath([0, 1, 1, 0, 0])
        );
    }

    #[test]
    fn sectioning_inside_definitions_is_ignored() {
        let src = "\\newcommand{\\foo}{\\section{X}}\ntext";
        let o = outline(src);
        assert_eq!(o.scope_of(src.find("text").unwrap()), ScopePath::default());
    }
}
