//! Structural parser: LaTeX source to an arena [`Document`].
//!
//! The parser only recovers structure (groups, environments, macro calls and
//! their adjacent arguments, math, verbatim, comments, text). It never
//! expands macros; an unknown macro is an opaque leaf with its arguments.
//! Inline verbatim macros such as `\verb|...|` keep their delimited body as
//! a single verbatim leaf.

use crate::config::SkipRegistry;
use crate::document::{Document, Node, NodeId, NodeKind};
use crate::error::MarkupError;
use crate::span::Span;

/// Parse `source` into a document tree.
///
/// Fails with [`MarkupError::MalformedStructure`] on an unclosed group, a
/// stray `}`, an `\end` that does not close the innermost environment, or
/// unterminated math or verbatim content.
pub fn parse(source: &str, registry: &SkipRegistry) -> Result<Document, MarkupError> {
    registry.validate()?;
    let mut parser = Parser {
        source,
        bytes: source.as_bytes(),
        pos: 0,
        registry,
        nodes: Vec::new(),
    };
    let root = parser.push(NodeKind::Root, 0, None);
    parser.parse_sequence(root, &Terminator::Eof)?;
    parser.close(root, source.len());
    Ok(Document::new(
        source.to_owned(),
        parser.nodes,
        registry.clone(),
    ))
}

#[derive(Debug)]
enum Terminator {
    Eof,
    Brace { open: usize },
    Bracket { open: usize },
    Environment { name: String, open: usize },
}

struct Parser<'a> {
    source: &'a str,
    bytes: &'a [u8],
    pos: usize,
    registry: &'a SkipRegistry,
    nodes: Vec<Node>,
}

impl<'a> Parser<'a> {
    fn push(&mut self, kind: NodeKind, start: usize, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            kind,
            span: Span::new(start, start),
            parent,
            children: Vec::new(),
        });
        if let Some(parent) = parent {
            self.nodes[parent.index()].children.push(id);
        }
        id
    }

    fn close(&mut self, id: NodeId, end: usize) {
        self.nodes[id.index()].span.end = end;
    }

    fn malformed(&self, offset: usize, reason: impl Into<String>) -> MarkupError {
        let line = self.source[..offset]
            .bytes()
            .filter(|b| *b == b'\n')
            .count()
            + 1;
        MarkupError::MalformedStructure {
            offset,
            line,
            reason: reason.into(),
        }
    }

    fn flush_text(&mut self, parent: NodeId, text_start: &mut Option<usize>) {
        if let Some(start) = text_start.take() {
            if start < self.pos {
                let id = self.push(NodeKind::Text, start, Some(parent));
                self.close(id, self.pos);
            }
        }
    }

    fn parse_sequence(&mut self, parent: NodeId, term: &Terminator) -> Result<(), MarkupError> {
        let mut text_start: Option<usize> = None;
        while self.pos < self.bytes.len() {
            match self.bytes[self.pos] {
                b'\\' => {
                    self.flush_text(parent, &mut text_start);
                    if self.parse_control(parent, term)? {
                        return Ok(());
                    }
                }
                b'{' => {
                    self.flush_text(parent, &mut text_start);
                    self.parse_group(parent, NodeKind::Group)?;
                }
                b'}' => {
                    self.flush_text(parent, &mut text_start);
                    return match term {
                        Terminator::Brace { .. } => {
                            self.pos += 1;
                            Ok(())
                        }
                        _ => Err(self.malformed(self.pos, "unexpected closing brace")),
                    };
                }
                b']' if matches!(term, Terminator::Bracket { .. }) => {
                    self.flush_text(parent, &mut text_start);
                    self.pos += 1;
                    return Ok(());
                }
                b'%' => {
                    self.flush_text(parent, &mut text_start);
                    self.parse_comment(parent);
                }
                b'$' => {
                    self.flush_text(parent, &mut text_start);
                    self.parse_dollar_math(parent)?;
                }
                _ => {
                    if text_start.is_none() {
                        text_start = Some(self.pos);
                    }
                    // Structural bytes are ASCII, so stepping bytewise never
                    // splits a multi-byte character at a node boundary.
                    self.pos += 1;
                }
            }
        }
        self.flush_text(parent, &mut text_start);
        match term {
            Terminator::Eof => Ok(()),
            Terminator::Brace { open } => Err(self.malformed(*open, "unclosed group")),
            Terminator::Bracket { open } => {
                Err(self.malformed(*open, "unclosed optional argument"))
            }
            Terminator::Environment { name, open } => Err(self.malformed(
                *open,
                format!("environment `{name}` is never closed"),
            )),
        }
    }

    fn parse_group(&mut self, parent: NodeId, kind: NodeKind) -> Result<NodeId, MarkupError> {
        let open = self.pos;
        let id = self.push(kind, open, Some(parent));
        self.pos += 1;
        self.parse_sequence(id, &Terminator::Brace { open })?;
        self.close(id, self.pos);
        Ok(id)
    }

    fn parse_optional(&mut self, parent: NodeId) -> Result<NodeId, MarkupError> {
        let open = self.pos;
        let id = self.push(NodeKind::Argument { optional: true }, open, Some(parent));
        self.pos += 1;
        self.parse_sequence(id, &Terminator::Bracket { open })?;
        self.close(id, self.pos);
        Ok(id)
    }

    /// Attach immediately adjacent `[...]` and `{...}` groups as arguments.
    fn parse_arguments(&mut self, owner: NodeId) -> Result<(), MarkupError> {
        loop {
            match self.bytes.get(self.pos) {
                Some(b'[') => {
                    self.parse_optional(owner)?;
                }
                Some(b'{') => {
                    self.parse_group(owner, NodeKind::Argument { optional: false })?;
                }
                _ => return Ok(()),
            }
        }
    }

    fn parse_comment(&mut self, parent: NodeId) {
        let start = self.pos;
        let end = self.source[start..]
            .find('\n')
            .map_or(self.bytes.len(), |i| start + i);
        let id = self.push(NodeKind::Comment, start, Some(parent));
        self.close(id, end);
        self.pos = end;
    }

    /// Find `closer` from `from`, stepping over backslash escapes.
    fn find_closing(&self, from: usize, closer: &[u8]) -> Option<usize> {
        let mut i = from;
        while i < self.bytes.len() {
            if self.bytes[i..].starts_with(closer) {
                return Some(i);
            }
            i += if self.bytes[i] == b'\\' { 2 } else { 1 };
        }
        None
    }

    fn parse_dollar_math(&mut self, parent: NodeId) -> Result<(), MarkupError> {
        let start = self.pos;
        let display = self.bytes.get(start + 1) == Some(&b'$');
        let closer: &[u8] = if display { b"$$" } else { b"$" };
        let close_at = self
            .find_closing(start + closer.len(), closer)
            .ok_or_else(|| self.malformed(start, "unterminated math"))?;
        let end = close_at + closer.len();
        let id = self.push(NodeKind::Math { display }, start, Some(parent));
        self.close(id, end);
        self.pos = end;
        Ok(())
    }

    fn parse_delimited_math(
        &mut self,
        parent: NodeId,
        start: usize,
        closer: &[u8],
        display: bool,
    ) -> Result<(), MarkupError> {
        let close_at = self
            .find_closing(start + 2, closer)
            .ok_or_else(|| self.malformed(start, "unterminated math"))?;
        let end = close_at + closer.len();
        let id = self.push(NodeKind::Math { display }, start, Some(parent));
        self.close(id, end);
        self.pos = end;
        Ok(())
    }

    /// Parse a control sequence at `self.pos`. Returns `true` when it was the
    /// `\end` closing the environment named by `term`.
    fn parse_control(&mut self, parent: NodeId, term: &Terminator) -> Result<bool, MarkupError> {
        let start = self.pos;
        let name_start = start + 1;
        let Some(&first) = self.bytes.get(name_start) else {
            let id = self.push(
                NodeKind::MacroCall {
                    name: String::new(),
                },
                start,
                Some(parent),
            );
            self.pos = self.bytes.len();
            self.close(id, self.pos);
            return Ok(false);
        };

        if first.is_ascii_alphabetic() {
            let mut end = name_start;
            while end < self.bytes.len() && self.bytes[end].is_ascii_alphabetic() {
                end += 1;
            }
            if self.bytes.get(end) == Some(&b'*') {
                end += 1;
            }
            let name = self.source[name_start..end].to_owned();
            self.pos = end;
            return match name.as_str() {
                "begin" => {
                    self.parse_environment(parent, start)?;
                    Ok(false)
                }
                "end" => self.parse_end(start, term),
                _ if self.registry.is_verbatim_macro(&name) => {
                    let kind = NodeKind::MacroCall { name: name.clone() };
                    let id = self.push(kind, start, Some(parent));
                    self.parse_inline_verbatim(id, start, &name)?;
                    self.close(id, self.pos);
                    Ok(false)
                }
                _ => {
                    let id = self.push(NodeKind::MacroCall { name }, start, Some(parent));
                    self.parse_arguments(id)?;
                    self.close(id, self.pos);
                    Ok(false)
                }
            };
        }

        match first {
            b'(' => self.parse_delimited_math(parent, start, b"\\)", false)?,
            b'[' => self.parse_delimited_math(parent, start, b"\\]", true)?,
            _ => {
                let symbol_len = self.source[name_start..]
                    .chars()
                    .next()
                    .map_or(1, char::len_utf8);
                let end = name_start + symbol_len;
                let name = self.source[name_start..end].to_owned();
                let id = self.push(NodeKind::MacroCall { name }, start, Some(parent));
                self.close(id, end);
                self.pos = end;
            }
        }
        Ok(false)
    }

    /// Read the delimited body of `\verb|...|` and friends as one
    /// [`NodeKind::Verbatim`] child of `owner`. The body ends at the next
    /// delimiter on the same line; `{` is closed by `}`.
    fn parse_inline_verbatim(
        &mut self,
        owner: NodeId,
        start: usize,
        name: &str,
    ) -> Result<(), MarkupError> {
        if self.bytes.get(self.pos) == Some(&b'[') {
            self.parse_optional(owner)?;
        }
        let open = match self.bytes.get(self.pos) {
            Some(&b) if b.is_ascii() && b != b'\n' && b != b'\r' => b,
            _ => return Err(self.malformed(start, format!("`\\{name}` without a delimiter"))),
        };
        let closer = if open == b'{' { b'}' } else { open };
        let body_start = self.pos + 1;
        let line_end = self.source[body_start..]
            .find('\n')
            .map_or(self.bytes.len(), |i| body_start + i);
        let rel = self.bytes[body_start..line_end]
            .iter()
            .position(|&b| b == closer)
            .ok_or_else(|| {
                self.malformed(start, format!("`\\{name}` is not closed on its line"))
            })?;
        let body = self.push(NodeKind::Verbatim, body_start, Some(owner));
        self.close(body, body_start + rel);
        self.pos = body_start + rel + 1;
        Ok(())
    }

    /// Read `{name}` at the cursor, returning the trimmed name.
    fn read_environment_name(&mut self, at: usize) -> Result<String, MarkupError> {
        let open = self.pos;
        let rel = self.source[open + 1..]
            .find('}')
            .ok_or_else(|| self.malformed(at, "unterminated environment name"))?;
        let name = self.source[open + 1..open + 1 + rel].trim().to_owned();
        self.pos = open + rel + 2;
        Ok(name)
    }

    fn parse_environment(&mut self, parent: NodeId, start: usize) -> Result<(), MarkupError> {
        if self.bytes.get(self.pos) != Some(&b'{') {
            let id = self.push(
                NodeKind::MacroCall {
                    name: "begin".to_owned(),
                },
                start,
                Some(parent),
            );
            self.close(id, self.pos);
            return Ok(());
        }
        let name = self.read_environment_name(start)?;
        let id = self.push(
            NodeKind::Environment { name: name.clone() },
            start,
            Some(parent),
        );
        self.parse_arguments(id)?;

        if self.registry.is_verbatim(&name) {
            let closer = format!("\\end{{{name}}}");
            let body_start = self.pos;
            let rel = self.source[body_start..].find(&closer).ok_or_else(|| {
                self.malformed(start, format!("verbatim environment `{name}` is never closed"))
            })?;
            let body = self.push(NodeKind::Verbatim, body_start, Some(id));
            self.close(body, body_start + rel);
            self.pos = body_start + rel + closer.len();
        } else {
            self.parse_sequence(id, &Terminator::Environment { name, open: start })?;
        }
        self.close(id, self.pos);
        Ok(())
    }

    fn parse_end(&mut self, start: usize, term: &Terminator) -> Result<bool, MarkupError> {
        if self.bytes.get(self.pos) != Some(&b'{') {
            return Err(self.malformed(start, "`\\end` without environment name"));
        }
        let name = self.read_environment_name(start)?;
        match term {
            Terminator::Environment { name: expected, .. } if *expected == name => Ok(true),
            Terminator::Environment { name: expected, .. } => Err(self.malformed(
                start,
                format!("`\\end{{{name}}}` found while `{expected}` is open"),
            )),
            _ => Err(self.malformed(
                start,
                format!("`\\end{{{name}}}` without matching `\\begin`"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(doc: &Document) -> Vec<NodeKind> {
        doc.nodes().map(|(_, n)| n.kind.clone()).collect()
    }

    #[test]
    fn parses_macro_with_adjacent_arguments() {
        let doc = parse(r"See \cite[p.~3]{knuth} now.", &SkipRegistry::default()).unwrap();
        let cite = doc
            .nodes()
            .find(|(_, n)| n.kind == NodeKind::MacroCall { name: "cite".into() })
            .map(|(id, _)| id)
            .unwrap();
        let args: Vec<bool> = doc.arguments(cite).map(|(_, opt)| opt).collect();
        assert_eq!(args, vec![true, false]);
        assert_eq!(doc.text(cite), r"\cite[p.~3]{knuth}");
    }

    #[test]
    fn spaced_group_is_not_an_argument() {
        let doc = parse(r"\foo {bar}", &SkipRegistry::default()).unwrap();
        let foo = NodeId(1);
        assert_eq!(doc.arguments(foo).count(), 0);
        assert!(kinds(&doc).contains(&NodeKind::Group));
    }

    #[test]
    fn math_forms_are_single_nodes() {
        let src = r"a $x$ b $$y$$ c \(z\) d \[w\] e";
        let doc = parse(src, &SkipRegistry::default()).unwrap();
        let math: Vec<&str> = doc
            .nodes()
            .filter(|(_, n)| matches!(n.kind, NodeKind::Math { .. }))
            .map(|(id, _)| doc.text(id))
            .collect();
        assert_eq!(math, vec!["$x$", "$$y$$", r"\(z\)", r"\[w\]"]);
    }

    #[test]
    fn escaped_dollar_is_not_math() {
        let doc = parse(r"costs \$5 and $a\$b$", &SkipRegistry::default()).unwrap();
        let math: Vec<&str> = doc
            .nodes()
            .filter(|(_, n)| matches!(n.kind, NodeKind::Math { .. }))
            .map(|(id, _)| doc.text(id))
            .collect();
        assert_eq!(math, vec![r"$a\$b$"]);
    }

    #[test]
    fn verbatim_body_is_literal() {
        let src = "\\begin{verbatim}\n{ unbalanced $ \\end{itemize}\n\\end{verbatim}\nafter";
        let doc = parse(src, &SkipRegistry::default()).unwrap();
        let verb = doc
            .nodes()
            .find(|(_, n)| n.kind == NodeKind::Verbatim)
            .map(|(id, _)| id)
            .unwrap();
        assert_eq!(doc.text(verb), "\n{ unbalanced $ \\end{itemize}\n");
    }

    #[test]
    fn inline_verbatim_is_literal() {
        let src = "use \\verb|{| and \\verb+$+ or \\verb*|%}| then \\lstinline[style=c]{x}";
        let doc = parse(src, &SkipRegistry::default()).unwrap();
        let bodies: Vec<&str> = doc
            .nodes()
            .filter(|(_, n)| n.kind == NodeKind::Verbatim)
            .map(|(id, _)| doc.text(id))
            .collect();
        assert_eq!(bodies, vec!["{", "$", "%}", "x"]);
        let calls: Vec<&str> = doc
            .nodes()
            .filter(|(_, n)| matches!(n.kind, NodeKind::MacroCall { .. }))
            .map(|(id, _)| doc.text(id))
            .collect();
        assert_eq!(
            calls,
            vec!["\\verb|{|", "\\verb+$+", "\\verb*|%}|", "\\lstinline[style=c]{x}"]
        );
    }

    #[test]
    fn inline_verbatim_must_close_on_its_line() {
        let err = parse("a \\verb|open\nclosed|", &SkipRegistry::default()).unwrap_err();
        assert!(matches!(err, MarkupError::MalformedStructure { offset: 2, line: 1, .. }));
    }

    #[test]
    fn comment_runs_to_end_of_line() {
        let doc = parse("text % note {\nmore", &SkipRegistry::default()).unwrap();
        let comment = doc
            .nodes()
            .find(|(_, n)| n.kind == NodeKind::Comment)
            .map(|(id, _)| id)
            .unwrap();
        assert_eq!(doc.text(comment), "% note {");
    }

    #[test]
    fn unclosed_group_reports_line() {
        let err = parse("line one\n{open", &SkipRegistry::default()).unwrap_err();
        assert_eq!(
            err,
            MarkupError::MalformedStructure {
                offset: 9,
                line: 2,
                reason: "unclosed group".into()
            }
        );
    }

    #[test]
    fn stray_close_brace_fails() {
        assert!(parse("a } b", &SkipRegistry::default()).is_err());
    }

    #[test]
    fn mismatched_end_fails() {
        let err = parse(
            "\\begin{itemize}\\begin{enumerate}\\end{itemize}\\end{enumerate}",
            &SkipRegistry::default(),
        )
        .unwrap_err();
        assert!(matches!(err, MarkupError::MalformedStructure { offset: 32, .. }));
    }

    #[test]
    fn unterminated_math_and_verbatim_fail() {
        let reg = SkipRegistry::default();
        assert!(parse("a $b", &reg).is_err());
        assert!(parse(r"a \[b", &reg).is_err());
        assert!(parse("\\begin{lstlisting}\ncode", &reg).is_err());
    }

    #[test]
    fn unicode_text_keeps_char_boundaries() {
        let src = "Ünïcödé {wörds} über";
        let doc = parse(src, &SkipRegistry::default()).unwrap();
        for (id, node) in doc.nodes() {
            if node.kind == NodeKind::Text {
                assert!(!doc.text(id).is_empty());
            }
        }
    }

    #[test]
    fn sibling_spans_are_ordered_and_disjoint() {
        let src = "\\section{Intro}\nText $m$ and \\emph{more} % c\n\\begin{quote}q\\end{quote}";
        let doc = parse(src, &SkipRegistry::default()).unwrap();
        for (id, _) in doc.nodes() {
            let spans: Vec<Span> = doc.children(id).iter().map(|c| doc.node(*c).span).collect();
            for pair in spans.windows(2) {
                assert!(pair[0].end <= pair[1].start);
            }
        }
        assert_eq!(doc.node(doc.root()).span, Span::new(0, src.len()));
    }
}
