//! Region classification: which text may receive index tags.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::document::{Document, NodeId, NodeKind};
use crate::outline::SectionLevel;
use crate::span::Span;
use crate::tag::{recognize_command, IndexType, TagArgument};

/// A text run outside every excluded region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggableSpan {
    pub node: NodeId,
    pub span: Span,
    /// End of the outermost enclosing transparent macro, when there is one.
    /// Tags for phrases in this run are inserted there instead of after the phrase.
    pub hoist: Option<usize>,
}

/// An index macro already present in the source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExistingTag {
    pub command: String,
    pub index_type: IndexType,
    pub inline: bool,
    pub argument: TagArgument,
    /// Whole macro call, from the backslash to the closing brace.
    pub span: Span,
    /// Raw argument text between the braces.
    pub raw: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectiveKind {
    /// `% texindex: standalone`
    Standalone,
    /// `% texindex: skip`
    Skip,
}

/// An inline author directive. Applies to the source line it sits on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directive {
    pub kind: DirectiveKind,
    pub span: Span,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Regions {
    pub taggable: Vec<TaggableSpan>,
    /// Sorted by start offset.
    pub existing_tags: Vec<ExistingTag>,
    pub directives: Vec<Directive>,
}

impl Regions {
    /// Tags forming a chain that starts at `offset` in `source`.
    ///
    /// Spaces, tabs and `~` may sit before the first tag and between tags;
    /// a line break ends the chain.
    pub fn tag_chain_at(&self, source: &str, offset: usize) -> Vec<&ExistingTag> {
        let bytes = source.as_bytes();
        let mut chain = Vec::new();
        let mut cursor = skip_horizontal_space(bytes, offset);
        let mut idx = self
            .existing_tags
            .partition_point(|tag| tag.span.start < cursor);
        while let Some(tag) = self.existing_tags.get(idx) {
            if tag.span.start != cursor {
                break;
            }
            chain.push(tag);
            cursor = skip_horizontal_space(bytes, tag.span.end);
            idx += 1;
        }
        chain
    }

    /// The existing tag strictly enclosing `offset`, if any.
    pub fn tag_enclosing(&self, offset: usize) -> Option<&ExistingTag> {
        self.existing_tags
            .iter()
            .find(|tag| tag.span.strictly_contains(offset))
    }
}

fn skip_horizontal_space(bytes: &[u8], mut at: usize) -> usize {
    while matches!(bytes.get(at), Some(b' ' | b'\t' | b'~')) {
        at += 1;
    }
    at
}

/// Classify a parsed document into taggable runs, existing tags and directives.
pub fn classify(doc: &Document) -> Regions {
    let mut walker = Walker {
        doc,
        out: Regions::default(),
    };
    walker.visit(doc.root(), false, None);
    walker.out.existing_tags = existing_tags(doc);
    debug!(
        taggable = walker.out.taggable.len(),
        existing_tags = walker.out.existing_tags.len(),
        directives = walker.out.directives.len(),
        "classified regions"
    );
    walker.out
}

fn existing_tags(doc: &Document) -> Vec<ExistingTag> {
    let mut tags = Vec::new();
    for (id, node) in doc.nodes() {
        let NodeKind::MacroCall { name } = &node.kind else {
            continue;
        };
        let Some((index_type, inline)) = recognize_command(name) else {
            continue;
        };
        let Some(arg) = doc.last_mandatory_argument(id) else {
            continue;
        };
        let raw = doc.argument_inner(arg).slice(doc.source()).to_owned();
        tags.push(ExistingTag {
            command: name.clone(),
            index_type,
            inline,
            argument: TagArgument::parse(&raw),
            span: node.span,
            raw,
        });
    }
    tags.sort_by_key(|tag| tag.span.start);
    tags
}

fn parse_directive(comment: &str) -> Option<DirectiveKind> {
    let body = comment.trim_start_matches('%').trim();
    let rest = body.strip_prefix("texindex:")?;
    match rest.trim() {
        "standalone" => Some(DirectiveKind::Standalone),
        "skip" => Some(DirectiveKind::Skip),
        _ => None,
    }
}

struct Walker<'d> {
    doc: &'d Document,
    out: Regions,
}

impl Walker<'_> {
    fn visit(&mut self, id: NodeId, excluded: bool, hoist: Option<usize>) {
        let doc = self.doc;
        let node = doc.node(id);
        match &node.kind {
            NodeKind::Root | NodeKind::Group => {
                for &child in &node.children {
                    self.visit(child, excluded, hoist);
                }
            }
            NodeKind::Environment { name } => {
                let body_excluded = excluded || doc.manifest().is_excluded_environment(name);
                for &child in &node.children {
                    // Environment arguments (`{ll}`, `[htb]`) are never prose.
                    if matches!(doc.node(child).kind, NodeKind::Argument { .. }) {
                        continue;
                    }
                    self.visit(child, body_excluded, hoist);
                }
            }
            NodeKind::MacroCall { name } => {
                if excluded || doc.manifest().is_opaque_macro(name) {
                    return;
                }
                if recognize_command(name).is_some() || SectionLevel::from_macro(name).is_some() {
                    return;
                }
                let hoist = hoist.or(Some(node.span.end));
                for (arg, optional) in doc.arguments(id) {
                    if optional {
                        continue;
                    }
                    for &child in doc.children(arg) {
                        self.visit(child, false, hoist);
                    }
                }
            }
            NodeKind::Text => {
                if !excluded {
                    self.out.taggable.push(TaggableSpan {
                        node: id,
                        span: node.span,
                        hoist,
                    });
                }
            }
            NodeKind::Comment => {
                if let Some(kind) = parse_directive(doc.text(id)) {
                    self.out.directives.push(Directive {
                        kind,
                        span: node.span,
                    });
                }
            }
            NodeKind::Argument { .. } | NodeKind::Math { .. } | NodeKind::Verbatim => {}
        }
    }
}
