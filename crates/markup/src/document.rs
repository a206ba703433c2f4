//! Arena-backed document tree.

use serde::{Deserialize, Serialize};

use crate::config::SkipManifest;
use crate::span::Span;

/// Index of a node in its document's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeKind {
    Root,
    Environment { name: String },
    MacroCall { name: String },
    Argument { optional: bool },
    Group,
    Math { display: bool },
    Verbatim,
    Comment,
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub kind: NodeKind,
    pub span: Span,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

/// Parsed LaTeX source.
///
/// Nodes are stored in document (pre-)order, so iterating the arena visits
/// nodes by ascending start offset. The tree never changes after parsing.
#[derive(Debug, Clone)]
pub struct Document {
    source: String,
    nodes: Vec<Node>,
    manifest: SkipManifest,
}

impl Document {
    pub(crate) fn new(source: String, nodes: Vec<Node>, manifest: SkipManifest) -> Self {
        Self {
            source,
            nodes,
            manifest,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Skip registry the document was parsed with.
    pub fn manifest(&self) -> &SkipManifest {
        &self.manifest
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (NodeId(i as u32), node))
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    /// Source text covered by a node, delimiters included.
    pub fn text(&self, id: NodeId) -> &str {
        self.node(id).span.slice(&self.source)
    }

    pub fn macro_name(&self, id: NodeId) -> Option<&str> {
        match &self.node(id).kind {
            NodeKind::MacroCall { name } => Some(name),
            _ => None,
        }
    }

    /// Argument children of a macro call or environment, optional ones included.
    pub fn arguments(&self, id: NodeId) -> impl Iterator<Item = (NodeId, bool)> + '_ {
        self.children(id)
            .iter()
            .filter_map(move |&child| match self.node(child).kind {
                NodeKind::Argument { optional } => Some((child, optional)),
                _ => None,
            })
    }

    /// Last mandatory `{...}` argument of a macro call.
    pub fn last_mandatory_argument(&self, id: NodeId) -> Option<NodeId> {
        self.arguments(id)
            .filter(|(_, optional)| !optional)
            .map(|(arg, _)| arg)
            .last()
    }

    /// Span of an argument's content without its delimiters.
    pub fn argument_inner(&self, arg: NodeId) -> Span {
        let span = self.node(arg).span;
        if span.len() >= 2 {
            Span::new(span.start + 1, span.end - 1)
        } else {
            Span::new(span.end, span.end)
        }
    }

    /// Walk from `id` up to the root, excluding `id` itself.
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            doc: self,
            next: self.node(id).parent,
        }
    }
}

pub struct Ancestors<'d> {
    doc: &'d Document,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.doc.node(current).parent;
        Some(current)
    }
}
