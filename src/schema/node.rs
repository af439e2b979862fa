/// Compiled script tree: an arena of nodes addressed by `NodeId`.
///
/// Passages own their children through indices into the arena. A GoTo only
/// names its destination, so loops between passages never form ownership
/// cycles.
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::content::{Content, PredicateFn};

/// Index of a node inside its `Document`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A named, independently addressable block of script.
#[derive(Debug, Clone)]
pub struct Passage {
    pub name: String,
    pub children: Vec<NodeId>,
}

/// A plain line of text. Children are only reachable once the line itself
/// has been read.
#[derive(Clone)]
pub struct Line {
    pub visibility: Vec<PredicateFn>,
    pub content: Content,
    pub children: Vec<NodeId>,
}

/// One option of a decision point; its children run only when chosen.
#[derive(Clone)]
pub struct Choice {
    pub visibility: Vec<PredicateFn>,
    pub content: Content,
    pub children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct GoTo {
    pub target: String,
    /// `None` when the target did not name a passage at compile time.
    pub destination: Option<NodeId>,
}

#[derive(Debug, Clone)]
pub struct Comment {
    pub content: Content,
}

#[derive(Debug, Clone)]
pub enum Node {
    Passage(Passage),
    Line(Line),
    Choice(Choice),
    GoTo(GoTo),
    Return,
    CloseChoice,
    Comment(Comment),
}

impl Node {
    /// Child list for tree-bearing nodes, empty for leaves.
    pub fn children(&self) -> &[NodeId] {
        match self {
            Self::Passage(p) => &p.children,
            Self::Line(l) => &l.children,
            Self::Choice(c) => &c.children,
            Self::GoTo(_) | Self::Return | Self::CloseChoice | Self::Comment(_) => &[],
        }
    }

    pub(crate) fn children_mut(&mut self) -> Option<&mut Vec<NodeId>> {
        match self {
            Self::Passage(p) => Some(&mut p.children),
            Self::Line(l) => Some(&mut l.children),
            Self::Choice(c) => Some(&mut c.children),
            Self::GoTo(_) | Self::Return | Self::CloseChoice | Self::Comment(_) => None,
        }
    }

    pub fn is_passage(&self) -> bool {
        matches!(self, Self::Passage(_))
    }
}

impl fmt::Debug for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Line")
            .field("visibility", &self.visibility.len())
            .field("content", &self.content)
            .field("children", &self.children)
            .finish()
    }
}

impl fmt::Debug for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Choice")
            .field("visibility", &self.visibility.len())
            .field("content", &self.content)
            .field("children", &self.children)
            .finish()
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Passage(p) => write!(f, "== {} ==", p.name),
            Self::Line(l) => f.write_str(&l.content.format()),
            Self::Choice(c) => write!(f, "> {}", c.content.format()),
            Self::GoTo(g) => write!(f, "-> {}", g.target),
            Self::Return => f.write_str("<-"),
            Self::CloseChoice => f.write_str("<"),
            Self::Comment(c) => write!(f, "// {}", c.content.format()),
        }
    }
}

/// An immutable compiled script.
///
/// Any number of readers can walk the same document; none of them mutate it.
#[derive(Debug, Clone)]
pub struct Document {
    pub(crate) nodes: Vec<Node>,
    pub(crate) root: NodeId,
    /// Declared passages in source order, duplicates included.
    pub(crate) declared: Vec<NodeId>,
    pub(crate) passages: FxHashMap<String, NodeId>,
}

impl Document {
    /// The unnamed passage holding content written before the first header.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Where a fresh reader starts: the root passage if it has content,
    /// otherwise the first declared passage.
    pub fn entry(&self) -> NodeId {
        if !self.node(self.root).children().is_empty() {
            return self.root;
        }
        self.declared.first().copied().unwrap_or(self.root)
    }

    pub fn passage(&self, name: &str) -> Option<NodeId> {
        self.passages.get(name).copied()
    }

    /// Names of all registered passages in declaration order.
    pub fn passage_names(&self) -> Vec<&str> {
        self.declared
            .iter()
            .filter_map(|id| match self.node(*id) {
                Node::Passage(p) if self.passages.get(&p.name) == Some(id) => {
                    Some(p.name.as_str())
                }
                _ => None,
            })
            .collect()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).children()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// A callback-free mirror of the tree, root first, then every declared
    /// passage in source order.
    pub fn outline(&self) -> Outline {
        let mut passages = vec![self.outline_node(self.root)];
        passages.extend(self.declared.iter().map(|id| self.outline_node(*id)));
        Outline { passages }
    }

    fn outline_node(&self, id: NodeId) -> OutlineNode {
        let children = |ids: &[NodeId]| -> Vec<OutlineNode> {
            ids.iter().map(|c| self.outline_node(*c)).collect()
        };
        match self.node(id) {
            Node::Passage(p) => OutlineNode::Passage {
                name: p.name.clone(),
                children: children(&p.children),
            },
            Node::Line(l) => OutlineNode::Line {
                format: l.content.format(),
                gates: l.visibility.len(),
                children: children(&l.children),
            },
            Node::Choice(c) => OutlineNode::Choice {
                format: c.content.format(),
                gates: c.visibility.len(),
                children: children(&c.children),
            },
            Node::GoTo(g) => OutlineNode::GoTo {
                target: g.target.clone(),
                resolved: g.destination.is_some(),
            },
            Node::Return => OutlineNode::Return,
            Node::CloseChoice => OutlineNode::CloseChoice,
            Node::Comment(c) => OutlineNode::Comment {
                format: c.content.format(),
            },
        }
    }
}

/// Serializable shape of a compiled document, for debugging and assertions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outline {
    pub passages: Vec<OutlineNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OutlineNode {
    Passage {
        name: String,
        children: Vec<OutlineNode>,
    },
    Line {
        format: String,
        gates: usize,
        children: Vec<OutlineNode>,
    },
    Choice {
        format: String,
        gates: usize,
        children: Vec<OutlineNode>,
    },
    GoTo {
        target: String,
        resolved: bool,
    },
    Return,
    CloseChoice,
    Comment {
        format: String,
    },
}

impl Outline {
    /// Pretty-printed RON rendering of the outline.
    pub fn to_ron(&self) -> Result<String, ron::Error> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
    }

    pub fn passage(&self, name: &str) -> Option<&OutlineNode> {
        self.passages
            .iter()
            .find(|p| matches!(p, OutlineNode::Passage { name: n, .. } if n == name))
    }
}

impl OutlineNode {
    pub fn children(&self) -> &[OutlineNode] {
        match self {
            Self::Passage { children, .. }
            | Self::Line { children, .. }
            | Self::Choice { children, .. } => children,
            _ => &[],
        }
    }
}
