//! Pattern node trees
//!
//! A [`Pattern`] is the parsed form of one BulletML document: a flat store of
//! [`Node`]s addressed by [`NodeId`]. It is built once (by the XML reader or by
//! hand through [`Pattern::add_node`]) and then shared behind an `Arc` by every
//! bullet that runs it, so no node can change once bullets exist.

pub mod expr;
pub mod library;
pub mod xml;

use std::collections::HashMap;
use std::fmt;

use crate::error::{PatternError, Result};

pub use expr::{EvalScope, Expr};
pub use library::{DirectorySource, PatternLibrary, PatternSource};

/// Index of a node inside its [`Pattern`]
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    /// Raw index (for diagnostics)
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Element names of the pattern language (closed set)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeName {
    Bulletml,
    Bullet,
    Action,
    Fire,
    BulletRef,
    ActionRef,
    FireRef,
    Direction,
    Speed,
    Horizontal,
    Vertical,
    Wait,
    Vanish,
    Repeat,
    Times,
    Term,
    ChangeDirection,
    ChangeSpeed,
    Accel,
    Param,
}

impl NodeName {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeName::Bulletml => "bulletml",
            NodeName::Bullet => "bullet",
            NodeName::Action => "action",
            NodeName::Fire => "fire",
            NodeName::BulletRef => "bulletRef",
            NodeName::ActionRef => "actionRef",
            NodeName::FireRef => "fireRef",
            NodeName::Direction => "direction",
            NodeName::Speed => "speed",
            NodeName::Horizontal => "horizontal",
            NodeName::Vertical => "vertical",
            NodeName::Wait => "wait",
            NodeName::Vanish => "vanish",
            NodeName::Repeat => "repeat",
            NodeName::Times => "times",
            NodeName::Term => "term",
            NodeName::ChangeDirection => "changeDirection",
            NodeName::ChangeSpeed => "changeSpeed",
            NodeName::Accel => "accel",
            NodeName::Param => "param",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        let name = match s {
            "bulletml" => NodeName::Bulletml,
            "bullet" => NodeName::Bullet,
            "action" => NodeName::Action,
            "fire" => NodeName::Fire,
            "bulletRef" => NodeName::BulletRef,
            "actionRef" => NodeName::ActionRef,
            "fireRef" => NodeName::FireRef,
            "direction" => NodeName::Direction,
            "speed" => NodeName::Speed,
            "horizontal" => NodeName::Horizontal,
            "vertical" => NodeName::Vertical,
            "wait" => NodeName::Wait,
            "vanish" => NodeName::Vanish,
            "repeat" => NodeName::Repeat,
            "times" => NodeName::Times,
            "term" => NodeName::Term,
            "changeDirection" => NodeName::ChangeDirection,
            "changeSpeed" => NodeName::ChangeSpeed,
            "accel" => NodeName::Accel,
            "param" => NodeName::Param,
            _ => return None,
        };
        Some(name)
    }

    /// Nodes whose text body is a value expression
    pub fn carries_value(&self) -> bool {
        matches!(
            self,
            NodeName::Direction
                | NodeName::Speed
                | NodeName::Horizontal
                | NodeName::Vertical
                | NodeName::Wait
                | NodeName::Times
                | NodeName::Term
                | NodeName::Param
        )
    }

    /// The labelled node kind a `*Ref` node points at
    pub fn ref_target(&self) -> Option<NodeName> {
        match self {
            NodeName::BulletRef => Some(NodeName::Bullet),
            NodeName::ActionRef => Some(NodeName::Action),
            NodeName::FireRef => Some(NodeName::Fire),
            _ => None,
        }
    }
}

impl fmt::Display for NodeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a resolved value combines with prior state (the `type` attribute)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueMode {
    Absolute,
    Relative,
    Aim,
    Sequence,
}

impl ValueMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueMode::Absolute => "absolute",
            ValueMode::Relative => "relative",
            ValueMode::Aim => "aim",
            ValueMode::Sequence => "sequence",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "absolute" => Some(ValueMode::Absolute),
            "relative" => Some(ValueMode::Relative),
            "aim" => Some(ValueMode::Aim),
            "sequence" => Some(ValueMode::Sequence),
            _ => None,
        }
    }
}

/// One element of a pattern document
#[derive(Debug, Clone)]
pub struct Node {
    pub name: NodeName,
    pub label: Option<String>,
    pub mode: Option<ValueMode>,
    pub expr: Option<Expr>,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

impl Node {
    fn new(name: NodeName, parent: Option<NodeId>) -> Self {
        Self {
            name,
            label: None,
            mode: None,
            expr: None,
            parent,
            children: Vec::new(),
        }
    }
}

/// A parsed pattern document
#[derive(Debug, Clone)]
pub struct Pattern {
    name: String,
    nodes: Vec<Node>,
    /// Labelled bullet/action/fire definitions
    labels: HashMap<(NodeName, String), NodeId>,
}

impl Pattern {
    /// Create a pattern holding only its `<bulletml>` root
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: vec![Node::new(NodeName::Bulletml, None)],
            labels: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    // -- Building --

    /// Append a new node under `parent`
    pub fn add_node(&mut self, parent: NodeId, name: NodeName) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node::new(name, Some(parent)));
        self.nodes[parent.index()].children.push(id);
        id
    }

    /// Label a bullet/action/fire (or name the target of a ref)
    pub fn set_label(&mut self, id: NodeId, label: impl Into<String>) {
        let label = label.into();
        let name = self.nodes[id.index()].name;
        if matches!(name, NodeName::Bullet | NodeName::Action | NodeName::Fire) {
            if let Some(previous) = self.labels.insert((name, label.clone()), id) {
                log::warn!(
                    "{}: <{}> label '{}' redefined ({} replaced by {})",
                    self.name,
                    name,
                    label,
                    previous,
                    id
                );
            }
        }
        self.nodes[id.index()].label = Some(label);
    }

    pub fn set_mode(&mut self, id: NodeId, mode: ValueMode) {
        self.nodes[id.index()].mode = Some(mode);
    }

    pub fn set_expression(&mut self, id: NodeId, expr: Expr) {
        self.nodes[id.index()].expr = Some(expr);
    }

    // -- Queries --

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    /// All children of a node, in document order
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.index()].children
    }

    /// First child with the given name
    pub fn child(&self, id: NodeId, name: NodeName) -> Option<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .find(|&c| self.nodes[c.index()].name == name)
    }

    /// All children with the given name, in document order
    pub fn children_named(&self, id: NodeId, name: NodeName) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id)
            .iter()
            .copied()
            .filter(move |&c| self.nodes[c.index()].name == name)
    }

    /// Follow a `bulletRef`/`actionRef`/`fireRef` to its labelled definition.
    /// Any other node resolves to itself.
    pub fn resolve(&self, id: NodeId) -> Result<NodeId> {
        let node = self.node(id);
        let Some(target) = node.name.ref_target() else {
            return Ok(id);
        };
        let label = node.label.clone().unwrap_or_default();
        self.labels
            .get(&(target, label.clone()))
            .copied()
            .ok_or(PatternError::DanglingRef {
                kind: node.name,
                label,
            })
    }

    /// Actions labelled `top*`, in document order
    pub fn top_actions(&self) -> Vec<NodeId> {
        self.children_named(self.root(), NodeName::Action)
            .filter(|&id| {
                self.node(id)
                    .label
                    .as_deref()
                    .is_some_and(|l| l.starts_with("top"))
            })
            .collect()
    }

    /// Check the whole tree for structural errors
    pub fn validate(&self) -> Result<()> {
        for (index, node) in self.nodes.iter().enumerate() {
            let id = NodeId(index as u32);
            let require = |child: NodeName| -> Result<()> {
                match self.child(id, child) {
                    Some(_) => Ok(()),
                    None => Err(PatternError::MissingChild {
                        node: id,
                        parent: node.name,
                        child,
                    }),
                }
            };

            match node.name {
                NodeName::BulletRef | NodeName::ActionRef | NodeName::FireRef => {
                    self.resolve(id)?;
                }
                NodeName::Fire => {
                    if self.child(id, NodeName::Bullet).is_none()
                        && self.child(id, NodeName::BulletRef).is_none()
                    {
                        return Err(PatternError::MissingBullet(id));
                    }
                }
                NodeName::ChangeDirection => {
                    require(NodeName::Direction)?;
                    require(NodeName::Term)?;
                }
                NodeName::ChangeSpeed => {
                    require(NodeName::Speed)?;
                    require(NodeName::Term)?;
                }
                NodeName::Accel => require(NodeName::Term)?,
                NodeName::Repeat => {
                    require(NodeName::Times)?;
                    if self.child(id, NodeName::Action).is_none() {
                        require(NodeName::ActionRef)?;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }
}
