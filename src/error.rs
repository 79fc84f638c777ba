//! Error types for pattern loading and interpretation
//!
//! Structural errors come from malformed pattern documents and are raised when a
//! pattern is loaded or a task tree is activated, never while it runs. Running out
//! of bullet slots is not an error at all: fire tasks absorb it locally.

use thiserror::Error;

use crate::pattern::{NodeId, NodeName};
use crate::sim::TaskId;

/// Everything that can go wrong while loading or activating a pattern
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PatternError {
    /// A `<fire>` has neither a `<bullet>` nor a `<bulletRef>` child
    #[error("fire node {0} has no <bullet> or <bulletRef> child")]
    MissingBullet(NodeId),

    /// A node is missing a child it cannot run without
    #[error("<{parent}> node {node} is missing its <{child}> child")]
    MissingChild {
        node: NodeId,
        parent: NodeName,
        child: NodeName,
    },

    /// A `*Ref` node names a label that was never declared
    #[error("<{kind}> references undefined label '{label}'")]
    DanglingRef { kind: NodeName, label: String },

    /// Task tree nested too deeply (usually an `actionRef` cycle)
    #[error("pattern nesting exceeds {0} levels")]
    RecursionLimit(usize),

    /// No `action` labelled `top*` to start the pattern from
    #[error("pattern '{0}' has no action labelled 'top'")]
    NoTopAction(String),

    /// Element outside the BulletML vocabulary
    #[error("unknown element <{0}>")]
    UnknownElement(String),

    /// Attribute value the node cannot accept
    #[error("<{node}> has invalid {attr}=\"{value}\"")]
    InvalidAttribute {
        node: NodeName,
        attr: String,
        value: String,
    },

    /// Value expression failed to parse
    #[error("bad expression '{text}': {reason}")]
    Expression { text: String, reason: String },

    /// Malformed XML document
    #[error("XML error: {0}")]
    Xml(String),

    /// Error reading a pattern file
    #[error("failed to read '{path}': {reason}")]
    Io { path: String, reason: String },

    /// The pattern source has no file with this name
    #[error("pattern not found: {0}")]
    PatternNotFound(String),

    /// A task handle was used after its task was released
    #[error("task {0:?} used after release")]
    StaleTask(TaskId),
}

impl PatternError {
    /// Creates an expression error
    pub fn expression(text: impl Into<String>, reason: impl Into<String>) -> Self {
        PatternError::Expression {
            text: text.into(),
            reason: reason.into(),
        }
    }

    /// Creates an I/O error for the given path
    pub fn io(path: impl Into<String>, reason: impl ToString) -> Self {
        PatternError::Io {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether the error comes from a malformed pattern document
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            PatternError::MissingBullet(_)
                | PatternError::MissingChild { .. }
                | PatternError::DanglingRef { .. }
                | PatternError::RecursionLimit(_)
                | PatternError::NoTopAction(_)
                | PatternError::UnknownElement(_)
                | PatternError::InvalidAttribute { .. }
                | PatternError::Expression { .. }
        )
    }
}

/// Type alias for Result using PatternError
pub type Result<T> = std::result::Result<T, PatternError>;
