//! Host-document model and port.
//!
//! The live page is external; the core only ever sees snapshots of a plain
//! node tree plus a stream of mutation batches. Host-specific detail (real
//! DOM bindings, capture replay) lives in adapter crates.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::domain::QuestionKey;

/// Attribute carrying the machine-readable form of rendered math, set by the
/// host's formula renderer on annotation elements.
pub const ATTR_ENCODING: &str = "data-encoding";
pub const TEX_ENCODING: &str = "application/x-tex";

/// Attribute marking the currently displayed question and carrying its key.
pub const ATTR_QUESTION_KEY: &str = "data-quesid";

/// One node of the host document tree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    Element(Element),
    Text { text: String },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub tag: String,
    #[serde(default)]
    pub attrs: HashMap<String, String>,
    /// Whether the host renders this element with a non-zero box. Hidden
    /// templates and off-screen duplicates come through as `false`.
    #[serde(default = "default_visible")]
    pub visible: bool,
    #[serde(default)]
    pub children: Vec<Node>,
}

fn default_visible() -> bool {
    true
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attrs: HashMap::new(),
            visible: true,
            children: Vec::new(),
        }
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    /// Depth-first pre-order search for the first element matching `pred`.
    pub fn find(&self, pred: &dyn Fn(&Element) -> bool) -> Option<&Element> {
        if pred(self) {
            return Some(self);
        }
        for child in &self.children {
            if let Node::Element(el) = child {
                if let Some(found) = el.find(pred) {
                    return Some(found);
                }
            }
        }
        None
    }
}

impl Node {
    pub fn text(text: impl Into<String>) -> Self {
        Node::Text { text: text.into() }
    }

    pub fn element(el: Element) -> Self {
        Node::Element(el)
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(el) => Some(el),
            Node::Text { .. } => None,
        }
    }
}

/// One structural or textual edit to the tree.
///
/// Paths address nodes by child index from the root element, so `[]` is the
/// root itself and `[2, 0]` is the first child of the root's third child.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Mutation {
    ChildAdded {
        parent_path: Vec<usize>,
        node: Node,
    },
    ChildRemoved {
        parent_path: Vec<usize>,
        index: usize,
    },
    TextChanged {
        path: Vec<usize>,
        text: String,
    },
    AttrSet {
        path: Vec<usize>,
        name: String,
        value: String,
    },
}

impl Mutation {
    /// Whether this record is a structural (child list) change as opposed to
    /// a character-data change. Attribute edits count as structural.
    pub fn is_structural(&self) -> bool {
        !matches!(self, Mutation::TextChanged { .. })
    }
}

/// A group of mutation records delivered together, mirroring how hosts
/// coalesce observer callbacks.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MutationBatch {
    pub records: Vec<Mutation>,
}

impl MutationBatch {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Which change kinds a subscriber wants delivered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChangeKinds {
    pub child_list: bool,
    pub text: bool,
}

impl ChangeKinds {
    /// Structural changes only (child list + attributes).
    pub fn structural() -> Self {
        Self {
            child_list: true,
            text: false,
        }
    }

    /// Structural and character-data changes.
    pub fn all() -> Self {
        Self {
            child_list: true,
            text: true,
        }
    }

    pub fn wants(&self, m: &Mutation) -> bool {
        if m.is_structural() {
            self.child_list
        } else {
            self.text
        }
    }
}

/// Read-only view of the live document.
#[async_trait]
pub trait DocumentPort: Send + Sync {
    /// Snapshot of the full tree as currently rendered.
    async fn snapshot(&self) -> Node;

    /// Key of the currently displayed question, if any.
    async fn current_question_key(&self) -> Option<QuestionKey>;

    /// Subscribe to mutation batches. Records not matching `kinds` are
    /// dropped before delivery; batches that end up empty are not delivered
    /// at all.
    async fn subscribe(&self, kinds: ChangeKinds) -> mpsc::Receiver<MutationBatch>;
}

/// Read the current question key out of a tree snapshot: the first element
/// carrying the question-key attribute, in document order.
pub fn question_key_of(root: &Node) -> Option<QuestionKey> {
    let el = root.as_element()?;
    let found = el.find(&|e| e.attr(ATTR_QUESTION_KEY).is_some())?;
    found
        .attr(ATTR_QUESTION_KEY)
        .map(|v| QuestionKey(v.to_string()))
}
