//! Room-code detection inside the document tree.

use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;

use crate::{
    document::{ChangeKinds, DocumentPort, Node},
    domain::Identifier,
    watch::{self, Probe, WatchHandle, WatchOptions},
    Result,
};

/// Scans text nodes for something shaped like a room code.
///
/// The shape is normative: a 6-digit block optionally split 3+3 by a single
/// whitespace character, or a standalone run of 4 to 8 digits. Matches are
/// stripped to digits and re-checked against the 4-8 length gate before
/// acceptance;
/// scanning continues past rejects. The first accepted match in document
/// order wins.
pub struct IdentifierScanner {
    pattern: Regex,
    require_visible: bool,
}

impl IdentifierScanner {
    pub fn new(require_visible: bool) -> Self {
        let pattern = Regex::new(r"\b\d{3}\s?\d{3}\b|\b\d{4,8}\b").expect("valid regex");
        Self {
            pattern,
            require_visible,
        }
    }

    /// Walk every text node depth-first pre-order and return the first
    /// accepted room code, if any.
    pub fn scan(&self, root: &Node) -> Option<Identifier> {
        self.scan_node(root)
    }

    fn scan_node(&self, node: &Node) -> Option<Identifier> {
        match node {
            Node::Text { text } => self.match_text(text),
            Node::Element(el) => {
                if self.require_visible && !el.visible {
                    // Hidden templates and off-screen duplicates are prime
                    // sources of stale codes; skip the whole subtree.
                    return None;
                }
                el.children.iter().find_map(|c| self.scan_node(c))
            }
        }
    }

    fn match_text(&self, text: &str) -> Option<Identifier> {
        self.pattern
            .find_iter(text)
            .find_map(|m| Identifier::parse(m.as_str()).ok())
    }
}

struct ScanProbe {
    doc: Arc<dyn DocumentPort>,
    scanner: IdentifierScanner,
    on_found: Option<Box<dyn FnOnce(Identifier) + Send>>,
}

#[async_trait]
impl Probe for ScanProbe {
    async fn probe(&mut self) -> Result<bool> {
        let root = self.doc.snapshot().await;
        let Some(id) = self.scanner.scan(&root) else {
            return Ok(false);
        };
        tracing::info!(code = %id, "room code detected");
        if let Some(cb) = self.on_found.take() {
            cb(id);
        }
        Ok(true)
    }
}

/// Watch the document until a room code shows up, then report it exactly
/// once and stop. Subscribes to both structural and character-data changes,
/// since codes appear through either.
pub async fn watch_for_identifier(
    doc: Arc<dyn DocumentPort>,
    scanner: IdentifierScanner,
    on_found: impl FnOnce(Identifier) + Send + 'static,
) -> WatchHandle {
    let rx = doc.subscribe(ChangeKinds::all()).await;
    watch::spawn(
        rx,
        ScanProbe {
            doc,
            scanner,
            on_found: Some(Box::new(on_found)),
        },
        WatchOptions::default(),
    )
}
