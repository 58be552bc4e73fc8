//! Capture replay adapter: drives the core from a recorded document session
//! (an initial tree plus a timeline of mutation batches) instead of a live
//! page. Used by the binary and for end-to-end exercising of the pipeline.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use qscout_core::{
    document::{question_key_of, ChangeKinds, DocumentPort, Mutation, MutationBatch, Node},
    domain::QuestionKey,
    Result,
};

/// A recorded document session.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Capture {
    pub initial: Node,
    #[serde(default)]
    pub timeline: Vec<TimedBatch>,
}

/// One timeline entry: wait `after_ms` past the previous entry, then apply
/// and deliver `batch`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TimedBatch {
    pub after_ms: u64,
    pub batch: MutationBatch,
}

struct Subscriber {
    kinds: ChangeKinds,
    tx: mpsc::Sender<MutationBatch>,
}

struct Inner {
    tree: Mutex<Node>,
    subscribers: Mutex<Vec<Subscriber>>,
    cancel: CancellationToken,
    finished: CancellationToken,
}

/// `DocumentPort` over a capture. `start` launches the pump that walks the
/// timeline, mutating the tree and fanning batches out to subscribers.
#[derive(Clone)]
pub struct ReplayDocument {
    inner: Arc<Inner>,
    capture: Arc<Capture>,
}

impl ReplayDocument {
    pub fn new(capture: Capture) -> Self {
        Self {
            inner: Arc::new(Inner {
                tree: Mutex::new(capture.initial.clone()),
                subscribers: Mutex::new(Vec::new()),
                cancel: CancellationToken::new(),
                finished: CancellationToken::new(),
            }),
            capture: Arc::new(capture),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let capture: Capture = serde_json::from_str(json)?;
        Ok(Self::new(capture))
    }

    pub async fn from_file(path: &Path) -> Result<Self> {
        let json = tokio::fs::read_to_string(path).await?;
        Self::from_json(&json)
    }

    /// Start replaying the timeline. Batches with no record an invalid entry
    /// would have produced are skipped with a warning; the replay keeps
    /// going, the way a live page shrugs off broken nodes.
    pub fn start(&self) {
        let inner = self.inner.clone();
        let capture = self.capture.clone();
        tokio::spawn(async move {
            for entry in &capture.timeline {
                tokio::select! {
                    _ = inner.cancel.cancelled() => break,
                    _ = sleep(Duration::from_millis(entry.after_ms)) => {}
                }

                {
                    let mut tree = inner.tree.lock().await;
                    for record in &entry.batch.records {
                        if let Err(e) = apply(&mut tree, record) {
                            tracing::warn!("skipping bad capture record: {e}");
                        }
                    }
                }

                inner.deliver(&entry.batch).await;
            }
            inner.finished.cancel();
        });
    }

    /// Stop the pump early.
    pub fn stop(&self) {
        self.inner.cancel.cancel();
    }

    /// Wait until the whole timeline has been applied (or the pump stopped).
    pub async fn finished(&self) {
        self.inner.finished.cancelled().await;
    }
}

impl Inner {
    async fn deliver(&self, batch: &MutationBatch) {
        // Snapshot the senders so the lock is never held across an awaited
        // send. A slow consumer can then stall delivery without also
        // blocking new `subscribe` calls.
        let targets: Vec<Subscriber> = {
            let subs = self.subscribers.lock().await;
            subs.iter()
                .map(|s| Subscriber {
                    kinds: s.kinds,
                    tx: s.tx.clone(),
                })
                .collect()
        };

        for sub in targets {
            let records: Vec<Mutation> = batch
                .records
                .iter()
                .filter(|m| sub.kinds.wants(m))
                .cloned()
                .collect();
            if records.is_empty() {
                continue;
            }
            // Err means the receiver is gone; it gets pruned below.
            let _ = sub.tx.send(MutationBatch { records }).await;
        }

        self.subscribers.lock().await.retain(|s| !s.tx.is_closed());
    }
}

#[async_trait]
impl DocumentPort for ReplayDocument {
    async fn snapshot(&self) -> Node {
        self.inner.tree.lock().await.clone()
    }

    async fn current_question_key(&self) -> Option<QuestionKey> {
        let tree = self.inner.tree.lock().await;
        question_key_of(&tree)
    }

    async fn subscribe(&self, kinds: ChangeKinds) -> mpsc::Receiver<MutationBatch> {
        let (tx, rx) = mpsc::channel(16);
        self.inner
            .subscribers
            .lock()
            .await
            .push(Subscriber { kinds, tx });
        rx
    }
}

/// Apply one mutation record to the tree. Paths address nodes by child index
/// from the root.
fn apply(root: &mut Node, m: &Mutation) -> std::result::Result<(), String> {
    match m {
        Mutation::ChildAdded { parent_path, node } => {
            let el = element_at_mut(root, parent_path)?;
            el.children.push(node.clone());
        }
        Mutation::ChildRemoved { parent_path, index } => {
            let el = element_at_mut(root, parent_path)?;
            if *index >= el.children.len() {
                return Err(format!("child index {index} out of range"));
            }
            el.children.remove(*index);
        }
        Mutation::TextChanged { path, text } => {
            match node_at_mut(root, path)? {
                Node::Text { text: t } => *t = text.clone(),
                Node::Element(_) => return Err(format!("path {path:?} is not a text node")),
            }
        }
        Mutation::AttrSet { path, name, value } => {
            match node_at_mut(root, path)? {
                Node::Element(el) => {
                    el.attrs.insert(name.clone(), value.clone());
                }
                Node::Text { .. } => return Err(format!("path {path:?} is not an element")),
            }
        }
    }
    Ok(())
}

fn node_at_mut<'a>(root: &'a mut Node, path: &[usize]) -> std::result::Result<&'a mut Node, String> {
    let mut cur = root;
    for &i in path {
        let Node::Element(el) = cur else {
            return Err(format!("path descends through a text node at {i}"));
        };
        cur = el
            .children
            .get_mut(i)
            .ok_or_else(|| format!("child index {i} out of range"))?;
    }
    Ok(cur)
}

fn element_at_mut<'a>(
    root: &'a mut Node,
    path: &[usize],
) -> std::result::Result<&'a mut qscout_core::document::Element, String> {
    match node_at_mut(root, path)? {
        Node::Element(el) => Ok(el),
        Node::Text { .. } => Err(format!("path {path:?} is not an element")),
    }
}
