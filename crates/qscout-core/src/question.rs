//! Question tracking: map the host's "current question" signal to a cached
//! answer exactly once per question, surviving re-renders and churn.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{
    cache::AnswerCache,
    document::{ChangeKinds, DocumentPort},
    domain::QuestionKey,
    ports::DisplayPort,
    watch::{self, Probe, WatchHandle, WatchOptions},
    Result,
};

pub const STATUS_ANSWER: &str = "📘 Answer";

/// Idle until the first question is handled, then tracks the last handled
/// key. Only the question watcher writes this.
#[derive(Debug, Default)]
pub struct WatchState {
    last_handled: Option<QuestionKey>,
}

pub struct QuestionWatcher {
    doc: Arc<dyn DocumentPort>,
    display: Arc<dyn DisplayPort>,
    cache: Arc<Mutex<AnswerCache>>,
    state: WatchState,
}

impl QuestionWatcher {
    pub fn new(
        doc: Arc<dyn DocumentPort>,
        display: Arc<dyn DisplayPort>,
        cache: Arc<Mutex<AnswerCache>>,
    ) -> Self {
        Self {
            doc,
            display,
            cache,
            state: WatchState::default(),
        }
    }

    /// One settled tick: read the current question and handle it. Returns
    /// whether a display emission happened.
    pub async fn handle_tick(&mut self) -> Result<bool> {
        let Some(key) = self.doc.current_question_key().await else {
            // No question on screen right now; nothing to do this tick.
            return Ok(false);
        };
        self.handle_key(key).await
    }

    /// Transition rule. Exactly one display emission per distinct key; the
    /// same key observed again is a no-op, and the watcher never moves
    /// backward to a previous key's display.
    pub async fn handle_key(&mut self, key: QuestionKey) -> Result<bool> {
        if self.cache.lock().await.is_empty() {
            return Ok(false);
        }
        if self.state.last_handled.as_ref() == Some(&key) {
            return Ok(false);
        }
        self.state.last_handled = Some(key.clone());

        let entry = self.cache.lock().await.lookup(&key).cloned();
        match entry {
            Some(entry) => {
                tracing::debug!(key = key.as_str(), "answer found");
                self.display.set_status(STATUS_ANSWER).await?;
                self.display.show_answer(&entry).await?;
            }
            None => {
                tracing::debug!(key = key.as_str(), "no cached answer");
                self.display.show_no_answer().await?;
            }
        }
        Ok(true)
    }
}

struct QuestionProbe {
    watcher: QuestionWatcher,
}

#[async_trait]
impl Probe for QuestionProbe {
    async fn probe(&mut self) -> Result<bool> {
        self.watcher.handle_tick().await?;
        // Never "succeeds": question tracking runs until cancelled.
        Ok(false)
    }
}

/// Spawn the question watcher over structural document changes, with the
/// given settle delay between a mutation batch and the question read.
pub async fn watch_questions(
    doc: Arc<dyn DocumentPort>,
    display: Arc<dyn DisplayPort>,
    cache: Arc<Mutex<AnswerCache>>,
    settle: Duration,
) -> WatchHandle {
    let rx = doc.subscribe(ChangeKinds::structural()).await;
    let watcher = QuestionWatcher::new(doc, display, cache);
    watch::spawn(
        rx,
        QuestionProbe { watcher },
        WatchOptions {
            settle: Some(settle),
        },
    )
}
