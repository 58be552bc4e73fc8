//! Per-session orchestration: detect a room code, load the answer set,
//! then track questions.
//!
//! One `SolverSession` exists per page session. All state (cache, accepted
//! code, watch handles) lives here and dies with it; nothing persists across
//! reloads.

use std::sync::Arc;

use tokio::sync::{oneshot, Mutex};
use tokio::time::sleep;

use crate::{
    cache::AnswerCache,
    config::Config,
    document::DocumentPort,
    domain::Identifier,
    errors::Error,
    ports::{AnswerFetcher, DisplayPort},
    question,
    scan::{self, IdentifierScanner},
    watch::WatchHandle,
    Result,
};

pub const STATUS_SCANNING: &str = "🔎 Looking for room code...";
pub const STATUS_DETECTED: &str = "✅ Room code found";
pub const STATUS_LOADING: &str = "🌀 Loading answers...";
pub const STATUS_READY: &str = "🚀 Ready";

#[derive(Default)]
struct SessionState {
    /// The one accepted room code. Set on the first successful load and
    /// never replaced for the lifetime of the session.
    identifier: Option<Identifier>,
    /// A load is currently fetching. Checked and set under the same lock
    /// acquisition as `identifier`, so overlapping loads (auto-detection
    /// racing a manual entry, or two manual retries) cannot both pass the
    /// acceptance gate.
    load_in_flight: bool,
    scan_watch: Option<WatchHandle>,
    question_watch: Option<WatchHandle>,
}

pub struct SolverSession {
    cfg: Arc<Config>,
    doc: Arc<dyn DocumentPort>,
    display: Arc<dyn DisplayPort>,
    fetcher: Arc<dyn AnswerFetcher>,
    cache: Arc<Mutex<AnswerCache>>,
    state: Mutex<SessionState>,
}

impl SolverSession {
    pub fn new(
        cfg: Arc<Config>,
        doc: Arc<dyn DocumentPort>,
        display: Arc<dyn DisplayPort>,
        fetcher: Arc<dyn AnswerFetcher>,
    ) -> Self {
        Self {
            cfg,
            doc,
            display,
            fetcher,
            cache: Arc::new(Mutex::new(AnswerCache::new())),
            state: Mutex::new(SessionState::default()),
        }
    }

    /// Begin auto-detection: watch the document for a room code and, once
    /// one appears, load answers for it after a short pause.
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        self.display.set_status(STATUS_SCANNING).await?;

        let (tx, rx) = oneshot::channel();
        let scanner = IdentifierScanner::new(self.cfg.require_visible_identifier);
        let handle = scan::watch_for_identifier(self.doc.clone(), scanner, move |id| {
            let _ = tx.send(id);
        })
        .await;
        self.state.lock().await.scan_watch = Some(handle);

        let sess = self.clone();
        tokio::spawn(async move {
            // The sender is dropped without firing if the scan is cancelled.
            let Ok(id) = rx.await else { return };
            if let Err(e) = sess.on_identifier_found(id).await {
                tracing::warn!("auto load failed: {e}");
            }
        });

        Ok(())
    }

    async fn on_identifier_found(&self, id: Identifier) -> Result<()> {
        self.display.set_status(STATUS_DETECTED).await?;
        sleep(self.cfg.auto_load_delay).await;
        self.load_answers(id.as_str()).await?;
        Ok(())
    }

    /// Load the answer set for a (possibly manually typed) room code and,
    /// on success, start tracking questions.
    ///
    /// Returns the user-facing success flag: `Ok(false)` covers every load
    /// failure (bad code, fetch error, timeout, empty set), with the cause
    /// already surfaced on the status slot and the entry controls re-enabled
    /// for retry. The previous cache, if any, stays in effect on failure.
    pub async fn load_answers(&self, raw: &str) -> Result<bool> {
        {
            let mut st = self.state.lock().await;
            if st.identifier.is_some() || st.load_in_flight {
                tracing::debug!("room code already accepted or load in flight, ignoring");
                return Ok(false);
            }
            st.load_in_flight = true;
        }

        let outcome = self.run_load(raw).await;
        // On success the accepted identifier keeps the gate closed from here on.
        self.state.lock().await.load_in_flight = false;
        outcome
    }

    async fn run_load(&self, raw: &str) -> Result<bool> {
        let id = match Identifier::parse(raw) {
            Ok(id) => id,
            Err(e) => {
                self.display.set_status(&format!("❌ Error: {e}")).await?;
                return Ok(false);
            }
        };

        self.display.set_controls_enabled(false).await?;
        self.display.set_status(STATUS_LOADING).await?;

        match self.fetch_and_rebuild(&id).await {
            Ok(count) => {
                self.state.lock().await.identifier = Some(id);
                tracing::info!(entries = count, "answers loaded");
                self.display.set_status(STATUS_READY).await?;
                self.start_question_watch().await;
                Ok(true)
            }
            Err(e) => {
                self.display.set_status(&format!("❌ Error: {e}")).await?;
                self.display.set_controls_enabled(true).await?;
                Ok(false)
            }
        }
    }

    /// Fetch with a hard deadline and swap in the rebuilt cache only when
    /// the fetch wins the race and yields at least one usable entry.
    async fn fetch_and_rebuild(&self, id: &Identifier) -> Result<usize> {
        let set = match tokio::time::timeout(self.cfg.fetch_timeout, self.fetcher.fetch(id)).await
        {
            Ok(res) => res?,
            Err(_) => {
                return Err(Error::Fetch(format!(
                    "timed out after {:?}",
                    self.cfg.fetch_timeout
                )))
            }
        };

        // Rebuild aside first: an all-garbage set must leave the previous
        // cache untouched.
        let mut fresh = AnswerCache::new();
        let count = fresh.rebuild(&set);
        if count == 0 {
            return Err(Error::EmptyAnswerSet);
        }
        *self.cache.lock().await = fresh;
        Ok(count)
    }

    async fn start_question_watch(&self) {
        let mut st = self.state.lock().await;
        if st.question_watch.as_ref().is_some_and(|h| !h.is_done()) {
            return;
        }
        let handle = question::watch_questions(
            self.doc.clone(),
            self.display.clone(),
            self.cache.clone(),
            self.cfg.settle_delay,
        )
        .await;
        st.question_watch = Some(handle);
    }

    /// Cancel both watchers. Safe to call at any point; the session is
    /// memory-only and simply goes quiet.
    pub async fn stop(&self) {
        let st = self.state.lock().await;
        if let Some(h) = &st.scan_watch {
            h.cancel();
        }
        if let Some(h) = &st.question_watch {
            h.cancel();
        }
    }

    /// The accepted room code, once a load has succeeded.
    pub async fn identifier(&self) -> Option<Identifier> {
        self.state.lock().await.identifier.clone()
    }

    pub async fn cache_len(&self) -> usize {
        self.cache.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::mpsc;

    use super::*;
    use crate::document::{ChangeKinds, Element, MutationBatch, Node};
    use crate::domain::{AnswerItem, AnswerKind, AnswerSet, QuestionKey};
    use crate::ports::DisplayPort;

    #[derive(Default)]
    struct RecordingDisplay {
        events: StdMutex<Vec<String>>,
    }

    impl RecordingDisplay {
        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }

        fn last_status(&self) -> Option<String> {
            self.events()
                .into_iter()
                .rev()
                .find(|e| e.starts_with("status:"))
        }
    }

    #[async_trait]
    impl DisplayPort for RecordingDisplay {
        async fn set_status(&self, text: &str) -> Result<()> {
            self.events.lock().unwrap().push(format!("status:{text}"));
            Ok(())
        }

        async fn show_answer(&self, entry: &crate::domain::AnswerEntry) -> Result<()> {
            self.events.lock().unwrap().push(format!("answer:{entry:?}"));
            Ok(())
        }

        async fn show_no_answer(&self) -> Result<()> {
            self.events.lock().unwrap().push("no-answer".to_string());
            Ok(())
        }

        async fn set_controls_enabled(&self, enabled: bool) -> Result<()> {
            self.events
                .lock()
                .unwrap()
                .push(format!("controls:{enabled}"));
            Ok(())
        }
    }

    struct StaticDocument {
        root: Node,
    }

    #[async_trait]
    impl DocumentPort for StaticDocument {
        async fn snapshot(&self) -> Node {
            self.root.clone()
        }

        async fn current_question_key(&self) -> Option<QuestionKey> {
            None
        }

        async fn subscribe(&self, _kinds: ChangeKinds) -> mpsc::Receiver<MutationBatch> {
            let (tx, rx) = mpsc::channel(1);
            // Keep the channel open for the watcher's lifetime.
            tokio::spawn(async move {
                let _tx = tx;
                sleep(Duration::from_secs(60)).await;
            });
            rx
        }
    }

    enum FetchPlan {
        Answers(AnswerSet),
        Slow(Duration, AnswerSet),
        Fail(String),
        Hang,
    }

    struct ScriptedFetcher {
        plan: FetchPlan,
        pins: StdMutex<Vec<String>>,
    }

    impl ScriptedFetcher {
        fn new(plan: FetchPlan) -> Self {
            Self {
                plan,
                pins: StdMutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl AnswerFetcher for ScriptedFetcher {
        async fn fetch(&self, identifier: &Identifier) -> Result<AnswerSet> {
            self.pins
                .lock()
                .unwrap()
                .push(identifier.as_str().to_string());
            match &self.plan {
                FetchPlan::Answers(set) => Ok(set.clone()),
                FetchPlan::Slow(delay, set) => {
                    sleep(*delay).await;
                    Ok(set.clone())
                }
                FetchPlan::Fail(msg) => Err(Error::Fetch(msg.clone())),
                FetchPlan::Hang => {
                    sleep(Duration::from_secs(3600)).await;
                    unreachable!("hung fetch should be timed out")
                }
            }
        }
    }

    fn one_answer_set() -> AnswerSet {
        AnswerSet {
            items: vec![AnswerItem {
                question_key: Some("q1".into()),
                kind: AnswerKind::Single,
                raw_values: vec!["42".into()],
            }],
        }
    }

    fn quick_config() -> Arc<Config> {
        Arc::new(Config {
            fetch_timeout: Duration::from_millis(50),
            settle_delay: Duration::from_millis(5),
            auto_load_delay: Duration::from_millis(5),
            ..Config::default()
        })
    }

    fn session_with(
        root: Node,
        plan: FetchPlan,
    ) -> (Arc<SolverSession>, Arc<RecordingDisplay>, Arc<ScriptedFetcher>) {
        let display = Arc::new(RecordingDisplay::default());
        let fetcher = Arc::new(ScriptedFetcher::new(plan));
        let session = Arc::new(SolverSession::new(
            quick_config(),
            Arc::new(StaticDocument { root }),
            display.clone(),
            fetcher.clone(),
        ));
        (session, display, fetcher)
    }

    fn empty_body() -> Node {
        Node::Element(Element::new("body"))
    }

    #[tokio::test]
    async fn successful_load_builds_cache_and_reports_ready() {
        let (session, display, _) =
            session_with(empty_body(), FetchPlan::Answers(one_answer_set()));

        let ok = session.load_answers("123 456").await.unwrap();
        assert!(ok);
        assert_eq!(session.cache_len().await, 1);
        assert_eq!(session.identifier().await.unwrap().as_str(), "123456");
        assert_eq!(
            display.last_status(),
            Some(format!("status:{STATUS_READY}"))
        );
        // Controls stay disabled after a successful load.
        assert!(!display.events().contains(&"controls:true".to_string()));
    }

    #[tokio::test]
    async fn fetch_failure_reenables_controls_and_keeps_cache() {
        let (session, display, _) =
            session_with(empty_body(), FetchPlan::Fail("API 500".into()));

        let ok = session.load_answers("4567").await.unwrap();
        assert!(!ok);
        assert_eq!(session.cache_len().await, 0);
        assert!(session.identifier().await.is_none());
        assert!(display.last_status().unwrap().contains("API 500"));
        assert!(display.events().contains(&"controls:true".to_string()));
    }

    #[tokio::test]
    async fn hung_fetch_times_out_and_cache_is_unchanged() {
        let (session, display, _) = session_with(empty_body(), FetchPlan::Hang);

        let ok = session.load_answers("123456").await.unwrap();
        assert!(!ok);
        assert_eq!(session.cache_len().await, 0);
        assert!(display.last_status().unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn empty_answer_set_is_a_failed_load() {
        let (session, display, _) =
            session_with(empty_body(), FetchPlan::Answers(AnswerSet::default()));

        let ok = session.load_answers("123456").await.unwrap();
        assert!(!ok);
        assert_eq!(session.cache_len().await, 0);
        assert!(display.events().contains(&"controls:true".to_string()));
        assert!(display.last_status().unwrap().contains("no usable entries"));
    }

    #[tokio::test]
    async fn invalid_code_fails_without_fetching() {
        let (session, display, fetcher) =
            session_with(empty_body(), FetchPlan::Answers(one_answer_set()));

        let ok = session.load_answers("123").await.unwrap();
        assert!(!ok);
        assert!(fetcher.pins.lock().unwrap().is_empty());
        assert!(display.last_status().unwrap().contains("4-8 digits"));
    }

    #[tokio::test]
    async fn second_load_after_success_is_ignored() {
        let (session, _, fetcher) =
            session_with(empty_body(), FetchPlan::Answers(one_answer_set()));

        assert!(session.load_answers("123456").await.unwrap());
        assert!(!session.load_answers("654321").await.unwrap());
        assert_eq!(fetcher.pins.lock().unwrap().as_slice(), ["123456"]);
    }

    #[tokio::test]
    async fn overlapping_loads_accept_only_the_first_code() {
        let display = Arc::new(RecordingDisplay::default());
        let fetcher = Arc::new(ScriptedFetcher::new(FetchPlan::Slow(
            Duration::from_millis(100),
            one_answer_set(),
        )));
        let cfg = Arc::new(Config {
            fetch_timeout: Duration::from_secs(1),
            settle_delay: Duration::from_millis(5),
            auto_load_delay: Duration::from_millis(5),
            ..Config::default()
        });
        let session = Arc::new(SolverSession::new(
            cfg,
            Arc::new(StaticDocument { root: empty_body() }),
            display,
            fetcher.clone(),
        ));

        let first = {
            let s = session.clone();
            tokio::spawn(async move { s.load_answers("111111").await })
        };
        sleep(Duration::from_millis(20)).await;

        // The first load is still fetching, so a competing code must be
        // rejected without reaching the fetcher.
        assert!(!session.load_answers("222222").await.unwrap());

        assert!(first.await.unwrap().unwrap());
        assert_eq!(session.identifier().await.unwrap().as_str(), "111111");
        assert_eq!(fetcher.pins.lock().unwrap().as_slice(), ["111111"]);
    }

    #[tokio::test]
    async fn start_detects_code_already_on_screen_and_autoloads() {
        let root = Node::Element(
            Element::new("body").with_child(Node::text("Join with code 246 810")),
        );
        let (session, display, fetcher) =
            session_with(root, FetchPlan::Answers(one_answer_set()));

        session.start().await.unwrap();

        // Detection + auto-load settle within a few delay periods.
        for _ in 0..50 {
            if session.identifier().await.is_some() {
                break;
            }
            sleep(Duration::from_millis(10)).await;
        }

        assert_eq!(fetcher.pins.lock().unwrap().as_slice(), ["246810"]);
        assert_eq!(
            display.last_status(),
            Some(format!("status:{STATUS_READY}"))
        );
        session.stop().await;
    }
}
