//! Fetch controller: debounced, cancelable paging into a [`ListState`]
//!
//! ```text
//!            set_query                 debounce elapsed
//!   Idle ───────────────▶ Debouncing ───────────────────┐
//!    ▲                        │ set_query (restart)      ▼
//!    │                        └──────────▶        Fetching ──▶ Applied (reset | append)
//!    │                                                │   └──▶ Failed
//!    └────────────────────────────────────────────────┘   └──▶ Cancelled (superseded)
//! ```
//!
//! At most one fetch is in flight. Starting a fetch cancels the previous
//! one through its [`CancellationToken`]; completions carry the id of the
//! operation that produced them and anything that is not the current
//! operation is dropped without touching the list.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::error::FetchError;
use crate::list_state::ListState;
use crate::record::{PageRequest, PageResponse, DEFAULT_LIMIT};
use crate::source::RecordSource;

/// The one message users see when a fetch fails.
pub const FETCH_FAILED: &str = "Failed to load reviews. Please try again later.";

/// Tuning knobs for a controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerSettings {
    /// Records requested per page.
    pub page_size: u32,
    /// Quiet period after the last keystroke before a query is fetched.
    pub debounce: Duration,
    /// Upper bound on a single fetch. `None` waits indefinitely.
    pub fetch_timeout: Option<Duration>,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_LIMIT,
            debounce: Duration::from_millis(300),
            fetch_timeout: Some(Duration::from_secs(10)),
        }
    }
}

/// Whether a fetch replaces the list or extends it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    Reset,
    Append,
}

impl FetchKind {
    fn of(request: &PageRequest) -> Self {
        if request.is_reset() {
            FetchKind::Reset
        } else {
            FetchKind::Append
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FetchKind::Reset => "reset",
            FetchKind::Append => "append",
        }
    }
}

/// Where the controller currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    /// A query is waiting for its quiet period.
    Debouncing,
    Fetching(FetchKind),
}

/// One observable step of the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// A fetch was issued.
    Started { kind: FetchKind, page: u32 },
    /// A response was applied to the list.
    Applied {
        kind: FetchKind,
        page: u32,
        received: usize,
    },
    /// The current fetch failed; carries the detailed cause.
    Failed { kind: FetchKind, error: String },
    /// A completion from a superseded fetch was dropped.
    Discarded { op: u64 },
}

/// The single in-flight fetch.
struct Operation {
    id: u64,
    request: PageRequest,
    cancel: CancellationToken,
}

struct Completion {
    id: u64,
    request: PageRequest,
    result: Result<PageResponse, FetchError>,
}

struct PendingQuery {
    deadline: Instant,
}

/// Drives a [`RecordSource`] from query edits and scroll requests.
///
/// The controller owns its [`ListState`] and is the only thing that
/// mutates it. Fetches run as spawned tasks; call [`step`](Self::step) to
/// let timers fire and completions land.
pub struct FetchController<S: RecordSource> {
    source: Arc<S>,
    settings: ControllerSettings,
    state: ListState,
    pending: Option<PendingQuery>,
    current: Option<Operation>,
    /// Last request that failed, for `retry`.
    failed: Option<PageRequest>,
    next_id: u64,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
}

impl<S: RecordSource> FetchController<S> {
    pub fn new(source: Arc<S>, settings: ControllerSettings) -> Self {
        Self::with_state(source, settings, ListState::new())
    }

    /// Controller continuing from an already populated list.
    ///
    /// Appends continue from the state's cursor, so a seed fetched with a
    /// different page size is never re-fetched.
    pub fn with_state(source: Arc<S>, settings: ControllerSettings, state: ListState) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            source,
            settings,
            state,
            pending: None,
            current: None,
            failed: None,
            next_id: 0,
            completions_tx,
            completions_rx,
        }
    }

    pub fn state(&self) -> &ListState {
        &self.state
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    pub fn phase(&self) -> Phase {
        match (&self.current, &self.pending) {
            (Some(op), _) => Phase::Fetching(FetchKind::of(&op.request)),
            (None, Some(_)) => Phase::Debouncing,
            (None, None) => Phase::Idle,
        }
    }

    /// Record a keystroke. The text is visible immediately; the fetch
    /// happens once no further edit arrives within the debounce window.
    pub fn set_query(&mut self, query: impl Into<String>) {
        self.state.set_query(query);
        let deadline = Instant::now() + self.settings.debounce;
        debug!(query = %self.state.query(), "query edited, debouncing");
        self.pending = Some(PendingQuery { deadline });
    }

    /// Fetch the first page of `query` right away, skipping the debounce.
    pub fn submit_query(&mut self, query: impl Into<String>) -> Transition {
        self.state.set_query(query);
        self.pending = None;
        let request = PageRequest::first(self.state.query(), self.settings.page_size);
        self.start(request)
    }

    /// Fetch the next page if nothing else is going on.
    ///
    /// Suppressed while a fetch is in flight, while an edited query is
    /// waiting out its debounce, and once the source reported no more
    /// pages. Returns whether a fetch was issued.
    pub fn load_more(&mut self) -> bool {
        if self.state.is_loading() || self.pending.is_some() || !self.state.has_more() {
            return false;
        }
        let request = match self.state.cursor() {
            Some(cursor) => cursor.next_page(),
            None => PageRequest::first(self.state.query(), self.settings.page_size),
        };
        self.start(request);
        true
    }

    /// Re-issue the last failed request. Returns whether a fetch was issued.
    pub fn retry(&mut self) -> bool {
        if self.state.is_loading() {
            return false;
        }
        match self.failed.take() {
            Some(request) => {
                self.start(request);
                true
            }
            None => false,
        }
    }

    /// Drop any pending query and cancel the in-flight fetch.
    ///
    /// Loaded items and any error stay as they are; `loading` clears.
    pub fn cancel(&mut self) {
        self.pending = None;
        if let Some(op) = self.current.take() {
            debug!(op = op.id, "fetch cancelled");
            op.cancel.cancel();
            self.state.end_fetch();
        }
    }

    /// Wait for the next transition.
    ///
    /// Returns `None` when there is nothing to wait for: no debounced
    /// query and no fetch in flight.
    pub async fn step(&mut self) -> Option<Transition> {
        let deadline = self.pending.as_ref().map(|p| p.deadline);
        if deadline.is_none() && self.current.is_none() {
            return None;
        }

        tokio::select! {
            biased;
            Some(done) = self.completions_rx.recv() => Some(self.complete(done)),
            _ = debounce_elapsed(deadline) => Some(self.fire_pending()),
        }
    }

    /// Step until idle, collecting every transition.
    pub async fn settle(&mut self) -> Vec<Transition> {
        let mut transitions = Vec::new();
        while let Some(t) = self.step().await {
            transitions.push(t);
        }
        transitions
    }

    fn fire_pending(&mut self) -> Transition {
        self.pending = None;
        let request = PageRequest::first(self.state.query(), self.settings.page_size);
        self.start(request)
    }

    fn start(&mut self, request: PageRequest) -> Transition {
        if let Some(prev) = self.current.take() {
            debug!(op = prev.id, "superseding in-flight fetch");
            prev.cancel.cancel();
        }

        let id = self.next_id;
        self.next_id += 1;
        let kind = FetchKind::of(&request);
        let page = request.page();
        let cancel = CancellationToken::new();

        self.state.begin_fetch(page);
        tokio::spawn(run_fetch(
            self.source.clone(),
            request.clone(),
            id,
            cancel.clone(),
            self.settings.fetch_timeout,
            self.completions_tx.clone(),
        ));
        self.current = Some(Operation {
            id,
            request,
            cancel,
        });

        Transition::Started { kind, page }
    }

    fn complete(&mut self, done: Completion) -> Transition {
        match &self.current {
            Some(op) if op.id == done.id => {}
            _ => {
                debug!(op = done.id, "dropping completion of superseded fetch");
                return Transition::Discarded { op: done.id };
            }
        }
        self.current = None;

        let kind = FetchKind::of(&done.request);
        let page = done.request.page();
        match done.result {
            Ok(response) => {
                let received = response.items.len();
                self.state.apply(&done.request, response);
                self.failed = None;
                info!(
                    kind = kind.as_str(),
                    page,
                    received,
                    loaded = self.state.len(),
                    total = self.state.total(),
                    "page applied"
                );
                Transition::Applied {
                    kind,
                    page,
                    received,
                }
            }
            Err(e) => {
                warn!(kind = kind.as_str(), page, error = %e, "fetch failed");
                self.state.fail(FETCH_FAILED);
                self.failed = Some(done.request);
                Transition::Failed {
                    kind,
                    error: e.to_string(),
                }
            }
        }
    }
}

impl<S: RecordSource> Drop for FetchController<S> {
    fn drop(&mut self) {
        if let Some(op) = self.current.take() {
            op.cancel.cancel();
        }
    }
}

async fn debounce_elapsed(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[instrument(
    name = "fetch",
    skip_all,
    fields(op = id, query = %request.query(), page = request.page())
)]
async fn run_fetch<S: RecordSource>(
    source: Arc<S>,
    request: PageRequest,
    id: u64,
    cancel: CancellationToken,
    timeout: Option<Duration>,
    completions: mpsc::UnboundedSender<Completion>,
) {
    let result = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            debug!("fetch abandoned");
            return;
        }
        result = fetch_page(source.as_ref(), &request, timeout) => result,
    };

    // Receiver gone means the controller was dropped
    let _ = completions.send(Completion {
        id,
        request,
        result,
    });
}

/// One fetch with the timeout applied and in-body errors lifted out.
async fn fetch_page<S: RecordSource>(
    source: &S,
    request: &PageRequest,
    timeout: Option<Duration>,
) -> Result<PageResponse, FetchError> {
    let response = match timeout {
        Some(limit) => tokio::time::timeout(limit, source.fetch(request))
            .await
            .map_err(|_| FetchError::Timeout(limit))??,
        None => source.fetch(request).await?,
    };

    match response.error {
        Some(error) => Err(FetchError::Upstream(error)),
        None => Ok(response),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;
    use crate::source::RecordStore;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use tokio_test::{assert_pending, assert_ready};

    fn record(id: usize, organization: &str) -> Record {
        Record {
            id: id.to_string(),
            organization: organization.to_string(),
            phone: String::new(),
            rating: 4.0,
            total_review: Some(10),
            category: "Cafe".to_string(),
            country: String::new(),
            state: String::new(),
            city: String::new(),
            street: String::new(),
            building: Some(1),
        }
    }

    /// In-memory source with per-query latency and switchable failure.
    struct TestSource {
        store: RecordStore,
        delays: HashMap<String, Duration>,
        failing: AtomicBool,
        upstream_error: AtomicBool,
        requests: Mutex<Vec<PageRequest>>,
    }

    impl TestSource {
        fn new() -> Self {
            let mut records = Vec::new();
            for i in 1..=5 {
                records.push(record(i, &format!("Cafe {i}")));
            }
            records.push(record(6, "Abbey Books"));
            records.push(record(7, "Abbot Kinney Deli"));
            records.push(record(8, "Alpine Bakery"));
            Self {
                store: RecordStore::new(records),
                delays: HashMap::new(),
                failing: AtomicBool::new(false),
                upstream_error: AtomicBool::new(false),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn delay(mut self, query: &str, delay: Duration) -> Self {
            self.delays.insert(query.to_string(), delay);
            self
        }

        fn requests(&self) -> Vec<PageRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RecordSource for TestSource {
        async fn fetch(&self, request: &PageRequest) -> Result<PageResponse, FetchError> {
            self.requests.lock().unwrap().push(request.clone());
            let delay = self
                .delays
                .get(request.query())
                .copied()
                .unwrap_or(Duration::from_millis(20));
            tokio::time::sleep(delay).await;

            if self.failing.load(Ordering::SeqCst) {
                return Err(FetchError::Status(503));
            }
            if self.upstream_error.load(Ordering::SeqCst) {
                return Ok(PageResponse::failed("Failed to process search request"));
            }
            Ok(self.store.search(request))
        }
    }

    fn settings(page_size: u32) -> ControllerSettings {
        ControllerSettings {
            page_size,
            ..ControllerSettings::default()
        }
    }

    fn ids<S: RecordSource>(controller: &FetchController<S>) -> Vec<String> {
        controller
            .state()
            .items()
            .iter()
            .map(|r| r.id.clone())
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_step_returns_none() {
        let mut controller = FetchController::new(Arc::new(TestSource::new()), settings(2));
        assert_eq!(controller.phase(), Phase::Idle);
        assert_eq!(controller.step().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_coalesces_keystrokes() {
        let source = Arc::new(TestSource::new());
        let mut controller = FetchController::new(source.clone(), settings(10));

        controller.set_query("c");
        assert_eq!(controller.state().query(), "c");
        assert_eq!(controller.phase(), Phase::Debouncing);

        tokio::time::advance(Duration::from_millis(200)).await;
        controller.set_query("ca");
        tokio::time::advance(Duration::from_millis(200)).await;
        controller.set_query("caf");
        assert_eq!(controller.state().query(), "caf");

        {
            // quiet period restarted by the last edit
            let mut step = tokio_test::task::spawn(controller.step());
            assert_pending!(step.poll());
        }
        assert!(source.requests().is_empty());

        let transitions = controller.settle().await;
        assert_eq!(
            transitions[0],
            Transition::Started {
                kind: FetchKind::Reset,
                page: 1
            }
        );
        let requests = source.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].query(), "caf");
        assert_eq!(controller.state().total(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_stale_query_never_applies() {
        let source = Arc::new(
            TestSource::new()
                .delay("ab", Duration::from_millis(500))
                .delay("abb", Duration::from_millis(50)),
        );
        let mut controller = FetchController::new(source.clone(), settings(10));

        controller.set_query("ab");
        assert_eq!(
            controller.step().await,
            Some(Transition::Started {
                kind: FetchKind::Reset,
                page: 1
            })
        );
        assert!(controller.state().is_loading());

        // "ab" is still in flight when "abb" fires
        controller.set_query("abb");
        assert!(matches!(
            controller.step().await,
            Some(Transition::Started { .. })
        ));

        let transitions = controller.settle().await;
        assert_eq!(
            transitions,
            vec![Transition::Applied {
                kind: FetchKind::Reset,
                page: 1,
                received: 2
            }]
        );

        // let the abandoned request's timer run out too
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(controller.step().await, None);

        assert_eq!(ids(&controller), vec!["6", "7"]);
        assert_eq!(controller.state().total(), 2);
        assert!(!controller.state().is_loading());
        assert!(controller.state().error().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_completion_is_discarded() {
        let mut controller = FetchController::new(Arc::new(TestSource::new()), settings(10));
        controller.submit_query("cafe");
        controller.submit_query("abb");

        let stale = Completion {
            id: 0,
            request: PageRequest::first("cafe", 10),
            result: Ok(TestSource::new().store.search(&PageRequest::first("cafe", 10))),
        };
        assert_eq!(controller.complete(stale), Transition::Discarded { op: 0 });
        assert!(controller.state().is_empty());
        assert!(controller.state().is_loading());

        controller.settle().await;
        assert_eq!(ids(&controller), vec!["6", "7"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pagination_appends_and_is_suppressed_while_loading() {
        let source = Arc::new(TestSource::new());
        let mut controller = FetchController::new(source.clone(), settings(2));

        controller.submit_query("cafe");
        assert!(!controller.load_more(), "first page still loading");
        controller.settle().await;
        assert_eq!(ids(&controller), vec!["1", "2"]);
        assert!(controller.state().has_more());

        assert!(controller.load_more());
        assert_eq!(controller.state().page(), 2);
        assert!(!controller.load_more(), "second page still loading");
        assert_eq!(controller.phase(), Phase::Fetching(FetchKind::Append));

        controller.settle().await;
        assert_eq!(ids(&controller), vec!["1", "2", "3", "4"]);
        assert_eq!(controller.state().epoch(), 1);

        assert!(controller.load_more());
        controller.settle().await;
        assert_eq!(ids(&controller), vec!["1", "2", "3", "4", "5"]);
        assert!(!controller.state().has_more());

        assert!(!controller.load_more(), "no more pages");
        let pages: Vec<u32> = source.requests().iter().map(|r| r.page()).collect();
        assert_eq!(pages, vec![1, 2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_more_waits_for_debounced_query() {
        let mut controller = FetchController::new(Arc::new(TestSource::new()), settings(2));
        controller.submit_query("cafe");
        controller.settle().await;

        controller.set_query("abb");
        assert!(!controller.load_more());

        controller.settle().await;
        assert_eq!(ids(&controller), vec!["6", "7"]);
        assert_eq!(controller.state().epoch(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_keeps_items_and_retry_recovers() {
        let source = Arc::new(TestSource::new());
        let mut controller = FetchController::new(source.clone(), settings(2));
        controller.submit_query("cafe");
        controller.settle().await;

        source.failing.store(true, Ordering::SeqCst);
        assert!(controller.load_more());
        let transitions = controller.settle().await;
        assert_eq!(
            transitions,
            vec![Transition::Failed {
                kind: FetchKind::Append,
                error: "HTTP error! status: 503".to_string()
            }]
        );
        assert_eq!(controller.state().error(), Some(FETCH_FAILED));
        assert!(!controller.state().is_loading());
        assert_eq!(ids(&controller), vec!["1", "2"]);

        source.failing.store(false, Ordering::SeqCst);
        assert!(controller.retry());
        assert!(controller.state().error().is_none());
        controller.settle().await;
        assert_eq!(ids(&controller), vec!["1", "2", "3", "4"]);
        assert!(!controller.retry(), "nothing left to retry");
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_body_counts_as_failure() {
        let source = Arc::new(TestSource::new());
        source.upstream_error.store(true, Ordering::SeqCst);
        let mut controller = FetchController::new(source, settings(2));

        controller.submit_query("cafe");
        let transitions = controller.settle().await;
        assert!(matches!(
            transitions.as_slice(),
            [Transition::Failed {
                kind: FetchKind::Reset,
                ..
            }]
        ));
        assert_eq!(controller.state().error(), Some(FETCH_FAILED));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_fetch_times_out() {
        let source = Arc::new(TestSource::new().delay("slow", Duration::from_secs(3600)));
        let mut controller = FetchController::new(
            source,
            ControllerSettings {
                fetch_timeout: Some(Duration::from_secs(10)),
                ..settings(2)
            },
        );

        controller.submit_query("slow");
        let started = Instant::now();
        let transitions = controller.settle().await;

        assert_eq!(
            transitions,
            vec![Transition::Failed {
                kind: FetchKind::Reset,
                error: "request timed out after 10000ms".to_string()
            }]
        );
        let waited = started.elapsed();
        assert!(waited >= Duration::from_secs(10) && waited < Duration::from_secs(11));
        assert!(!controller.state().is_loading());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_leaves_state_untouched() {
        let mut controller = FetchController::new(Arc::new(TestSource::new()), settings(2));
        controller.submit_query("cafe");
        controller.cancel();

        assert_eq!(controller.phase(), Phase::Idle);
        assert_eq!(controller.step().await, None);
        assert!(controller.state().is_empty());
        assert!(controller.state().error().is_none());
        assert!(!controller.state().is_loading());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_append_can_be_reissued() {
        let source = Arc::new(TestSource::new());
        let mut controller = FetchController::new(source.clone(), settings(2));
        controller.submit_query("cafe");
        controller.settle().await;

        assert!(controller.load_more());
        controller.cancel();
        assert!(!controller.state().is_loading());
        assert_eq!(controller.state().page(), 1);
        assert_eq!(controller.step().await, None);
        assert_eq!(ids(&controller), vec!["1", "2"]);

        // the cancelled page is requested again, not skipped
        assert!(controller.load_more());
        controller.settle().await;
        assert_eq!(ids(&controller), vec!["1", "2", "3", "4"]);
        assert_eq!(source.requests().last().map(|r| r.page()), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_seeded_state_appends_after_seed() {
        let source = Arc::new(TestSource::new());
        let seed = PageRequest::first("cafe", 3);
        let initial = source.store.search(&seed);
        let state = ListState::with_initial(seed, initial);
        let mut controller = FetchController::with_state(source.clone(), settings(2), state);

        assert!(controller.load_more());
        controller.settle().await;
        assert_eq!(ids(&controller), vec!["1", "2", "3", "4", "5"]);
        assert!(!controller.state().has_more());
    }

    #[tokio::test(start_paused = true)]
    async fn test_step_ready_once_completion_arrives() {
        let mut controller = FetchController::new(Arc::new(TestSource::new()), settings(2));
        controller.submit_query("cafe");
        tokio::time::sleep(Duration::from_millis(50)).await;

        let mut step = tokio_test::task::spawn(controller.step());
        let transition = assert_ready!(step.poll());
        assert!(matches!(transition, Some(Transition::Applied { .. })));
    }
}
