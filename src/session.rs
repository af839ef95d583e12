//! A mounted list: fetch controller and windowing wired to view events
//!
//! The session is what a presentation layer talks to. It feeds scroll and
//! resize events to the [`Windower`], turns "reached the bottom" into
//! pagination, and keeps the window in step with the list as pages land.

use std::sync::Arc;

use tracing::debug;

use crate::controller::{ControllerSettings, FetchController, Transition};
use crate::events::{ViewEvent, ViewSubscription};
use crate::list_state::ListState;
use crate::record::Record;
use crate::source::RecordSource;
use crate::window::{Viewport, Window, WindowSpec, Windower, DEFAULT_BOTTOM_THRESHOLD};

/// Everything needed to mount a list.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub controller: ControllerSettings,
    pub window: WindowSpec,
    /// How close to the bottom counts as reaching it.
    pub bottom_threshold: f64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            controller: ControllerSettings::default(),
            window: WindowSpec::default(),
            bottom_threshold: DEFAULT_BOTTOM_THRESHOLD,
        }
    }
}

/// A row the presentation layer should draw.
#[derive(Debug, Clone, Copy)]
pub struct VisibleRow<'a> {
    pub index: usize,
    pub offset: f64,
    pub record: &'a Record,
}

/// What changed after one [`ListSession::pump`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionUpdate {
    /// A view event was handled.
    View { window_changed: bool },
    /// The controller moved.
    Fetch(Transition),
}

pub struct ListSession<S: RecordSource> {
    controller: FetchController<S>,
    windower: Windower,
    bottom_threshold: f64,
}

impl<S: RecordSource> ListSession<S> {
    pub fn new(source: Arc<S>, settings: SessionSettings) -> Self {
        Self::with_state(source, settings, ListState::new())
    }

    /// Mount with an already-fetched first page.
    pub fn with_state(source: Arc<S>, settings: SessionSettings, state: ListState) -> Self {
        let mut windower = Windower::new(settings.window);
        windower.set_total_items(state.len());
        Self {
            controller: FetchController::with_state(source, settings.controller, state),
            windower,
            bottom_threshold: settings.bottom_threshold,
        }
    }

    pub fn state(&self) -> &ListState {
        self.controller.state()
    }

    pub fn controller(&self) -> &FetchController<S> {
        &self.controller
    }

    pub fn window(&self) -> &Window {
        self.windower.window()
    }

    pub fn viewport(&self) -> Viewport {
        self.windower.viewport()
    }

    /// Fetch `query` immediately, as on first mount.
    pub fn start(&mut self, query: impl Into<String>) -> Transition {
        self.controller.submit_query(query)
    }

    /// Handle one view event. Returns whether the window changed.
    pub fn handle(&mut self, event: ViewEvent) -> bool {
        match event {
            ViewEvent::Scrolled { scroll_top } => {
                let changed = self.windower.scroll_to(scroll_top);
                self.paginate_if_at_bottom();
                changed
            }
            ViewEvent::Resized { height } => {
                let changed = self.windower.resize(height);
                self.paginate_if_at_bottom();
                changed
            }
            ViewEvent::QueryEdited { query } => {
                self.controller.set_query(query);
                false
            }
            ViewEvent::Retry => {
                self.controller.retry();
                false
            }
        }
    }

    fn paginate_if_at_bottom(&mut self) {
        if self.windower.reached_bottom(self.bottom_threshold) && self.controller.load_more() {
            debug!(page = self.state().page(), "reached bottom, loading next page");
        }
    }

    /// Bring the window up to date with the list length.
    ///
    /// When the list shrinks, the scroll offset is clamped the way a
    /// scroll container clamps it, so the window never points past the end.
    fn sync_window(&mut self) -> bool {
        let spec = self.windower.spec();
        let total_items = self.state().len();
        let mut viewport = self.windower.viewport();

        let extent = total_items as f64 * spec.item_height;
        let max_scroll = (extent - viewport.height).max(0.0);
        if viewport.scroll_top > max_scroll {
            viewport.scroll_top = max_scroll;
        }
        self.windower.update(total_items, viewport)
    }

    /// Wait for the next view event or controller transition.
    ///
    /// Returns `None` when the subscription has closed.
    pub async fn pump(&mut self, events: &mut ViewSubscription) -> Option<SessionUpdate> {
        tokio::select! {
            Some(transition) = self.controller.step() => {
                self.sync_window();
                Some(SessionUpdate::Fetch(transition))
            }
            event = events.recv() => {
                let event = event?;
                Some(SessionUpdate::View {
                    window_changed: self.handle(event),
                })
            }
        }
    }

    /// Process events until the subscription closes.
    pub async fn run(&mut self, mut events: ViewSubscription) {
        while self.pump(&mut events).await.is_some() {}
        debug!("view subscription closed, session stopped");
    }

    /// Step the controller until idle, keeping the window in sync.
    pub async fn settle(&mut self) -> Vec<Transition> {
        let transitions = self.controller.settle().await;
        self.sync_window();
        transitions
    }

    /// Rows to draw for the current window.
    pub fn visible_rows(&self) -> Vec<VisibleRow<'_>> {
        let state = self.controller.state();
        self.windower
            .window()
            .items()
            .iter()
            .filter_map(|item| {
                state.get(item.index).map(|record| VisibleRow {
                    index: item.index,
                    offset: item.offset,
                    record,
                })
            })
            .collect()
    }
}
