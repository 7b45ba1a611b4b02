//! Progressive reveal of file-change cards.
//!
//! Each card that appears on the timeline runs a small timed state machine:
//!
//! ```text
//!   Idle ──start──▶ Revealing(0) ──+800ms──▶ Revealing(1) ── ... ──▶ Revealing(n)
//!     │                                                                  │
//!     └──── start (not loading) ──────▶ Complete ◀──────── +500ms ───────┘
//! ```
//!
//! Line `i` becomes visible `(i + 1) * line_interval` after the card first
//! appeared. Reveal state is presentation-only: it lives in the
//! [`RevealEngine`], never in the timeline message.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use iterate_types::{FileAction, FileChange, Message, MessageId};

use crate::config::RevealTiming;
use crate::timeline::TimelineEvent;

/// Capacity of the reveal event channel.
const EVENT_CAPACITY: usize = 1024;

/// Marker prefixed to shortened file paths.
const ELLIPSIS: &str = "...";

// ============================================================================
// Card state machine
// ============================================================================

/// Where a card is in its reveal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum RevealState {
    /// Not yet on screen.
    #[default]
    Idle,
    /// This many lines are visible; still loading.
    Revealing(usize),
    /// All lines visible; loading finished.
    Complete,
}

/// Icon shown in a card header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RevealIcon {
    Spinner,
    Pen,
    Trash,
}

/// Presentation state for one file-change card.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RevealCard {
    change: FileChange,
    state: RevealState,
    expanded: bool,
}

impl RevealCard {
    pub fn new(change: FileChange) -> Self {
        Self {
            change,
            state: RevealState::Idle,
            expanded: false,
        }
    }

    /// The card became visible: begin revealing, or finish at once if the
    /// change is not loading.
    pub fn start(&mut self) {
        if self.state != RevealState::Idle {
            return;
        }
        self.state = if self.change.is_loading {
            RevealState::Revealing(0)
        } else {
            RevealState::Complete
        };
    }

    /// Timed transitions after [`start`](Self::start), as offsets from it.
    ///
    /// Empty when the change is not loading.
    pub fn schedule(&self, timing: &RevealTiming) -> Vec<(Duration, RevealState)> {
        if !self.change.is_loading {
            return Vec::new();
        }
        let lines = self.change.changes.len();
        let interval = timing.line_interval();
        let mut schedule: Vec<_> = (1..=lines)
            .map(|k| (interval * k as u32, RevealState::Revealing(k)))
            .collect();
        schedule.push((interval * lines as u32 + timing.complete_delay(), RevealState::Complete));
        schedule
    }

    /// State `elapsed` after the card appeared.
    pub fn state_at(&self, elapsed: Duration, timing: &RevealTiming) -> RevealState {
        let mut card = self.clone();
        card.state = RevealState::Idle;
        card.start();
        for (at, state) in card.schedule(timing) {
            if at <= elapsed {
                card.advance(state);
            }
        }
        card.state
    }

    /// Move forward to `state`. Never moves backwards.
    pub fn advance(&mut self, state: RevealState) {
        let forward = match (self.state, state) {
            (RevealState::Complete, _) => false,
            (_, RevealState::Complete) => true,
            (RevealState::Idle, RevealState::Revealing(_)) => true,
            (RevealState::Revealing(a), RevealState::Revealing(b)) => b > a,
            (_, RevealState::Idle) => false,
        };
        if forward {
            self.state = state;
        }
    }

    pub fn state(&self) -> RevealState {
        self.state
    }

    pub fn change(&self) -> &FileChange {
        &self.change
    }

    pub fn is_complete(&self) -> bool {
        self.state == RevealState::Complete
    }

    /// Lines revealed so far.
    pub fn visible_lines(&self) -> &[String] {
        let lines = &self.change.changes;
        match self.state {
            RevealState::Idle => &[],
            RevealState::Revealing(k) => &lines[..k.min(lines.len())],
            RevealState::Complete => lines,
        }
    }

    /// Header verb: present participle while loading, past tense once complete.
    pub fn action_label(&self) -> &'static str {
        match (self.change.action, self.is_complete()) {
            (FileAction::Creating, false) => "Creating file",
            (FileAction::Modifying, false) => "Editing file",
            (FileAction::Deleting, false) => "Deleting file",
            (FileAction::Creating, true) => "Created file",
            (FileAction::Modifying, true) => "Edited file",
            (FileAction::Deleting, true) => "Deleted file",
        }
    }

    pub fn icon(&self) -> RevealIcon {
        if !self.is_complete() {
            return RevealIcon::Spinner;
        }
        match self.change.action {
            FileAction::Creating | FileAction::Modifying => RevealIcon::Pen,
            FileAction::Deleting => RevealIcon::Trash,
        }
    }

    /// File path for the header, shortened to its last two segments.
    pub fn display_filename(&self) -> String {
        shorten_path(&self.change.filename)
    }

    pub fn is_expanded(&self) -> bool {
        self.expanded
    }

    /// Flip the expanded state. Stays collapsed while no line is visible.
    pub fn toggle_expanded(&mut self) -> bool {
        if self.visible_lines().is_empty() {
            self.expanded = false;
        } else {
            self.expanded = !self.expanded;
        }
        self.expanded
    }
}

/// `src/components/ui/Button.tsx` → `.../ui/Button.tsx`.
pub fn shorten_path(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').collect();
    if segments.len() <= 2 {
        return path.to_string();
    }
    format!("{ELLIPSIS}/{}", segments[segments.len() - 2..].join("/"))
}

// ============================================================================
// Engine
// ============================================================================

/// Identifies a card: the burst message and the card's index in it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CardKey {
    pub message: MessageId,
    pub index: usize,
}

/// Progress events for render surfaces.
#[derive(Clone, Debug)]
pub enum RevealEvent {
    /// A card appeared and began revealing.
    Started(CardKey),
    /// Line `index` became visible.
    LineRevealed {
        key: CardKey,
        index: usize,
        line: String,
    },
    /// The card finished loading.
    Completed(CardKey),
}

struct RevealInner {
    timing: RevealTiming,
    cards: Mutex<HashMap<CardKey, RevealCard>>,
    token: CancellationToken,
    event_tx: broadcast::Sender<RevealEvent>,
}

/// Runs the reveal of every file-change card that appears on the timeline.
///
/// Dropping the engine (or calling [`shutdown`](Self::shutdown)) cancels all
/// running reveals.
pub struct RevealEngine {
    inner: Arc<RevealInner>,
}

impl RevealEngine {
    pub fn new(timing: RevealTiming) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(RevealInner {
                timing,
                cards: Mutex::new(HashMap::new()),
                token: CancellationToken::new(),
                event_tx,
            }),
        }
    }

    /// Start revealing the cards of a newly visible message.
    ///
    /// Returns how many cards were started. Cards already known are skipped.
    /// Must be called inside a tokio runtime when any card is loading.
    pub fn observe(&self, message: &Message) -> usize {
        self.inner.observe(message)
    }

    /// Follow a timeline, observing every appended message until shutdown.
    pub fn follow(&self, mut rx: broadcast::Receiver<TimelineEvent>) -> JoinHandle<()> {
        let inner = self.inner.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = inner.token.cancelled() => break,
                    event = rx.recv() => match event {
                        Ok(TimelineEvent::Appended(message)) => {
                            inner.observe(&message);
                        }
                        Ok(TimelineEvent::Removed(_)) => {}
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            tracing::warn!("reveal engine lagged, {n} timeline events dropped");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
        })
    }

    /// Current presentation state of a card.
    pub fn card(&self, key: CardKey) -> Option<RevealCard> {
        self.inner.cards.lock().get(&key).cloned()
    }

    /// All known cards of a message, in burst order.
    pub fn cards_for(&self, message: MessageId) -> Vec<RevealCard> {
        let cards = self.inner.cards.lock();
        (0..)
            .map_while(|index| cards.get(&CardKey { message, index }).cloned())
            .collect()
    }

    /// Toggle a card's expanded state. `None` for an unknown card.
    pub fn toggle_expanded(&self, key: CardKey) -> Option<bool> {
        self.inner
            .cards
            .lock()
            .get_mut(&key)
            .map(RevealCard::toggle_expanded)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RevealEvent> {
        self.inner.event_tx.subscribe()
    }

    /// Cancel every running reveal. Cards keep their last state.
    pub fn shutdown(&self) {
        self.inner.token.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.token.is_cancelled()
    }
}

impl Drop for RevealEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl RevealInner {
    fn observe(self: &Arc<Self>, message: &Message) -> usize {
        if self.token.is_cancelled() {
            return 0;
        }
        let mut started = 0;
        for (index, change) in message.changes().iter().enumerate() {
            let key = CardKey {
                message: message.id,
                index,
            };
            let mut card = RevealCard::new(change.clone());
            card.start();
            let schedule = card.schedule(&self.timing);
            let complete = card.is_complete();
            {
                let mut cards = self.cards.lock();
                if cards.contains_key(&key) {
                    continue;
                }
                cards.insert(key, card);
            }
            started += 1;

            let _ = self.event_tx.send(RevealEvent::Started(key));
            if complete {
                let _ = self.event_tx.send(RevealEvent::Completed(key));
            } else {
                tokio::spawn(run_reveal(self.clone(), key, schedule, Instant::now()));
            }
        }
        started
    }
}

async fn run_reveal(
    inner: Arc<RevealInner>,
    key: CardKey,
    schedule: Vec<(Duration, RevealState)>,
    start: Instant,
) {
    for (at, state) in schedule {
        tokio::select! {
            biased;
            _ = inner.token.cancelled() => return,
            _ = tokio::time::sleep_until(start + at) => {}
        }

        let event = {
            let mut cards = inner.cards.lock();
            if inner.token.is_cancelled() {
                return;
            }
            let Some(card) = cards.get_mut(&key) else {
                return;
            };
            card.advance(state);
            match state {
                RevealState::Revealing(k) if k > 0 => RevealEvent::LineRevealed {
                    key,
                    index: k - 1,
                    line: card.change().changes[k - 1].clone(),
                },
                _ => RevealEvent::Completed(key),
            }
        };
        tracing::trace!(message = %key.message, index = key.index, ?state, "reveal tick");
        let _ = inner.event_tx.send(event);
    }
}
