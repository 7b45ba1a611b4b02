//! Playback: one user submission turned into a timed series of timeline
//! mutations.
//!
//! ```text
//!   submit("hello")            T0     user message appended (synchronously)
//!   ├─ placeholder             +500   thinking spinner appended
//!   ├─ remove placeholder      +2000
//!   ├─ step 0                  +2000  thinking note or file-change burst
//!   ├─ step 1                  +2000 + d(step 0)
//!   ├─ ...
//!   └─ summary                 +2000 + Σd(steps) + 1000
//! ```
//!
//! `d(step)` is 2000ms for a thinking note and 2500ms for a file-change burst
//! (see [`PlaybackTiming`]).
//!
//! The whole script is computed up front as a [`PlaybackPlan`] and executed by
//! a single task per playback. Each task owns a [`CancellationToken`]; once
//! cancelled, the task applies nothing further. The token is checked while
//! holding the timeline write lock, so cancellation always wins over a timer
//! that has already fired.

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use iterate_types::{Attachment, Message, MessageId, PlaybackId, Scenario, ScenarioStep};

use crate::catalog::ScenarioCatalog;
use crate::config::PlaybackTiming;
use crate::timeline::{SharedTimeline, Timeline};

// ============================================================================
// Plan
// ============================================================================

/// A timeline change scheduled by a playback.
#[derive(Clone, Debug)]
pub enum TimelineMutation {
    /// Append a message (timestamped when applied).
    Append(Message),
    /// Remove this playback's placeholder.
    RemovePlaceholder(MessageId),
}

/// A mutation and its offset from the submit instant.
#[derive(Clone, Debug)]
pub struct ScheduledMutation {
    pub at: Duration,
    pub mutation: TimelineMutation,
}

/// The complete, ordered script for one playback.
///
/// Offsets never decrease; mutations sharing an offset apply in plan order.
#[derive(Clone, Debug)]
pub struct PlaybackPlan {
    mutations: Vec<ScheduledMutation>,
}

impl PlaybackPlan {
    /// Script the replay of `scenario`.
    pub fn build(scenario: &Scenario, timing: &PlaybackTiming) -> Self {
        let placeholder = Message::placeholder();
        let placeholder_id = placeholder.id;

        let mut mutations = Vec::with_capacity(scenario.steps.len() + 3);
        mutations.push(ScheduledMutation {
            at: timing.placeholder_delay(),
            mutation: TimelineMutation::Append(placeholder),
        });
        mutations.push(ScheduledMutation {
            at: timing.scenario_delay(),
            mutation: TimelineMutation::RemovePlaceholder(placeholder_id),
        });

        let mut offset = timing.scenario_delay();
        for step in &scenario.steps {
            let (message, consumed) = match step {
                ScenarioStep::Thinking(note) => {
                    (Message::assistant(note.clone()), timing.thinking_step())
                }
                ScenarioStep::FileChanges(changes) => {
                    let burst = changes
                        .iter()
                        .cloned()
                        .map(|mut change| {
                            change.is_loading = true;
                            change
                        })
                        .collect();
                    (Message::file_changes(burst), timing.file_change_step())
                }
            };
            mutations.push(ScheduledMutation {
                at: offset,
                mutation: TimelineMutation::Append(message),
            });
            offset += consumed;
        }

        mutations.push(ScheduledMutation {
            at: offset + timing.summary_delay(),
            mutation: TimelineMutation::Append(Message::assistant(scenario.summary.clone())),
        });

        Self { mutations }
    }

    pub fn mutations(&self) -> &[ScheduledMutation] {
        &self.mutations
    }

    /// Offset of the final mutation (the summary).
    pub fn duration(&self) -> Duration {
        self.mutations.last().map_or(Duration::ZERO, |m| m.at)
    }

    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }
}

// ============================================================================
// Running playbacks
// ============================================================================

/// How a playback task ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackOutcome {
    /// Every scheduled mutation was applied.
    Completed,
    /// Cancelled before the script finished.
    Cancelled,
}

/// Handle to one running playback.
#[derive(Debug)]
pub struct PlaybackHandle {
    id: PlaybackId,
    token: CancellationToken,
    task: JoinHandle<PlaybackOutcome>,
}

impl PlaybackHandle {
    pub fn id(&self) -> PlaybackId {
        self.id
    }

    /// Stop the playback. No timeline mutation happens after this returns.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the playback to end.
    pub async fn finished(self) -> PlaybackOutcome {
        // A panicked task applied nothing after the panic.
        self.task.await.unwrap_or(PlaybackOutcome::Cancelled)
    }
}

fn apply(timeline: &mut Timeline, playback: PlaybackId, mutation: TimelineMutation) {
    match mutation {
        TimelineMutation::Append(mut message) => {
            message.stamp_now();
            match timeline.append(message) {
                Ok(id) => tracing::debug!(playback = %playback, message = %id, "appended"),
                Err(e) => tracing::warn!(playback = %playback, "skipped scripted message: {e}"),
            }
        }
        TimelineMutation::RemovePlaceholder(id) => match timeline.remove_placeholder(id) {
            Ok(_) => tracing::debug!(playback = %playback, message = %id, "placeholder removed"),
            Err(e) => tracing::warn!(playback = %playback, "placeholder removal failed: {e}"),
        },
    }
}

async fn run_playback(
    id: PlaybackId,
    plan: PlaybackPlan,
    timeline: SharedTimeline,
    token: CancellationToken,
    start: Instant,
) -> PlaybackOutcome {
    for scheduled in plan.mutations {
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                tracing::info!(playback = %id, "playback cancelled");
                return PlaybackOutcome::Cancelled;
            }
            _ = tokio::time::sleep_until(start + scheduled.at) => {}
        }

        {
            let mut guard = timeline.write();
            if token.is_cancelled() {
                tracing::info!(playback = %id, "playback cancelled");
                return PlaybackOutcome::Cancelled;
            }
            apply(&mut guard, id, scheduled.mutation);
        }
    }
    tracing::info!(playback = %id, "playback complete");
    PlaybackOutcome::Completed
}

// ============================================================================
// Scheduler
// ============================================================================

/// Turns submissions into playbacks against a shared timeline.
///
/// Concurrent playbacks (rapid consecutive sends) each run their own task;
/// their messages interleave on the timeline by fire time.
pub struct PlaybackScheduler {
    timeline: SharedTimeline,
    catalog: Arc<dyn ScenarioCatalog>,
    timing: PlaybackTiming,
    rng: Box<dyn RngCore + Send>,
    handles: Vec<PlaybackHandle>,
}

impl PlaybackScheduler {
    /// Scheduler with an entropy-seeded scenario picker.
    pub fn new(
        timeline: SharedTimeline,
        catalog: Arc<dyn ScenarioCatalog>,
        timing: PlaybackTiming,
    ) -> Self {
        Self::with_rng(timeline, catalog, timing, StdRng::from_entropy())
    }

    /// Scheduler with an injected scenario picker (seed it for determinism).
    pub fn with_rng(
        timeline: SharedTimeline,
        catalog: Arc<dyn ScenarioCatalog>,
        timing: PlaybackTiming,
        rng: impl RngCore + Send + 'static,
    ) -> Self {
        Self {
            timeline,
            catalog,
            timing,
            rng: Box::new(rng),
            handles: Vec::new(),
        }
    }

    /// Append the user message and start a playback.
    ///
    /// Returns `None` without touching the timeline when `text` is blank and
    /// there are no attachments, or when the catalog yields no scenario (the
    /// attachments are then dropped). Must be called inside a tokio runtime.
    pub fn submit(&mut self, text: &str, attachments: Vec<Attachment>) -> Option<PlaybackId> {
        if text.trim().is_empty() && attachments.is_empty() {
            return None;
        }

        let Some(scenario) = self.catalog.choose(&mut *self.rng) else {
            tracing::warn!("no scenario to play back");
            return None;
        };
        let plan = PlaybackPlan::build(scenario, &self.timing);
        let steps = scenario.steps.len();

        let start = Instant::now();
        let user_message = Message::user(text, attachments);
        if let Err(e) = self.timeline.write().append(user_message) {
            tracing::warn!("user message rejected: {e}");
            return None;
        }

        let id = PlaybackId::new();
        let token = CancellationToken::new();
        tracing::info!(
            playback = %id,
            steps,
            duration_ms = plan.duration().as_millis() as u64,
            "playback started"
        );
        let task = tokio::spawn(run_playback(
            id,
            plan,
            self.timeline.clone(),
            token.clone(),
            start,
        ));

        self.handles.retain(|h| !h.is_finished());
        self.handles.push(PlaybackHandle { id, token, task });
        Some(id)
    }

    /// Cancel one playback. Returns `false` if it is unknown or already done.
    pub fn cancel(&mut self, id: PlaybackId) -> bool {
        let Some(handle) = self.handles.iter().find(|h| h.id == id) else {
            return false;
        };
        if handle.is_finished() {
            return false;
        }
        handle.cancel();
        true
    }

    /// Cancel every playback started by this scheduler.
    pub fn cancel_all(&mut self) {
        for handle in &self.handles {
            handle.cancel();
        }
    }

    /// Number of playbacks still running.
    pub fn active(&self) -> usize {
        self.handles
            .iter()
            .filter(|h| !h.is_finished() && !h.is_cancelled())
            .count()
    }

    /// Wait for every started playback to end.
    pub async fn wait_idle(&mut self) {
        for handle in self.handles.drain(..) {
            handle.finished().await;
        }
    }
}

impl Drop for PlaybackScheduler {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
