//! # iterate-kernel
//!
//! Core of the Iterate chat panel.
//!
//! The panel is a single timeline of messages. A user turn:
//! - Drains the pending attachments (at most three) into a user message
//! - Picks one scripted scenario from the catalog
//! - Plays it back on timers: a thinking placeholder, thinking notes,
//!   bursts of file-change cards, then a summary
//!
//! Every file-change card that lands on the timeline is revealed line by
//! line by the [`RevealEngine`]. Playbacks and reveals are cancellable and
//! owned by the [`ChatPanel`], which cancels all of them on teardown.

pub mod attachments;
pub mod catalog;
pub mod config;
pub mod error;
pub mod panel;
pub mod playback;
pub mod preview;
pub mod reveal;
pub mod timeline;

pub use attachments::{AttachmentStore, MAX_PENDING_ATTACHMENTS};
pub use catalog::{ScenarioCatalog, StaticCatalog};
pub use config::{FeatureFlags, PanelConfig, PlaybackTiming, RevealTiming};
pub use error::{AttachmentError, CatalogError, ConfigError, TimelineError};
pub use panel::ChatPanel;
pub use playback::{
    PlaybackHandle, PlaybackOutcome, PlaybackPlan, PlaybackScheduler, ScheduledMutation,
    TimelineMutation,
};
pub use preview::{BlobUrlBackend, PreviewBackend};
pub use reveal::{CardKey, RevealCard, RevealEngine, RevealEvent, RevealIcon, RevealState};
pub use timeline::{SharedTimeline, Timeline, TimelineEvent, shared_timeline};
