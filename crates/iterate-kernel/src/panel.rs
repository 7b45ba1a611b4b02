//! The chat panel: one timeline, its pending attachments, and everything that
//! runs on timers against them.
//!
//! A [`ChatPanel`] owns every playback and reveal it starts. Tearing the panel
//! down (explicitly or by dropping it) cancels all of them, so no scheduled
//! mutation can land after the panel is gone.

use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use iterate_types::{Attachment, AttachmentId, Message, PlaybackId, RawAttachment};

use crate::attachments::AttachmentStore;
use crate::catalog::ScenarioCatalog;
use crate::config::PanelConfig;
use crate::error::AttachmentError;
use crate::playback::PlaybackScheduler;
use crate::preview::PreviewBackend;
use crate::reveal::{CardKey, RevealCard, RevealEngine, RevealEvent};
use crate::timeline::{SharedTimeline, TimelineEvent, shared_timeline};

pub struct ChatPanel {
    timeline: SharedTimeline,
    attachments: AttachmentStore,
    scheduler: PlaybackScheduler,
    reveal: RevealEngine,
    listener: JoinHandle<()>,
}

impl ChatPanel {
    /// Build a panel. Must be called inside a tokio runtime.
    pub fn new<B: PreviewBackend + 'static>(
        config: &PanelConfig,
        catalog: Arc<dyn ScenarioCatalog>,
        backend: Arc<B>,
    ) -> Self {
        let timeline = shared_timeline(config.greeting.as_deref());
        let reveal = RevealEngine::new(config.reveal);
        let listener = reveal.follow(timeline.read().subscribe());

        let scheduler = match config.seed {
            Some(seed) => PlaybackScheduler::with_rng(
                timeline.clone(),
                catalog,
                config.playback,
                StdRng::seed_from_u64(seed),
            ),
            None => PlaybackScheduler::new(timeline.clone(), catalog, config.playback),
        };

        tracing::debug!(seed = ?config.seed, "chat panel ready");
        Self {
            timeline,
            attachments: AttachmentStore::new(backend),
            scheduler,
            reveal,
            listener,
        }
    }

    /// Send `text` with every pending attachment and start a scripted reply.
    ///
    /// Blank text with no pending attachments does nothing and returns `None`.
    pub fn submit(&mut self, text: &str) -> Option<PlaybackId> {
        if text.trim().is_empty() && self.attachments.is_empty() {
            return None;
        }
        let attachments = self.attachments.drain_for_send();
        self.scheduler.submit(text, attachments)
    }

    pub fn add_attachment(&mut self, raw: RawAttachment) -> Result<AttachmentId, AttachmentError> {
        self.attachments.add(raw)
    }

    /// Add the first image among pasted clipboard items.
    ///
    /// `Ok(None)` when nothing pasted was an image.
    pub fn paste(
        &mut self,
        items: impl IntoIterator<Item = RawAttachment>,
    ) -> Result<Option<AttachmentId>, AttachmentError> {
        match RawAttachment::from_clipboard(items) {
            Some(raw) => self.attachments.add(raw).map(Some),
            None => Ok(None),
        }
    }

    pub fn remove_attachment(&mut self, id: AttachmentId) -> bool {
        self.attachments.remove(id)
    }

    pub fn pending_attachments(&self) -> &[Attachment] {
        self.attachments.pending()
    }

    /// Snapshot of the timeline, in order.
    pub fn messages(&self) -> Vec<Message> {
        self.timeline.read().snapshot()
    }

    pub fn reveal_card(&self, key: CardKey) -> Option<RevealCard> {
        self.reveal.card(key)
    }

    pub fn toggle_card(&self, key: CardKey) -> Option<bool> {
        self.reveal.toggle_expanded(key)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TimelineEvent> {
        self.timeline.read().subscribe()
    }

    pub fn subscribe_reveals(&self) -> broadcast::Receiver<RevealEvent> {
        self.reveal.subscribe()
    }

    pub fn cancel(&mut self, id: PlaybackId) -> bool {
        self.scheduler.cancel(id)
    }

    /// Number of playbacks still running.
    pub fn active_playbacks(&self) -> usize {
        self.scheduler.active()
    }

    /// Wait for every playback started so far to end.
    pub async fn wait_idle(&mut self) {
        self.scheduler.wait_idle().await;
    }

    /// Cancel all playbacks and reveals. The timeline keeps its messages.
    pub fn teardown(&mut self) {
        self.scheduler.cancel_all();
        self.reveal.shutdown();
        self.listener.abort();
        tracing::debug!("chat panel torn down");
    }

    /// Current timeline as pretty JSON.
    pub fn transcript_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self.timeline.read().messages())
    }
}

impl Drop for ChatPanel {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::catalog::StaticCatalog;
    use crate::preview::BlobUrlBackend;
    use iterate_types::{Role, Scenario};

    fn panel() -> (ChatPanel, Arc<BlobUrlBackend>) {
        let backend = Arc::new(BlobUrlBackend::new());
        let catalog = StaticCatalog::new(vec![Scenario::new(vec![], "done")]).unwrap();
        let config = PanelConfig {
            seed: Some(7),
            ..PanelConfig::default()
        };
        (ChatPanel::new(&config, Arc::new(catalog), backend.clone()), backend)
    }

    #[tokio::test(start_paused = true)]
    async fn test_starts_with_greeting() {
        let (panel, _) = panel();
        let messages = panel.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, Role::Assistant);
    }

    #[tokio::test(start_paused = true)]
    async fn test_blank_submit_is_noop() {
        let (mut panel, _) = panel();
        assert!(panel.submit("   ").is_none());
        assert_eq!(panel.messages().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attachment_only_submit_drains_store() {
        let (mut panel, backend) = panel();
        panel
            .add_attachment(RawAttachment::new("a.png", "image/png", vec![1]))
            .unwrap();
        assert!(panel.submit("").is_some());
        assert!(panel.pending_attachments().is_empty());

        let sent = &panel.messages()[1];
        assert_eq!(sent.attachments.as_ref().map(Vec::len), Some(1));
        assert_eq!(backend.live_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_paste_takes_first_image() {
        let (mut panel, _) = panel();
        let items = vec![
            RawAttachment::new("notes.txt", "text/plain", vec![]),
            RawAttachment::new("", "image/png", vec![1]),
        ];
        assert!(panel.paste(items).unwrap().is_some());
        assert_eq!(panel.pending_attachments()[0].name, "pasted-image.png");

        let text_only = vec![RawAttachment::new("notes.txt", "text/plain", vec![])];
        assert_eq!(panel.paste(text_only).unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_stops_playback() {
        let (mut panel, _) = panel();
        panel.submit("hello").unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        panel.teardown();
        tokio::time::sleep(Duration::from_secs(30)).await;

        // greeting + user message only
        assert_eq!(panel.messages().len(), 2);
        assert_eq!(panel.active_playbacks(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transcript_json() {
        let (mut panel, _) = panel();
        panel.submit("hello").unwrap();
        let json: serde_json::Value = serde_json::from_str(&panel.transcript_json().unwrap()).unwrap();
        assert_eq!(json.as_array().unwrap().len(), 2);
        assert_eq!(json[1]["content"], "hello");
        assert_eq!(json[1]["role"], "user");
    }
}
