//! The ordered message log rendered by the chat panel.
//!
//! # Mutation rules
//!
//! - Messages are appended; the only removal is of a playback's thinking
//!   placeholder ([`Timeline::remove_placeholder`]).
//! - An appended message must carry content, attachments, or file changes;
//!   the placeholder is the one empty message allowed.
//! - Appended messages are never edited. Reveal progress lives in the
//!   [`RevealEngine`](crate::reveal::RevealEngine), not here.
//!
//! Every mutation is broadcast as a [`TimelineEvent`] so render surfaces can
//! follow along without polling.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;

use iterate_types::{Message, MessageId};

use crate::error::TimelineError;

/// Capacity of the timeline event channel.
const EVENT_CAPACITY: usize = 1024;

/// Events broadcast when the timeline changes.
#[derive(Clone, Debug)]
pub enum TimelineEvent {
    /// A message was appended at the end.
    Appended(Message),
    /// A placeholder was removed.
    Removed(MessageId),
}

/// Ordered log of messages.
#[derive(Debug)]
pub struct Timeline {
    messages: Vec<Message>,
    event_tx: broadcast::Sender<TimelineEvent>,
}

/// Timeline shared between the panel and its playback tasks.
pub type SharedTimeline = Arc<RwLock<Timeline>>;

/// Create a shared timeline, optionally seeded with a greeting.
pub fn shared_timeline(greeting: Option<&str>) -> SharedTimeline {
    let timeline = match greeting {
        Some(text) => Timeline::with_greeting(text),
        None => Timeline::new(),
    };
    Arc::new(RwLock::new(timeline))
}

impl Timeline {
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            messages: Vec::new(),
            event_tx,
        }
    }

    /// A timeline whose first message is an assistant greeting.
    pub fn with_greeting(text: &str) -> Self {
        let mut timeline = Self::new();
        if !text.is_empty() {
            timeline.messages.push(Message::assistant(text));
        }
        timeline
    }

    /// Append a message at the end.
    pub fn append(&mut self, message: Message) -> Result<MessageId, TimelineError> {
        if message.is_empty() && !message.is_placeholder() {
            return Err(TimelineError::EmptyMessage(message.id));
        }
        let id = message.id;
        tracing::trace!(message = %id, role = %message.role, "timeline append");
        self.messages.push(message.clone());
        let _ = self.event_tx.send(TimelineEvent::Appended(message));
        Ok(id)
    }

    /// Remove a thinking placeholder.
    pub fn remove_placeholder(&mut self, id: MessageId) -> Result<Message, TimelineError> {
        let pos = self
            .messages
            .iter()
            .position(|m| m.id == id)
            .ok_or(TimelineError::NotFound(id))?;
        if !self.messages[pos].is_placeholder() {
            return Err(TimelineError::NotPlaceholder(id));
        }
        let removed = self.messages.remove(pos);
        tracing::trace!(message = %id, "timeline placeholder removed");
        let _ = self.event_tx.send(TimelineEvent::Removed(id));
        Ok(removed)
    }

    /// Read-only copy of the current messages, in order.
    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.clone()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Subscribe to future mutations.
    pub fn subscribe(&self) -> broadcast::Receiver<TimelineEvent> {
        self.event_tx.subscribe()
    }
}

impl Default for Timeline {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iterate_types::{FileAction, FileChange, Role};

    #[test]
    fn test_greeting_seeds_timeline() {
        let timeline = Timeline::with_greeting("hi there");
        assert_eq!(timeline.len(), 1);
        assert_eq!(timeline.messages()[0].role, Role::Assistant);
        assert_eq!(timeline.messages()[0].content, "hi there");

        assert!(Timeline::with_greeting("").is_empty());
    }

    #[test]
    fn test_append_preserves_order() {
        let mut timeline = Timeline::new();
        let a = timeline.append(Message::user("one", vec![])).unwrap();
        let b = timeline.append(Message::assistant("two")).unwrap();
        let ids: Vec<_> = timeline.messages().iter().map(|m| m.id).collect();
        assert_eq!(ids, [a, b]);
        assert_eq!(timeline.get(b).unwrap().content, "two");
    }

    #[test]
    fn test_empty_message_rejected() {
        let mut timeline = Timeline::new();
        let empty = Message::user("", vec![]);
        let id = empty.id;
        assert_eq!(timeline.append(empty), Err(TimelineError::EmptyMessage(id)));
        assert!(timeline.is_empty());

        // An empty burst is just as empty
        assert!(timeline.append(Message::file_changes(vec![])).is_err());
    }

    #[test]
    fn test_placeholder_allowed_and_removable() {
        let mut timeline = Timeline::new();
        timeline.append(Message::user("hello", vec![])).unwrap();
        let ph = timeline.append(Message::placeholder()).unwrap();
        assert_eq!(timeline.len(), 2);

        let removed = timeline.remove_placeholder(ph).unwrap();
        assert!(removed.is_placeholder());
        assert_eq!(timeline.len(), 1);
        assert_eq!(timeline.remove_placeholder(ph), Err(TimelineError::NotFound(ph)));
    }

    #[test]
    fn test_regular_messages_cannot_be_removed() {
        let mut timeline = Timeline::new();
        let card = FileChange::new("thinking", "a.ts", FileAction::Creating, vec!["x".into()]);
        let id = timeline.append(Message::file_changes(vec![card])).unwrap();
        assert_eq!(timeline.remove_placeholder(id), Err(TimelineError::NotPlaceholder(id)));
        assert_eq!(timeline.len(), 1);
    }

    #[test]
    fn test_events_follow_mutations() {
        let mut timeline = Timeline::new();
        let mut rx = timeline.subscribe();

        let ph = timeline.append(Message::placeholder()).unwrap();
        timeline.remove_placeholder(ph).unwrap();

        match rx.try_recv().unwrap() {
            TimelineEvent::Appended(m) => assert_eq!(m.id, ph),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(rx.try_recv().unwrap(), TimelineEvent::Removed(id) if id == ph));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_shared_timeline_greeting() {
        let shared = shared_timeline(Some("welcome"));
        assert_eq!(shared.read().len(), 1);
        assert!(shared_timeline(None).read().is_empty());
    }
}
