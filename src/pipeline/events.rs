//! Status change notifications backed by a `tokio::sync::broadcast` channel.
//!
//! The coordinator publishes a [`StatusEvent`] on every pipeline transition
//! so a UI can react to pushes instead of polling submission state.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use super::status::{PipelineKind, StatusView};

/// One observed transition of one pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusEvent {
    pub submission_id: Uuid,
    pub pipeline: PipelineKind,
    pub status: StatusView,
    /// Segmentation sub-status, carried by transcription events once the
    /// transcript exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segmentation: Option<StatusView>,
}

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 256;

/// Fan-out publisher for [`StatusEvent`]s.
///
/// Cheap to clone; every clone publishes into the same channel.
#[derive(Clone)]
pub struct StatusBus {
    sender: broadcast::Sender<StatusEvent>,
}

impl StatusBus {
    /// When the buffer is full the oldest events are dropped and slow
    /// receivers observe `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn publish(&self, event: StatusEvent) {
        // Err only means nobody is listening.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for StatusBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::status::PipelineStatus;

    fn event(pipeline: PipelineKind) -> StatusEvent {
        StatusEvent {
            submission_id: Uuid::nil(),
            pipeline,
            status: PipelineStatus::<()>::Running { progress: 10 }.view(),
            segmentation: None,
        }
    }

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let bus = StatusBus::default();
        let mut rx = bus.subscribe();

        bus.publish(event(PipelineKind::Frames));

        let received = rx.recv().await.unwrap();
        assert_eq!(received.pipeline, PipelineKind::Frames);
        assert_eq!(received.status.progress_percent, 10);
    }

    #[test]
    fn publish_without_subscribers_does_not_panic() {
        let bus = StatusBus::new(4);
        assert_eq!(bus.subscriber_count(), 0);
        bus.publish(event(PipelineKind::Transcription));
    }

    #[tokio::test]
    async fn every_subscriber_gets_every_event() {
        let bus = StatusBus::default();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        bus.publish(event(PipelineKind::Frames));
        bus.publish(event(PipelineKind::Transcription));

        for rx in [&mut a, &mut b] {
            assert_eq!(rx.recv().await.unwrap().pipeline, PipelineKind::Frames);
            assert_eq!(rx.recv().await.unwrap().pipeline, PipelineKind::Transcription);
        }
    }
}
