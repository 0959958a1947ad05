//! Event sinks
//!
//! A run delivers its events to exactly one sink, one at a time, in the order
//! the stream workers handed them over. Sinks never see concurrent calls.

use async_trait::async_trait;
use insight_core::Event;
use tokio::sync::mpsc;

/// Receiver of normalized events
#[async_trait]
pub trait EventSink: Send {
    async fn accept(&mut self, event: Event);
}

#[async_trait]
impl EventSink for Vec<Event> {
    async fn accept(&mut self, event: Event) {
        self.push(event);
    }
}

#[async_trait]
impl EventSink for mpsc::Sender<Event> {
    async fn accept(&mut self, event: Event) {
        if self.send(event).await.is_err() {
            tracing::debug!("event receiver dropped");
        }
    }
}

#[async_trait]
impl<S: EventSink + ?Sized> EventSink for &mut S {
    async fn accept(&mut self, event: Event) {
        (**self).accept(event).await;
    }
}
