//! Event relay: committed market events fan out over a broadcast channel.

use bourse_engine::EventSink;
use bourse_types::MarketEvent;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{info, warn};

/// [`EventSink`] publishing onto a `tokio` broadcast channel.
///
/// Sending never blocks the committing thread; slow subscribers lag and
/// lose the oldest events.
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<MarketEvent>,
}

impl BroadcastSink {
    /// A sink with room for `capacity` unread events per subscriber.
    /// Events sent before the first [`subscribe`](Self::subscribe) are dropped.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MarketEvent> {
        self.tx.subscribe()
    }
}

impl EventSink for BroadcastSink {
    fn emit(&self, event: MarketEvent) {
        // No subscribers is fine.
        let _ = self.tx.send(event);
    }
}

/// Log every relayed event until the channel closes.
pub async fn log_events(mut rx: broadcast::Receiver<MarketEvent>) {
    loop {
        match rx.recv().await {
            Ok(event) => match serde_json::to_string(&event) {
                Ok(json) => info!(target: "bourse::events", event = %json, "market event"),
                Err(err) => warn!(?event, %err, "unserializable market event"),
            },
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "event relay lagged"),
            Err(RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use bourse_types::{InstrumentId, InstrumentStatus};

    use super::*;

    fn status_change() -> MarketEvent {
        MarketEvent::InstrumentStatusChanged {
            instrument_id: InstrumentId::new(),
            from: InstrumentStatus::IpoActive,
            to: InstrumentStatus::Trading,
        }
    }

    #[tokio::test]
    async fn emitted_events_reach_every_subscriber() {
        let sink = BroadcastSink::new(8);
        let (mut first, mut second) = (sink.subscribe(), sink.subscribe());
        let event = status_change();
        sink.emit(event.clone());
        assert_eq!(first.recv().await.unwrap(), event);
        assert_eq!(second.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn emitting_without_subscribers_is_silent() {
        let sink = BroadcastSink::new(8);
        sink.emit(status_change());
        let mut late = sink.subscribe();
        assert!(late.try_recv().is_err());
    }

    #[tokio::test]
    async fn logger_stops_when_sink_is_dropped() {
        let sink = BroadcastSink::new(8);
        let rx = sink.subscribe();
        sink.emit(status_change());
        drop(sink);
        log_events(rx).await;
    }
}
