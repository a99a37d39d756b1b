//! Event sinks
//!
//! Transports and ranging engines report what happens to them from their own
//! threads and callbacks. They do so through an [`EventSink`], which forwards
//! into one channel owned by the orchestrator so that every event is applied
//! in arrival order on a single task.

use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Cloneable, type-erased sender for events of type `T`
pub struct EventSink<T> {
    deliver: Arc<dyn Fn(T) -> bool + Send + Sync>,
}

impl<T> Clone for EventSink<T> {
    fn clone(&self) -> Self {
        Self {
            deliver: Arc::clone(&self.deliver),
        }
    }
}

impl<T> fmt::Debug for EventSink<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSink").finish_non_exhaustive()
    }
}

impl<T: Send + 'static> EventSink<T> {
    /// Forward events into `tx`, wrapping each with `wrap`
    pub fn new<U: Send + 'static>(tx: mpsc::UnboundedSender<U>, wrap: fn(T) -> U) -> Self {
        Self {
            deliver: Arc::new(move |event| tx.send(wrap(event)).is_ok()),
        }
    }

    /// Sink plus the receiver it feeds
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<T>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx, std::convert::identity), rx)
    }

    /// Sink that drops everything
    pub fn discard() -> Self {
        Self {
            deliver: Arc::new(|_| false),
        }
    }

    /// Deliver an event. Returns `false` once the receiving side is gone.
    pub fn emit(&self, event: T) -> bool {
        (self.deliver)(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    enum Wrapped {
        Number(u32),
    }

    #[test]
    fn test_sink_wraps_events() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = EventSink::new(tx, Wrapped::Number);
        assert!(sink.clone().emit(3));
        assert_eq!(rx.try_recv().ok(), Some(Wrapped::Number(3)));
    }

    #[test]
    fn test_emit_reports_closed_receiver() {
        let (sink, rx) = EventSink::<u32>::channel();
        drop(rx);
        assert!(!sink.emit(1));
        assert!(!EventSink::<u32>::discard().emit(1));
    }
}
