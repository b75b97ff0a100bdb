//! Fan-out of model notifications to any number of listeners.

use tokio::sync::mpsc;

/// A list of unbounded senders; every emitted event is cloned to each.
///
/// Listeners that dropped their receiver are pruned on the next emit.
#[derive(Debug)]
pub struct Subscribers<T> {
    senders: Vec<mpsc::UnboundedSender<T>>,
}

impl<T> Default for Subscribers<T> {
    fn default() -> Self {
        Self {
            senders: Vec::new(),
        }
    }
}

impl<T: Clone> Subscribers<T> {
    /// Create an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a listener and return its receiving end.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.push(tx);
        rx
    }

    /// Deliver `event` to every live listener.
    pub fn emit(&mut self, event: &T) {
        self.senders.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Number of listeners as of the last emit.
    pub fn len(&self) -> usize {
        self.senders.len()
    }

    /// Returns `true` if nobody is listening.
    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dropped_listeners_are_pruned() {
        let mut subscribers = Subscribers::new();
        let mut kept = subscribers.subscribe();
        let dropped = subscribers.subscribe();
        drop(dropped);

        subscribers.emit(&7u32);
        assert_eq!(subscribers.len(), 1);
        assert_eq!(kept.try_recv().ok(), Some(7));
    }
}
