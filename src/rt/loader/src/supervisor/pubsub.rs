use std::sync::mpsc::{channel, Receiver, Sender};

use parking_lot::Mutex;

/// Fan-out of events to any number of subscribers. Subscribers whose receiver has been dropped
/// are removed on the next publish.
pub(crate) struct PubSub<T> {
    subscribers: Mutex<Vec<Sender<T>>>,
}

impl<T> Default for PubSub<T> {
    fn default() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }
}

impl<T: Clone + Send> PubSub<T> {
    pub fn subscribe(&self) -> Receiver<T> {
        let (send, recv) = channel();
        self.subscribers.lock().push(send);
        recv
    }

    pub fn publish(&self, event: T) {
        self.subscribers
            .lock()
            .retain(|sub| sub.send(event.clone()).is_ok());
    }
}
