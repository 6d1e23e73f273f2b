//! Single-slot, newest-wins hand-off between a producer thread and the tick loop.

use crossbeam_channel as xch;

/// Receiving end, read once per tick.
pub struct Mailbox<T> {
    tx: xch::Sender<T>,
    rx: xch::Receiver<T>,
}

/// Producer handle; cheap to clone.
pub struct Publisher<T> {
    tx: xch::Sender<T>,
    rx: xch::Receiver<T>,
}

impl<T> Clone for Publisher<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            rx: self.rx.clone(),
        }
    }
}

impl<T> Default for Mailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Mailbox<T> {
    pub fn new() -> Self {
        let (tx, rx) = xch::bounded(1);
        Self { tx, rx }
    }

    pub fn publisher(&self) -> Publisher<T> {
        Publisher {
            tx: self.tx.clone(),
            rx: self.rx.clone(),
        }
    }

    /// Take the newest unread value, if any.
    pub fn take(&self) -> Option<T> {
        self.rx.try_recv().ok()
    }
}

impl<T> Publisher<T> {
    /// Publish `value`, replacing any value the consumer has not read yet.
    pub fn publish(&self, value: T) {
        let mut value = value;
        loop {
            match self.tx.try_send(value) {
                Ok(()) | Err(xch::TrySendError::Disconnected(_)) => return,
                Err(xch::TrySendError::Full(v)) => {
                    let _stale = self.rx.try_recv();
                    value = v;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newest_value_wins() {
        let mb = Mailbox::new();
        let p = mb.publisher();
        p.publish(1);
        p.publish(2);
        p.publish(3);
        assert_eq!(mb.take(), Some(3));
        assert_eq!(mb.take(), None);
    }

    #[test]
    fn publishers_from_other_threads() {
        let mb = Mailbox::new();
        let p = mb.publisher();
        std::thread::spawn(move || p.publish("frame")).join().unwrap();
        assert_eq!(mb.take(), Some("frame"));
    }
}
