//! Main-thread message queue
//!
//! Workers hold a [`Poster`]; only the owning thread drains the [`Mailbox`].

use flume::{Receiver, Sender};
use tracing::trace;

pub struct Mailbox<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
}

impl<T> Default for Mailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Mailbox<T> {
    pub fn new() -> Self {
        let (tx, rx) = flume::unbounded();
        Self { tx, rx }
    }

    /// Sending half for a worker or callback
    pub fn poster(&self) -> Poster<T> {
        Poster {
            tx: self.tx.clone(),
        }
    }

    /// Everything posted so far, without blocking
    pub fn drain(&self) -> impl Iterator<Item = T> + '_ {
        self.rx.try_iter()
    }

    pub fn try_recv(&self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    /// Block up to `timeout` for one message
    pub fn recv_timeout(&self, timeout: std::time::Duration) -> Option<T> {
        self.rx.recv_timeout(timeout).ok()
    }
}

pub struct Poster<T> {
    tx: Sender<T>,
}

impl<T> Clone for Poster<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T> Poster<T> {
    /// Returns false once the mailbox is gone; the message is dropped
    pub fn post(&self, msg: T) -> bool {
        if self.tx.send(msg).is_err() {
            trace!("Mailbox closed, dropping message");
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_from_threads_drain_on_owner() {
        let mailbox = Mailbox::new();
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let poster = mailbox.poster();
                std::thread::spawn(move || poster.post(i))
            })
            .collect();
        for h in handles {
            assert!(h.join().unwrap());
        }

        let mut got: Vec<i32> = mailbox.drain().collect();
        got.sort_unstable();
        assert_eq!(got, [0, 1, 2, 3]);
        assert!(mailbox.try_recv().is_none());
    }

    #[test]
    fn post_after_drop_reports_failure() {
        let mailbox = Mailbox::new();
        let poster = mailbox.poster();
        drop(mailbox);
        assert!(!poster.post(1u8));
    }
}
