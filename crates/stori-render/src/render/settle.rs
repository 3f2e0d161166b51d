//! Single-resolution result delivery: the first writer wins, later attempts
//! are ignored.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender};

#[derive(Debug)]
struct Shared<T> {
    settled: AtomicBool,
    sender: Sender<T>,
}

#[derive(Debug)]
pub struct Settler<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Settler<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> Settler<T> {
    /// Delivers `value` if nothing was delivered before. Returns whether this
    /// call resolved the result.
    pub fn settle(&self, value: T) -> bool {
        if self
            .shared
            .settled
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        // Capacity one and a single successful writer: never full. The
        // receiver may already be gone, which is fine.
        let _ = self.shared.sender.try_send(value);
        true
    }

    pub fn is_settled(&self) -> bool {
        self.shared.settled.load(Ordering::Acquire)
    }
}

pub fn settle_once<T>() -> (Settler<T>, Receiver<T>) {
    let (sender, receiver) = bounded(1);
    let shared = Arc::new(Shared {
        settled: AtomicBool::new(false),
        sender,
    });
    (Settler { shared }, receiver)
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn first_writer_wins() {
        let (settler, receiver) = settle_once();
        assert!(settler.settle(1));
        assert!(!settler.settle(2));
        assert_eq!(receiver.recv().ok(), Some(1));
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn racing_writers_resolve_once() {
        let (settler, receiver) = settle_once();
        let winners: usize = (0..8)
            .map(|index| {
                let settler = settler.clone();
                thread::spawn(move || settler.settle(index))
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|handle| usize::from(handle.join().unwrap_or(false)))
            .sum();
        assert_eq!(winners, 1);
        assert!(receiver.recv().is_ok());
        assert!(receiver.try_recv().is_err());
    }
}
