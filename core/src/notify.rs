//! Coalescing notifications between tasks
//!
//! Every channel here holds at most one pending notification. Sending never
//! blocks: if a notification is already waiting, the new one is dropped, so a
//! burst of sends is seen by the receiver as a single wake-up. Do not replace
//! this with an unbounded queue; workers rely on bursts collapsing.

use tokio::sync::mpsc;

/// Create a connected notifier/listener pair with room for one pending value
pub fn channel<T>() -> (Notifier<T>, Listener<T>) {
    let (tx, rx) = mpsc::channel(1);
    (Notifier { tx }, Listener { rx })
}

/// Sending half. Cheap to clone.
pub struct Notifier<T = ()> {
    tx: mpsc::Sender<T>,
}

impl<T> Clone for Notifier<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T> Notifier<T> {
    /// Queue `value` unless something is already pending.
    ///
    /// Returns `true` if the value was queued.
    pub fn send(&self, value: T) -> bool {
        self.tx.try_send(value).is_ok()
    }
}

impl Notifier<()> {
    pub fn notify(&self) -> bool {
        self.send(())
    }
}

/// Receiving half. Single consumer.
pub struct Listener<T = ()> {
    rx: mpsc::Receiver<T>,
}

impl<T> Listener<T> {
    /// Wait for the next notification. `None` once every notifier is gone.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Take the pending notification, if any
    pub fn try_recv(&mut self) -> Option<T> {
        self.rx.try_recv().ok()
    }
}

/// Termination fan-out: one stop channel per task, all triggered at once
#[derive(Default)]
pub struct Shutdown {
    stops: Vec<Notifier>,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task and get its dedicated stop listener
    pub fn subscribe(&mut self) -> Listener {
        let (tx, rx) = channel();
        self.stops.push(tx);
        rx
    }

    /// Add an existing stop notifier (e.g. a worker handle's)
    pub fn register(&mut self, stop: Notifier) {
        self.stops.push(stop);
    }

    /// Signal every registered task. Safe to call more than once.
    pub fn trigger(&self) {
        for stop in &self.stops {
            stop.notify();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_burst_coalesces_to_one() {
        let (tx, mut rx) = channel();
        assert!(tx.notify());
        assert!(!tx.notify());
        assert!(!tx.clone().notify());

        assert_eq!(rx.try_recv(), Some(()));
        assert_eq!(rx.try_recv(), None);

        assert!(tx.notify());
        assert_eq!(rx.recv().await, Some(()));
    }

    #[tokio::test]
    async fn test_first_value_wins_while_pending() {
        let (tx, mut rx) = channel::<usize>();
        assert!(tx.send(3));
        assert!(!tx.send(7));
        assert_eq!(rx.recv().await, Some(3));
    }

    #[tokio::test]
    async fn test_recv_ends_when_notifiers_dropped() {
        let (tx, mut rx) = channel::<()>();
        drop(tx);
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_shutdown_reaches_every_task() {
        let mut shutdown = Shutdown::new();
        let mut a = shutdown.subscribe();
        let mut b = shutdown.subscribe();
        let (stop, mut c) = channel();
        shutdown.register(stop);

        shutdown.trigger();
        shutdown.trigger();

        assert_eq!(a.recv().await, Some(()));
        assert_eq!(b.recv().await, Some(()));
        assert_eq!(c.recv().await, Some(()));
        assert_eq!(a.try_recv(), None);
    }
}
