//! Rate-limited delivery of status notifications to a local sink.
//!
//! The session surfaces human-readable status strings ("Disconnected from
//! server" and friends) through a caller-provided sink. Transport flap can
//! produce these in rapid bursts, so deliveries are bounded to one per
//! minimum interval. Messages marked prioritized always go through.
//!
//! This gate applies to local notifications only; protocol messages are
//! never throttled.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Callback receiving delivered notification strings.
pub type MessageSink = Box<dyn Fn(&str) + Send + Sync>;

/// Throttling gate in front of a [`MessageSink`].
pub struct Notifier {
    sink: MessageSink,
    min_interval: Duration,
    /// Time of the last delivered notification. Drops do not advance it.
    last_delivery: Mutex<Option<Instant>>,
}

impl Notifier {
    /// Minimum time between non-prioritized deliveries.
    pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(5_000);

    #[must_use]
    pub fn new(sink: MessageSink) -> Self {
        Self::with_interval(sink, Self::DEFAULT_INTERVAL)
    }

    #[must_use]
    pub fn with_interval(sink: MessageSink, min_interval: Duration) -> Self {
        Self {
            sink,
            min_interval,
            last_delivery: Mutex::new(None),
        }
    }

    /// Offers a notification to the sink, subject to throttling.
    ///
    /// Returns whether the notification was delivered.
    pub fn post(&self, text: &str) -> bool {
        self.offer(text, false, Instant::now())
    }

    /// Delivers a notification unconditionally, bypassing the throttle.
    ///
    /// Used for one-time operator-facing messages such as a newly issued
    /// session key.
    pub fn post_prioritized(&self, text: &str) -> bool {
        self.offer(text, true, Instant::now())
    }

    fn offer(&self, text: &str, prioritized: bool, now: Instant) -> bool {
        let mut last_delivery = match self.last_delivery.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let due = last_delivery
            .is_none_or(|last| now.saturating_duration_since(last) >= self.min_interval);
        if prioritized || due {
            (self.sink)(text);
            *last_delivery = Some(now);
            true
        } else {
            trace!("dropping throttled notification: {text}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn capturing() -> (MessageSink, Arc<Mutex<Vec<String>>>) {
        let delivered = Arc::new(Mutex::new(Vec::new()));
        let captured = Arc::clone(&delivered);
        let sink: MessageSink = Box::new(move |text: &str| {
            captured.lock().unwrap().push(text.to_string());
        });
        (sink, delivered)
    }

    #[test]
    fn delivers_first_then_throttles_then_recovers() {
        let (sink, delivered) = capturing();
        let gate = Notifier::new(sink);
        let epoch = Instant::now();

        assert!(gate.offer("one", false, epoch));
        assert!(!gate.offer("two", false, epoch + Duration::from_millis(2_000)));
        assert!(gate.offer("three", false, epoch + Duration::from_millis(6_000)));

        assert_eq!(*delivered.lock().unwrap(), vec!["one", "three"]);
    }

    #[test]
    fn prioritized_always_delivers() {
        let (sink, delivered) = capturing();
        let gate = Notifier::new(sink);
        let epoch = Instant::now();

        assert!(gate.offer("one", false, epoch));
        assert!(gate.offer("urgent", true, epoch + Duration::from_millis(2_000)));
        assert_eq!(*delivered.lock().unwrap(), vec!["one", "urgent"]);
    }

    #[test]
    fn prioritized_delivery_restarts_the_window() {
        let (sink, delivered) = capturing();
        let gate = Notifier::new(sink);
        let epoch = Instant::now();

        assert!(gate.offer("urgent", true, epoch + Duration::from_millis(2_000)));
        // 4s after the prioritized delivery, still inside the window.
        assert!(!gate.offer("late", false, epoch + Duration::from_millis(6_000)));
        // 5s after it, due again.
        assert!(gate.offer("later", false, epoch + Duration::from_millis(7_000)));

        assert_eq!(*delivered.lock().unwrap(), vec!["urgent", "later"]);
    }

    #[test]
    fn drops_do_not_advance_the_window() {
        let (sink, delivered) = capturing();
        let gate = Notifier::with_interval(sink, Duration::from_millis(100));
        let epoch = Instant::now();

        assert!(gate.offer("one", false, epoch));
        // Repeated drops inside the window must not push the window forward.
        assert!(!gate.offer("x", false, epoch + Duration::from_millis(50)));
        assert!(!gate.offer("x", false, epoch + Duration::from_millis(90)));
        assert!(gate.offer("two", false, epoch + Duration::from_millis(100)));

        assert_eq!(*delivered.lock().unwrap(), vec!["one", "two"]);
    }
}
