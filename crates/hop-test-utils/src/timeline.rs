//! Shared event log for ordering assertions.
//!
//! Every fake records into the same [`Timeline`], so a test can check the
//! relative order of, say, remote completion and terminal restore.

use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Something a fake observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    SizeQueried,
    Established,
    EstablishFailed,
    RawEntered,
    InputOpened,
    RemoteCompleted,
    ChannelClosed,
    TransportClosed,
    Restored,
}

/// Ordered, timestamped record of [`Event`]s.
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    events: Arc<Mutex<Vec<(Event, Instant)>>>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, event: Event) {
        self.events.lock().unwrap().push((event, Instant::now()));
    }

    /// Events in the order they were recorded.
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().iter().map(|(e, _)| *e).collect()
    }

    /// When `event` was first recorded.
    pub fn first(&self, event: Event) -> Option<Instant> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .find(|(e, _)| *e == event)
            .map(|(_, at)| *at)
    }

    /// Index of the first occurrence of `event`.
    pub fn position(&self, event: Event) -> Option<usize> {
        self.events().iter().position(|e| *e == event)
    }

    pub fn count(&self, event: Event) -> usize {
        self.events().iter().filter(|e| **e == event).count()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_in_order() {
        let timeline = Timeline::new();
        let clone = timeline.clone();
        timeline.record(Event::Established);
        clone.record(Event::Restored);

        assert_eq!(timeline.events(), vec![Event::Established, Event::Restored]);
        assert_eq!(timeline.position(Event::Restored), Some(1));
        assert!(timeline.first(Event::Established) <= timeline.first(Event::Restored));
        assert_eq!(timeline.count(Event::ChannelClosed), 0);
    }
}
