use chrono::NaiveDateTime;

use crate::log_source::split_log_line;
use crate::notifier::NotificationSink;
use crate::tracker::DeathTracker;

/// One monitored log: a tracker plus the sink its notifications go to.
#[derive(Debug)]
pub struct LogSession<S: NotificationSink> {
    tracker: DeathTracker,
    sink: S,
    notifications_submitted: u64,
}

impl<S: NotificationSink> LogSession<S> {
    pub fn new(tracker: DeathTracker, sink: S) -> Self {
        Self {
            tracker,
            sink,
            notifications_submitted: 0,
        }
    }

    /// Feeds an already framed line. Returns whether a notification was submitted.
    pub fn handle_line(&mut self, timestamp: NaiveDateTime, text: &str) -> bool {
        let Some(notification) = self.tracker.process_line(timestamp, text) else {
            return false;
        };

        self.sink.submit(notification);
        self.notifications_submitted = self.notifications_submitted.saturating_add(1);
        true
    }

    /// Frames a raw game-log line and feeds it. Unframed lines are skipped.
    pub fn handle_raw_line(&mut self, raw_line: &str) -> bool {
        let Some((timestamp, text)) = split_log_line(raw_line) else {
            tracing::debug!(line = %raw_line.trim_end(), "Skipping line without log timestamp");
            return false;
        };

        self.handle_line(timestamp, text)
    }

    pub fn tracker(&self) -> &DeathTracker {
        &self.tracker
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn notifications_submitted(&self) -> u64 {
        self.notifications_submitted
    }

    pub fn into_sink(self) -> S {
        self.sink
    }
}
