use std::sync::Mutex;

use crate::notifier::NotificationSink;
use crate::respawn::RespawnTable;
use crate::session::LogSession;
use crate::tracker::{DeathTracker, Features, Notification};

#[derive(Debug, Default)]
pub(crate) struct RecordingSink {
    notifications: Mutex<Vec<Notification>>,
}

impl RecordingSink {
    pub(crate) fn messages(&self) -> Vec<String> {
        self.notifications
            .lock()
            .unwrap()
            .iter()
            .map(|notification| notification.message.clone())
            .collect()
    }
}

impl NotificationSink for RecordingSink {
    fn submit(&self, notification: Notification) {
        self.notifications.lock().unwrap().push(notification);
    }
}

pub(crate) fn build_recording_session() -> LogSession<RecordingSink> {
    LogSession::new(
        DeathTracker::new(Features::enriched(), RespawnTable::default()),
        RecordingSink::default(),
    )
}
