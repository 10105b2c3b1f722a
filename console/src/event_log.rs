use std::collections::VecDeque;
use time::macros::format_description;
use time::OffsetDateTime;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::types::{Event, EventKind};

pub const EVENT_LOG_CAPACITY: usize = 50;

/// Bounded in-memory log of monitor activity, newest entry first.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    entries: VecDeque<Event>,
}

impl EventLog {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::with_capacity(EVENT_LOG_CAPACITY),
        }
    }

    /// Record an event, evicting the oldest one once the log is full.
    pub fn push(&mut self, message: impl Into<String>, kind: EventKind) -> &Event {
        let message = message.into();
        match kind {
            EventKind::Error => error!(kind = kind.as_str(), "{}", message),
            EventKind::Warning => warn!(kind = kind.as_str(), "{}", message),
            EventKind::Info | EventKind::Success => info!(kind = kind.as_str(), "{}", message),
        }

        if self.entries.len() == EVENT_LOG_CAPACITY {
            self.entries.pop_back();
        }
        self.entries.push_front(Event {
            id: Uuid::new_v4(),
            timestamp: now_hms(),
            message,
            kind,
        });
        &self.entries[0]
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn latest(&self) -> Option<&Event> {
        self.entries.front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.entries.iter()
    }

    pub fn to_vec(&self) -> Vec<Event> {
        self.entries.iter().cloned().collect()
    }
}

fn now_hms() -> String {
    OffsetDateTime::now_utc()
        .format(format_description!("[hour]:[minute]:[second]"))
        .unwrap_or_default()
}
