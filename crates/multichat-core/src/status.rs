//! Transient status banner. One slot; a new status replaces the old one.

use std::time::{Duration, Instant};

pub const STATUS_TTL: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Success,
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub message: String,
    pub level: StatusLevel,
    pub shown_at: Instant,
}

#[derive(Debug, Default)]
pub struct StatusLine {
    current: Option<Status>,
}

impl StatusLine {
    pub fn show(&mut self, message: impl Into<String>, level: StatusLevel) {
        self.show_at(message, level, Instant::now());
    }

    pub fn show_at(&mut self, message: impl Into<String>, level: StatusLevel, at: Instant) {
        self.current = Some(Status {
            message: message.into(),
            level,
            shown_at: at,
        });
    }

    /// The visible status at `now`, if it has not yet expired.
    pub fn visible_at(&self, now: Instant) -> Option<&Status> {
        self.current
            .as_ref()
            .filter(|s| now.saturating_duration_since(s.shown_at) < STATUS_TTL)
    }

    pub fn visible(&self) -> Option<&Status> {
        self.visible_at(Instant::now())
    }

    /// The last status shown, expired or not.
    pub fn last(&self) -> Option<&Status> {
        self.current.as_ref()
    }

    /// Drop the status once it has expired. Returns true if something was removed.
    pub fn expire(&mut self, now: Instant) -> bool {
        if self.current.is_some() && self.visible_at(now).is_none() {
            self.current = None;
            return true;
        }
        false
    }
}
