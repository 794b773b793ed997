//! Short-lived buffer of raw transport lines.
//!
//! Whatever the leader prints, reports or not, is shown to the operator
//! for a few seconds so replies to typed commands are visible. Lines older
//! than the retention window are pruned on every access.

use std::collections::VecDeque;

use chrono::{DateTime, TimeDelta, Utc};

/// Upper bound on buffered lines regardless of age.
const MAX_LINES: usize = 200;

/// Recent raw lines with their arrival time.
#[derive(Debug, Clone)]
pub struct ConsoleLog {
    retention: TimeDelta,
    lines: VecDeque<(DateTime<Utc>, String)>,
}

impl ConsoleLog {
    /// Create a buffer keeping lines for `retention_secs` seconds.
    pub fn new(retention_secs: u64) -> Self {
        let retention = i64::try_from(retention_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .unwrap_or(TimeDelta::MAX);
        Self {
            retention,
            lines: VecDeque::new(),
        }
    }

    /// Record a line received at `now`.
    pub fn push(&mut self, line: impl Into<String>, now: DateTime<Utc>) {
        self.prune(now);
        if self.lines.len() >= MAX_LINES {
            self.lines.pop_front();
        }
        self.lines.push_back((now, line.into()));
    }

    /// Lines still inside the retention window at `now`, oldest first.
    pub fn recent(&mut self, now: DateTime<Utc>) -> Vec<String> {
        self.prune(now);
        self.lines.iter().map(|(_, line)| line.clone()).collect()
    }

    fn prune(&mut self, now: DateTime<Utc>) {
        while self
            .lines
            .front()
            .is_some_and(|(at, _)| now.signed_duration_since(*at) > self.retention)
        {
            self.lines.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(secs: i64) -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH + TimeDelta::seconds(secs)
    }

    #[test]
    fn lines_expire_after_retention() {
        let mut log = ConsoleLog::new(5);
        log.push("first", t(0));
        log.push("second", t(3));
        assert_eq!(log.recent(t(5)), vec!["first".to_owned(), "second".to_owned()]);
        assert_eq!(log.recent(t(6)), vec!["second".to_owned()]);
        assert!(log.recent(t(20)).is_empty());
    }

    #[test]
    fn buffer_is_bounded() {
        let mut log = ConsoleLog::new(60);
        for i in 0..(MAX_LINES + 10) {
            log.push(format!("line {i}"), t(0));
        }
        let recent = log.recent(t(0));
        assert_eq!(recent.len(), MAX_LINES);
        assert_eq!(recent.first().map(String::as_str), Some("line 10"));
    }
}
