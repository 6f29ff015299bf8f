//! Reminder scheduler
//!
//! A min-heap of (trigger time, name) pairs. The main loop's one-second
//! tick drains every entry whose trigger time has passed and emits one due
//! event per entry, in ascending trigger order. Fired entries are gone for
//! good. Persistence is best-effort: cache errors are logged and swallowed
//! and a missing or corrupt cache yields an empty heap.

use chrono::{DateTime, Local, NaiveTime, Timelike};
use goblin_ipc::ReminderEntry;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fs;
use std::path::PathBuf;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReminderTimeError {
    #[error("invalid time format, use HHMM")]
    BadFormat,
    #[error("hour or minute out of range")]
    OutOfRange,
}

/// Parse an `HHMM` entry into a trigger datetime on today's date.
pub fn parse_hhmm(now: DateTime<Local>, text: &str) -> Result<DateTime<Local>, ReminderTimeError> {
    let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() != 4 || digits != text {
        return Err(ReminderTimeError::BadFormat);
    }
    let hour: u32 = digits[..2].parse().map_err(|_| ReminderTimeError::BadFormat)?;
    let minute: u32 = digits[2..].parse().map_err(|_| ReminderTimeError::BadFormat)?;
    if hour >= 24 || minute >= 60 {
        return Err(ReminderTimeError::OutOfRange);
    }
    let time = NaiveTime::from_hms_opt(hour, minute, 0).ok_or(ReminderTimeError::OutOfRange)?;
    now.with_time(time)
        .single()
        .ok_or(ReminderTimeError::OutOfRange)
}

pub struct ReminderScheduler {
    heap: BinaryHeap<Reverse<ReminderEntry>>,
    cache_path: PathBuf,
}

impl ReminderScheduler {
    /// Load the persisted heap, falling back to empty on any failure.
    pub fn load(cache_path: PathBuf) -> Self {
        let heap = match fs::read_to_string(&cache_path) {
            Ok(content) => match serde_json::from_str::<Vec<ReminderEntry>>(&content) {
                Ok(entries) => entries.into_iter().map(Reverse).collect(),
                Err(e) => {
                    error!("[reminders] cache unreadable: {}", e);
                    BinaryHeap::new()
                }
            },
            // Missing cache is the normal first-run case.
            Err(_) => BinaryHeap::new(),
        };
        Self { heap, cache_path }
    }

    pub fn add(&mut self, trigger: DateTime<Local>, name: impl Into<String>) {
        // Seconds are not part of the entry grammar.
        let trigger = trigger.with_second(0).and_then(|t| t.with_nanosecond(0)).unwrap_or(trigger);
        self.heap.push(Reverse(ReminderEntry {
            trigger,
            name: name.into(),
        }));
        self.persist();
    }

    /// Drop the next-due entry, if any.
    pub fn pop_next(&mut self) -> Option<ReminderEntry> {
        let popped = self.heap.pop().map(|Reverse(e)| e);
        if popped.is_some() {
            self.persist();
        }
        popped
    }

    /// Remove a specific entry by value equality.
    pub fn remove(&mut self, trigger: DateTime<Local>, name: &str) {
        let target = ReminderEntry {
            trigger,
            name: name.to_string(),
        };
        let heap = std::mem::take(&mut self.heap);
        self.heap = heap
            .into_iter()
            .filter(|Reverse(e)| *e != target)
            .collect();
        self.persist();
    }

    pub fn clear(&mut self) {
        self.heap.clear();
        self.persist();
    }

    /// Pop every entry whose trigger time has passed, in ascending order.
    pub fn pop_due(&mut self, now: DateTime<Local>) -> Vec<ReminderEntry> {
        let mut due = Vec::new();
        while let Some(Reverse(next)) = self.heap.peek() {
            if next.trigger > now {
                break;
            }
            if let Some(Reverse(entry)) = self.heap.pop() {
                due.push(entry);
            }
        }
        if !due.is_empty() {
            self.persist();
        }
        due
    }

    /// Entries sorted by trigger time, for display.
    pub fn entries_sorted(&self) -> Vec<ReminderEntry> {
        let mut entries: Vec<_> = self.heap.iter().map(|Reverse(e)| e.clone()).collect();
        entries.sort();
        entries
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Best-effort cache write; failures are logged, never surfaced.
    fn persist(&self) {
        let entries = self.entries_sorted();
        let result = serde_json::to_string(&entries)
            .map_err(anyhow::Error::from)
            .and_then(|json| {
                if let Some(parent) = self.cache_path.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(&self.cache_path, json)?;
                Ok(())
            });
        if let Err(e) = result {
            error!("[reminders] {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use tempfile::TempDir;

    fn scheduler() -> (TempDir, ReminderScheduler) {
        let dir = TempDir::new().unwrap();
        let sched = ReminderScheduler::load(dir.path().join("reminders.json"));
        (dir, sched)
    }

    fn at(hour: u32, minute: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 3, 14, hour, minute, 0).unwrap()
    }

    #[test]
    fn pops_in_nondecreasing_trigger_order() {
        let (_dir, mut sched) = scheduler();
        sched.add(at(14, 30), "late");
        sched.add(at(9, 0), "early");
        sched.add(at(12, 15), "middle");
        sched.add(at(9, 0), "also early");

        let mut previous: Option<DateTime<Local>> = None;
        while let Some(entry) = sched.pop_next() {
            if let Some(prev) = previous {
                assert!(entry.trigger >= prev);
            }
            previous = Some(entry.trigger);
        }
    }

    #[test]
    fn pop_due_fires_each_entry_once_in_order() {
        let (_dir, mut sched) = scheduler();
        sched.add(at(9, 0), "breakfast");
        sched.add(at(10, 0), "standup");
        sched.add(at(18, 0), "dinner");

        let due = sched.pop_due(at(10, 30));
        let names: Vec<_> = due.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["breakfast", "standup"]);

        // Nothing fires twice.
        assert!(sched.pop_due(at(10, 30)).is_empty());
        assert_eq!(sched.pop_due(at(19, 0)).len(), 1);
    }

    #[test]
    fn remove_targets_value_equality() {
        let (_dir, mut sched) = scheduler();
        sched.add(at(9, 0), "a");
        sched.add(at(9, 0), "b");
        sched.remove(at(9, 0), "a");

        let left = sched.entries_sorted();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].name, "b");
    }

    #[test]
    fn survives_reload_from_cache() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("reminders.json");
        {
            let mut sched = ReminderScheduler::load(path.clone());
            sched.add(at(9, 0), "persisted");
        }
        let mut reloaded = ReminderScheduler::load(path);
        assert_eq!(reloaded.pop_next().unwrap().name, "persisted");
    }

    #[test]
    fn corrupt_cache_yields_empty_heap() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("reminders.json");
        std::fs::write(&path, "not json at all").unwrap();
        let sched = ReminderScheduler::load(path);
        assert!(sched.is_empty());
    }

    #[test]
    fn parses_hhmm_entries() {
        let now = at(8, 0);
        let trigger = parse_hhmm(now, "0930").unwrap();
        assert_eq!(trigger, at(9, 30));

        assert_eq!(parse_hhmm(now, "2460"), Err(ReminderTimeError::OutOfRange));
        assert_eq!(parse_hhmm(now, "2399"), Err(ReminderTimeError::OutOfRange));
        assert_eq!(parse_hhmm(now, "93"), Err(ReminderTimeError::BadFormat));
        assert_eq!(parse_hhmm(now, "09:30"), Err(ReminderTimeError::BadFormat));
        assert_eq!(parse_hhmm(now, ""), Err(ReminderTimeError::BadFormat));
    }

    #[test]
    fn past_trigger_fires_on_next_tick() {
        let (_dir, mut sched) = scheduler();
        let now = at(12, 0);
        sched.add(now - Duration::minutes(5), "overdue");
        let due = sched.pop_due(now);
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].name, "overdue");
    }
}
