//! Listener registry.
//!
//! Maps each pattern to an ordered list of listener records. Patterns keep
//! their first-registration order, and records keep their list order, so a
//! dispatch over several matching patterns is deterministic.
//!
//! The registry never keeps an empty list: removing the last record of a
//! pattern removes the pattern.
//!
//! Once-records stay registered until a dispatch reaches them. The dispatch
//! claims the record through its [`Target`] and then expires it, so a record
//! selected by several overlapping dispatches still fires only once.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::listener::Listener;
use crate::pattern::{has_wildcard, MatchOptions, Pattern};

/// A registered callback and whether it expires after one invocation.
#[derive(Debug, Clone)]
pub struct ListenerRecord {
    /// The callback.
    pub listener: Listener,
    /// Remove after the first invocation.
    pub once: bool,
    claimed: Arc<AtomicBool>,
}

impl ListenerRecord {
    /// Creates a record.
    pub fn new(listener: Listener, once: bool) -> Self {
        Self {
            listener,
            once,
            claimed: Arc::new(AtomicBool::new(false)),
        }
    }

    fn is_claimed(&self) -> bool {
        self.claimed.load(Ordering::SeqCst)
    }
}

/// A listener selected for one dispatch, with the pattern that matched it.
#[derive(Debug, Clone)]
pub struct Target {
    /// Registered pattern that matched the event name.
    pub pattern: String,
    /// The callback.
    pub listener: Listener,
    /// Whether the record expires after one invocation.
    pub once: bool,
    claimed: Arc<AtomicBool>,
}

impl Target {
    /// Reserves the invocation of this target.
    ///
    /// Always true for regular records. For a once-record only the first
    /// caller across all dispatches gets true.
    pub fn claim(&self) -> bool {
        !self.once || !self.claimed.swap(true, Ordering::SeqCst)
    }
}

#[derive(Debug)]
struct PatternEntry {
    pattern: Pattern,
    records: Vec<ListenerRecord>,
}

/// Ordered `pattern -> listeners` map.
#[derive(Debug, Default)]
pub struct Registry {
    options: MatchOptions,
    entries: Vec<PatternEntry>,
}

impl Registry {
    /// Creates an empty registry compiling patterns with `options`.
    pub fn new(options: MatchOptions) -> Self {
        Self {
            options,
            entries: Vec::new(),
        }
    }

    /// Appends a listener. Returns the pattern's new listener count.
    pub fn add_target(&mut self, pattern: &str, listener: Listener) -> usize {
        self.insert(pattern, ListenerRecord::new(listener, false), false)
    }

    /// Appends a once-listener. Returns the pattern's new listener count.
    pub fn add_target_once(&mut self, pattern: &str, listener: Listener) -> usize {
        self.insert(pattern, ListenerRecord::new(listener, true), false)
    }

    /// Inserts a listener ahead of all others. Returns the pattern's new listener count.
    pub fn prepend_target(&mut self, pattern: &str, listener: Listener) -> usize {
        self.insert(pattern, ListenerRecord::new(listener, false), true)
    }

    /// Inserts a once-listener ahead of all others. Returns the pattern's new listener count.
    pub fn prepend_target_once(&mut self, pattern: &str, listener: Listener) -> usize {
        self.insert(pattern, ListenerRecord::new(listener, true), true)
    }

    fn insert(&mut self, pattern: &str, record: ListenerRecord, front: bool) -> usize {
        let index = match self.position(pattern) {
            Some(index) => index,
            None => {
                self.entries.push(PatternEntry {
                    pattern: Pattern::compile(pattern, &self.options),
                    records: Vec::new(),
                });
                self.entries.len() - 1
            }
        };

        let records = &mut self.entries[index].records;
        if front {
            records.insert(0, record);
        } else {
            records.push(record);
        }
        records.len()
    }

    fn position(&self, pattern: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.pattern.as_str() == pattern)
    }

    /// Removes one occurrence of `listener` under exactly `pattern`.
    ///
    /// When the listener was registered several times, the most recently
    /// registered occurrence goes first. Returns true if a record was removed.
    pub fn remove_target(&mut self, pattern: &str, listener: &Listener) -> bool {
        let Some(index) = self.position(pattern) else {
            return false;
        };

        let records = &mut self.entries[index].records;
        let Some(found) = records.iter().rposition(|r| r.listener.same_as(listener)) else {
            return false;
        };

        records.remove(found);
        if records.is_empty() {
            self.entries.remove(index);
        }
        true
    }

    /// Removes whole listener lists.
    ///
    /// - `None` clears the registry.
    /// - A name without wildcards removes that pattern only.
    /// - A wildcard removes every registered pattern it matches.
    ///
    /// Returns the removed `(pattern, listener)` pairs in registry order.
    pub fn remove_all_targets(&mut self, pattern: Option<&str>) -> Vec<(String, Listener)> {
        let removed: Vec<PatternEntry> = match pattern {
            None => std::mem::take(&mut self.entries),
            Some(query) if self.options.use_wildcards && has_wildcard(query) => {
                let target = Pattern::compile(query, &self.options);
                let (removed, kept) = std::mem::take(&mut self.entries)
                    .into_iter()
                    .partition(|entry| target.matches(entry.pattern.as_str()));
                self.entries = kept;
                removed
            }
            Some(query) => match self.position(query) {
                Some(index) => vec![self.entries.remove(index)],
                None => Vec::new(),
            },
        };

        removed
            .into_iter()
            .flat_map(|entry| {
                let name = entry.pattern.as_str().to_string();
                entry
                    .records
                    .into_iter()
                    .map(move |record| (name.clone(), record.listener))
            })
            .collect()
    }

    /// Snapshots every listener matching `name`, in registry order.
    ///
    /// Once-records already claimed by another dispatch are left out.
    pub fn matching(&self, name: &str) -> Vec<Target> {
        self.entries
            .iter()
            .filter(|entry| entry.pattern.matches(name))
            .flat_map(|entry| {
                entry
                    .records
                    .iter()
                    .filter(|record| !record.is_claimed())
                    .map(|record| Target {
                        pattern: entry.pattern.as_str().to_string(),
                        listener: record.listener.clone(),
                        once: record.once,
                        claimed: Arc::clone(&record.claimed),
                    })
            })
            .collect()
    }

    /// Removes the record behind `target`. Returns false if it is already gone.
    pub fn expire(&mut self, target: &Target) -> bool {
        let Some(index) = self.position(&target.pattern) else {
            return false;
        };

        let records = &mut self.entries[index].records;
        let Some(found) = records
            .iter()
            .position(|r| Arc::ptr_eq(&r.claimed, &target.claimed))
        else {
            return false;
        };

        records.remove(found);
        if records.is_empty() {
            self.entries.remove(index);
        }
        true
    }

    /// Total number of records across all patterns.
    pub fn targets_count(&self) -> usize {
        self.entries.iter().map(|e| e.records.len()).sum()
    }

    /// Number of records registered under exactly `pattern`.
    pub fn targets_count_for(&self, pattern: &str) -> usize {
        self.position(pattern)
            .map(|index| self.entries[index].records.len())
            .unwrap_or(0)
    }

    /// Returns true if any registered pattern matches any of `names`.
    pub fn has_matchers<S: AsRef<str>>(&self, names: &[S]) -> bool {
        self.entries.iter().any(|entry| {
            names
                .iter()
                .any(|name| entry.pattern.overlaps(name.as_ref()))
        })
    }

    /// Registered patterns, in first-registration order.
    pub fn patterns(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|e| e.pattern.as_str().to_string())
            .collect()
    }

    /// Every registered listener, in registry order.
    pub fn listeners(&self) -> Vec<Listener> {
        self.entries
            .iter()
            .flat_map(|e| e.records.iter().map(|r| r.listener.clone()))
            .collect()
    }

    /// Returns true if no listener is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
