//! Bounded memory
//!
//! A fixed-capacity FIFO of labelled entries. Agents store `(tool, result)`
//! pairs here, collaborations store `(agent, output)` pairs.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// One remembered item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryEntry {
    /// Role, tool name or agent name
    pub label: String,
    pub value: String,
}

impl MemoryEntry {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// Ring buffer keeping the most recent `capacity` entries.
///
/// Capacity 0 retains nothing, which is how disabled memory is represented.
#[derive(Debug, Clone)]
pub struct Memory {
    entries: VecDeque<MemoryEntry>,
    capacity: usize,
}

impl Memory {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// Memory that never retains anything
    pub fn disabled() -> Self {
        Self::new(0)
    }

    /// Add an entry, evicting the oldest one when full
    pub fn append(&mut self, entry: MemoryEntry) {
        if self.capacity == 0 {
            return;
        }
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// Shorthand for `append(MemoryEntry::new(label, value))`
    pub fn push(&mut self, label: impl Into<String>, value: impl Into<String>) {
        self.append(MemoryEntry::new(label, value));
    }

    /// Current entries, oldest first
    pub fn snapshot(&self) -> Vec<MemoryEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MemoryEntry> {
        self.entries.iter()
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

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_enabled(&self) -> bool {
        self.capacity > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill(capacity: usize, count: usize) -> Memory {
        let mut memory = Memory::new(capacity);
        for i in 0..count {
            memory.push(format!("l{i}"), format!("v{i}"));
        }
        memory
    }

    #[test]
    fn test_keeps_last_n_in_order() {
        for extra in [0usize, 1, 3, 250] {
            let memory = fill(5, 5 + extra);
            let labels: Vec<_> = memory.iter().map(|e| e.label.clone()).collect();
            let expected: Vec<_> = (extra..extra + 5).map(|i| format!("l{i}")).collect();
            assert_eq!(labels, expected, "extra = {extra}");
        }
    }

    #[test]
    fn test_under_capacity() {
        let memory = fill(10, 3);
        assert_eq!(memory.len(), 3);
        assert_eq!(memory.snapshot()[0], MemoryEntry::new("l0", "v0"));
    }

    #[test]
    fn test_capacity_zero_is_a_sink() {
        let memory = fill(0, 100);
        assert!(memory.snapshot().is_empty());
        assert!(!memory.is_enabled());
        assert_eq!(memory.capacity(), 0);
    }

    #[test]
    fn test_clear() {
        let mut memory = fill(3, 3);
        memory.clear();
        assert!(memory.is_empty());
        memory.push("a", "b");
        assert_eq!(memory.len(), 1);
    }
}
