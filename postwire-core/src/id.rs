//! Correlation id generators.
//!
//! Ids only need to be unique among the calls in flight on one client, but
//! peers on a shared broadcast channel see each other's traffic, so
//! transports that share a medium should use [`RandomIds`] or give each
//! peer its own [`SequentialIds`] prefix.

use std::cell::Cell;

use rand::Rng;

/// Source of correlation ids.
pub trait IdGenerator {
    /// Produce the next id.
    fn next_id(&self) -> String;
}

impl<F: Fn() -> String> IdGenerator for F {
    fn next_id(&self) -> String {
        self()
    }
}

/// Counter-based ids: `"1"`, `"2"`, ... or `"<prefix>-1"`, `"<prefix>-2"`, ...
#[derive(Debug, Default)]
pub struct SequentialIds {
    prefix: String,
    next: Cell<u64>,
}

impl SequentialIds {
    /// Unprefixed ids starting at 1.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids of the form `"<prefix>-<n>"`.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: Cell::new(0),
        }
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&self) -> String {
        let n = self.next.get() + 1;
        self.next.set(n);
        if self.prefix.is_empty() {
            n.to_string()
        } else {
            format!("{}-{}", self.prefix, n)
        }
    }
}

/// 128 random bits, hex encoded.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomIds;

impl IdGenerator for RandomIds {
    fn next_id(&self) -> String {
        let bits: u128 = rand::rng().random();
        format!("{bits:032x}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_sequential_ids() {
        let ids = SequentialIds::new();
        assert_eq!(ids.next_id(), "1");
        assert_eq!(ids.next_id(), "2");
    }

    #[test]
    fn test_sequential_ids_with_prefix() {
        let ids = SequentialIds::with_prefix("worker");
        assert_eq!(ids.next_id(), "worker-1");
        assert_eq!(ids.next_id(), "worker-2");
    }

    #[test]
    fn test_random_ids_are_distinct() {
        let ids = RandomIds;
        let seen: HashSet<String> = (0..256).map(|_| ids.next_id()).collect();
        assert_eq!(seen.len(), 256);
        assert!(seen.iter().all(|id| id.len() == 32));
    }

    #[test]
    fn test_closure_generator() {
        let generator = || "fixed".to_string();
        assert_eq!(generator.next_id(), "fixed");
    }
}
