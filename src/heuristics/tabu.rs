//! Short-term memory of forbidden moves.
//!
//! A move is identified by the directed edge it would introduce. Each entry
//! carries a remaining tenure; entries with a tenure of zero or less are not
//! tabu. The list is owned by the caller and passed explicitly, so independent
//! runs never share state.

use std::collections::HashMap;

/// Directed-edge tabu list with per-edge tenure.
#[derive(Debug, Clone, Default)]
pub struct TabuList {
    tenures: HashMap<(usize, usize), i64>,
}

impl TabuList {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when `(from, to)` has a positive remaining tenure.
    #[inline]
    pub fn is_tabu(&self, from: usize, to: usize) -> bool {
        self.tenures.get(&(from, to)).map_or(false, |&t| t > 0)
    }

    /// Mark `(from, to)` tabu for `tenure` iterations. A zero tenure is a no-op.
    pub fn insert(&mut self, from: usize, to: usize, tenure: usize) {
        if tenure == 0 {
            return;
        }
        self.tenures.insert((from, to), tenure as i64);
    }

    /// Age every active entry by one iteration.
    pub fn decrement_all(&mut self) {
        for tenure in self.tenures.values_mut().filter(|t| **t > 0) {
            *tenure -= 1;
        }
    }

    /// Number of edges currently tabu.
    pub fn active(&self) -> usize {
        self.tenures.values().filter(|&&t| t > 0).count()
    }

    pub fn is_empty(&self) -> bool {
        self.active() == 0
    }

    pub fn clear(&mut self) {
        self.tenures.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tenure_expires() {
        let mut tabu = TabuList::new();
        tabu.insert(1, 2, 2);
        assert!(tabu.is_tabu(1, 2));
        assert!(!tabu.is_tabu(2, 1));

        tabu.decrement_all();
        assert!(tabu.is_tabu(1, 2));
        tabu.decrement_all();
        assert!(!tabu.is_tabu(1, 2));
        tabu.decrement_all();
        assert!(!tabu.is_tabu(1, 2));
        assert!(tabu.is_empty());
    }

    #[test]
    fn test_reinsert_resets_tenure() {
        let mut tabu = TabuList::new();
        tabu.insert(0, 3, 1);
        tabu.decrement_all();
        tabu.insert(0, 3, 2);
        assert_eq!(tabu.active(), 1);

        tabu.insert(4, 5, 0);
        assert!(!tabu.is_tabu(4, 5));

        tabu.clear();
        assert!(tabu.is_empty());
    }
}
