//! Collections shared by the automaton passes.

use std::{collections::VecDeque, hash::Hash};

type FxBuildHasher = std::hash::BuildHasherDefault<rustc_hash::FxHasher>;

/// Insertion-ordered, so iteration is deterministic across runs.
pub type Map<K, V> = indexmap::IndexMap<K, V, FxBuildHasher>;
pub type Set<T> = indexmap::IndexSet<T, FxBuildHasher>;

/// A FIFO worklist in which each value waits at most once at a time.
///
/// A value can be pushed again after it has been popped.
#[derive(Debug)]
pub struct Worklist<T> {
    order: VecDeque<T>,
    waiting: Set<T>,
}

impl<T> Worklist<T>
where
    T: Clone + Eq + Hash,
{
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            order: VecDeque::with_capacity(capacity),
            waiting: Set::with_capacity_and_hasher(capacity, FxBuildHasher::default()),
        }
    }

    /// Returns `false` if the value was already waiting.
    pub fn push(&mut self, value: T) -> bool {
        if !self.waiting.insert(value.clone()) {
            return false;
        }
        self.order.push_back(value);
        true
    }

    pub fn pop(&mut self) -> Option<T> {
        let value = self.order.pop_front()?;
        self.waiting.swap_remove(&value);
        Some(value)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl<T> Default for Worklist<T>
where
    T: Clone + Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Extend<T> for Worklist<T>
where
    T: Clone + Eq + Hash,
{
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.push(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn waiting_values_are_not_duplicated() {
        let mut worklist = Worklist::new();
        worklist.extend([1, 2, 1, 3]);
        assert_eq!(worklist.len(), 3);
        assert!(!worklist.push(2));
        assert_eq!(worklist.pop(), Some(1));
        assert!(worklist.push(1));
        assert_eq!(worklist.pop(), Some(2));
        assert_eq!(worklist.pop(), Some(3));
        assert_eq!(worklist.pop(), Some(1));
        assert!(worklist.is_empty());
    }
}
