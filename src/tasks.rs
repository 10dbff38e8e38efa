//! Ordered operation queues.

use std::collections::VecDeque;

/// Operations that must be applied one at a time, in the order pushed.
/// Consuming the queue yields them front to back.
#[derive(Debug, Clone, PartialEq)]
pub struct Sequence<T> {
    ops: VecDeque<T>,
}

impl<T> Sequence<T> {
    pub fn new() -> Self {
        Sequence {
            ops: VecDeque::new(),
        }
    }

    pub fn push(&mut self, op: T) {
        self.ops.push_back(op);
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.ops.iter()
    }
}

impl<T> Default for Sequence<T> {
    fn default() -> Self {
        Sequence::new()
    }
}

impl<T> IntoIterator for Sequence<T> {
    type Item = T;
    type IntoIter = std::collections::vec_deque::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.ops.into_iter()
    }
}

impl<T> FromIterator<T> for Sequence<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Sequence {
            ops: iter.into_iter().collect(),
        }
    }
}

impl<T> Extend<T> for Sequence<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        self.ops.extend(iter);
    }
}
