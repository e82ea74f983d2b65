//! Binary min-heap ordered by a caller supplied score function.
//!
//! Scores are evaluated lazily on every comparison and never cached, so the
//! score function must be cheap and free of side effects. Elements with
//! equal scores pop in insertion order.

use std::cmp::Ordering;
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("pop on an empty priority queue")]
pub struct EmptyQueue;

/// Identity of an element pushed in a [`BinaryHeap`].
///
/// Handles are unique for the lifetime of the heap and increase with every
/// push, which is also what breaks ties between equal scores.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(u64);

#[derive(Debug)]
struct Entry<T> {
    id: EntryId,
    element: T,
}

pub struct BinaryHeap<T, F>
where
    F: Fn(&T) -> f64,
{
    content: Vec<Entry<T>>,
    score: F,
    next_id: u64,
}

impl<T, F> BinaryHeap<T, F>
where
    F: Fn(&T) -> f64,
{
    pub fn new(score: F) -> Self {
        Self {
            content: Vec::new(),
            score,
            next_id: 0,
        }
    }

    pub fn with_capacity(capacity: usize, score: F) -> Self {
        Self {
            content: Vec::with_capacity(capacity),
            score,
            next_id: 0,
        }
    }

    /// Insert an element and return its identity handle.
    pub fn push(&mut self, element: T) -> EntryId {
        let id = EntryId(self.next_id);
        self.next_id += 1;

        self.content.push(Entry { id, element });
        self.bubble_up(self.content.len() - 1);

        id
    }

    /// Remove and return the element with the smallest score.
    pub fn pop_min(&mut self) -> Result<T, EmptyQueue> {
        let last = self.content.pop().ok_or(EmptyQueue)?;
        if self.content.is_empty() {
            return Ok(last.element);
        }

        let root = std::mem::replace(&mut self.content[0], last);
        self.sink_down(0);

        Ok(root.element)
    }

    /// Remove the element pushed under `id`, if it is still queued.
    pub fn remove(&mut self, id: EntryId) -> Option<T> {
        let index = self.content.iter().position(|entry| entry.id == id)?;

        let removed = self.content.swap_remove(index);
        if index < self.content.len() {
            self.bubble_up(index);
            self.sink_down(index);
        }

        Some(removed.element)
    }

    pub fn peek(&self) -> Option<&T> {
        self.content.first().map(|entry| &entry.element)
    }

    pub fn size(&self) -> usize {
        self.content.len()
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    fn compare(&self, a: usize, b: usize) -> Ordering {
        let (a, b) = (&self.content[a], &self.content[b]);
        (self.score)(&a.element)
            .total_cmp(&(self.score)(&b.element))
            .then(a.id.cmp(&b.id))
    }

    fn bubble_up(&mut self, mut n: usize) {
        while n > 0 {
            let parent = (n - 1) / 2;
            if self.compare(n, parent) != Ordering::Less {
                break;
            }
            self.content.swap(n, parent);
            n = parent;
        }
    }

    fn sink_down(&mut self, mut n: usize) {
        let length = self.content.len();

        loop {
            let left = 2 * n + 1;
            let right = left + 1;
            let mut smallest = n;

            if left < length && self.compare(left, smallest) == Ordering::Less {
                smallest = left;
            }
            if right < length && self.compare(right, smallest) == Ordering::Less {
                smallest = right;
            }

            if smallest == n {
                break;
            }
            self.content.swap(n, smallest);
            n = smallest;
        }
    }

    #[cfg(test)]
    fn is_valid_heap(&self) -> bool {
        (1..self.content.len()).all(|i| self.compare(i, (i - 1) / 2) != Ordering::Less)
    }
}
