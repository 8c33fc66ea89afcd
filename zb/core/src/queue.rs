//! Bounded request queues for stack components
//!
//! Every component that accepts upper-layer requests keeps them in a
//! `RequestQueue`. The head of the queue is the request in progress; it
//! stays queued until the component confirms it.

use crate::{ZbError, ZbResult};
use heapless::Deque;

/// Bounded FIFO of pending requests
#[derive(Debug)]
pub struct RequestQueue<T, const N: usize> {
    queue: Deque<T, N>,
}

impl<T, const N: usize> RequestQueue<T, N> {
    /// Create a new empty queue
    pub const fn new() -> Self {
        Self {
            queue: Deque::new(),
        }
    }

    /// Append a request (FIFO)
    pub fn post(&mut self, request: T) -> ZbResult<()> {
        self.queue
            .push_back(request)
            .map_err(|_| ZbError::QueueFull)
    }

    /// Queue a request right behind the one in progress
    pub fn post_next(&mut self, request: T) -> ZbResult<()> {
        if self.queue.is_full() {
            return Err(ZbError::QueueFull);
        }
        match self.queue.pop_front() {
            Some(head) => {
                let _ = self.queue.push_front(request);
                let _ = self.queue.push_front(head);
            }
            None => {
                let _ = self.queue.push_front(request);
            }
        }
        Ok(())
    }

    /// Request currently being served
    pub fn head(&self) -> Option<&T> {
        self.queue.front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.queue.iter()
    }

    /// Remove the served request
    pub fn remove_head(&mut self) -> ZbResult<T> {
        self.queue.pop_front().ok_or(ZbError::QueueEmpty)
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.queue.is_full()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// Drop all pending requests
    pub fn clear(&mut self) {
        self.queue.clear();
    }
}

impl<T, const N: usize> Default for RequestQueue<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_queue_fifo() {
        let mut queue: RequestQueue<u8, 3> = RequestQueue::new();
        assert!(queue.is_empty());

        queue.post(1).unwrap();
        queue.post(2).unwrap();
        queue.post_next(9).unwrap();
        assert!(queue.is_full());
        assert_eq!(queue.post(3), Err(ZbError::QueueFull));
        assert_eq!(queue.post_next(3), Err(ZbError::QueueFull));

        // the request in progress stays at the head
        assert_eq!(queue.head(), Some(&1));
        assert_eq!(queue.remove_head(), Ok(1));
        assert_eq!(queue.remove_head(), Ok(9));
        assert_eq!(queue.len(), 1);

        queue.clear();
        assert_eq!(queue.remove_head(), Err(ZbError::QueueEmpty));
    }

    #[test]
    fn test_post_next_on_empty_queue() {
        let mut queue: RequestQueue<u8, 2> = RequestQueue::new();
        queue.post_next(4).unwrap();
        assert_eq!(queue.head(), Some(&4));
        assert_eq!(queue.iter().count(), 1);
    }
}
