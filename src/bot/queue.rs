//! Two-lane FIFO of replies waiting to be sent.
//!
//! The priority lane is always drained before the normal lane, and a single
//! dequeue never returns more than the caller's batch limit. The normal lane
//! is bounded: once full, its oldest item makes room for the newest. The
//! priority lane is never trimmed.

use crate::config::DEFAULT_NORMAL_LANE_CAPACITY;
use crate::feed::ChatMessage;
use std::collections::VecDeque;
use tracing::debug;

/// Queue lane
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lane {
    /// Super chats, VIP messages and welcomes
    Priority,
    /// Everything else that deserves a reply
    Normal,
}

/// A reply waiting for dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingReply {
    /// Answer a chat message
    Respond(ChatMessage),
    /// Greet a first-time author
    Welcome {
        /// Author's channel identifier
        author_id: String,
        /// Author's display name
        author_name: String,
    },
}

/// Priority and normal FIFO lanes
#[derive(Debug)]
pub struct DualQueue {
    priority: VecDeque<PendingReply>,
    normal: VecDeque<PendingReply>,
    normal_capacity: usize,
}

impl Default for DualQueue {
    fn default() -> Self {
        Self::with_normal_capacity(DEFAULT_NORMAL_LANE_CAPACITY)
    }
}

impl DualQueue {
    /// Create an empty queue with the default normal lane capacity
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty queue whose normal lane holds at most `capacity` items (at least one)
    #[must_use]
    pub fn with_normal_capacity(capacity: usize) -> Self {
        Self {
            priority: VecDeque::new(),
            normal: VecDeque::new(),
            normal_capacity: capacity.max(1),
        }
    }

    /// Append to the back of a lane.
    ///
    /// Returns the item evicted from a full normal lane, if any.
    pub fn enqueue(&mut self, lane: Lane, item: PendingReply) -> Option<PendingReply> {
        match lane {
            Lane::Priority => {
                self.priority.push_back(item);
                None
            }
            Lane::Normal => {
                let evicted = if self.normal.len() >= self.normal_capacity {
                    self.normal.pop_front()
                } else {
                    None
                };
                if evicted.is_some() {
                    debug!(
                        "Normal lane full ({}), dropping oldest reply",
                        self.normal_capacity
                    );
                }
                self.normal.push_back(item);
                evicted
            }
        }
    }

    /// Take up to `max_n` items, priority lane first, FIFO within a lane.
    ///
    /// Returns an empty batch immediately when both lanes are empty.
    pub fn dequeue_batch(&mut self, max_n: usize) -> Vec<PendingReply> {
        self.take_batch(max_n)
            .into_iter()
            .map(|(_, item)| item)
            .collect()
    }

    /// Like [`DualQueue::dequeue_batch`], keeping the lane each item came from
    pub fn take_batch(&mut self, max_n: usize) -> Vec<(Lane, PendingReply)> {
        let mut batch = Vec::with_capacity(max_n.min(self.len()));
        while batch.len() < max_n {
            if let Some(item) = self.priority.pop_front() {
                batch.push((Lane::Priority, item));
            } else if let Some(item) = self.normal.pop_front() {
                batch.push((Lane::Normal, item));
            } else {
                break;
            }
        }
        batch
    }

    /// Put items taken by [`DualQueue::take_batch`] back at the front of
    /// their lanes, in their original order.
    pub fn requeue_front(&mut self, items: Vec<(Lane, PendingReply)>) {
        for (lane, item) in items.into_iter().rev() {
            match lane {
                Lane::Priority => self.priority.push_front(item),
                Lane::Normal => self.normal.push_front(item),
            }
        }
    }

    /// Maximum length of the normal lane
    #[must_use]
    pub const fn normal_capacity(&self) -> usize {
        self.normal_capacity
    }

    /// Items waiting in a lane
    #[must_use]
    pub fn lane_len(&self, lane: Lane) -> usize {
        match lane {
            Lane::Priority => self.priority.len(),
            Lane::Normal => self.normal.len(),
        }
    }

    /// Items waiting in both lanes
    #[must_use]
    pub fn len(&self) -> usize {
        self.priority.len() + self.normal.len()
    }

    /// Whether both lanes are empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.priority.is_empty() && self.normal.is_empty()
    }

    /// Iterate over a lane front to back
    pub fn iter_lane(&self, lane: Lane) -> impl Iterator<Item = &PendingReply> {
        match lane {
            Lane::Priority => self.priority.iter(),
            Lane::Normal => self.normal.iter(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn welcome(name: &str) -> PendingReply {
        PendingReply::Welcome {
            author_id: format!("UC{name}"),
            author_name: name.to_string(),
        }
    }

    #[test]
    fn test_priority_drained_first() {
        let mut queue = DualQueue::new();
        queue.enqueue(Lane::Normal, welcome("n1"));
        queue.enqueue(Lane::Priority, welcome("p1"));
        queue.enqueue(Lane::Normal, welcome("n2"));
        queue.enqueue(Lane::Priority, welcome("p2"));

        let batch = queue.dequeue_batch(10);
        assert_eq!(
            batch,
            vec![welcome("p1"), welcome("p2"), welcome("n1"), welcome("n2")]
        );
        assert!(queue.is_empty());
    }

    #[test]
    fn test_batch_limit_leaves_rest_in_order() {
        let mut queue = DualQueue::new();
        for name in ["n1", "n2", "n3"] {
            queue.enqueue(Lane::Normal, welcome(name));
        }
        queue.enqueue(Lane::Priority, welcome("p1"));

        assert_eq!(queue.dequeue_batch(2), vec![welcome("p1"), welcome("n1")]);
        assert_eq!(queue.lane_len(Lane::Priority), 0);
        assert_eq!(queue.lane_len(Lane::Normal), 2);

        // A priority arrival overtakes the remaining normal items
        queue.enqueue(Lane::Priority, welcome("p2"));
        assert_eq!(queue.dequeue_batch(2), vec![welcome("p2"), welcome("n2")]);
        assert_eq!(queue.dequeue_batch(2), vec![welcome("n3")]);
    }

    #[test]
    fn test_empty_queue_returns_empty_batch() {
        let mut queue = DualQueue::new();
        assert!(queue.dequeue_batch(5).is_empty());
        queue.enqueue(Lane::Normal, welcome("n1"));
        assert!(queue.dequeue_batch(0).is_empty());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_full_normal_lane_drops_oldest() {
        let mut queue = DualQueue::with_normal_capacity(2);
        assert_eq!(queue.enqueue(Lane::Normal, welcome("n1")), None);
        assert_eq!(queue.enqueue(Lane::Normal, welcome("n2")), None);
        assert_eq!(queue.enqueue(Lane::Normal, welcome("n3")), Some(welcome("n1")));

        for name in ["p1", "p2", "p3", "p4"] {
            assert_eq!(queue.enqueue(Lane::Priority, welcome(name)), None);
        }

        assert_eq!(queue.lane_len(Lane::Normal), 2);
        assert_eq!(queue.lane_len(Lane::Priority), 4);
        let normal: Vec<_> = queue.iter_lane(Lane::Normal).cloned().collect();
        assert_eq!(normal, vec![welcome("n2"), welcome("n3")]);
    }

    #[test]
    fn test_requeue_front_restores_order() {
        let mut queue = DualQueue::new();
        for name in ["p1", "p2"] {
            queue.enqueue(Lane::Priority, welcome(name));
        }
        for name in ["n1", "n2"] {
            queue.enqueue(Lane::Normal, welcome(name));
        }

        let mut batch = queue.take_batch(3);
        assert_eq!(
            batch.iter().map(|(lane, _)| *lane).collect::<Vec<_>>(),
            vec![Lane::Priority, Lane::Priority, Lane::Normal]
        );
        // First item was handled, the rest go back
        batch.remove(0);
        queue.requeue_front(batch);

        assert_eq!(
            queue.dequeue_batch(10),
            vec![welcome("p2"), welcome("n1"), welcome("n2")]
        );
    }
}
