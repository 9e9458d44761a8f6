//! Response rotation state for a single stub.

use crate::imposter::ResponseConfig;
use std::collections::VecDeque;
use std::fmt;

/// Trait for types that can have a repeat behavior
pub trait HasRepeatBehavior {
    fn get_repeat(&self) -> Option<u32>;

    /// Number of consecutive rotation slots, never less than one
    fn repeat_count(&self) -> usize {
        self.get_repeat().unwrap_or(1).max(1) as usize
    }
}

/// Circular, repeat-expanded queue of response configs.
///
/// A config with `repeat = 3` occupies three consecutive slots. Taking the
/// next response moves the head slot to the tail, so the queue never drains.
/// Not synchronized; the owning stub entry serializes access.
#[derive(Clone, Default)]
pub struct ResponseSequencer {
    queue: VecDeque<ResponseConfig>,
}

impl ResponseSequencer {
    pub fn new(responses: &[ResponseConfig]) -> Self {
        let capacity = responses.iter().map(|r| r.repeat_count()).sum();
        let mut queue = VecDeque::with_capacity(capacity);
        for response in responses {
            for _ in 0..response.repeat_count() {
                queue.push_back(response.clone());
            }
        }
        Self { queue }
    }

    /// Rotate and return the head slot, or None when nothing is queued
    pub fn rotate(&mut self) -> Option<ResponseConfig> {
        let head = self.queue.pop_front()?;
        self.queue.push_back(head.clone());
        Some(head)
    }

    /// Append exactly one slot, regardless of the response's repeat
    pub fn push(&mut self, response: ResponseConfig) {
        self.queue.push_back(response);
    }

    pub fn peek(&self) -> Option<&ResponseConfig> {
        self.queue.front()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl fmt::Debug for ResponseSequencer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ResponseSequencer")
            .field("slots", &self.queue.len())
            .finish()
    }
}
