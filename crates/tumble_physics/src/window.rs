//! Bounded population of spawned bodies
//!
//! Spawners that create a body per user action need a cap so the space
//! does not grow without bound. [`BodyWindow`] tracks spawned bodies in
//! arrival order and evicts the oldest ones, removing them from the
//! space, once the cap is exceeded.

use std::collections::VecDeque;

use crate::body::BodyKey;
use crate::shapes::ShapeKey;
use crate::space::Space;

/// FIFO window over spawned bodies with a fixed capacity
pub struct BodyWindow {
    capacity: usize,
    entries: VecDeque<(BodyKey, ShapeKey)>,
}

impl BodyWindow {
    /// Create a window holding at most `capacity` bodies
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: VecDeque::with_capacity(capacity.max(1)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Tracked `(body, shape)` pairs, oldest first
    pub fn iter(&self) -> impl Iterator<Item = (BodyKey, ShapeKey)> + '_ {
        self.entries.iter().copied()
    }

    /// Track a newly spawned body, evicting the oldest beyond capacity
    ///
    /// Evicted bodies are removed from `space` together with their
    /// shapes. Entries whose body was already removed externally are
    /// dropped without complaint, since their keys simply no longer
    /// resolve. Returns the number of bodies evicted from the space.
    pub fn push(&mut self, space: &mut Space, body: BodyKey, shape: ShapeKey) -> usize {
        self.entries.push_back((body, shape));
        let mut evicted = 0;
        while self.entries.len() > self.capacity {
            if let Some((old_body, _)) = self.entries.pop_front() {
                if space.remove_body(old_body).is_ok() {
                    evicted += 1;
                    log::debug!("evicted body {:?} from window", old_body);
                }
            }
        }
        evicted
    }

    /// Stop tracking a body without removing it from the space
    pub fn forget(&mut self, body: BodyKey) {
        self.entries.retain(|&(b, _)| b != body);
    }
}
