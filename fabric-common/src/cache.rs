//! Bounded, recency-ordered segment cache (`spec.md` §4.1).
//!
//! One mutex guards both the lookup map and the recency order, so `put`
//! and `get` never observe or leave behind an inconsistent pairing of the
//! two — the invariant the spec calls out explicitly.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// Capacity fallback when a caller configures `cache_capacity <= 0`.
pub const DEFAULT_CAPACITY: usize = 64;

struct Inner {
    map: HashMap<String, Vec<u8>>,
    /// Front = most recently touched.
    order: VecDeque<String>,
}

pub struct Cache {
    inner: Mutex<Inner>,
    capacity: usize,
}

impl Cache {
    pub fn new(capacity: i64) -> Self {
        let capacity = if capacity <= 0 {
            DEFAULT_CAPACITY
        } else {
            capacity as usize
        };
        Self {
            inner: Mutex::new(Inner {
                map: HashMap::new(),
                order: VecDeque::new(),
            }),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert or overwrite `id`, promoting it to most-recent. Evicts the
    /// single least-recent entry if this push grows the cache past
    /// capacity.
    pub fn put(&self, id: &str, bytes: Vec<u8>) {
        let mut inner = self.inner.lock().unwrap();
        let existed = inner.map.insert(id.to_string(), bytes).is_some();
        if existed {
            inner.order.retain(|k| k != id);
        }
        inner.order.push_front(id.to_string());
        if inner.order.len() > self.capacity {
            if let Some(evicted) = inner.order.pop_back() {
                inner.map.remove(&evicted);
            }
        }
    }

    /// Returns a clone of the bytes on hit, promoting `id` to
    /// most-recent. Does not mutate on miss.
    pub fn get(&self, id: &str) -> Option<Vec<u8>> {
        let mut inner = self.inner.lock().unwrap();
        let hit = inner.map.get(id).cloned();
        if hit.is_some() {
            inner.order.retain(|k| k != id);
            inner.order.push_front(id.to_string());
        }
        hit
    }

    /// Current ids, most-recent-first.
    pub fn keys(&self) -> Vec<String> {
        self.inner.lock().unwrap().order.iter().cloned().collect()
    }
}
