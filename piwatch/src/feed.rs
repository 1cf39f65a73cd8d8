//! Feed
//!
//! Deduplication engine for the recent-queries feed. Poll windows overlap,
//! so each node keeps a bounded set of already-emitted event identities and
//! only events outside that set flow on to the view.
//!
//! Assumptions:
//! 1. Within a poll, each node's events arrive freshest-first
//! 2. There is no server-assigned event id; identity is the
//!    (timestamp, domain, blocked) triple, so two real events sharing all
//!    three collapse to a single feed row

use serde::Deserialize;
use std::collections::{HashMap, HashSet, VecDeque};

/// Identities retained per node before FIFO eviction kicks in.
pub const SEEN_CAPACITY: usize = 1000;

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct QueryEvent {
    pub timestamp: i64,
    pub domain: String,
    pub blocked: bool,
}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
struct EventKey {
    timestamp: i64,
    domain: String,
    blocked: bool,
}

impl QueryEvent {
    fn key(&self) -> EventKey {
        EventKey {
            timestamp: self.timestamp,
            domain: self.domain.clone(),
            blocked: self.blocked,
        }
    }
}

/// Bounded membership set with strict FIFO eviction by insertion order.
/// Existing keys are never re-touched, so insertion order is the proxy
/// for recency.
pub struct SeenSet {
    keys: HashSet<EventKey>,
    order: VecDeque<EventKey>,
    capacity: usize,
}

impl SeenSet {
    pub fn new(capacity: usize) -> SeenSet {
        SeenSet {
            keys: HashSet::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, event: &QueryEvent) -> bool {
        self.keys.contains(&event.key())
    }

    /// Records the event's identity, returning true if it was novel.
    /// At capacity, the single oldest-inserted identity is evicted first.
    pub fn insert(&mut self, event: &QueryEvent) -> bool {
        let key = event.key();
        if self.keys.contains(&key) {
            return false;
        }
        if self.order.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.keys.remove(&oldest);
            }
        }
        self.keys.insert(key.clone());
        self.order.push_back(key);
        true
    }
}

/// A novel event tagged with its owning node.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedEntry {
    pub node: String,
    pub event: QueryEvent,
}

/// Per-node dedup state for the whole session. Nodes get a seen-set
/// lazily on first ingest.
pub struct FeedEngine {
    seen: HashMap<String, SeenSet>,
    capacity: usize,
}

impl FeedEngine {
    pub fn new() -> FeedEngine {
        FeedEngine::with_capacity(SEEN_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> FeedEngine {
        FeedEngine {
            seen: HashMap::new(),
            capacity,
        }
    }

    /// Processes one poll's batches. Each node's events are freshest-first
    /// as delivered; the result is the novel subset, oldest-first within a
    /// node, nodes concatenated in the caller's order. Cross-node time
    /// interleaving is deliberately not performed.
    pub fn ingest(&mut self, batches: &[(String, Vec<QueryEvent>)]) -> Vec<FeedEntry> {
        let mut novel = Vec::new();
        for (node, events) in batches {
            let seen = self
                .seen
                .entry(node.clone())
                .or_insert_with(|| SeenSet::new(self.capacity));
            for event in events.iter().rev() {
                if seen.insert(event) {
                    novel.push(FeedEntry {
                        node: node.clone(),
                        event: event.clone(),
                    });
                }
            }
        }
        novel
    }

    pub fn seen_len(&self, node: &str) -> usize {
        self.seen.get(node).map(SeenSet::len).unwrap_or(0)
    }
}

impl Default for FeedEngine {
    fn default() -> FeedEngine {
        FeedEngine::new()
    }
}
