//! Strategies for generating and checking WS-Addressing message IDs.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;
use uuid::{Builder, Uuid};

/// Generates reply message IDs and, optionally, detects duplicate
/// request IDs.
pub trait MessageIdStrategy: Send + Sync {
    /// Whether `message_id` was already received. The default performs no
    /// duplicate detection.
    fn is_duplicate(&self, _message_id: &str) -> bool {
        false
    }

    /// A new, unique message ID URI.
    fn new_message_id(&self) -> String;
}

fn urn(uuid: Uuid) -> String {
    uuid.urn().to_string()
}

/// `urn:uuid:` IDs from random (version 4) UUIDs.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidMessageIdStrategy;

impl MessageIdStrategy for UuidMessageIdStrategy {
    fn new_message_id(&self) -> String {
        urn(Uuid::new_v4())
    }
}

/// Random GUIDs drawn either from the thread-local generator or from a
/// generator seeded by the operating system.
pub struct RandomGuidMessageIdStrategy {
    secure: Option<Mutex<StdRng>>,
}

impl RandomGuidMessageIdStrategy {
    /// Non-secure strategy backed by the thread-local generator.
    pub fn new() -> Self {
        Self { secure: None }
    }

    /// Strategy backed by an OS-seeded cryptographic generator.
    pub fn secure() -> Self {
        Self {
            secure: Some(Mutex::new(StdRng::from_os_rng())),
        }
    }

    pub fn is_secure(&self) -> bool {
        self.secure.is_some()
    }
}

impl Default for RandomGuidMessageIdStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageIdStrategy for RandomGuidMessageIdStrategy {
    fn new_message_id(&self) -> String {
        let bytes: [u8; 16] = match &self.secure {
            Some(rng) => rng.lock().unwrap_or_else(|e| e.into_inner()).random(),
            None => rand::rng().random(),
        };
        urn(Builder::from_random_bytes(bytes).into_uuid())
    }
}

/// Default number of request IDs remembered for duplicate detection.
pub const DEFAULT_TRACKED_IDS: usize = 10_000;

#[derive(Default)]
struct SeenIds {
    ids: HashSet<String>,
    order: VecDeque<String>,
}

/// Wraps a strategy and remembers the most recent request IDs, so a
/// repeated ID is reported as a duplicate. Once `capacity` IDs are held
/// the oldest is forgotten first.
pub struct TrackingMessageIdStrategy<S> {
    inner: S,
    capacity: usize,
    seen: Mutex<SeenIds>,
}

impl<S: MessageIdStrategy> TrackingMessageIdStrategy<S> {
    pub fn new(inner: S) -> Self {
        Self::with_capacity(inner, DEFAULT_TRACKED_IDS)
    }

    /// Remember at most `capacity` IDs (at least one).
    pub fn with_capacity(inner: S, capacity: usize) -> Self {
        Self {
            inner,
            capacity: capacity.max(1),
            seen: Mutex::new(SeenIds::default()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of IDs currently remembered.
    pub fn tracked(&self) -> usize {
        self.seen.lock().unwrap_or_else(|e| e.into_inner()).order.len()
    }
}

impl<S: MessageIdStrategy> MessageIdStrategy for TrackingMessageIdStrategy<S> {
    fn is_duplicate(&self, message_id: &str) -> bool {
        let mut seen = self.seen.lock().unwrap_or_else(|e| e.into_inner());
        if seen.ids.contains(message_id) {
            return true;
        }
        while seen.order.len() >= self.capacity {
            match seen.order.pop_front() {
                Some(oldest) => {
                    seen.ids.remove(&oldest);
                }
                None => break,
            }
        }
        seen.ids.insert(message_id.to_string());
        seen.order.push_back(message_id.to_string());
        false
    }

    fn new_message_id(&self) -> String {
        self.inner.new_message_id()
    }
}
