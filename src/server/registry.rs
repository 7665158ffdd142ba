//! Process-wide topic table

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use crate::arena::ShmArena;
use crate::error::{RobomqError, Result};
use crate::store::{BackingMode, DataTopic, RetentionPolicy};

/// Unique identifier for topics, derived from the topic name
pub type TopicId = u32;

/// One registered topic: its buffer and optional arena
#[derive(Debug)]
pub struct TopicEntry {
    topic: Mutex<DataTopic>,
    arena: Option<Arc<ShmArena>>,
}

impl TopicEntry {
    /// Lock the topic buffer for one serialized operation
    pub fn lock(&self) -> MutexGuard<'_, DataTopic> {
        self.topic.lock().unwrap()
    }

    /// The arena backing this topic's payloads, if shared-memory-backed
    pub fn arena(&self) -> Option<&Arc<ShmArena>> {
        self.arena.as_ref()
    }
}

/// Name → topic mapping; single source of truth for which topics exist
///
/// The table itself sits behind an RwLock so lookups on different topics
/// never contend; each entry carries its own mutex for per-topic
/// exclusivity.
#[derive(Debug, Default)]
pub struct TopicRegistry {
    topics: RwLock<HashMap<String, Arc<TopicEntry>>>,
}

impl TopicRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
        }
    }

    /// Register a heap-backed topic; re-adding a name is a conflict error
    pub fn add(&self, name: &str, retention: RetentionPolicy) -> Result<TopicId> {
        self.insert(name, retention, BackingMode::Heap, None)
    }

    /// Register a shared-memory-backed topic with its arena
    pub fn add_shared(
        &self,
        name: &str,
        retention: RetentionPolicy,
        arena: ShmArena,
    ) -> Result<TopicId> {
        self.insert(name, retention, BackingMode::SharedMemory, Some(Arc::new(arena)))
    }

    fn insert(
        &self,
        name: &str,
        retention: RetentionPolicy,
        backing: BackingMode,
        arena: Option<Arc<ShmArena>>,
    ) -> Result<TopicId> {
        if name.is_empty() {
            return Err(RobomqError::invalid_parameter(
                "name",
                "Topic name cannot be empty",
            ));
        }

        let mut topics = self.topics.write().unwrap();
        if topics.contains_key(name) {
            return Err(RobomqError::topic_exists(name));
        }
        topics.insert(
            name.to_string(),
            Arc::new(TopicEntry {
                topic: Mutex::new(DataTopic::with_backing(name, retention, backing)),
                arena,
            }),
        );
        Ok(Self::topic_id(name))
    }

    /// Look up a topic entry by name
    pub fn get(&self, name: &str) -> Option<Arc<TopicEntry>> {
        let topics = self.topics.read().unwrap();
        topics.get(name).cloned()
    }

    /// Whether a topic name is registered
    pub fn has_topic(&self, name: &str) -> bool {
        let topics = self.topics.read().unwrap();
        topics.contains_key(name)
    }

    /// All registered topic names
    pub fn names(&self) -> Vec<String> {
        let topics = self.topics.read().unwrap();
        topics.keys().cloned().collect()
    }

    /// Number of registered topics
    pub fn topic_count(&self) -> usize {
        let topics = self.topics.read().unwrap();
        topics.len()
    }

    /// Drop all retained messages from every topic (registrations survive)
    pub fn clear_all_data(&self) {
        let topics = self.topics.read().unwrap();
        for entry in topics.values() {
            entry.lock().clear();
        }
    }

    /// Stable topic id derived from the name
    pub fn topic_id(name: &str) -> TopicId {
        let mut hasher = DefaultHasher::new();
        name.hash(&mut hasher);
        hasher.finish() as TopicId
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_lookup() {
        let registry = TopicRegistry::new();
        let id = registry.add("imu", RetentionPolicy::new(5.0)).unwrap();
        assert_eq!(id, TopicRegistry::topic_id("imu"));
        assert!(registry.has_topic("imu"));
        assert!(registry.get("imu").is_some());
        assert_eq!(registry.topic_count(), 1);
    }

    #[test]
    fn test_duplicate_add_is_conflict() {
        let registry = TopicRegistry::new();
        registry.add("imu", RetentionPolicy::new(5.0)).unwrap();
        assert!(matches!(
            registry.add("imu", RetentionPolicy::new(5.0)),
            Err(RobomqError::TopicExists { .. })
        ));
    }

    #[test]
    fn test_empty_name_rejected() {
        let registry = TopicRegistry::new();
        assert!(registry.add("", RetentionPolicy::new(1.0)).is_err());
    }

    #[test]
    fn test_clear_all_data_keeps_registrations() {
        let registry = TopicRegistry::new();
        registry.add("t", RetentionPolicy::new(10.0)).unwrap();
        let entry = registry.get("t").unwrap();
        entry
            .lock()
            .push(crate::store::PayloadRef::inline(b"x".to_vec()), 0.0);

        registry.clear_all_data();
        assert!(registry.has_topic("t"));
        assert_eq!(entry.lock().len(0.0), 0);
    }
}
