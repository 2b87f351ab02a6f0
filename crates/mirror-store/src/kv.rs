use async_trait::async_trait;
use dashmap::DashMap;
use mirror_core::Result;
use std::collections::BTreeSet;

/// A single key-value mutation
#[derive(Debug, Clone, PartialEq)]
pub enum KvWrite {
    Set { key: String, value: String },
    /// Replace a set's members; an empty list deletes the key
    ReplaceSet { key: String, members: Vec<String> },
    Del { key: String },
}

/// Minimal key-value surface the order book is persisted through.
///
/// Values are plain strings; sets hold unique string members.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Add members to a set, creating it if absent
    async fn sadd(&self, key: &str, members: &[String]) -> Result<()>;

    async fn smembers(&self, key: &str) -> Result<Vec<String>>;

    async fn del(&self, key: &str) -> Result<()>;

    /// All keys starting with `prefix`
    async fn keys(&self, prefix: &str) -> Result<Vec<String>>;

    /// Apply `writes` in order as one unit: either all of them land or none do
    async fn write_batch(&self, writes: &[KvWrite]) -> Result<()>;
}

/// In-process store used in tests and when running without Redis
#[derive(Debug)]
pub struct MemoryKeyValueStore {
    values: DashMap<String, String>,
    sets: DashMap<String, BTreeSet<String>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self {
            values: DashMap::new(),
            sets: DashMap::new(),
        }
    }

    /// Number of keys held (values and sets)
    pub fn count(&self) -> usize {
        self.values.len() + self.sets.len()
    }
}

impl Default for MemoryKeyValueStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.get(key).map(|v| v.clone()))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn sadd(&self, key: &str, members: &[String]) -> Result<()> {
        let mut set = self.sets.entry(key.to_string()).or_default();
        set.extend(members.iter().cloned());
        Ok(())
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>> {
        Ok(self
            .sets
            .get(key)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn del(&self, key: &str) -> Result<()> {
        self.values.remove(key);
        self.sets.remove(key);
        Ok(())
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self
            .values
            .iter()
            .map(|e| e.key().clone())
            .chain(self.sets.iter().map(|e| e.key().clone()))
            .filter(|k| k.starts_with(prefix))
            .collect();
        keys.sort();
        keys.dedup();
        Ok(keys)
    }

    async fn write_batch(&self, writes: &[KvWrite]) -> Result<()> {
        for write in writes {
            match write {
                KvWrite::Set { key, value } => {
                    self.values.insert(key.clone(), value.clone());
                }
                KvWrite::ReplaceSet { key, members } => {
                    if members.is_empty() {
                        self.sets.remove(key);
                    } else {
                        self.sets.insert(key.clone(), members.iter().cloned().collect());
                    }
                }
                KvWrite::Del { key } => {
                    self.values.remove(key);
                    self.sets.remove(key);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_values_and_sets() {
        let kv = MemoryKeyValueStore::new();
        kv.set("a:1", "x").await.unwrap();
        kv.sadd("s:1", &["m2".to_string(), "m1".to_string()]).await.unwrap();
        kv.sadd("s:1", &["m1".to_string()]).await.unwrap();

        assert_eq!(kv.get("a:1").await.unwrap().as_deref(), Some("x"));
        assert_eq!(kv.get("a:2").await.unwrap(), None);
        assert_eq!(kv.smembers("s:1").await.unwrap(), vec!["m1", "m2"]);
        assert_eq!(kv.keys("s:").await.unwrap(), vec!["s:1"]);
        assert_eq!(kv.count(), 2);

        kv.del("s:1").await.unwrap();
        assert!(kv.smembers("s:1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_write_batch() {
        let kv = MemoryKeyValueStore::new();
        kv.sadd("s:1", &["old".to_string()]).await.unwrap();
        kv.set("gone", "x").await.unwrap();

        kv.write_batch(&[
            KvWrite::Set {
                key: "a".to_string(),
                value: "1".to_string(),
            },
            KvWrite::ReplaceSet {
                key: "s:1".to_string(),
                members: vec!["b".to_string(), "a".to_string()],
            },
            KvWrite::ReplaceSet {
                key: "s:2".to_string(),
                members: Vec::new(),
            },
            KvWrite::Del {
                key: "gone".to_string(),
            },
        ])
        .await
        .unwrap();

        assert_eq!(kv.get("a").await.unwrap().as_deref(), Some("1"));
        assert_eq!(kv.smembers("s:1").await.unwrap(), vec!["a", "b"]);
        assert!(kv.keys("s:2").await.unwrap().is_empty());
        assert_eq!(kv.get("gone").await.unwrap(), None);
    }
}
