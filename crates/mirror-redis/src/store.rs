use crate::connection::RedisConnection;
use crate::RedisError;
use async_trait::async_trait;
use mirror_core::Result;
use mirror_store::{KeyValueStore, KvWrite};
use std::sync::Arc;
use tracing::debug;

/// [`KeyValueStore`] backed by a shared Redis connection
#[derive(Clone)]
pub struct RedisKeyValueStore {
    connection: Arc<RedisConnection>,
}

impl RedisKeyValueStore {
    pub fn new(connection: Arc<RedisConnection>) -> Self {
        Self { connection }
    }
}

/// Escape glob metacharacters so the prefix matches literally in SCAN
fn scan_pattern(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('*');
    pattern
}

#[async_trait]
impl KeyValueStore for RedisKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.connection.get_connection();
        let value = redis::cmd("GET")
            .arg(key)
            .query_async::<Option<String>>(&mut conn)
            .await
            .map_err(RedisError::from)?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut conn = self.connection.get_connection();
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .query_async::<()>(&mut conn)
            .await
            .map_err(RedisError::from)?;
        Ok(())
    }

    async fn sadd(&self, key: &str, members: &[String]) -> Result<()> {
        if members.is_empty() {
            return Ok(());
        }
        let mut conn = self.connection.get_connection();
        redis::cmd("SADD")
            .arg(key)
            .arg(members)
            .query_async::<()>(&mut conn)
            .await
            .map_err(RedisError::from)?;
        Ok(())
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>> {
        let mut conn = self.connection.get_connection();
        let mut members = redis::cmd("SMEMBERS")
            .arg(key)
            .query_async::<Vec<String>>(&mut conn)
            .await
            .map_err(RedisError::from)?;
        members.sort();
        Ok(members)
    }

    async fn del(&self, key: &str) -> Result<()> {
        let mut conn = self.connection.get_connection();
        redis::cmd("DEL")
            .arg(key)
            .query_async::<()>(&mut conn)
            .await
            .map_err(RedisError::from)?;
        Ok(())
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        let mut conn = self.connection.get_connection();
        let pattern = scan_pattern(prefix);
        let count = self.connection.config().scan_count;

        let mut cursor: u64 = 0;
        let mut keys = Vec::new();
        loop {
            let (next, batch) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(count)
                .query_async::<(u64, Vec<String>)>(&mut conn)
                .await
                .map_err(RedisError::from)?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }

        keys.sort();
        keys.dedup();
        debug!(prefix = %prefix, keys = keys.len(), "Scanned Redis keys");
        Ok(keys)
    }

    async fn write_batch(&self, writes: &[KvWrite]) -> Result<()> {
        if writes.is_empty() {
            return Ok(());
        }
        let mut conn = self.connection.get_connection();
        batch_pipeline(writes)
            .query_async::<()>(&mut conn)
            .await
            .map_err(RedisError::from)?;
        Ok(())
    }
}

/// MULTI/EXEC pipeline for a write batch
fn batch_pipeline(writes: &[KvWrite]) -> redis::Pipeline {
    let mut pipe = redis::pipe();
    pipe.atomic();

    for write in writes {
        match write {
            KvWrite::Set { key, value } => {
                pipe.cmd("SET").arg(key).arg(value).ignore();
            }
            KvWrite::ReplaceSet { key, members } => {
                pipe.cmd("DEL").arg(key).ignore();
                if !members.is_empty() {
                    pipe.cmd("SADD").arg(key).arg(members).ignore();
                }
            }
            KvWrite::Del { key } => {
                pipe.cmd("DEL").arg(key).ignore();
            }
        }
    }
    pipe
}
