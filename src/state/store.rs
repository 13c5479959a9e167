use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::Result;

/// 上下文存储 trait
#[async_trait]
pub trait ContextStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: String) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<()>;
}

/// 内存存储实现
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

#[async_trait]
impl ContextStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.inner.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        self.inner.write().insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.inner.write().remove(key);
        Ok(())
    }
}

#[cfg(feature = "redis-store")]
pub mod redis_store {
    use super::*;
    use crate::error::BotFlowError;
    use redis::AsyncCommands;

    /// Redis 存储；设置 TTL 后过期的会话由 Redis 自动清理
    pub struct RedisStore {
        client: redis::Client,
        ttl_secs: Option<u64>,
    }

    impl RedisStore {
        pub fn new(client: redis::Client) -> Self {
            Self {
                client,
                ttl_secs: None,
            }
        }

        pub fn open(url: &str) -> Result<Self> {
            let client =
                redis::Client::open(url).map_err(|e| BotFlowError::Context(e.to_string()))?;
            Ok(Self::new(client))
        }

        pub fn with_ttl(mut self, ttl_secs: u64) -> Self {
            self.ttl_secs = Some(ttl_secs).filter(|ttl| *ttl > 0);
            self
        }

        async fn connection(&self) -> Result<redis::aio::MultiplexedConnection> {
            self.client
                .get_multiplexed_async_connection()
                .await
                .map_err(|e| BotFlowError::Context(e.to_string()))
        }
    }

    #[async_trait]
    impl ContextStore for RedisStore {
        async fn get(&self, key: &str) -> Result<Option<String>> {
            let mut conn = self.connection().await?;
            let value: Option<String> = conn
                .get(key)
                .await
                .map_err(|e| BotFlowError::Context(e.to_string()))?;
            Ok(value)
        }

        async fn set(&self, key: &str, value: String) -> Result<()> {
            let mut conn = self.connection().await?;
            match self.ttl_secs {
                Some(ttl) => conn
                    .set_ex::<_, _, ()>(key, value, ttl)
                    .await
                    .map_err(|e| BotFlowError::Context(e.to_string()))?,
                None => conn
                    .set::<_, _, ()>(key, value)
                    .await
                    .map_err(|e| BotFlowError::Context(e.to_string()))?,
            }
            Ok(())
        }

        async fn delete(&self, key: &str) -> Result<()> {
            let mut conn = self.connection().await?;
            conn.del::<_, ()>(key)
                .await
                .map_err(|e| BotFlowError::Context(e.to_string()))?;
            Ok(())
        }
    }
}
