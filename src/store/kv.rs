//! Redis-backed key-value operations backing `news::dedup`.
//!
//! Namespaces (24h TTL unless noted): `url:{md5}`, `content:{md5}`,
//! `titles:{company}:{YYYY-MM-DD}` (sorted set scored by UTC timestamp).

use anyhow::Result;
use redis::AsyncCommands;

pub const DEDUP_TTL_SECONDS: i64 = 24 * 60 * 60;

#[derive(Clone)]
pub struct KvStore {
    client: redis::Client,
}

impl KvStore {
    pub fn new(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self { client })
    }

    async fn conn(&self) -> Result<redis::aio::MultiplexedConnection> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }

    /// Checks whether `key` already exists; if not, reserves it with the
    /// dedup TTL. Returns `true` if the key was already present (a
    /// duplicate). First writer wins under concurrent callers.
    pub async fn exists_or_reserve(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn().await?;
        let existed: bool = conn.exists(key).await?;
        if existed {
            return Ok(true);
        }
        let _: () = conn.set_ex(key, "1", DEDUP_TTL_SECONDS as u64).await?;
        Ok(false)
    }

    /// Returns up to `limit` members of the sorted set at `key`, ordered by
    /// score ascending (oldest first), matching `zrange(key, 0, limit-1)`.
    pub async fn zrange(&self, key: &str, limit: isize) -> Result<Vec<String>> {
        let mut conn = self.conn().await?;
        let members: Vec<String> = conn.zrange(key, 0, limit - 1).await?;
        Ok(members)
    }

    pub async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<()> {
        let mut conn = self.conn().await?;
        let _: () = conn.zadd(key, member, score).await?;
        let _: () = conn.expire(key, DEDUP_TTL_SECONDS).await?;
        Ok(())
    }

    /// Loads the persisted bloom-filter blob, if any.
    pub async fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.conn().await?;
        let value: Option<Vec<u8>> = conn.get(key).await?;
        Ok(value)
    }

    pub async fn set_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let mut conn = self.conn().await?;
        let _: () = conn.set(key, bytes).await?;
        Ok(())
    }
}
