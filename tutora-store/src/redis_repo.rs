use async_trait::async_trait;
use redis::{AsyncCommands, RedisResult};
use tracing::debug;

use tutora_core::{OtpStore, StoreError, StoreResult};
use tutora_shared::pii::mask_phone;

#[derive(Clone)]
pub struct RedisClient {
    client: redis::Client,
}

impl RedisClient {
    pub async fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client })
    }

    /// One-time login codes live under a TTL key, never in process memory:
    /// they survive restarts and are shared across instances.
    pub async fn put_otp(&self, phone: &str, code: &str, ttl_seconds: u64) -> RedisResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = format!("otp:{}", phone);
        conn.set_ex::<_, _, ()>(key, code, ttl_seconds).await?;
        debug!("OTP stored for {}", mask_phone(phone));
        Ok(())
    }

    /// GETDEL so a code can be checked exactly once; a second verify attempt
    /// sees nothing.
    pub async fn take_otp(&self, phone: &str) -> RedisResult<Option<String>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = format!("otp:{}", phone);
        redis::cmd("GETDEL").arg(&key).query_async(&mut conn).await
    }

    pub async fn check_rate_limit(
        &self,
        key: &str,
        limit: i64,
        window_seconds: i64,
    ) -> RedisResult<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let (count,): (i64,) = redis::pipe()
            .atomic()
            .incr(key, 1)
            .expire(key, window_seconds)
            .query_async(&mut conn)
            .await?;

        Ok(count <= limit)
    }
}

#[async_trait]
impl OtpStore for RedisClient {
    async fn put_code(&self, phone: &str, code: &str, ttl_seconds: u64) -> StoreResult<()> {
        self.put_otp(phone, code, ttl_seconds)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn take_code(&self, phone: &str) -> StoreResult<Option<String>> {
        self.take_otp(phone)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }
}
