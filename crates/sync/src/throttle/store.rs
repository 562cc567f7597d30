//! Backing stores for the shared token bucket.

use std::time::Duration;

use redis::Script;
use redis::aio::ConnectionManager;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::ThrottleError;

/// Bucket sizing: a reservoir that refills by `refill_amount` tokens every
/// `refill_interval`, capped at `capacity`.
#[derive(Debug, Clone, Copy)]
pub struct BucketConfig {
    pub capacity: u32,
    pub refill_amount: u32,
    pub refill_interval: Duration,
}

impl BucketConfig {
    /// Sizing for the Shopify Admin REST quota: a 40-call reservoir
    /// restored at 2 calls per second.
    #[must_use]
    pub const fn shopify_admin() -> Self {
        Self {
            capacity: 40,
            refill_amount: 2,
            refill_interval: Duration::from_secs(1),
        }
    }
}

/// One atomic attempt against the shared counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TakeOutcome {
    /// A token was taken; the caller may proceed.
    Taken,
    /// Bucket empty; a retry is not worth attempting sooner than this.
    RetryIn(Duration),
}

/// The seam between the waiting logic and the shared counter.
///
/// `try_take` must be atomic with respect to every other process sharing
/// the store: refill accounting and the decrement happen as one operation.
#[allow(async_fn_in_trait)]
pub trait TokenStore: Send + Sync {
    /// Refill by elapsed time, then take one token if available.
    async fn try_take(&self) -> Result<TakeOutcome, ThrottleError>;

    /// Return one unspent token, capped at capacity.
    async fn put_back(&self) -> Result<(), ThrottleError>;
}

// =============================================================================
// Redis store
// =============================================================================

/// Refill-then-take, executed atomically inside Redis. Returns -1 when a
/// token was taken, otherwise milliseconds until the next refill. The
/// clock is Redis server time, so every worker in the fleet refills
/// against the same clock regardless of local skew.
const TAKE_SCRIPT: &str = r"
local capacity = tonumber(ARGV[1])
local refill_amount = tonumber(ARGV[2])
local interval_ms = tonumber(ARGV[3])
local time = redis.call('TIME')
local now_ms = time[1] * 1000 + math.floor(time[2] / 1000)

local state = redis.call('HMGET', KEYS[1], 'tokens', 'refreshed_at')
local tokens = tonumber(state[1])
local refreshed = tonumber(state[2])
if tokens == nil then
  tokens = capacity
  refreshed = now_ms
end

if refill_amount > 0 then
  local intervals = math.floor((now_ms - refreshed) / interval_ms)
  if intervals > 0 then
    tokens = math.min(capacity, tokens + intervals * refill_amount)
    refreshed = refreshed + intervals * interval_ms
  end
end

local taken = 0
if tokens > 0 then
  tokens = tokens - 1
  taken = 1
end

redis.call('HSET', KEYS[1], 'tokens', tokens, 'refreshed_at', refreshed)
redis.call('PEXPIRE', KEYS[1], math.max(interval_ms * 120, 60000))

if taken == 1 then
  return -1
end
return interval_ms - ((now_ms - refreshed) % interval_ms)
";

/// Increment capped at capacity; initializes a missing bucket as full
/// minus nothing, so a stray return can never exceed the reservoir.
const PUT_BACK_SCRIPT: &str = r"
local capacity = tonumber(ARGV[1])
local tokens = tonumber(redis.call('HGET', KEYS[1], 'tokens'))
if tokens == nil then
  tokens = capacity
end
redis.call('HSET', KEYS[1], 'tokens', math.min(capacity, tokens + 1))
return 0
";

/// Token store shared by every worker process through one Redis key.
///
/// Atomicity comes from Lua script execution: Redis runs each script as a
/// single operation, so concurrent workers on separate machines never
/// interleave refill accounting with their decrements.
#[derive(Clone)]
pub struct RedisTokenStore {
    conn: ConnectionManager,
    key: String,
    config: BucketConfig,
    take: Script,
    put_back: Script,
}

impl RedisTokenStore {
    /// Create a store over an established connection. All workers limiting
    /// the same external quota must use the same `key`.
    #[must_use]
    pub fn new(conn: ConnectionManager, key: impl Into<String>, config: BucketConfig) -> Self {
        Self {
            conn,
            key: key.into(),
            config,
            take: Script::new(TAKE_SCRIPT),
            put_back: Script::new(PUT_BACK_SCRIPT),
        }
    }
}

impl TokenStore for RedisTokenStore {
    async fn try_take(&self) -> Result<TakeOutcome, ThrottleError> {
        let mut conn = self.conn.clone();
        let verdict: i64 = self
            .take
            .key(&self.key)
            .arg(self.config.capacity)
            .arg(self.config.refill_amount)
            .arg(u64::try_from(self.config.refill_interval.as_millis()).unwrap_or(1000))
            .invoke_async(&mut conn)
            .await
            .map_err(|e| ThrottleError::Store(e.to_string()))?;

        if verdict < 0 {
            Ok(TakeOutcome::Taken)
        } else {
            let wait = u64::try_from(verdict).unwrap_or(0).max(1);
            Ok(TakeOutcome::RetryIn(Duration::from_millis(wait)))
        }
    }

    async fn put_back(&self) -> Result<(), ThrottleError> {
        let mut conn = self.conn.clone();
        let _: i64 = self
            .put_back
            .key(&self.key)
            .arg(self.config.capacity)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| ThrottleError::Store(e.to_string()))?;
        Ok(())
    }
}

// =============================================================================
// In-memory store
// =============================================================================

#[derive(Debug)]
struct Bucket {
    tokens: u32,
    refreshed_at: Instant,
}

/// Single-process store for tests and local runs. Same refill arithmetic
/// as the Redis store, guarded by a mutex instead of script atomicity.
pub struct MemoryTokenStore {
    config: BucketConfig,
    bucket: Mutex<Bucket>,
}

impl MemoryTokenStore {
    #[must_use]
    pub fn new(config: BucketConfig) -> Self {
        Self {
            config,
            bucket: Mutex::new(Bucket {
                tokens: config.capacity,
                refreshed_at: Instant::now(),
            }),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    async fn try_take(&self) -> Result<TakeOutcome, ThrottleError> {
        let mut bucket = self.bucket.lock().await;
        let now = Instant::now();

        if self.config.refill_amount > 0 {
            let elapsed = now.duration_since(bucket.refreshed_at);
            let intervals =
                u32::try_from(elapsed.as_millis() / self.config.refill_interval.as_millis().max(1))
                    .unwrap_or(u32::MAX);
            if intervals > 0 {
                bucket.tokens = bucket
                    .tokens
                    .saturating_add(intervals.saturating_mul(self.config.refill_amount))
                    .min(self.config.capacity);
                bucket.refreshed_at += self.config.refill_interval * intervals;
            }
        }

        if bucket.tokens > 0 {
            bucket.tokens -= 1;
            return Ok(TakeOutcome::Taken);
        }

        let hint = if self.config.refill_amount > 0 {
            let since = now.duration_since(bucket.refreshed_at);
            self.config
                .refill_interval
                .checked_sub(since)
                .unwrap_or(Duration::from_millis(1))
        } else {
            // Nothing refills this bucket; wake only when a token comes back.
            Duration::from_millis(25)
        };
        Ok(TakeOutcome::RetryIn(hint))
    }

    async fn put_back(&self) -> Result<(), ThrottleError> {
        let mut bucket = self.bucket.lock().await;
        bucket.tokens = (bucket.tokens + 1).min(self.config.capacity);
        Ok(())
    }
}
