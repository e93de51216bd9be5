use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, RedisResult, Script};
use tracing::{debug, info};

use super::{KvBackend, StoreError};

/// Atomic GET-compare-SET. Returns 1 when the swap happened, 0 otherwise.
const CAS_SCRIPT: &str = r#"
local current = redis.call('GET', KEYS[1])
if current == ARGV[1] then
    redis.call('SET', KEYS[1], ARGV[2])
    return 1
end
return 0
"#;

/// Atomic usage bump on a JSON record. ARGV[1] is the current time in epoch
/// microseconds. Returns the updated record, or nil when the key is missing.
const HIT_SCRIPT: &str = r#"
local function to_micros(ts)
    local y, mo, d, h, mi, s, us =
        string.match(ts, '^(%d%d%d%d)-(%d%d)-(%d%d)T(%d%d):(%d%d):(%d%d)%.(%d%d%d%d%d%d)Z$')
    if not y then
        return nil
    end
    y, mo, d = tonumber(y), tonumber(mo), tonumber(d)
    if mo <= 2 then
        y = y - 1
    end
    local era = math.floor(y / 400)
    local yoe = y - era * 400
    local doy = math.floor((153 * ((mo + 9) % 12) + 2) / 5) + d - 1
    local doe = yoe * 365 + math.floor(yoe / 4) - math.floor(yoe / 100) + doy
    local days = era * 146097 + doe - 719468
    local secs = ((days * 24 + tonumber(h)) * 60 + tonumber(mi)) * 60 + tonumber(s)
    return secs * 1000000 + tonumber(us)
end

local function from_micros(t)
    local us = t % 1000000
    local secs = (t - us) / 1000000
    local s = secs % 60
    local mins = (secs - s) / 60
    local mi = mins % 60
    local hours = (mins - mi) / 60
    local h = hours % 24
    local z = (hours - h) / 24 + 719468
    local era = math.floor(z / 146097)
    local doe = z - era * 146097
    local yoe = math.floor((doe - math.floor(doe / 1460) + math.floor(doe / 36524)
        - math.floor(doe / 146096)) / 365)
    local doy = doe - (365 * yoe + math.floor(yoe / 4) - math.floor(yoe / 100))
    local mp = math.floor((5 * doy + 2) / 153)
    local d = doy - math.floor((153 * mp + 2) / 5) + 1
    local mo = mp < 10 and mp + 3 or mp - 9
    local y = yoe + era * 400
    if mo <= 2 then
        y = y + 1
    end
    return string.format('%04d-%02d-%02dT%02d:%02d:%02d.%06dZ', y, mo, d, h, mi, s, us)
end

local raw = redis.call('GET', KEYS[1])
if not raw then
    return false
end
local entry = cjson.decode(raw)
local now = tonumber(ARGV[1])
local prev = type(entry.last_used) == 'string' and to_micros(entry.last_used)
if prev and prev >= now then
    now = prev + 1
end
entry.last_used = from_micros(now)
entry.usage_count = (tonumber(entry.usage_count) or 0) + 1
local updated = cjson.encode(entry)
redis.call('SET', KEYS[1], updated)
return updated
"#;

/// Redis-backed store. Every command is bounded by `timeout`; expiry and
/// connection errors both surface as `StoreError::Unavailable`.
pub struct RedisBackend {
    conn: ConnectionManager,
    cas: Script,
    hit: Script,
    timeout: Duration,
}

impl RedisBackend {
    pub async fn connect(redis_url: &str, timeout: Duration) -> Result<Self, StoreError> {
        info!("Connecting to Redis...");
        let client = redis::Client::open(redis_url)
            .map_err(|e| StoreError::Unavailable(format!("invalid redis url: {e}")))?;
        let conn = match tokio::time::timeout(timeout, client.get_connection_manager()).await {
            Ok(Ok(conn)) => conn,
            Ok(Err(e)) => return Err(StoreError::Unavailable(format!("connect: {e}"))),
            Err(_) => {
                return Err(StoreError::Unavailable(format!(
                    "connect timed out after {}ms",
                    timeout.as_millis()
                )))
            }
        };
        info!("Redis connection established");
        Ok(Self {
            conn,
            cas: Script::new(CAS_SCRIPT),
            hit: Script::new(HIT_SCRIPT),
            timeout,
        })
    }

    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = RedisResult<T>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(StoreError::Unavailable(format!("{op}: {e}"))),
            Err(_) => Err(StoreError::Unavailable(format!(
                "{op} timed out after {}ms",
                self.timeout.as_millis()
            ))),
        }
    }
}

#[async_trait]
impl KvBackend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut con = self.conn.clone();
        self.bounded("GET", async move { con.get::<_, Option<String>>(key).await })
            .await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut con = self.conn.clone();
        self.bounded("SET", async move { con.set::<_, _, ()>(key, value).await })
            .await
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let mut con = self.conn.clone();
        let removed = self
            .bounded("DEL", async move { con.del::<_, i64>(key).await })
            .await?;
        Ok(removed > 0)
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: &str,
        new: &str,
    ) -> Result<bool, StoreError> {
        let mut con = self.conn.clone();
        let swapped = self
            .bounded("EVALSHA cas", async {
                self.cas
                    .key(key)
                    .arg(expected)
                    .arg(new)
                    .invoke_async::<_, i32>(&mut con)
                    .await
            })
            .await?;
        if swapped == 0 {
            debug!("CAS lost race on {key}");
        }
        Ok(swapped == 1)
    }

    async fn record_hit(
        &self,
        key: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<String>, StoreError> {
        let mut con = self.conn.clone();
        self.bounded("EVALSHA hit", async {
            self.hit
                .key(key)
                .arg(now.timestamp_micros())
                .invoke_async::<_, Option<String>>(&mut con)
                .await
        })
        .await
    }

    async fn set_add(&self, set: &str, member: &str) -> Result<(), StoreError> {
        let mut con = self.conn.clone();
        self.bounded("SADD", async move { con.sadd::<_, _, ()>(set, member).await })
            .await
    }

    async fn set_remove(&self, set: &str, member: &str) -> Result<(), StoreError> {
        let mut con = self.conn.clone();
        self.bounded("SREM", async move { con.srem::<_, _, ()>(set, member).await })
            .await
    }

    async fn set_members(&self, set: &str) -> Result<Vec<String>, StoreError> {
        let mut con = self.conn.clone();
        self.bounded("SMEMBERS", async move {
            con.smembers::<_, Vec<String>>(set).await
        })
        .await
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut con = self.conn.clone();
        let pattern = format!("{prefix}*");
        self.bounded("SCAN", async move {
            let mut iter = con.scan_match::<_, String>(pattern).await?;
            let mut keys = Vec::new();
            while let Some(key) = iter.next_item().await {
                keys.push(key);
            }
            Ok(keys)
        })
        .await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut con = self.conn.clone();
        self.bounded("PING", async move {
            redis::cmd("PING").query_async::<_, String>(&mut con).await
        })
        .await
        .map(|_| ())
    }
}
