//! Redis implementation of the ranking backend.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, FromRedisValue, RedisResult, Value};

use crate::config::Config;
use crate::error::Result;
use crate::member::Order;

use super::{RankingBackend, Reply};

/// Redis-backed store. Connections are multiplexed over the shared client,
/// so this can be cloned freely and handles stay cheap.
#[derive(Clone)]
pub struct RedisRankingBackend {
    client: redis::Client,
}

impl RedisRankingBackend {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }

    /// Opens a client for the configured Redis URL.
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        Ok(Self { client })
    }

    async fn connection(&self) -> Result<MultiplexedConnection> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }
}

impl FromRedisValue for Reply {
    fn from_redis_value(value: &Value) -> RedisResult<Self> {
        Ok(match value {
            Value::Nil => Reply::Nil,
            Value::Int(n) => Reply::Int(*n),
            Value::BulkString(bytes) => Reply::Data(String::from_utf8_lossy(bytes).into_owned()),
            Value::SimpleString(s) => Reply::Data(s.clone()),
            Value::Okay => Reply::Data("OK".into()),
            Value::Double(d) => Reply::Data(d.to_string()),
            Value::Array(items) => Reply::Array(
                items
                    .iter()
                    .map(Reply::from_redis_value)
                    .collect::<RedisResult<_>>()?,
            ),
            other => {
                return Err((
                    redis::ErrorKind::TypeError,
                    "unexpected script reply shape",
                    format!("{other:?}"),
                )
                    .into())
            }
        })
    }
}

#[async_trait]
impl RankingBackend for RedisRankingBackend {
    async fn eval(&self, script: &str, keys: &[String], args: &[String]) -> Result<Reply> {
        let mut conn = self.connection().await?;
        let script = redis::Script::new(script);
        let mut invocation = script.prepare_invoke();
        for key in keys {
            invocation.key(key.as_str());
        }
        for arg in args {
            invocation.arg(arg.as_str());
        }
        let reply: Reply = invocation.invoke_async(&mut conn).await?;
        Ok(reply)
    }

    async fn rank_of(&self, key: &str, member: &str, order: Order) -> Result<Option<u64>> {
        let mut conn = self.connection().await?;
        let rank: Option<u64> = match order {
            Order::Descending => conn.zrevrank(key, member).await?,
            Order::Ascending => conn.zrank(key, member).await?,
        };
        Ok(rank)
    }

    async fn range_with_scores(
        &self,
        key: &str,
        start: isize,
        stop: isize,
        order: Order,
    ) -> Result<Vec<(String, i64)>> {
        let mut conn = self.connection().await?;
        let entries: Vec<(String, i64)> = match order {
            Order::Descending => conn.zrevrange_withscores(key, start, stop).await?,
            Order::Ascending => conn.zrange_withscores(key, start, stop).await?,
        };
        Ok(entries)
    }

    async fn rev_range_by_score(
        &self,
        key: &str,
        min: &str,
        max: &str,
        offset: isize,
        count: isize,
    ) -> Result<Vec<String>> {
        let mut conn = self.connection().await?;
        let members: Vec<String> = conn
            .zrevrangebyscore_limit(key, max, min, offset, count)
            .await?;
        Ok(members)
    }

    async fn cardinality(&self, key: &str) -> Result<u64> {
        let mut conn = self.connection().await?;
        Ok(conn.zcard(key).await?)
    }

    async fn remove_members(&self, key: &str, members: &[String]) -> Result<u64> {
        if members.is_empty() {
            return Ok(0);
        }
        let mut conn = self.connection().await?;
        Ok(conn.zrem(key, members).await?)
    }

    async fn delete_key(&self, key: &str) -> Result<()> {
        let mut conn = self.connection().await?;
        let _: i64 = conn.del(key).await?;
        Ok(())
    }
}
