//! Lua sources for the atomic board primitives.
//!
//! Every multi-step mutation or consistent multi-read runs as one script so
//! the backend linearizes it against concurrent writers on the same keys.
//! The command that varies with the operation or requested order is spliced
//! into the template before the script ships.

use crate::member::Order;

/// Registry set naming every per-score expiry index ever written. An
/// external compactor iterates this instead of scanning the keyspace.
pub const EXPIRATION_SETS_KEY: &str = "expiration-sets";

/// Sibling key holding a board's per-member expiry timestamps.
pub fn expiry_index_key(public_id: &str) -> String {
    format!("{public_id}:ttl")
}

/// Which write command the set-score script applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreWriteOp {
    /// `ZADD`: overwrite scores, any number of members per call.
    Set,
    /// `ZINCRBY`: add a delta to one member's score.
    Increment,
}

impl ScoreWriteOp {
    fn command(self) -> &'static str {
        match self {
            ScoreWriteOp::Set => "ZADD",
            ScoreWriteOp::Increment => "ZINCRBY",
        }
    }
}

fn rank_command(order: Order) -> &'static str {
    match order {
        Order::Descending => "ZREVRANK",
        Order::Ascending => "ZRANK",
    }
}

fn range_command(order: Order) -> &'static str {
    match order {
        Order::Descending => "ZREVRANGE",
        Order::Ascending => "ZRANGE",
    }
}

/// Bulk set / bulk increment.
///
/// Captures previous ranks, applies the write, stamps the board expiry on
/// first write, upserts per-score expiries, and reads back rank and score,
/// all in one atomic unit. Rows of five per member:
/// `(member, rank_0_based, score, previous_rank_or_-2, expire_at_or_"nil")`.
const SET_SCORE_TEMPLATE: &str = r#"
-- KEYS[1] leaderboard key
-- ARGV[1] board expiration as absolute unix seconds, -1 to skip
-- ARGV[2] "1" to capture previous ranks
-- ARGV[3] per-score ttl in seconds, "" or "inf" to skip
-- ARGV[4] current unix timestamp
-- ARGV[5..] alternating score, member pairs
local want_prev = ARGV[2] == "1"
local score_ttl = ARGV[3]
if score_ttl == nil or score_ttl == "" then
    score_ttl = "inf"
end

local write_args = {}
local prev_ranks = {}
local count = 0
for i = 5, #ARGV, 2 do
    count = count + 1
    table.insert(write_args, tonumber(ARGV[i]))
    table.insert(write_args, ARGV[i + 1])
    if want_prev then
        prev_ranks[count] = tonumber(redis.call("ZREVRANK", KEYS[1], ARGV[i + 1])) or -2
    end
end
redis.call("__WRITE__", KEYS[1], unpack(write_args))

if ARGV[1] ~= "-1" then
    local board_ttl = redis.call("TTL", KEYS[1])
    if board_ttl == -2 then
        return redis.error_reply("leaderboard key missing after write")
    end
    if board_ttl == -1 then
        redis.call("EXPIREAT", KEYS[1], ARGV[1])
    end
end

local expire_at = "nil"
if score_ttl ~= "inf" then
    local expiry_key = KEYS[1] .. ":ttl"
    expire_at = ARGV[4] + score_ttl
    local expiry_args = {}
    for i = 5, #ARGV, 2 do
        table.insert(expiry_args, expire_at)
        table.insert(expiry_args, ARGV[i + 1])
    end
    redis.call("ZADD", expiry_key, unpack(expiry_args))
    redis.call("SADD", "expiration-sets", expiry_key)
end

local reply = {}
local index = 0
for i = 5, #ARGV, 2 do
    index = index + 1
    local member = ARGV[i + 1]
    table.insert(reply, member)
    table.insert(reply, redis.call("ZREVRANK", KEYS[1], member))
    table.insert(reply, redis.call("ZSCORE", KEYS[1], member))
    if want_prev then
        table.insert(reply, prev_ranks[index])
    else
        table.insert(reply, -1)
    end
    table.insert(reply, expire_at)
end
return reply
"#;

/// Rank, score, and optionally expiry of one member as one snapshot.
/// Absent members come back as nil rank and score.
const GET_MEMBER_TEMPLATE: &str = r#"
-- KEYS[1] leaderboard key
-- KEYS[2] member public id
-- ARGV[1] "true" to read the per-score expiry
local rank = redis.call("__RANK__", KEYS[1], KEYS[2])
local score = redis.call("ZSCORE", KEYS[1], KEYS[2])
if ARGV[1] == "true" then
    local expire_at = redis.call("ZSCORE", KEYS[1] .. ":ttl", KEYS[2])
    return {rank, score, expire_at}
end
return {rank, score}
"#;

/// Rank and score for a batch of members as one snapshot. Rows of four per
/// requested id: `(member, rank_or_nil, score_or_nil, expire_at_or_"nil")`.
const GET_MEMBERS_TEMPLATE: &str = r#"
-- KEYS[1] leaderboard key
-- ARGV[1] "true" to read per-score expiries
-- ARGV[2..] member public ids
local reply = {}
for i = 2, #ARGV do
    local member = ARGV[i]
    table.insert(reply, member)
    table.insert(reply, redis.call("__RANK__", KEYS[1], member))
    table.insert(reply, redis.call("ZSCORE", KEYS[1], member))
    if ARGV[1] == "true" then
        table.insert(reply, redis.call("ZSCORE", KEYS[1] .. ":ttl", member))
    else
        table.insert(reply, "nil")
    end
end
return reply
"#;

/// Leading slice of the board sized by percentage of cardinality, clamped
/// to `[1, max_members]`. Rows of three: `(member, rank_0_based, score)`.
const TOP_PERCENTAGE_TEMPLATE: &str = r#"
-- KEYS[1] leaderboard key
-- ARGV[1] desired fraction (0.0 to 1.0)
-- ARGV[2] maximum number of members returned
local total = redis.call("ZCARD", KEYS[1])
local wanted = math.floor(ARGV[1] * total)
if wanted < 1 then
    wanted = 1
end
if wanted > math.floor(ARGV[2]) then
    wanted = math.floor(ARGV[2])
end

local entries = redis.call("__RANGE__", KEYS[1], 0, wanted - 1, "WITHSCORES")
local reply = {}
for i = 1, #entries, 2 do
    local member = entries[i]
    table.insert(reply, member)
    table.insert(reply, redis.call("__RANK__", KEYS[1], member))
    table.insert(reply, entries[i + 1])
end
return reply
"#;

pub fn set_score_script(op: ScoreWriteOp) -> String {
    SET_SCORE_TEMPLATE.replace("__WRITE__", op.command())
}

pub fn get_member_script(order: Order) -> String {
    GET_MEMBER_TEMPLATE.replace("__RANK__", rank_command(order))
}

pub fn get_members_script(order: Order) -> String {
    GET_MEMBERS_TEMPLATE.replace("__RANK__", rank_command(order))
}

pub fn top_percentage_script(order: Order) -> String {
    TOP_PERCENTAGE_TEMPLATE
        .replace("__RANGE__", range_command(order))
        .replace("__RANK__", rank_command(order))
}
