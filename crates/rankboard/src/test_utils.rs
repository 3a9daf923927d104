//! Shared test double: an in-memory [`RankingBackend`].
//!
//! Recognizes the engine's script sources and executes equivalent native
//! logic against process-local state, so scenario tests can drive a full
//! [`Leaderboard`](crate::Leaderboard) without a Redis server. Replicates
//! the sorted-set tie-break (lexicographic within equal scores, reversed
//! for descending reads).

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::backend::{RankingBackend, Reply};
use crate::error::{Error, Result};
use crate::member::Order;
use crate::scripts::{self, ScoreWriteOp, EXPIRATION_SETS_KEY};

#[derive(Default)]
struct State {
    /// Sorted sets: board score indices and `:ttl` expiry indices alike.
    sets: HashMap<String, HashMap<String, i64>>,
    /// Plain sets (the expiry registry).
    plain_sets: HashMap<String, HashSet<String>>,
    /// Absolute expiry per key, where one has been stamped.
    key_expirations: HashMap<String, i64>,
}

#[derive(Clone, Default)]
pub struct FakeBackend {
    state: Arc<Mutex<State>>,
}

fn ranked(entries: &HashMap<String, i64>, order: Order) -> Vec<(String, i64)> {
    let mut members: Vec<(String, i64)> = entries
        .iter()
        .map(|(member, score)| (member.clone(), *score))
        .collect();
    members.sort_by(|a, b| match order {
        Order::Ascending => a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)),
        Order::Descending => b.1.cmp(&a.1).then_with(|| b.0.cmp(&a.0)),
    });
    members
}

fn rank_in(entries: &HashMap<String, i64>, member: &str, order: Order) -> Option<i64> {
    ranked(entries, order)
        .iter()
        .position(|(candidate, _)| candidate == member)
        .map(|position| position as i64)
}

fn score_bound(raw: &str) -> i64 {
    match raw {
        "-inf" => i64::MIN,
        "+inf" | "inf" => i64::MAX,
        _ => raw.parse().expect("numeric score bound"),
    }
}

impl FakeBackend {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("fake backend poisoned")
    }

    pub fn registry_contains(&self, expiry_key: &str) -> bool {
        self.lock()
            .plain_sets
            .get(EXPIRATION_SETS_KEY)
            .is_some_and(|registry| registry.contains(expiry_key))
    }

    pub fn expiry_of(&self, board: &str, member: &str) -> Option<i64> {
        self.lock()
            .sets
            .get(&scripts::expiry_index_key(board))?
            .get(member)
            .copied()
    }

    pub fn board_expire_at(&self, board: &str) -> Option<i64> {
        self.lock().key_expirations.get(board).copied()
    }

    fn run_write(&self, op: ScoreWriteOp, keys: &[String], args: &[String]) -> Result<Reply> {
        let board = keys[0].clone();
        let board_expire_at: i64 = args[0].parse().expect("board expiry argument");
        let want_prev = args[1] == "1";
        let score_ttl = args[2].as_str();
        let now: i64 = args[3].parse().expect("now argument");
        let pairs: Vec<(i64, String)> = args[4..]
            .chunks(2)
            .map(|pair| (pair[0].parse().expect("score argument"), pair[1].clone()))
            .collect();

        let mut state = self.lock();
        let state = &mut *state;

        let mut previous_ranks = Vec::with_capacity(pairs.len());
        if want_prev {
            let entries = state.sets.entry(board.clone()).or_default();
            for (_, member) in &pairs {
                previous_ranks.push(rank_in(entries, member, Order::Descending).unwrap_or(-2));
            }
        }

        let entries = state.sets.entry(board.clone()).or_default();
        for (score, member) in &pairs {
            match op {
                ScoreWriteOp::Set => {
                    entries.insert(member.clone(), *score);
                }
                ScoreWriteOp::Increment => {
                    *entries.entry(member.clone()).or_insert(0) += score;
                }
            }
        }

        if board_expire_at != -1 {
            state
                .key_expirations
                .entry(board.clone())
                .or_insert(board_expire_at);
        }

        let mut expire_reply = Reply::Data("nil".into());
        if !score_ttl.is_empty() && score_ttl != "inf" {
            let expire_at = now + score_ttl.parse::<i64>().expect("score ttl argument");
            let expiry_key = scripts::expiry_index_key(&board);
            let expiry_index = state.sets.entry(expiry_key.clone()).or_default();
            for (_, member) in &pairs {
                expiry_index.insert(member.clone(), expire_at);
            }
            state
                .plain_sets
                .entry(EXPIRATION_SETS_KEY.to_string())
                .or_default()
                .insert(expiry_key);
            expire_reply = Reply::Int(expire_at);
        }

        let entries = &state.sets[&board];
        let mut rows = Vec::with_capacity(pairs.len() * 5);
        for (index, (_, member)) in pairs.iter().enumerate() {
            rows.push(Reply::Data(member.clone()));
            rows.push(Reply::Int(
                rank_in(entries, member, Order::Descending).expect("member just written"),
            ));
            rows.push(Reply::Data(entries[member].to_string()));
            rows.push(Reply::Int(if want_prev { previous_ranks[index] } else { -1 }));
            rows.push(expire_reply.clone());
        }
        Ok(Reply::Array(rows))
    }

    fn run_get_member(&self, order: Order, keys: &[String], args: &[String]) -> Result<Reply> {
        let state = self.lock();
        let board = &keys[0];
        let member = &keys[1];
        let include_ttl = args[0] == "true";

        let entries = state.sets.get(board);
        let rank = entries.and_then(|entries| rank_in(entries, member, order));
        let score = entries.and_then(|entries| entries.get(member));
        let (Some(rank), Some(score)) = (rank, score) else {
            return Ok(Reply::Array(vec![Reply::Nil, Reply::Nil]));
        };

        let mut row = vec![Reply::Int(rank), Reply::Data(score.to_string())];
        if include_ttl {
            row.push(
                state
                    .sets
                    .get(&scripts::expiry_index_key(board))
                    .and_then(|index| index.get(member))
                    .map_or(Reply::Nil, |expire_at| Reply::Data(expire_at.to_string())),
            );
        }
        Ok(Reply::Array(row))
    }

    fn run_get_members(&self, order: Order, keys: &[String], args: &[String]) -> Result<Reply> {
        let state = self.lock();
        let board = &keys[0];
        let include_ttl = args[0] == "true";
        let entries = state.sets.get(board);

        let mut rows = Vec::new();
        for member in &args[1..] {
            rows.push(Reply::Data(member.clone()));
            match (
                entries.and_then(|entries| rank_in(entries, member, order)),
                entries.and_then(|entries| entries.get(member)),
            ) {
                (Some(rank), Some(score)) => {
                    rows.push(Reply::Int(rank));
                    rows.push(Reply::Data(score.to_string()));
                }
                _ => {
                    rows.push(Reply::Nil);
                    rows.push(Reply::Nil);
                }
            }
            if include_ttl {
                rows.push(
                    state
                        .sets
                        .get(&scripts::expiry_index_key(board))
                        .and_then(|index| index.get(member))
                        .map_or(Reply::Nil, |expire_at| Reply::Data(expire_at.to_string())),
                );
            } else {
                rows.push(Reply::Data("nil".into()));
            }
        }
        Ok(Reply::Array(rows))
    }

    fn run_top_percentage(&self, order: Order, keys: &[String], args: &[String]) -> Result<Reply> {
        let state = self.lock();
        let fraction: f64 = args[0].parse().expect("fraction argument");
        let max_members: usize = args[1].parse().expect("max members argument");

        let Some(entries) = state.sets.get(&keys[0]) else {
            return Ok(Reply::Array(Vec::new()));
        };
        let wanted = ((fraction * entries.len() as f64).floor() as usize)
            .max(1)
            .min(max_members);

        let mut rows = Vec::new();
        for (rank, (member, score)) in ranked(entries, order).into_iter().take(wanted).enumerate() {
            rows.push(Reply::Data(member));
            rows.push(Reply::Int(rank as i64));
            rows.push(Reply::Data(score.to_string()));
        }
        Ok(Reply::Array(rows))
    }
}

#[async_trait]
impl RankingBackend for FakeBackend {
    async fn eval(&self, script: &str, keys: &[String], args: &[String]) -> Result<Reply> {
        for op in [ScoreWriteOp::Set, ScoreWriteOp::Increment] {
            if script == scripts::set_score_script(op) {
                return self.run_write(op, keys, args);
            }
        }
        for order in [Order::Descending, Order::Ascending] {
            if script == scripts::get_member_script(order) {
                return self.run_get_member(order, keys, args);
            }
            if script == scripts::get_members_script(order) {
                return self.run_get_members(order, keys, args);
            }
            if script == scripts::top_percentage_script(order) {
                return self.run_top_percentage(order, keys, args);
            }
        }
        Err(Error::Backend(anyhow::anyhow!("unrecognized script")))
    }

    async fn rank_of(&self, key: &str, member: &str, order: Order) -> Result<Option<u64>> {
        Ok(self
            .lock()
            .sets
            .get(key)
            .and_then(|entries| rank_in(entries, member, order))
            .map(|rank| rank as u64))
    }

    async fn range_with_scores(
        &self,
        key: &str,
        start: isize,
        stop: isize,
        order: Order,
    ) -> Result<Vec<(String, i64)>> {
        let state = self.lock();
        let Some(entries) = state.sets.get(key) else {
            return Ok(Vec::new());
        };
        let members = ranked(entries, order);
        let start = start.max(0) as usize;
        let stop = stop.min(members.len() as isize - 1);
        if stop < 0 || start > stop as usize {
            return Ok(Vec::new());
        }
        Ok(members[start..=stop as usize].to_vec())
    }

    async fn rev_range_by_score(
        &self,
        key: &str,
        min: &str,
        max: &str,
        offset: isize,
        count: isize,
    ) -> Result<Vec<String>> {
        let state = self.lock();
        let Some(entries) = state.sets.get(key) else {
            return Ok(Vec::new());
        };
        let (min, max) = (score_bound(min), score_bound(max));
        Ok(ranked(entries, Order::Descending)
            .into_iter()
            .filter(|(_, score)| (min..=max).contains(score))
            .skip(offset.max(0) as usize)
            .take(count.max(0) as usize)
            .map(|(member, _)| member)
            .collect())
    }

    async fn cardinality(&self, key: &str) -> Result<u64> {
        Ok(self.lock().sets.get(key).map_or(0, |entries| entries.len() as u64))
    }

    async fn remove_members(&self, key: &str, members: &[String]) -> Result<u64> {
        let mut state = self.lock();
        let Some(entries) = state.sets.get_mut(key) else {
            return Ok(0);
        };
        let mut removed = 0;
        for member in members {
            if entries.remove(member).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn delete_key(&self, key: &str) -> Result<()> {
        let mut state = self.lock();
        state.sets.remove(key);
        state.plain_sets.remove(key);
        state.key_expirations.remove(key);
        Ok(())
    }
}
