//! Leaderboard handles: atomic write/read primitives plus the windowed
//! query composition layered on top of them.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error};

use crate::backend::{RankingBackend, Reply};
use crate::error::{Error, Result};
use crate::expiration::{ExpirationPolicy, NoExpiration};
use crate::member::{Member, MemberScore, Order};
use crate::scripts::{self, ScoreWriteOp};

/// Sentinel the write script reports for "member had no previous rank".
/// The 1-based shift at the boundary turns it into the external `-1`.
const ABSENT_PREVIOUS_RANK: i64 = -2;

/// A cheap handle over one named board.
///
/// All fields are read-only after construction; concurrent callers may hold
/// clones of the same handle. Serialization of writes happens entirely at
/// the backend, which runs each primitive as one atomic script.
#[derive(Clone)]
pub struct Leaderboard {
    backend: Arc<dyn RankingBackend>,
    expiration: Arc<dyn ExpirationPolicy>,
    public_id: String,
    page_size: usize,
}

impl Leaderboard {
    /// Builds a handle over the board named `public_id`. `page_size` drives
    /// every windowed query and is clamped to at least 1.
    pub fn new(
        backend: Arc<dyn RankingBackend>,
        public_id: impl Into<String>,
        page_size: usize,
    ) -> Self {
        Self {
            backend,
            expiration: Arc::new(NoExpiration),
            public_id: public_id.into(),
            page_size: page_size.max(1),
        }
    }

    /// Replaces the whole-board expiration policy. The default never
    /// expires boards.
    pub fn with_expiration_policy(mut self, policy: Arc<dyn ExpirationPolicy>) -> Self {
        self.expiration = policy;
        self
    }

    pub fn public_id(&self) -> &str {
        &self.public_id
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Sets one member's score. Returns the member enriched with its new
    /// rank, the previous rank when requested, and the expiry when
    /// `score_ttl` is given.
    pub async fn set_member_score(
        &self,
        member_id: &str,
        score: i64,
        want_previous_rank: bool,
        score_ttl: Option<u64>,
    ) -> Result<Member> {
        let members = [MemberScore::new(member_id, score)];
        let mut written = self
            .write_scores(ScoreWriteOp::Set, &members, want_previous_rank, score_ttl)
            .await?;
        written
            .pop()
            .ok_or_else(|| Error::Backend(anyhow::anyhow!("write script returned no rows")))
    }

    /// Sets scores for a batch of members in one atomic write. Results come
    /// back in caller order.
    pub async fn set_members_score(
        &self,
        members: &[MemberScore],
        want_previous_rank: bool,
        score_ttl: Option<u64>,
    ) -> Result<Vec<Member>> {
        self.write_scores(ScoreWriteOp::Set, members, want_previous_rank, score_ttl)
            .await
    }

    /// Adds `delta` (may be negative) to one member's score, creating the
    /// member at `delta` if absent.
    pub async fn increment_member_score(
        &self,
        member_id: &str,
        delta: i64,
        score_ttl: Option<u64>,
    ) -> Result<Member> {
        let members = [MemberScore::new(member_id, delta)];
        let mut written = self
            .write_scores(ScoreWriteOp::Increment, &members, false, score_ttl)
            .await?;
        written
            .pop()
            .ok_or_else(|| Error::Backend(anyhow::anyhow!("write script returned no rows")))
    }

    async fn write_scores(
        &self,
        op: ScoreWriteOp,
        members: &[MemberScore],
        want_previous_rank: bool,
        score_ttl: Option<u64>,
    ) -> Result<Vec<Member>> {
        if members.is_empty() {
            return Err(Error::Validation("at least one member is required".into()));
        }

        let expire_at = self.expiration.board_expire_at(&self.public_id)?;
        debug!(
            leaderboard = %self.public_id,
            members = members.len(),
            ?op,
            "writing member scores"
        );

        let mut args = vec![
            expire_at.to_string(),
            if want_previous_rank { "1" } else { "0" }.to_string(),
            score_ttl.map_or_else(|| "inf".to_string(), |ttl| ttl.to_string()),
            Utc::now().timestamp().to_string(),
        ];
        for member in members {
            args.push(member.score.to_string());
            args.push(member.public_id.clone());
        }

        let reply = self
            .backend
            .eval(&scripts::set_score_script(op), &[self.public_id.clone()], &args)
            .await
            .inspect_err(|err| {
                error!(leaderboard = %self.public_id, %err, "score write failed");
            })?;

        let rows = reply.into_array();
        let mut written = Vec::with_capacity(members.len());
        for row in rows.chunks(5) {
            let [id, rank, score, previous, expire] = row else {
                return Err(malformed_reply("write"));
            };
            let rank = rank.as_int().ok_or_else(|| malformed_reply("write"))?;
            written.push(Member {
                public_id: id.as_data().unwrap_or_default().to_string(),
                score: parse_score(score),
                rank: rank + 1,
                previous_rank: if want_previous_rank {
                    previous.as_int().unwrap_or(ABSENT_PREVIOUS_RANK) + 1
                } else {
                    -1
                },
                expire_at: if score_ttl.is_some() {
                    expire.as_int().unwrap_or(0)
                } else {
                    0
                },
            });
        }
        Ok(written)
    }

    /// Rank, score, and optionally expiry of one member, read as a single
    /// consistent snapshot.
    pub async fn get_member(
        &self,
        member_id: &str,
        order: Order,
        include_ttl: bool,
    ) -> Result<Member> {
        debug!(leaderboard = %self.public_id, member = %member_id, "getting member");

        let keys = [self.public_id.clone(), member_id.to_string()];
        let args = [include_ttl.to_string()];
        let reply = self
            .backend
            .eval(&scripts::get_member_script(order), &keys, &args)
            .await?;

        let row = reply.into_array();
        let rank = row.first().and_then(Reply::as_int);
        let score = row.get(1).filter(|reply| !reply.is_nil());
        match (rank, score) {
            (Some(rank), Some(score)) => Ok(Member {
                public_id: member_id.to_string(),
                score: parse_score(score),
                rank: rank + 1,
                previous_rank: -1,
                expire_at: if include_ttl {
                    row.get(2).map_or(0, parse_expiry)
                } else {
                    0
                },
            }),
            _ => Err(Error::member_not_found(&self.public_id, member_id)),
        }
    }

    /// Rank and score for a batch of members as one snapshot. Absent members
    /// are silently omitted; survivors come back sorted by rank ascending.
    pub async fn get_members(
        &self,
        member_ids: &[String],
        order: Order,
        include_ttl: bool,
    ) -> Result<Vec<Member>> {
        let mut args = Vec::with_capacity(member_ids.len() + 1);
        args.push(include_ttl.to_string());
        args.extend(member_ids.iter().cloned());

        let reply = self
            .backend
            .eval(
                &scripts::get_members_script(order),
                &[self.public_id.clone()],
                &args,
            )
            .await?;

        let rows = reply.into_array();
        let mut members = Vec::new();
        for row in rows.chunks(4) {
            let [id, rank, score, expire] = row else {
                return Err(malformed_reply("bulk get"));
            };
            let (Some(rank), Some(score)) = (rank.as_int(), score.as_data()) else {
                continue;
            };
            members.push(Member {
                public_id: id.as_data().unwrap_or_default().to_string(),
                score: parse_score_str(score),
                rank: rank + 1,
                previous_rank: -1,
                expire_at: if include_ttl { parse_expiry(expire) } else { 0 },
            });
        }
        members.sort_by_key(|member| member.rank);
        Ok(members)
    }

    /// 1-based rank of one member.
    pub async fn get_rank(&self, member_id: &str, order: Order) -> Result<i64> {
        match self
            .backend
            .rank_of(&self.public_id, member_id, order)
            .await?
        {
            Some(rank) => Ok(rank as i64 + 1),
            None => Err(Error::member_not_found(&self.public_id, member_id)),
        }
    }

    /// Number of members in the board.
    pub async fn total_members(&self) -> Result<u64> {
        self.backend.cardinality(&self.public_id).await
    }

    /// Number of pages at this handle's page size; 0 for an empty board.
    pub async fn total_pages(&self) -> Result<u64> {
        let total = self.total_members().await?;
        Ok(total.div_ceil(self.page_size as u64))
    }

    /// One page of the board, best ranks first. Page numbers below 1 coerce
    /// to 1; pages past the end yield an empty list.
    pub async fn get_leaders(&self, page: u64, order: Order) -> Result<Vec<Member>> {
        let page = page.max(1);
        debug!(leaderboard = %self.public_id, page, "getting leaders");

        let total_pages = self.total_pages().await?;
        if page > total_pages {
            return Ok(Vec::new());
        }

        let start = (page - 1) as i64 * self.page_size as i64;
        let stop = start + self.page_size as i64 - 1;
        self.members_in_range(start, stop, order).await
    }

    /// A page-sized window centered on the given member. When the member is
    /// absent and `get_last_if_not_found` is set, the window wraps the tail
    /// of the board instead; otherwise the not-found error propagates.
    pub async fn get_around_me(
        &self,
        member_id: &str,
        order: Order,
        get_last_if_not_found: bool,
    ) -> Result<Vec<Member>> {
        debug!(leaderboard = %self.public_id, member = %member_id, "getting window around member");

        let member = match self.get_member(member_id, order, false).await {
            Ok(member) => Some(member),
            Err(err) if err.is_member_not_found() && get_last_if_not_found => None,
            Err(err) => return Err(err),
        };

        let total = self.total_members().await? as i64;
        let rank = member.map_or(total + 1, |member| member.rank);

        let page_size = self.page_size as i64;
        let mut start = (rank - page_size / 2).max(0);
        let mut stop = start + page_size - 1;
        if total < stop {
            stop = total;
            start = (stop - page_size).max(0);
        }

        self.members_in_range(start, stop, order).await
    }

    /// A page-sized window around the highest-ranked member whose score is
    /// at most `score`. With no such member the window wraps the board tail.
    pub async fn get_around_score(&self, score: i64, order: Order) -> Result<Vec<Member>> {
        let pivot = self
            .backend
            .rev_range_by_score(&self.public_id, "-inf", &score.to_string(), 0, 1)
            .await?;
        let pivot_id = pivot.into_iter().next().unwrap_or_default();
        self.get_around_me(&pivot_id, order, true).await
    }

    /// The leading `percent` of the board, capped at `max_members` entries
    /// but never fewer than one member while the board is non-empty.
    pub async fn get_top_percentage(
        &self,
        percent: u64,
        max_members: u64,
        order: Order,
    ) -> Result<Vec<Member>> {
        if !(1..=100).contains(&percent) {
            return Err(Error::Validation(
                "percentage must be a valid integer between 1 and 100".into(),
            ));
        }

        let args = [
            (percent as f64 / 100.0).to_string(),
            max_members.to_string(),
        ];
        let reply = self
            .backend
            .eval(
                &scripts::top_percentage_script(order),
                &[self.public_id.clone()],
                &args,
            )
            .await?;

        let rows = reply.into_array();
        let mut members = Vec::new();
        for row in rows.chunks(3) {
            let [id, rank, score] = row else {
                return Err(malformed_reply("top percentage"));
            };
            let rank = rank.as_int().ok_or_else(|| malformed_reply("top percentage"))?;
            members.push(Member {
                public_id: id.as_data().unwrap_or_default().to_string(),
                score: parse_score(score),
                rank: rank + 1,
                previous_rank: -1,
                expire_at: 0,
            });
        }
        Ok(members)
    }

    /// Removes one member from the score index. The expiry sibling is left
    /// for the compactor.
    pub async fn remove_member(&self, member_id: &str) -> Result<()> {
        self.remove_members(&[member_id.to_string()]).await
    }

    /// Removes a batch of members from the score index.
    pub async fn remove_members(&self, member_ids: &[String]) -> Result<()> {
        debug!(
            leaderboard = %self.public_id,
            members = member_ids.len(),
            "removing members"
        );
        self.backend
            .remove_members(&self.public_id, member_ids)
            .await?;
        Ok(())
    }

    /// Deletes the board's score index. The expiry sibling and the registry
    /// entry are left for the compactor.
    pub async fn remove_leaderboard(&self) -> Result<()> {
        debug!(leaderboard = %self.public_id, "removing leaderboard");
        self.backend.delete_key(&self.public_id).await
    }

    async fn members_in_range(&self, start: i64, stop: i64, order: Order) -> Result<Vec<Member>> {
        let entries = self
            .backend
            .range_with_scores(&self.public_id, start as isize, stop as isize, order)
            .await?;

        Ok(entries
            .into_iter()
            .enumerate()
            .map(|(offset, (public_id, score))| Member {
                public_id,
                score,
                rank: start + offset as i64 + 1,
                previous_rank: -1,
                expire_at: 0,
            })
            .collect())
    }
}

fn malformed_reply(primitive: &str) -> Error {
    Error::Backend(anyhow::anyhow!("{primitive} script returned a malformed row"))
}

fn parse_score(reply: &Reply) -> i64 {
    match reply {
        Reply::Int(n) => *n,
        Reply::Data(s) => parse_score_str(s),
        _ => 0,
    }
}

/// Scores come back as bulk strings; integral values parse directly, float
/// formatting (a `ZINCRBY` artifact) truncates.
fn parse_score_str(raw: &str) -> i64 {
    raw.parse::<i64>()
        .or_else(|_| raw.parse::<f64>().map(|score| score as i64))
        .unwrap_or(0)
}

fn parse_expiry(reply: &Reply) -> i64 {
    match reply {
        Reply::Int(n) => *n,
        Reply::Data(s) => s.parse().unwrap_or(0),
        _ => 0,
    }
}
