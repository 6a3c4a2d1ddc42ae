//! Per-user favorite markers on pupi
use crate::{
    error::{Error, Result},
    store::Store,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use time::OffsetDateTime;
use tracing::debug;

/// A single vote as recorded by the file backend. The SQL backends keep the
/// same columns in the `votes` table.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Vote {
    pub user_id: String,
    pub pupo_id: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Vote {
    pub fn new(user_id: String, pupo_id: i64) -> Self {
        Self {
            user_id,
            pupo_id,
            created_at: OffsetDateTime::now_utc(),
        }
    }
}

/// The state transition performed by [toggle]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum VoteAction {
    Added,
    Removed,
}

/// Vote totals for every pupo together with the pupi that a particular user
/// has voted for
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteSummary {
    pub vote_counts: BTreeMap<i64, i64>,
    pub user_votes: Vec<i64>,
}

/// Load the vote totals, plus the votes of `user_id` if a user is given
pub async fn summary(store: &dyn Store, user_id: Option<&str>) -> Result<VoteSummary> {
    let vote_counts = store.vote_counts().await?;
    let user_votes = match user_id {
        Some(user) => store.user_votes(user).await?,
        None => Vec::new(),
    };
    Ok(VoteSummary {
        vote_counts,
        user_votes,
    })
}

/// Flip the vote of `user_id` for `pupo_id`: add it if it does not exist yet,
/// remove it otherwise. This is an existence check followed by an insert or a
/// delete, relying on the store for the atomicity of each statement.
pub async fn toggle(store: &dyn Store, user_id: &str, pupo_id: i64) -> Result<VoteAction> {
    if store.get_pupo(pupo_id).await?.is_none() {
        return Err(Error::NotFound(format!("pupo {pupo_id}")));
    }
    let action = if store.has_vote(user_id, pupo_id).await? {
        store.remove_vote(user_id, pupo_id).await?;
        VoteAction::Removed
    } else {
        store.add_vote(user_id, pupo_id).await?;
        VoteAction::Added
    };
    debug!(user_id, pupo_id, %action, "toggled vote");
    Ok(action)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Database, sqlite::SqliteStore};
    use sqlx::{Pool, Sqlite};
    use test_log::test;

    #[test(sqlx::test(
        migrations = "../db/migrations/sqlite",
        fixtures(path = "../../db/fixtures", scripts("pupi", "votes"))
    ))]
    async fn test_toggle(pool: Pool<Sqlite>) {
        let db = Database::Sqlite(SqliteStore::from(pool));

        let before = summary(&*db, Some("google-111")).await.unwrap();
        assert_eq!(before.vote_counts.get(&1), Some(&2));
        assert_eq!(before.vote_counts.get(&2), None);
        assert_eq!(before.user_votes, vec![1, 3]);

        assert_eq!(
            toggle(&*db, "google-111", 2).await.unwrap(),
            VoteAction::Added
        );
        let after = summary(&*db, Some("google-111")).await.unwrap();
        assert_eq!(after.vote_counts.get(&2), Some(&1));
        assert_eq!(after.user_votes, vec![1, 2, 3]);

        assert_eq!(
            toggle(&*db, "google-111", 2).await.unwrap(),
            VoteAction::Removed
        );
        assert_eq!(summary(&*db, Some("google-111")).await.unwrap(), before);
    }

    #[test(sqlx::test(
        migrations = "../db/migrations/sqlite",
        fixtures(path = "../../db/fixtures", scripts("pupi", "votes"))
    ))]
    async fn test_toggle_unknown_pupo(pool: Pool<Sqlite>) {
        let db = Database::Sqlite(SqliteStore::from(pool));
        assert!(matches!(
            toggle(&*db, "google-111", 999).await,
            Err(Error::NotFound(_))
        ));
    }

    #[test(sqlx::test(
        migrations = "../db/migrations/sqlite",
        fixtures(path = "../../db/fixtures", scripts("pupi", "votes"))
    ))]
    async fn test_anonymous_summary(pool: Pool<Sqlite>) {
        let db = Database::Sqlite(SqliteStore::from(pool));
        let s = summary(&*db, None).await.unwrap();
        assert!(s.user_votes.is_empty());
        assert_eq!(s.vote_counts.values().sum::<i64>(), 3);
        let v = serde_json::to_value(&s).unwrap();
        assert_eq!(v["voteCounts"]["1"], 2);
        assert_eq!(v["userVotes"], serde_json::json!([]));
    }

    #[test]
    fn test_action_display() {
        assert_eq!(VoteAction::Added.to_string(), "added");
        assert_eq!(
            serde_json::to_value(VoteAction::Removed).unwrap(),
            serde_json::json!("removed")
        );
    }
}
