use chrono::{DateTime, Utc};
use sqlx::Row;

use newsbot_core::domain::submission::{
    ChannelId, MessageId, PriorSubmission, RecordOutcome, SlackTimestamp, Submission, TeamId,
    UserId,
};

use super::{ChannelRef, RepositoryError, SubmissionRepository};
use crate::DbPool;

pub struct SqlSubmissionRepository {
    pool: DbPool,
}

impl SqlSubmissionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn decode<T>(result: Result<T, sqlx::Error>) -> Result<T, RepositoryError> {
    result.map_err(|e| RepositoryError::Decode(e.to_string()))
}

fn row_to_submission(row: &sqlx::sqlite::SqliteRow) -> Result<Submission, RepositoryError> {
    let message_id: String = decode(row.try_get("message_id"))?;
    let channel_id: String = decode(row.try_get("channel_id"))?;
    let team_id: Option<String> = decode(row.try_get("team_id"))?;
    let ts: String = decode(row.try_get("ts"))?;
    let submitter: String = decode(row.try_get("submitter_user_id"))?;
    let url: String = decode(row.try_get("url"))?;
    let description: String = decode(row.try_get("description"))?;
    let tags: String = decode(row.try_get("tags"))?;

    Ok(Submission {
        message_id: MessageId(message_id),
        channel_id: ChannelId(channel_id),
        team_id: team_id.map(TeamId),
        timestamp: SlackTimestamp(ts),
        submitter: UserId(submitter),
        url,
        description,
        tags: Submission::tags_from_column(&tags),
    })
}

#[async_trait::async_trait]
impl SubmissionRepository for SqlSubmissionRepository {
    async fn find_by_url(
        &self,
        channel_id: &ChannelId,
        url: &str,
    ) -> Result<Option<PriorSubmission>, RepositoryError> {
        let row = sqlx::query(
            "SELECT ts, submitter_user_id FROM submission WHERE channel_id = ? AND url = ?",
        )
        .bind(&channel_id.0)
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => {
                let ts: String = decode(r.try_get("ts"))?;
                let submitter: String = decode(r.try_get("submitter_user_id"))?;
                Ok(Some(PriorSubmission {
                    timestamp: SlackTimestamp(ts),
                    submitter: UserId(submitter),
                }))
            }
            None => Ok(None),
        }
    }

    async fn record(&self, submission: Submission) -> Result<RecordOutcome, RepositoryError> {
        let ts_epoch = submission.timestamp.epoch_seconds().ok_or_else(|| {
            RepositoryError::InvalidRecord(format!(
                "submission timestamp `{}` is not a slack ts",
                submission.timestamp.0
            ))
        })?;

        let inserted = sqlx::query(
            "INSERT INTO submission (message_id, channel_id, team_id, ts, ts_epoch,
                                     submitter_user_id, url, description, tags, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&submission.message_id.0)
        .bind(&submission.channel_id.0)
        .bind(submission.team_id.as_ref().map(|team| team.0.as_str()))
        .bind(&submission.timestamp.0)
        .bind(ts_epoch)
        .bind(&submission.submitter.0)
        .bind(&submission.url)
        .bind(&submission.description)
        .bind(submission.tags_column())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await;

        match inserted {
            Ok(_) => Ok(RecordOutcome::Recorded),
            Err(sqlx::Error::Database(error)) if error.is_unique_violation() => {
                let prior = self.find_by_url(&submission.channel_id, &submission.url).await?;
                prior.map(RecordOutcome::Duplicate).ok_or_else(|| {
                    RepositoryError::Decode(format!(
                        "unique violation for `{}` without a stored row",
                        submission.url
                    ))
                })
            }
            Err(error) => Err(error.into()),
        }
    }

    async fn list_since(
        &self,
        channel_id: &ChannelId,
        since: DateTime<Utc>,
        tag: Option<&str>,
    ) -> Result<Vec<Submission>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = if let Some(tag) = tag {
            sqlx::query(
                "SELECT message_id, channel_id, team_id, ts, submitter_user_id, url,
                        description, tags
                 FROM submission
                 WHERE channel_id = ? AND ts_epoch >= ? AND instr(tags, ?) > 0
                 ORDER BY ts_epoch ASC, id ASC",
            )
            .bind(&channel_id.0)
            .bind(since.timestamp())
            .bind(tag)
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query(
                "SELECT message_id, channel_id, team_id, ts, submitter_user_id, url,
                        description, tags
                 FROM submission
                 WHERE channel_id = ? AND ts_epoch >= ?
                 ORDER BY ts_epoch ASC, id ASC",
            )
            .bind(&channel_id.0)
            .bind(since.timestamp())
            .fetch_all(&self.pool)
            .await?
        };

        rows.iter().map(row_to_submission).collect::<Result<Vec<_>, _>>()
    }

    async fn list_channels(&self) -> Result<Vec<ChannelRef>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT channel_id, MAX(team_id) AS team_id FROM submission
             GROUP BY channel_id ORDER BY channel_id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let channel_id: String = decode(row.try_get("channel_id"))?;
                let team_id: Option<String> = decode(row.try_get("team_id"))?;
                Ok(ChannelRef { channel_id: ChannelId(channel_id), team_id: team_id.map(TeamId) })
            })
            .collect()
    }

    async fn delete_channel(&self, channel_id: &ChannelId) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM submission WHERE channel_id = ?")
            .bind(&channel_id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_team(&self, team_id: &TeamId) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM submission WHERE team_id = ?")
            .bind(&team_id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
