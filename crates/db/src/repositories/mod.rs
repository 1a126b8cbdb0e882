use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use newsbot_core::domain::submission::{
    ChannelId, PriorSubmission, RecordOutcome, Submission, TeamId,
};
use newsbot_core::domain::tenant::TenantCredential;
use newsbot_core::errors::ApplicationError;

pub mod candidates;
pub mod memory;
pub mod submission;
pub mod tenant;

pub use candidates::{retrieve_candidates, TagUnion};
pub use memory::{InMemorySubmissionRepository, InMemoryTenantRepository};
pub use submission::SqlSubmissionRepository;
pub use tenant::SqlTenantRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("invalid record: {0}")]
    InvalidRecord(String),
}

impl From<RepositoryError> for ApplicationError {
    fn from(value: RepositoryError) -> Self {
        Self::Persistence(value.to_string())
    }
}

/// A channel with at least one stored submission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelRef {
    pub channel_id: ChannelId,
    pub team_id: Option<TeamId>,
}

#[async_trait]
pub trait SubmissionRepository: Send + Sync {
    async fn find_by_url(
        &self,
        channel_id: &ChannelId,
        url: &str,
    ) -> Result<Option<PriorSubmission>, RepositoryError>;

    /// Stores a submission. Losing a race against an identical URL yields `Duplicate`.
    async fn record(&self, submission: Submission) -> Result<RecordOutcome, RepositoryError>;

    /// Submissions posted at or after `since`, oldest first. `tag` is a substring match.
    async fn list_since(
        &self,
        channel_id: &ChannelId,
        since: DateTime<Utc>,
        tag: Option<&str>,
    ) -> Result<Vec<Submission>, RepositoryError>;

    async fn list_channels(&self) -> Result<Vec<ChannelRef>, RepositoryError>;

    async fn delete_channel(&self, channel_id: &ChannelId) -> Result<u64, RepositoryError>;

    async fn delete_team(&self, team_id: &TeamId) -> Result<u64, RepositoryError>;
}

#[async_trait]
pub trait TenantRepository: Send + Sync {
    async fn find(&self, team_id: &TeamId) -> Result<Option<TenantCredential>, RepositoryError>;
    async fn save(&self, tenant: TenantCredential) -> Result<(), RepositoryError>;
    async fn delete(&self, team_id: &TeamId) -> Result<bool, RepositoryError>;
}

#[cfg(test)]
mod tests {
    use newsbot_core::errors::ApplicationError;

    use super::RepositoryError;

    #[test]
    fn repository_failures_are_persistence_errors() {
        let error = ApplicationError::from(RepositoryError::Decode("bad timestamp".to_string()));
        assert_eq!(error, ApplicationError::Persistence("decode error: bad timestamp".to_string()));
    }
}
