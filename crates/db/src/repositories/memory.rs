use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use newsbot_core::domain::submission::{
    ChannelId, PriorSubmission, RecordOutcome, Submission, TeamId,
};
use newsbot_core::domain::tenant::TenantCredential;

use super::{ChannelRef, RepositoryError, SubmissionRepository, TenantRepository};

#[derive(Default)]
pub struct InMemorySubmissionRepository {
    submissions: RwLock<Vec<(i64, Submission)>>,
}

impl InMemorySubmissionRepository {
    pub async fn count(&self) -> usize {
        self.submissions.read().await.len()
    }
}

#[async_trait::async_trait]
impl SubmissionRepository for InMemorySubmissionRepository {
    async fn find_by_url(
        &self,
        channel_id: &ChannelId,
        url: &str,
    ) -> Result<Option<PriorSubmission>, RepositoryError> {
        let submissions = self.submissions.read().await;
        Ok(submissions
            .iter()
            .find(|(_, stored)| &stored.channel_id == channel_id && stored.url == url)
            .map(|(_, stored)| stored.prior()))
    }

    async fn record(&self, submission: Submission) -> Result<RecordOutcome, RepositoryError> {
        let epoch = submission.timestamp.epoch_seconds().ok_or_else(|| {
            RepositoryError::InvalidRecord(format!(
                "submission timestamp `{}` is not a slack ts",
                submission.timestamp.0
            ))
        })?;

        let mut submissions = self.submissions.write().await;
        let existing = submissions.iter().find(|(_, stored)| {
            stored.channel_id == submission.channel_id && stored.url == submission.url
        });
        if let Some((_, stored)) = existing {
            return Ok(RecordOutcome::Duplicate(stored.prior()));
        }

        submissions.push((epoch, submission));
        Ok(RecordOutcome::Recorded)
    }

    async fn list_since(
        &self,
        channel_id: &ChannelId,
        since: DateTime<Utc>,
        tag: Option<&str>,
    ) -> Result<Vec<Submission>, RepositoryError> {
        let since = since.timestamp();
        let submissions = self.submissions.read().await;
        let mut matched: Vec<&(i64, Submission)> = submissions
            .iter()
            .filter(|(epoch, stored)| &stored.channel_id == channel_id && *epoch >= since)
            .filter(|(_, stored)| tag.map_or(true, |tag| stored.tags_column().contains(tag)))
            .collect();
        matched.sort_by_key(|(epoch, _)| *epoch);

        Ok(matched.into_iter().map(|(_, stored)| stored.clone()).collect())
    }

    async fn list_channels(&self) -> Result<Vec<ChannelRef>, RepositoryError> {
        let submissions = self.submissions.read().await;
        let mut channels: BTreeMap<ChannelId, Option<TeamId>> = BTreeMap::new();
        for (_, stored) in submissions.iter() {
            let team = channels.entry(stored.channel_id.clone()).or_default();
            if team.is_none() {
                *team = stored.team_id.clone();
            }
        }

        Ok(channels
            .into_iter()
            .map(|(channel_id, team_id)| ChannelRef { channel_id, team_id })
            .collect())
    }

    async fn delete_channel(&self, channel_id: &ChannelId) -> Result<u64, RepositoryError> {
        let mut submissions = self.submissions.write().await;
        let before = submissions.len();
        submissions.retain(|(_, stored)| &stored.channel_id != channel_id);
        Ok((before - submissions.len()) as u64)
    }

    async fn delete_team(&self, team_id: &TeamId) -> Result<u64, RepositoryError> {
        let mut submissions = self.submissions.write().await;
        let before = submissions.len();
        submissions.retain(|(_, stored)| stored.team_id.as_ref() != Some(team_id));
        Ok((before - submissions.len()) as u64)
    }
}

#[derive(Default)]
pub struct InMemoryTenantRepository {
    tenants: RwLock<HashMap<String, TenantCredential>>,
}

#[async_trait::async_trait]
impl TenantRepository for InMemoryTenantRepository {
    async fn find(&self, team_id: &TeamId) -> Result<Option<TenantCredential>, RepositoryError> {
        let tenants = self.tenants.read().await;
        Ok(tenants.get(&team_id.0).cloned())
    }

    async fn save(&self, tenant: TenantCredential) -> Result<(), RepositoryError> {
        let mut tenants = self.tenants.write().await;
        tenants.insert(tenant.team_id.0.clone(), tenant);
        Ok(())
    }

    async fn delete(&self, team_id: &TeamId) -> Result<bool, RepositoryError> {
        let mut tenants = self.tenants.write().await;
        Ok(tenants.remove(&team_id.0).is_some())
    }
}
