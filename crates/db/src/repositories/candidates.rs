use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tracing::debug;

use newsbot_core::domain::submission::{ChannelId, Submission};

use super::{RepositoryError, SubmissionRepository};

/// How per-tag result lists are combined.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TagUnion {
    /// A submission matching two tags is ranked twice.
    #[default]
    PreserveDuplicates,
    Distinct,
}

impl TagUnion {
    pub fn from_distinct_flag(distinct: bool) -> Self {
        if distinct {
            Self::Distinct
        } else {
            Self::PreserveDuplicates
        }
    }
}

pub async fn retrieve_candidates(
    repo: &dyn SubmissionRepository,
    channel_id: &ChannelId,
    since: DateTime<Utc>,
    tags: &[String],
    union: TagUnion,
) -> Result<Vec<Submission>, RepositoryError> {
    if tags.is_empty() {
        return repo.list_since(channel_id, since, None).await;
    }

    let mut candidates = Vec::new();
    for tag in tags {
        let matched = repo.list_since(channel_id, since, Some(tag)).await?;
        debug!(
            event_name = "candidates.tag.matched",
            channel_id = %channel_id.0,
            tag = %tag,
            matched = matched.len(),
            "retrieved candidates for tag"
        );
        candidates.extend(matched);
    }

    if union == TagUnion::Distinct {
        let mut seen = HashSet::new();
        candidates.retain(|submission| seen.insert(submission.message_id.clone()));
    }

    Ok(candidates)
}
