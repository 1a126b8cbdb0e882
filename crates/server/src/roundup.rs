//! Weekly roundup batch: one digest per channel with recent submissions.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use newsbot_core::domain::submission::ChannelId;
use newsbot_core::errors::ApplicationError;
use newsbot_core::ranking::{select_most_popular, RankingQuery};
use newsbot_db::repositories::{ChannelRef, RepositoryError, SubmissionRepository};
use newsbot_slack::api::{OutboundMessage, SlackConnector};
use newsbot_slack::blocks::{DigestCard, RunnerUp};

use crate::newsroom::gather_snapshots;
use crate::summary::Summarizer;
use crate::tenancy::TenantResolver;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RoundupSummary {
    pub channels_total: usize,
    pub sent: usize,
    pub skipped_empty: usize,
    pub skipped_no_credential: usize,
    pub revoked: usize,
    pub failed: usize,
}

impl RoundupSummary {
    fn tally(&mut self, outcome: ChannelOutcome) {
        match outcome {
            ChannelOutcome::Sent => self.sent += 1,
            ChannelOutcome::Empty => self.skipped_empty += 1,
            ChannelOutcome::NoCredential => self.skipped_no_credential += 1,
            ChannelOutcome::Revoked => self.revoked += 1,
            ChannelOutcome::Failed => self.failed += 1,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ChannelOutcome {
    Sent,
    Empty,
    NoCredential,
    Revoked,
    Failed,
}

#[derive(Clone)]
pub struct Roundup {
    submissions: Arc<dyn SubmissionRepository>,
    tenants: TenantResolver,
    connector: Arc<dyn SlackConnector>,
    summarizer: Arc<dyn Summarizer>,
    day_window: u32,
    max_concurrency: usize,
}

impl Roundup {
    pub fn new(
        submissions: Arc<dyn SubmissionRepository>,
        tenants: TenantResolver,
        connector: Arc<dyn SlackConnector>,
        summarizer: Arc<dyn Summarizer>,
        day_window: u32,
        max_concurrency: usize,
    ) -> Self {
        Self { submissions, tenants, connector, summarizer, day_window, max_concurrency }
    }

    /// Only listing channels can fail the run; every channel after that is isolated.
    pub async fn run(&self) -> Result<RoundupSummary, RepositoryError> {
        let channels = self.submissions.list_channels().await?;
        let mut summary = RoundupSummary { channels_total: channels.len(), ..RoundupSummary::default() };
        info!(
            event_name = "roundup.started",
            channels = channels.len(),
            max_concurrency = self.max_concurrency,
            "starting weekly roundup"
        );

        if self.max_concurrency <= 1 {
            for channel in &channels {
                summary.tally(self.run_channel(channel).await);
            }
        } else {
            let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
            let mut tasks = JoinSet::new();
            for channel in channels {
                let Ok(permit) = semaphore.clone().acquire_owned().await else {
                    summary.tally(ChannelOutcome::Failed);
                    continue;
                };
                let roundup = self.clone();
                tasks.spawn(async move {
                    let _permit = permit;
                    roundup.run_channel(&channel).await
                });
            }
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok(outcome) => summary.tally(outcome),
                    Err(error) => {
                        warn!(event_name = "roundup.channel.panicked", error = %error, "roundup task failed");
                        summary.tally(ChannelOutcome::Failed);
                    }
                }
            }
        }

        info!(
            event_name = "roundup.finished",
            sent = summary.sent,
            skipped_empty = summary.skipped_empty,
            skipped_no_credential = summary.skipped_no_credential,
            revoked = summary.revoked,
            failed = summary.failed,
            "weekly roundup finished"
        );
        Ok(summary)
    }

    async fn run_channel(&self, channel: &ChannelRef) -> ChannelOutcome {
        let channel_id = &channel.channel_id;
        let query = RankingQuery::new(channel_id.clone()).with_window(self.day_window);

        let candidates = match self.submissions.list_since(channel_id, query.since(Utc::now()), None).await {
            Ok(candidates) if candidates.is_empty() => return ChannelOutcome::Empty,
            Ok(candidates) => candidates,
            Err(error) => {
                warn!(
                    event_name = "roundup.channel.failed",
                    channel_id = %channel_id.0,
                    error = %error,
                    "could not load candidates"
                );
                return ChannelOutcome::Failed;
            }
        };

        let credential = match self.tenants.resolve(channel.team_id.as_ref()).await {
            Ok(Some(credential)) => credential,
            Ok(None) => {
                info!(
                    event_name = "roundup.channel.no_credential",
                    channel_id = %channel_id.0,
                    "no bot credential for channel's team"
                );
                return ChannelOutcome::NoCredential;
            }
            Err(error) => {
                warn!(
                    event_name = "roundup.channel.failed",
                    channel_id = %channel_id.0,
                    error = %error,
                    "could not resolve bot credential"
                );
                return ChannelOutcome::Failed;
            }
        };

        let api = self.connector.connect(&credential);
        let ranked = match gather_snapshots(api.as_ref(), channel_id, &candidates).await {
            Ok(ranked) => ranked,
            Err(error) if error.is_authorization_revoked() => {
                return self.revoke_channel(channel_id, &error).await;
            }
            Err(error) => {
                warn!(
                    event_name = "roundup.channel.failed",
                    channel_id = %channel_id.0,
                    error = %error,
                    "could not gather interactions"
                );
                return ChannelOutcome::Failed;
            }
        };
        let Ok(report) = select_most_popular(&query, &ranked) else {
            return ChannelOutcome::Empty;
        };

        let summary = self.summarizer.summarize(report.winner_url()).await;
        let card = DigestCard::new(report.winner_url())
            .with_summary(summary.title, summary.summary)
            .with_runner_ups(candidates.iter().map(|submission| RunnerUp {
                url: submission.url.clone(),
                description: submission.description.clone(),
            }));

        match api.post_message(channel_id, &OutboundMessage::Blocks(card.render())).await {
            Ok(()) => {
                info!(
                    event_name = "roundup.channel.sent",
                    channel_id = %channel_id.0,
                    runner_ups = card.runner_ups().len(),
                    "posted weekly digest"
                );
                ChannelOutcome::Sent
            }
            Err(error) => {
                let error = ApplicationError::from(error);
                if error.is_authorization_revoked() {
                    return self.revoke_channel(channel_id, &error).await;
                }
                warn!(
                    event_name = "roundup.channel.failed",
                    channel_id = %channel_id.0,
                    error = %error,
                    "could not post weekly digest"
                );
                ChannelOutcome::Failed
            }
        }
    }

    async fn revoke_channel(&self, channel_id: &ChannelId, error: &ApplicationError) -> ChannelOutcome {
        let removed = match self.submissions.delete_channel(channel_id).await {
            Ok(removed) => removed,
            Err(delete_error) => {
                warn!(
                    event_name = "roundup.channel.cleanup_failed",
                    channel_id = %channel_id.0,
                    error = %delete_error,
                    "could not remove submissions for revoked channel"
                );
                0
            }
        };
        warn!(
            event_name = "roundup.channel.revoked",
            channel_id = %channel_id.0,
            removed,
            error = %error,
            "bot lost access to channel; submissions removed"
        );
        ChannelOutcome::Revoked
    }
}
