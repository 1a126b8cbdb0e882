use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, warn};

use newsbot_core::command::PopularQuery;
use newsbot_core::domain::submission::{ChannelId, RecordOutcome, Submission, TeamId};
use newsbot_core::domain::tenant::BotCredential;
use newsbot_core::errors::{ApplicationError, DomainError};
use newsbot_core::mention::{parse_mention, MentionEvent, MentionOptions, ParsedMention};
use newsbot_core::ranking::{select_most_popular, InteractionSnapshot, RankedCandidate, RankingQuery};
use newsbot_db::repositories::{retrieve_candidates, SubmissionRepository, TagUnion};
use newsbot_slack::api::{OutboundMessage, SlackConnector, SlackWebApi};
use newsbot_slack::commands::{CommandEnvelope, CommandRouteError, PopularNewsService};
use newsbot_slack::events::{EventContext, EventHandlerError, LifecycleService, MentionService};

use crate::tenancy::TenantResolver;

/// Mention intake, `/popular_news`, and workspace lifecycle cleanup.
#[derive(Clone)]
pub struct Newsroom {
    submissions: Arc<dyn SubmissionRepository>,
    tenants: TenantResolver,
    connector: Arc<dyn SlackConnector>,
    mention_options: MentionOptions,
    tag_union: TagUnion,
}

impl Newsroom {
    pub fn new(
        submissions: Arc<dyn SubmissionRepository>,
        tenants: TenantResolver,
        connector: Arc<dyn SlackConnector>,
        mention_options: MentionOptions,
        tag_union: TagUnion,
    ) -> Self {
        Self { submissions, tenants, connector, mention_options, tag_union }
    }

    pub fn tenants(&self) -> &TenantResolver {
        &self.tenants
    }

    async fn credential(&self, team_id: Option<&TeamId>, correlation_id: &str) -> Option<BotCredential> {
        match self.tenants.resolve(team_id).await {
            Ok(credential) => credential,
            Err(error) => {
                warn!(
                    event_name = "newsroom.tenant.unresolved",
                    correlation_id = %correlation_id,
                    error = %error,
                    "could not resolve bot credential"
                );
                None
            }
        }
    }

    /// Sends are best effort; a team without a credential is skipped.
    async fn post_text(
        &self,
        team_id: Option<&TeamId>,
        channel_id: &ChannelId,
        text: String,
        correlation_id: &str,
    ) {
        let Some(credential) = self.credential(team_id, correlation_id).await else {
            return;
        };
        let api = self.connector.connect(&credential);
        if let Err(error) = api.post_message(channel_id, &OutboundMessage::Text(text)).await {
            let error = ApplicationError::from(error);
            warn!(
                event_name = "newsroom.message.failed",
                correlation_id = %correlation_id,
                channel_id = %channel_id.0,
                revoked = error.is_authorization_revoked(),
                error = %error,
                "failed to post reply"
            );
        }
    }

    async fn record_submission(&self, submission: &Submission) -> Result<String, EventHandlerError> {
        let existing = self
            .submissions
            .find_by_url(&submission.channel_id, &submission.url)
            .await
            .map_err(|error| EventHandlerError::Mention(error.into()))?;
        if let Some(prior) = existing {
            return Ok(prior.scooped_text());
        }

        let outcome = self
            .submissions
            .record(submission.clone())
            .await
            .map_err(|error| EventHandlerError::Mention(error.into()))?;
        Ok(match outcome {
            RecordOutcome::Recorded => submission.recorded_text(),
            RecordOutcome::Duplicate(prior) => prior.scooped_text(),
        })
    }
}

/// Fetches interactions for each candidate in order. A transient failed fetch, a non-message
/// item, or a message whose id does not match drops that candidate only. Losing access to the
/// channel ends the pass with [`ApplicationError::AuthorizationRevoked`].
pub async fn gather_snapshots(
    api: &dyn SlackWebApi,
    channel_id: &ChannelId,
    candidates: &[Submission],
) -> Result<Vec<RankedCandidate>, ApplicationError> {
    let mut ranked = Vec::with_capacity(candidates.len());
    for submission in candidates {
        let interactions = match api.fetch_interactions(channel_id, &submission.timestamp).await {
            Ok(interactions) => interactions,
            Err(error) => {
                let error = ApplicationError::from(error);
                if error.is_authorization_revoked() {
                    warn!(
                        event_name = "ranking.interactions.revoked",
                        channel_id = %channel_id.0,
                        message_id = %submission.message_id.0,
                        error = %error,
                        "bot lost access while fetching interactions"
                    );
                    return Err(error);
                }
                warn!(
                    event_name = "ranking.interactions.failed",
                    channel_id = %channel_id.0,
                    message_id = %submission.message_id.0,
                    error = %error,
                    "excluding candidate after failed interaction fetch"
                );
                continue;
            }
        };

        if interactions.item_type != "message" {
            warn!(
                event_name = "ranking.interactions.not_message",
                channel_id = %channel_id.0,
                message_id = %submission.message_id.0,
                item_type = %interactions.item_type,
                "excluding candidate whose item is not a message"
            );
            continue;
        }
        if interactions.client_msg_id.as_deref() != Some(submission.message_id.0.as_str()) {
            warn!(
                event_name = "ranking.interactions.mismatch",
                channel_id = %channel_id.0,
                message_id = %submission.message_id.0,
                "excluding candidate whose fetched message id differs"
            );
            continue;
        }

        ranked.push(RankedCandidate {
            submission: submission.clone(),
            snapshot: InteractionSnapshot::new(interactions.reply_count, interactions.reaction_count),
        });
    }
    Ok(ranked)
}

#[async_trait]
impl MentionService for Newsroom {
    async fn handle_mention(
        &self,
        team_id: Option<TeamId>,
        event: &MentionEvent,
        ctx: &EventContext,
    ) -> Result<(), EventHandlerError> {
        let channel_id = ChannelId(event.channel.clone());
        info!(
            event_name = "ingress.slack.mention",
            correlation_id = %ctx.correlation_id,
            channel_id = %channel_id.0,
            "received mention"
        );

        let mut submission = match parse_mention(event, self.mention_options) {
            ParsedMention::Complete(submission) => submission,
            ParsedMention::Incomplete { missing } => {
                let fields: Vec<&str> = missing.iter().map(|field| field.as_str()).collect();
                let error = DomainError::MalformedInput { missing };
                info!(
                    event_name = "newsroom.mention.incomplete",
                    correlation_id = %ctx.correlation_id,
                    missing = ?fields,
                    "mention is missing a link or caption"
                );
                if !channel_id.0.is_empty() {
                    self.post_text(team_id.as_ref(), &channel_id, error.reply_text(), &ctx.correlation_id)
                        .await;
                }
                return Ok(());
            }
        };
        if submission.team_id.is_none() {
            submission.team_id = team_id.clone();
        }

        let reply = self.record_submission(&submission).await?;
        info!(
            event_name = "newsroom.submission.recorded",
            correlation_id = %ctx.correlation_id,
            channel_id = %channel_id.0,
            message_id = %submission.message_id.0,
            "processed submission"
        );
        self.post_text(submission.team_id.as_ref(), &channel_id, reply, &ctx.correlation_id).await;
        Ok(())
    }
}

#[async_trait]
impl PopularNewsService for Newsroom {
    async fn most_popular(
        &self,
        query: PopularQuery,
        envelope: &CommandEnvelope,
    ) -> Result<String, CommandRouteError> {
        let Some(credential) = self.credential(Some(&envelope.team_id), &envelope.request_id).await
        else {
            return Err(ApplicationError::AuthorizationRevoked(format!(
                "no usable bot credential for team `{}`",
                envelope.team_id.0
            ))
            .into());
        };

        let ranking_query = RankingQuery::new(envelope.channel_id.clone())
            .with_window(query.day_window)
            .with_tags(query.tags.clone());
        let candidates = retrieve_candidates(
            self.submissions.as_ref(),
            &ranking_query.channel_id,
            ranking_query.since(Utc::now()),
            &ranking_query.tags,
            self.tag_union,
        )
        .await
        .map_err(ApplicationError::from)?;
        if candidates.is_empty() {
            return Ok(DomainError::EmptyCandidateSet.reply_text());
        }

        let api = self.connector.connect(&credential);
        let ranked = gather_snapshots(api.as_ref(), &ranking_query.channel_id, &candidates).await?;
        let report = match select_most_popular(&ranking_query, &ranked).map_err(DomainError::from) {
            Ok(report) => report,
            Err(error) => return Ok(error.reply_text()),
        };

        info!(
            event_name = "newsroom.popular.ranked",
            correlation_id = %envelope.request_id,
            channel_id = %envelope.channel_id.0,
            candidates = candidates.len(),
            ranked = ranked.len(),
            tie = report.tie,
            "ranked popular news"
        );
        Ok(format!("{}{}", query.advisory_prefix(), report.render()))
    }
}

#[async_trait]
impl LifecycleService for Newsroom {
    async fn channel_deleted(
        &self,
        channel_id: &ChannelId,
        ctx: &EventContext,
    ) -> Result<(), EventHandlerError> {
        let removed = self
            .submissions
            .delete_channel(channel_id)
            .await
            .map_err(|error| EventHandlerError::Lifecycle(error.into()))?;
        info!(
            event_name = "newsroom.channel.deleted",
            correlation_id = %ctx.correlation_id,
            channel_id = %channel_id.0,
            removed,
            "removed submissions for deleted channel"
        );
        Ok(())
    }

    async fn team_revoked(&self, team_id: &TeamId, ctx: &EventContext) -> Result<(), EventHandlerError> {
        let tenant_removed = self
            .tenants
            .revoke(team_id)
            .await
            .map_err(|error| EventHandlerError::Lifecycle(error.into()))?;
        let removed = self
            .submissions
            .delete_team(team_id)
            .await
            .map_err(|error| EventHandlerError::Lifecycle(error.into()))?;
        info!(
            event_name = "newsroom.team.revoked",
            correlation_id = %ctx.correlation_id,
            team_id = %team_id.0,
            tenant_removed,
            removed,
            "removed tenant and its submissions"
        );
        Ok(())
    }
}
