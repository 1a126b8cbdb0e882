use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use newsbot_core::domain::submission::{ChannelId, TeamId};
use newsbot_core::errors::ApplicationError;
use newsbot_core::mention::MentionEvent;

/// Top-level body of an Events API request.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventsApiPayload {
    UrlVerification {
        challenge: String,
    },
    EventCallback {
        #[serde(default)]
        team_id: String,
        #[serde(default)]
        event_id: String,
        event: SlackEvent,
    },
    #[serde(other)]
    Unsupported,
}

impl EventsApiPayload {
    pub fn parse(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }

    /// `None` for handshakes and payload kinds the bot does not subscribe to.
    pub fn into_envelope(self) -> Option<SlackEnvelope> {
        match self {
            Self::EventCallback { team_id, event_id, event } => Some(SlackEnvelope {
                envelope_id: event_id,
                team_id: non_empty(team_id).map(TeamId),
                event,
            }),
            Self::UrlVerification { .. } | Self::Unsupported => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlackEnvelope {
    pub envelope_id: String,
    pub team_id: Option<TeamId>,
    pub event: SlackEvent,
}

impl SlackEnvelope {
    /// The envelope team wins. Events that carry their own team id fill the gap.
    pub fn team(&self) -> Option<TeamId> {
        if let Some(team) = &self.team_id {
            return Some(team.clone());
        }
        match &self.event {
            SlackEvent::AppMention(event) => non_empty(event.team.clone()).map(TeamId),
            SlackEvent::TokensRevoked { team_id } => non_empty(team_id.clone()).map(TeamId),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SlackEvent {
    AppMention(MentionEvent),
    ChannelDeleted {
        #[serde(default)]
        channel: String,
    },
    TokensRevoked {
        #[serde(default)]
        team_id: String,
    },
    AppUninstalled,
    #[serde(other)]
    Unsupported,
}

impl SlackEvent {
    pub fn event_type(&self) -> SlackEventType {
        match self {
            Self::AppMention(_) => SlackEventType::AppMention,
            Self::ChannelDeleted { .. } => SlackEventType::ChannelDeleted,
            Self::TokensRevoked { .. } => SlackEventType::TokensRevoked,
            Self::AppUninstalled => SlackEventType::AppUninstalled,
            Self::Unsupported => SlackEventType::Unsupported,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SlackEventType {
    AppMention,
    ChannelDeleted,
    TokensRevoked,
    AppUninstalled,
    Unsupported,
}

impl SlackEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AppMention => "app_mention",
            Self::ChannelDeleted => "channel_deleted",
            Self::TokensRevoked => "tokens_revoked",
            Self::AppUninstalled => "app_uninstalled",
            Self::Unsupported => "unsupported",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Processed,
    Ignored,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error("mention handler failure: {0}")]
    Mention(#[source] ApplicationError),
    #[error("lifecycle handler failure: {0}")]
    Lifecycle(#[source] ApplicationError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> SlackEventType;
    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<SlackEventType, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_type(), Arc::new(handler));
    }

    pub async fn dispatch(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let Some(handler) = self.handlers.get(&envelope.event.event_type()) else {
            return Ok(HandlerResult::Ignored);
        };

        handler.handle(envelope, ctx).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

/// Registers every event the bot subscribes to against the given services.
pub fn newsroom_dispatcher<M, L>(mentions: Arc<M>, lifecycle: Arc<L>) -> EventDispatcher
where
    M: MentionService + 'static,
    L: LifecycleService + 'static,
{
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(MentionHandler::new(mentions));
    dispatcher.register(ChannelDeletedHandler::new(lifecycle.clone()));
    dispatcher.register(TeamRevokedHandler::new(lifecycle.clone(), SlackEventType::TokensRevoked));
    dispatcher.register(TeamRevokedHandler::new(lifecycle, SlackEventType::AppUninstalled));
    dispatcher
}

#[async_trait]
pub trait MentionService: Send + Sync {
    async fn handle_mention(
        &self,
        team_id: Option<TeamId>,
        event: &MentionEvent,
        ctx: &EventContext,
    ) -> Result<(), EventHandlerError>;
}

#[async_trait]
pub trait LifecycleService: Send + Sync {
    async fn channel_deleted(
        &self,
        channel_id: &ChannelId,
        ctx: &EventContext,
    ) -> Result<(), EventHandlerError>;

    async fn team_revoked(&self, team_id: &TeamId, ctx: &EventContext)
        -> Result<(), EventHandlerError>;
}

pub struct MentionHandler<S> {
    service: Arc<S>,
}

impl<S> MentionHandler<S>
where
    S: MentionService,
{
    pub fn new(service: Arc<S>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for MentionHandler<S>
where
    S: MentionService + 'static,
{
    fn event_type(&self) -> SlackEventType {
        SlackEventType::AppMention
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::AppMention(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        self.service.handle_mention(envelope.team(), event, ctx).await?;
        Ok(HandlerResult::Processed)
    }
}

pub struct ChannelDeletedHandler<S> {
    service: Arc<S>,
}

impl<S> ChannelDeletedHandler<S>
where
    S: LifecycleService,
{
    pub fn new(service: Arc<S>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for ChannelDeletedHandler<S>
where
    S: LifecycleService + 'static,
{
    fn event_type(&self) -> SlackEventType {
        SlackEventType::ChannelDeleted
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::ChannelDeleted { channel } = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };
        if channel.is_empty() {
            return Ok(HandlerResult::Ignored);
        }

        self.service.channel_deleted(&ChannelId(channel.clone()), ctx).await?;
        Ok(HandlerResult::Processed)
    }
}

/// Handles both `tokens_revoked` and `app_uninstalled`; register one per event type.
pub struct TeamRevokedHandler<S> {
    service: Arc<S>,
    event_type: SlackEventType,
}

impl<S> TeamRevokedHandler<S>
where
    S: LifecycleService,
{
    pub fn new(service: Arc<S>, event_type: SlackEventType) -> Self {
        Self { service, event_type }
    }
}

#[async_trait]
impl<S> EventHandler for TeamRevokedHandler<S>
where
    S: LifecycleService + 'static,
{
    fn event_type(&self) -> SlackEventType {
        self.event_type
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        if !matches!(envelope.event, SlackEvent::TokensRevoked { .. } | SlackEvent::AppUninstalled)
        {
            return Ok(HandlerResult::Ignored);
        }
        let Some(team_id) = envelope.team() else {
            return Ok(HandlerResult::Ignored);
        };

        self.service.team_revoked(&team_id, ctx).await?;
        Ok(HandlerResult::Processed)
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}
