//! Outbound Slack Web API calls behind the [`SlackWebApi`] seam.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

use newsbot_core::domain::submission::{ChannelId, SlackTimestamp};
use newsbot_core::domain::tenant::BotCredential;
use newsbot_core::errors::ApplicationError;

use crate::blocks::MessageTemplate;

const AUTHORIZATION_ERROR_CODES: &[&str] = &[
    "not_authed",
    "invalid_auth",
    "account_inactive",
    "token_revoked",
    "token_expired",
    "not_in_channel",
    "channel_not_found",
    "is_archived",
];

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutboundMessage {
    Text(String),
    Blocks(MessageTemplate),
}

impl OutboundMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    fn payload(&self, channel: &ChannelId) -> Value {
        match self {
            Self::Text(text) => json!({ "channel": channel.0, "text": text }),
            Self::Blocks(template) => json!({
                "channel": channel.0,
                "text": template.fallback_text,
                "blocks": template.blocks,
            }),
        }
    }
}

/// What `reactions.get` reports about one message.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MessageInteractions {
    pub item_type: String,
    pub client_msg_id: Option<String>,
    pub reply_count: u64,
    pub reaction_count: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OAuthAccess {
    pub team_id: String,
    pub team_name: Option<String>,
    pub bot_user_id: Option<String>,
    pub scope: Option<String>,
    pub access_token: String,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SlackApiError {
    #[error("slack {method} failed: {code}")]
    Api { method: &'static str, code: String },
    #[error("slack {method} returned http {status}")]
    Status { method: &'static str, status: u16 },
    #[error("slack {method} transport failure: {message}")]
    Transport { method: &'static str, message: String },
    #[error("slack {method} response was not understood: {message}")]
    Decode { method: &'static str, message: String },
}

impl SlackApiError {
    /// Errors meaning the bot can no longer act in the channel or team.
    pub fn is_authorization_revoked(&self) -> bool {
        match self {
            Self::Api { code, .. } => AUTHORIZATION_ERROR_CODES.contains(&code.as_str()),
            Self::Status { status, .. } => matches!(status, 401 | 403),
            Self::Transport { .. } | Self::Decode { .. } => false,
        }
    }
}

impl From<SlackApiError> for ApplicationError {
    fn from(value: SlackApiError) -> Self {
        if value.is_authorization_revoked() {
            Self::AuthorizationRevoked(value.to_string())
        } else {
            Self::TransientPlatform(value.to_string())
        }
    }
}

#[async_trait]
pub trait SlackWebApi: Send + Sync {
    async fn post_message(
        &self,
        channel: &ChannelId,
        message: &OutboundMessage,
    ) -> Result<(), SlackApiError>;

    async fn fetch_interactions(
        &self,
        channel: &ChannelId,
        timestamp: &SlackTimestamp,
    ) -> Result<MessageInteractions, SlackApiError>;
}

/// Builds a per-tenant [`SlackWebApi`] and performs the OAuth code exchange.
#[async_trait]
pub trait SlackConnector: Send + Sync {
    fn connect(&self, credential: &BotCredential) -> Arc<dyn SlackWebApi>;

    async fn exchange_oauth_code(
        &self,
        client_id: &str,
        client_secret: &SecretString,
        code: &str,
    ) -> Result<OAuthAccess, SlackApiError>;
}

#[derive(Clone)]
pub struct HttpSlackConnector {
    http: reqwest::Client,
    api_base: String,
}

impl HttpSlackConnector {
    pub fn new(api_base: &str, request_timeout_secs: u64) -> Result<Self, reqwest::Error> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("newsbot"),
        );
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(request_timeout_secs.max(1)))
            .build()?;

        Ok(Self { http, api_base: api_base.trim_end_matches('/').to_string() })
    }
}

#[async_trait]
impl SlackConnector for HttpSlackConnector {
    fn connect(&self, credential: &BotCredential) -> Arc<dyn SlackWebApi> {
        Arc::new(SlackWebClient {
            http: self.http.clone(),
            api_base: self.api_base.clone(),
            credential: credential.clone(),
        })
    }

    async fn exchange_oauth_code(
        &self,
        client_id: &str,
        client_secret: &SecretString,
        code: &str,
    ) -> Result<OAuthAccess, SlackApiError> {
        const METHOD: &str = "oauth.v2.access";
        let request = self.http.post(format!("{}/{METHOD}", self.api_base)).form(&[
            ("code", code),
            ("client_id", client_id),
            ("client_secret", client_secret.expose_secret()),
        ]);
        let response: OAuthAccessResponse = send_json(METHOD, request).await?;
        if !response.ok {
            return Err(api_error(METHOD, response.error));
        }

        let team = response.team.ok_or_else(|| SlackApiError::Decode {
            method: METHOD,
            message: "response did not include a team".to_string(),
        })?;
        let access_token = response.access_token.filter(|token| !token.is_empty()).ok_or_else(
            || SlackApiError::Decode {
                method: METHOD,
                message: "response did not include an access token".to_string(),
            },
        )?;

        Ok(OAuthAccess {
            team_id: team.id,
            team_name: team.name,
            bot_user_id: response.bot_user_id,
            scope: response.scope,
            access_token,
        })
    }
}

pub struct SlackWebClient {
    http: reqwest::Client,
    api_base: String,
    credential: BotCredential,
}

#[async_trait]
impl SlackWebApi for SlackWebClient {
    async fn post_message(
        &self,
        channel: &ChannelId,
        message: &OutboundMessage,
    ) -> Result<(), SlackApiError> {
        const METHOD: &str = "chat.postMessage";
        let request = self
            .http
            .post(format!("{}/{METHOD}", self.api_base))
            .bearer_auth(self.credential.token())
            .json(&message.payload(channel));

        let response: OkResponse = send_json(METHOD, request).await?;
        if !response.ok {
            return Err(api_error(METHOD, response.error));
        }
        debug!(event_name = "slack.message.posted", channel_id = %channel.0, "posted message");
        Ok(())
    }

    async fn fetch_interactions(
        &self,
        channel: &ChannelId,
        timestamp: &SlackTimestamp,
    ) -> Result<MessageInteractions, SlackApiError> {
        const METHOD: &str = "reactions.get";
        let request = self
            .http
            .get(format!("{}/{METHOD}", self.api_base))
            .bearer_auth(self.credential.token())
            .query(&[
                ("channel", channel.0.as_str()),
                ("timestamp", timestamp.0.as_str()),
                ("full", "true"),
            ]);

        let response: ReactionsGetResponse = send_json(METHOD, request).await?;
        if !response.ok {
            return Err(api_error(METHOD, response.error));
        }
        Ok(response.into_interactions())
    }
}

#[derive(Debug, Deserialize)]
struct OkResponse {
    ok: bool,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReactionsGetResponse {
    ok: bool,
    error: Option<String>,
    #[serde(rename = "type", default)]
    item_type: String,
    message: Option<ReactedMessage>,
}

#[derive(Debug, Deserialize)]
struct ReactedMessage {
    client_msg_id: Option<String>,
    #[serde(default)]
    reply_count: u64,
    #[serde(default)]
    reactions: Vec<Reaction>,
}

#[derive(Debug, Deserialize)]
struct Reaction {
    #[serde(default)]
    count: u64,
}

impl ReactionsGetResponse {
    fn into_interactions(self) -> MessageInteractions {
        let Some(message) = self.message else {
            return MessageInteractions { item_type: self.item_type, ..MessageInteractions::default() };
        };
        MessageInteractions {
            item_type: self.item_type,
            client_msg_id: message.client_msg_id,
            reply_count: message.reply_count,
            reaction_count: message
                .reactions
                .iter()
                .fold(0u64, |total, reaction| total.saturating_add(reaction.count)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OAuthAccessResponse {
    ok: bool,
    error: Option<String>,
    access_token: Option<String>,
    scope: Option<String>,
    bot_user_id: Option<String>,
    team: Option<OAuthTeam>,
}

#[derive(Debug, Deserialize)]
struct OAuthTeam {
    id: String,
    name: Option<String>,
}

fn api_error(method: &'static str, code: Option<String>) -> SlackApiError {
    SlackApiError::Api { method, code: code.unwrap_or_else(|| "unknown_error".to_string()) }
}

async fn send_json<T>(
    method: &'static str,
    request: reqwest::RequestBuilder,
) -> Result<T, SlackApiError>
where
    T: DeserializeOwned,
{
    let response = request
        .send()
        .await
        .map_err(|error| SlackApiError::Transport { method, message: error.to_string() })?;

    let status = response.status();
    if !status.is_success() {
        return Err(SlackApiError::Status { method, status: status.as_u16() });
    }

    response
        .json::<T>()
        .await
        .map_err(|error| SlackApiError::Decode { method, message: error.to_string() })
}
