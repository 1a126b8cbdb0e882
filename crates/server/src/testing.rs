//! Hand-written Slack fake shared by the service and router tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use secrecy::SecretString;

use newsbot_core::domain::submission::{ChannelId, SlackTimestamp, Submission};
use newsbot_core::domain::tenant::BotCredential;
use newsbot_slack::api::{
    MessageInteractions, OAuthAccess, OutboundMessage, SlackApiError, SlackConnector, SlackWebApi,
};
use newsbot_slack::blocks::MessageTemplate;

#[derive(Default)]
struct FakeState {
    interactions: HashMap<String, Result<MessageInteractions, SlackApiError>>,
    post_failures: HashMap<String, SlackApiError>,
    posts: Vec<(ChannelId, OutboundMessage)>,
    tokens: Vec<String>,
    oauth: Option<Result<OAuthAccess, SlackApiError>>,
}

#[derive(Clone, Default)]
pub struct FakeSlack {
    state: Arc<Mutex<FakeState>>,
}

impl FakeSlack {
    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().expect("fake slack state")
    }

    fn message_key(channel: &ChannelId, timestamp: &SlackTimestamp) -> String {
        format!("{}:{}", channel.0, timestamp.0)
    }

    pub fn set_interactions(&self, submission: &Submission, replies: u64, reactions: u64) {
        self.state().interactions.insert(
            Self::message_key(&submission.channel_id, &submission.timestamp),
            Ok(MessageInteractions {
                item_type: "message".to_string(),
                client_msg_id: Some(submission.message_id.0.clone()),
                reply_count: replies,
                reaction_count: reactions,
            }),
        );
    }

    pub fn set_foreign_message(&self, submission: &Submission) {
        self.state().interactions.insert(
            Self::message_key(&submission.channel_id, &submission.timestamp),
            Ok(MessageInteractions {
                item_type: "message".to_string(),
                client_msg_id: Some("someone-elses-message".to_string()),
                reply_count: 9,
                reaction_count: 9,
            }),
        );
    }

    pub fn fail_interactions(&self, submission: &Submission) {
        self.fail_interactions_with(submission, "ratelimited");
    }

    pub fn fail_interactions_with(&self, submission: &Submission, code: &str) {
        self.state().interactions.insert(
            Self::message_key(&submission.channel_id, &submission.timestamp),
            Err(SlackApiError::Api { method: "reactions.get", code: code.to_string() }),
        );
    }

    pub fn fail_posts_to(&self, channel: &str, code: &str) {
        self.state().post_failures.insert(
            channel.to_string(),
            SlackApiError::Api { method: "chat.postMessage", code: code.to_string() },
        );
    }

    pub fn set_oauth(&self, outcome: Result<OAuthAccess, SlackApiError>) {
        self.state().oauth = Some(outcome);
    }

    pub fn posted_texts(&self) -> Vec<String> {
        self.state()
            .posts
            .iter()
            .filter_map(|(_, message)| match message {
                OutboundMessage::Text(text) => Some(text.clone()),
                OutboundMessage::Blocks(_) => None,
            })
            .collect()
    }

    pub fn posted_digests(&self) -> Vec<(ChannelId, MessageTemplate)> {
        self.state()
            .posts
            .iter()
            .filter_map(|(channel, message)| match message {
                OutboundMessage::Blocks(template) => Some((channel.clone(), template.clone())),
                OutboundMessage::Text(_) => None,
            })
            .collect()
    }

    pub fn tokens_used(&self) -> Vec<String> {
        self.state().tokens.clone()
    }
}

#[async_trait]
impl SlackWebApi for FakeSlack {
    async fn post_message(
        &self,
        channel: &ChannelId,
        message: &OutboundMessage,
    ) -> Result<(), SlackApiError> {
        let mut state = self.state();
        if let Some(error) = state.post_failures.get(&channel.0) {
            return Err(error.clone());
        }
        state.posts.push((channel.clone(), message.clone()));
        Ok(())
    }

    async fn fetch_interactions(
        &self,
        channel: &ChannelId,
        timestamp: &SlackTimestamp,
    ) -> Result<MessageInteractions, SlackApiError> {
        let key = Self::message_key(channel, timestamp);
        self.state().interactions.get(&key).cloned().unwrap_or_else(|| {
            Err(SlackApiError::Api { method: "reactions.get", code: "message_not_found".to_string() })
        })
    }
}

#[async_trait]
impl SlackConnector for FakeSlack {
    fn connect(&self, credential: &BotCredential) -> Arc<dyn SlackWebApi> {
        self.state().tokens.push(credential.token().to_string());
        Arc::new(self.clone())
    }

    async fn exchange_oauth_code(
        &self,
        _client_id: &str,
        _client_secret: &SecretString,
        code: &str,
    ) -> Result<OAuthAccess, SlackApiError> {
        self.state().oauth.clone().unwrap_or_else(|| {
            Err(SlackApiError::Api { method: "oauth.v2.access", code: format!("invalid_code:{code}") })
        })
    }
}
