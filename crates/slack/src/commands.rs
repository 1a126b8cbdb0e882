use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use newsbot_core::command::{parse_popular_command, PopularCommand, PopularQuery, POPULAR_NEWS_HELP};
use newsbot_core::domain::submission::{ChannelId, TeamId, UserId};
use newsbot_core::errors::{ApplicationError, DomainError, InterfaceError};

/// Form body Slack posts for a slash command.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct SlashCommandPayload {
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub channel_id: String,
    #[serde(default)]
    pub team_id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub trigger_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandEnvelope {
    pub command: String,
    pub text: String,
    pub channel_id: ChannelId,
    pub team_id: TeamId,
    pub user_id: UserId,
    pub request_id: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("unsupported slash command: {0}")]
    UnsupportedCommand(String),
    #[error("slash command payload is missing `{0}`")]
    MissingContext(&'static str),
}

impl CommandParseError {
    /// A payload Slack should never send is reported like any other platform failure.
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        InterfaceError::ServiceUnavailable { message: self.to_string(), correlation_id: correlation_id.into() }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandRouteError {
    #[error("command service failed: {0}")]
    Application(#[from] ApplicationError),
}

impl CommandRouteError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        match self {
            Self::Application(error) => error.into_interface(correlation_id),
        }
    }
}

/// Validates the command name and lifts the ids into typed form. Argument text is left untouched
/// so the parser sees the exact tokens the user typed.
pub fn normalize_popular_command(
    payload: SlashCommandPayload,
    expected_command: &str,
) -> Result<CommandEnvelope, CommandParseError> {
    if payload.command != expected_command {
        return Err(CommandParseError::UnsupportedCommand(payload.command));
    }
    if payload.channel_id.is_empty() {
        return Err(CommandParseError::MissingContext("channel_id"));
    }
    if payload.team_id.is_empty() {
        return Err(CommandParseError::MissingContext("team_id"));
    }

    Ok(CommandEnvelope {
        command: payload.command,
        text: payload.text,
        channel_id: ChannelId(payload.channel_id),
        team_id: TeamId(payload.team_id),
        user_id: UserId(payload.user_id),
        request_id: payload.trigger_id,
    })
}

pub struct CommandRouter<S> {
    service: S,
}

impl<S> CommandRouter<S>
where
    S: PopularNewsService,
{
    pub fn new(service: S) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    /// Always produces the text body to send back to Slack unless the service itself fails.
    pub async fn route(&self, envelope: &CommandEnvelope) -> Result<String, CommandRouteError> {
        match parse_popular_command(&envelope.text) {
            PopularCommand::Help => Ok(POPULAR_NEWS_HELP.to_owned()),
            PopularCommand::Invalid { message } => Ok(DomainError::InvalidArgument(message).reply_text()),
            PopularCommand::Query(query) => self.service.most_popular(query, envelope).await,
        }
    }
}

#[async_trait]
pub trait PopularNewsService: Send + Sync {
    async fn most_popular(
        &self,
        query: PopularQuery,
        envelope: &CommandEnvelope,
    ) -> Result<String, CommandRouteError>;
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use newsbot_core::command::{Advisory, PopularQuery, POPULAR_NEWS_HELP};
    use newsbot_core::errors::{ApplicationError, SLACK_UNAVAILABLE_TEXT};

    use super::{
        normalize_popular_command, CommandEnvelope, CommandParseError, CommandRouteError,
        CommandRouter, PopularNewsService, SlashCommandPayload,
    };

    #[derive(Default)]
    struct RecordingService {
        queries: Mutex<Vec<PopularQuery>>,
    }

    #[async_trait]
    impl PopularNewsService for RecordingService {
        async fn most_popular(
            &self,
            query: PopularQuery,
            envelope: &CommandEnvelope,
        ) -> Result<String, CommandRouteError> {
            let reply = format!("{}ranked {}", query.advisory_prefix(), envelope.channel_id.0);
            self.queries.lock().expect("lock").push(query);
            Ok(reply)
        }
    }

    fn payload(text: &str) -> SlashCommandPayload {
        SlashCommandPayload {
            command: "/popular_news".to_owned(),
            text: text.to_owned(),
            channel_id: "C1".to_owned(),
            team_id: "T1".to_owned(),
            user_id: "U1".to_owned(),
            trigger_id: "trigger-1".to_owned(),
        }
    }

    async fn route(router: &CommandRouter<RecordingService>, text: &str) -> String {
        let envelope = normalize_popular_command(payload(text), "/popular_news").expect("normalize");
        router.route(&envelope).await.expect("route")
    }

    #[tokio::test]
    async fn router_calls_service_for_queries_only() {
        let router = CommandRouter::new(RecordingService::default());

        assert_eq!(route(&router, "3 #ransomware,#breach").await, "ranked C1");
        assert_eq!(route(&router, "3 help").await, POPULAR_NEWS_HELP);
        assert!(route(&router, "0").await.starts_with("Please submit a positive number of days. "));

        let queries = router.service().queries.lock().expect("lock");
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].day_window, 3);
        assert_eq!(queries[0].tags, vec!["#ransomware".to_owned(), "#breach".to_owned()]);
    }

    #[tokio::test]
    async fn advisories_reach_the_service() {
        let router = CommandRouter::new(RecordingService::default());

        let reply = route(&router, "breach").await;
        assert!(reply.starts_with(Advisory::MalformedTags.text()));
        assert!(reply.ends_with("ranked C1"));
    }

    #[test]
    fn normalize_rejects_other_commands_and_missing_context() {
        let mut other = payload("");
        other.command = "/weather".to_owned();
        assert_eq!(
            normalize_popular_command(other, "/popular_news"),
            Err(CommandParseError::UnsupportedCommand("/weather".to_owned()))
        );

        let mut no_team = payload("");
        no_team.team_id.clear();
        assert_eq!(
            normalize_popular_command(no_team, "/popular_news"),
            Err(CommandParseError::MissingContext("team_id"))
        );

        let mut no_channel = payload("");
        no_channel.channel_id.clear();
        assert_eq!(
            normalize_popular_command(no_channel, "/popular_news"),
            Err(CommandParseError::MissingContext("channel_id"))
        );
    }

    #[test]
    fn failures_answer_with_the_slack_unavailable_text() {
        let route_error =
            CommandRouteError::from(ApplicationError::Persistence("database is locked".to_owned()));
        let interface = route_error.into_interface("trigger-1");
        assert_eq!(interface.correlation_id(), "trigger-1");
        assert_eq!(interface.user_message(), SLACK_UNAVAILABLE_TEXT);

        let parse_error = CommandParseError::MissingContext("team_id").into_interface("trigger-2");
        assert_eq!(parse_error.user_message(), SLACK_UNAVAILABLE_TEXT);
    }

    #[test]
    fn normalize_keeps_argument_text_verbatim() {
        let envelope =
            normalize_popular_command(payload(" 3  #a"), "/popular_news").expect("normalize");
        assert_eq!(envelope.text, " 3  #a");
        assert_eq!(envelope.request_id, "trigger-1");
    }
}
