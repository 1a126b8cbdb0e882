use thiserror::Error;

use crate::mention::{MentionField, MALFORMED_MENTION_TEXT};
use crate::ranking::{RankingError, NO_MESSAGES_FOUND_TEXT};

pub const SLACK_UNAVAILABLE_TEXT: &str =
    "Something went wrong with the Slack API. Please try again later.";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("mention is missing required fields: {missing:?}")]
    MalformedInput { missing: Vec<MentionField> },
    #[error("invalid command argument: {0}")]
    InvalidArgument(String),
    #[error("no candidates matched the time range and tags")]
    EmptyCandidateSet,
}

impl DomainError {
    /// Domain failures are answered in-channel rather than surfaced as request errors.
    pub fn reply_text(&self) -> String {
        match self {
            Self::MalformedInput { .. } => MALFORMED_MENTION_TEXT.to_owned(),
            Self::InvalidArgument(message) => message.clone(),
            Self::EmptyCandidateSet => NO_MESSAGES_FOUND_TEXT.to_owned(),
        }
    }
}

impl From<RankingError> for DomainError {
    fn from(value: RankingError) -> Self {
        match value {
            RankingError::EmptyCandidateSet => Self::EmptyCandidateSet,
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("slack authorization revoked: {0}")]
    AuthorizationRevoked(String),
    #[error("transient platform failure: {0}")]
    TransientPlatform(String),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::ServiceUnavailable { .. } => SLACK_UNAVAILABLE_TEXT,
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn is_authorization_revoked(&self) -> bool {
        matches!(self, Self::AuthorizationRevoked(_))
    }

    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        match value {
            ApplicationError::Domain(error) => {
                Self::BadRequest { message: error.to_string(), correlation_id: "unassigned".to_owned() }
            }
            ApplicationError::AuthorizationRevoked(message)
            | ApplicationError::TransientPlatform(message)
            | ApplicationError::Persistence(message) => {
                Self::ServiceUnavailable { message, correlation_id: "unassigned".to_owned() }
            }
            ApplicationError::Configuration(message) => {
                Self::Internal { message, correlation_id: "unassigned".to_owned() }
            }
        }
    }
}
