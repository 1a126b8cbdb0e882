pub mod command;
pub mod config;
pub mod domain;
pub mod errors;
pub mod mention;
pub mod ranking;

pub use command::{parse_popular_command, Advisory, PopularCommand, PopularQuery};
pub use domain::submission::{
    ChannelId, MessageId, PriorSubmission, RecordOutcome, SlackTimestamp, Submission, TeamId,
    UserId,
};
pub use domain::tenant::{BotCredential, TenantCredential};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use mention::{parse_mention, LinkPolicy, MentionEvent, MentionOptions, ParsedMention};
pub use ranking::{
    select_most_popular, InteractionSnapshot, PopularityReport, RankedCandidate, RankingError,
    RankingQuery,
};
