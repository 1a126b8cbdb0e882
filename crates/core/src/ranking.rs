use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::command::DEFAULT_DAY_WINDOW;
use crate::domain::submission::{ChannelId, Submission};

pub const TIE_NOTICE: &str =
    "There was a tie in popularity. The most recently posted article will be returned.\n";
pub const NO_MESSAGES_FOUND_TEXT: &str =
    "No messages were found within the time range and the specified tags.";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct InteractionSnapshot {
    pub reply_count: u64,
    pub reaction_count: u64,
}

impl InteractionSnapshot {
    pub fn new(reply_count: u64, reaction_count: u64) -> Self {
        Self { reply_count, reaction_count }
    }

    pub fn interaction_score(&self) -> u64 {
        self.reply_count.saturating_add(self.reaction_count)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RankingQuery {
    pub channel_id: ChannelId,
    pub day_window: u32,
    pub tags: Vec<String>,
}

impl RankingQuery {
    pub fn new(channel_id: ChannelId) -> Self {
        Self { channel_id, day_window: DEFAULT_DAY_WINDOW, tags: Vec::new() }
    }

    pub fn with_window(mut self, day_window: u32) -> Self {
        self.day_window = day_window;
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Start of the window. Saturates at the earliest representable instant.
    pub fn since(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_sub_signed(Duration::days(i64::from(self.day_window)))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RankedCandidate {
    pub submission: Submission,
    pub snapshot: InteractionSnapshot,
}

#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum RankingError {
    #[error("no candidates to rank")]
    EmptyCandidateSet,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PopularityReport {
    pub channel_id: ChannelId,
    pub day_window: u32,
    pub tags: Vec<String>,
    pub winner: Submission,
    pub winner_snapshot: InteractionSnapshot,
    pub tie: bool,
}

impl PopularityReport {
    pub fn winner_url(&self) -> &str {
        &self.winner.url
    }

    pub fn render(&self) -> String {
        let tag_clause = if self.tags.is_empty() {
            String::new()
        } else {
            format!("with the tag(s): {} ", self.tags.join(", "))
        };
        let report = format!(
            "The most popular article posted to the <#{}> channel in the past {} days {}was posted on {} by <@{}>. You can read the article again here: {}",
            self.channel_id.0,
            self.day_window,
            tag_clause,
            self.winner.timestamp.display_date(),
            self.winner.submitter.0,
            self.winner.url
        );

        if self.tie {
            format!("{TIE_NOTICE}{report}")
        } else {
            report
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct BestSoFar {
    index: usize,
    score: u64,
    replies: u64,
    tie: bool,
}

impl BestSoFar {
    fn first(index: usize, snapshot: InteractionSnapshot) -> Self {
        Self { index, score: snapshot.interaction_score(), replies: snapshot.reply_count, tie: false }
    }

    fn consider(self, index: usize, snapshot: InteractionSnapshot) -> Self {
        let score = snapshot.interaction_score();
        let replies = snapshot.reply_count;

        if score > self.score || (score == self.score && replies > self.replies) {
            Self { index, score, replies, tie: self.tie }
        } else if score == self.score && replies == self.replies && self.score > 0 {
            Self { tie: true, ..self }
        } else {
            self
        }
    }
}

/// Picks the candidate with the highest interaction score.
///
/// Equal scores fall back to reply count; a full tie keeps the earlier candidate and flags the
/// report. The flag is never cleared once set.
pub fn select_most_popular(
    query: &RankingQuery,
    candidates: &[RankedCandidate],
) -> Result<PopularityReport, RankingError> {
    let best = candidates
        .iter()
        .enumerate()
        .fold(None, |best: Option<BestSoFar>, (index, candidate)| {
            Some(match best {
                None => BestSoFar::first(index, candidate.snapshot),
                Some(best) => best.consider(index, candidate.snapshot),
            })
        })
        .ok_or(RankingError::EmptyCandidateSet)?;

    let winner = &candidates[best.index];
    Ok(PopularityReport {
        channel_id: query.channel_id.clone(),
        day_window: query.day_window,
        tags: query.tags.clone(),
        winner: winner.submission.clone(),
        winner_snapshot: winner.snapshot,
        tie: best.tie,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{
        select_most_popular, InteractionSnapshot, RankedCandidate, RankingError, RankingQuery,
        TIE_NOTICE,
    };
    use crate::domain::submission::{ChannelId, MessageId, SlackTimestamp, Submission, UserId};

    fn candidate(id: &str, replies: u64, reactions: u64) -> RankedCandidate {
        RankedCandidate {
            submission: Submission {
                message_id: MessageId(id.to_owned()),
                channel_id: ChannelId("C1".to_owned()),
                team_id: None,
                timestamp: SlackTimestamp("1700000000.000100".to_owned()),
                submitter: UserId(format!("U-{id}")),
                url: format!("https://example.com/{id}"),
                description: format!("story {id}"),
                tags: Vec::new(),
            },
            snapshot: InteractionSnapshot::new(replies, reactions),
        }
    }

    fn query() -> RankingQuery {
        RankingQuery::new(ChannelId("C1".to_owned()))
    }

    #[test]
    fn empty_candidate_set_is_an_error() {
        assert_eq!(select_most_popular(&query(), &[]), Err(RankingError::EmptyCandidateSet));
    }

    #[test]
    fn full_tie_keeps_first_and_flags_notice() {
        let candidates = [candidate("a", 2, 3), candidate("b", 2, 3)];
        let report = select_most_popular(&query(), &candidates).expect("non-empty");

        assert_eq!(report.winner.message_id.0, "a");
        assert!(report.tie);
        assert!(report.render().starts_with(TIE_NOTICE));
    }

    #[test]
    fn equal_score_more_replies_wins_without_notice() {
        let candidates = [candidate("a", 1, 4), candidate("b", 3, 2)];
        let report = select_most_popular(&query(), &candidates).expect("non-empty");

        assert_eq!(report.winner.message_id.0, "b");
        assert!(!report.tie);
        assert!(!report.render().contains("There was a tie"));
    }

    #[test]
    fn zero_score_ties_are_not_flagged() {
        let candidates = [candidate("a", 0, 0), candidate("b", 0, 0)];
        let report = select_most_popular(&query(), &candidates).expect("non-empty");

        assert_eq!(report.winner.message_id.0, "a");
        assert!(!report.tie);
    }

    #[test]
    fn tie_flag_survives_a_later_winner() {
        let candidates = [candidate("a", 1, 1), candidate("b", 1, 1), candidate("c", 5, 5)];
        let report = select_most_popular(&query(), &candidates).expect("non-empty");

        assert_eq!(report.winner.message_id.0, "c");
        assert!(report.tie);
    }

    #[test]
    fn winner_score_is_never_below_any_candidate() {
        let candidates = [
            candidate("a", 0, 1),
            candidate("b", 4, 0),
            candidate("c", 2, 7),
            candidate("d", 9, 0),
            candidate("e", 3, 6),
        ];
        let report = select_most_popular(&query(), &candidates).expect("non-empty");
        let best = report.winner_snapshot.interaction_score();

        assert!(candidates.iter().all(|c| c.snapshot.interaction_score() <= best));
        assert_eq!(report.winner.message_id.0, "d");
    }

    #[test]
    fn render_lists_tags_and_window() {
        let candidates = [candidate("a", 1, 0)];
        let query = query().with_window(3).with_tags(vec!["#a".to_owned(), "#b".to_owned()]);
        let report = select_most_popular(&query, &candidates).expect("non-empty");

        assert_eq!(
            report.render(),
            "The most popular article posted to the <#C1> channel in the past 3 days with the tag(s): #a, #b was posted on 2023-11-14 by <@U-a>. You can read the article again here: https://example.com/a"
        );
        assert_eq!(report.winner_url(), "https://example.com/a");
    }

    #[test]
    fn since_subtracts_day_window() {
        let now = Utc.with_ymd_and_hms(2024, 1, 10, 12, 0, 0).single().expect("valid date");
        let since = query().with_window(7).since(now);

        assert_eq!(since, Utc.with_ymd_and_hms(2024, 1, 3, 12, 0, 0).single().expect("valid date"));
    }
}
