use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TeamId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

/// Slack message timestamp (`"1700000000.123456"`).
///
/// Used as the sort key, the display date, and the item key for `reactions.get`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlackTimestamp(pub String);

impl SlackTimestamp {
    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        Self(format!("{}.{:06}", at.timestamp(), at.timestamp_subsec_micros()))
    }

    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        let raw = self.0.trim();
        let (seconds, fraction) = raw.split_once('.').unwrap_or((raw, ""));
        let seconds = seconds.parse::<i64>().ok()?;

        let digits: String = fraction.chars().take(6).collect();
        if !digits.chars().all(|ch| ch.is_ascii_digit()) {
            return None;
        }
        let micros = if digits.is_empty() { 0 } else { format!("{digits:0<6}").parse::<u32>().ok()? };

        DateTime::from_timestamp(seconds, micros * 1_000)
    }

    /// Whole seconds since the epoch; the store indexes on this.
    pub fn epoch_seconds(&self) -> Option<i64> {
        self.to_datetime().map(|at| at.timestamp())
    }

    pub fn display_date(&self) -> String {
        self.format_or_raw("%Y-%m-%d")
    }

    pub fn display_datetime(&self) -> String {
        self.format_or_raw("%Y-%m-%d %H:%M:%S")
    }

    fn format_or_raw(&self, pattern: &str) -> String {
        match self.to_datetime() {
            Some(at) => at.format(pattern).to_string(),
            None => self.0.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub message_id: MessageId,
    pub channel_id: ChannelId,
    pub team_id: Option<TeamId>,
    pub timestamp: SlackTimestamp,
    pub submitter: UserId,
    pub url: String,
    pub description: String,
    pub tags: Vec<String>,
}

impl Submission {
    pub fn prior(&self) -> PriorSubmission {
        PriorSubmission { timestamp: self.timestamp.clone(), submitter: self.submitter.clone() }
    }

    /// Tags as stored: space separated, in extraction order.
    pub fn tags_column(&self) -> String {
        self.tags.join(" ")
    }

    pub fn tags_from_column(column: &str) -> Vec<String> {
        column.split_whitespace().map(str::to_owned).collect()
    }

    pub fn recorded_text(&self) -> String {
        format!("{} has been added to the <#{}> channel list.", self.url, self.channel_id.0)
    }
}

/// The first submission of a URL in a channel, as seen by a later duplicate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorSubmission {
    pub timestamp: SlackTimestamp,
    pub submitter: UserId,
}

impl PriorSubmission {
    pub fn scooped_text(&self) -> String {
        format!(
            "This URL is a duplicate. You have been :spoon: _*SCOOPED*_ by <@{}> on {}!",
            self.submitter.0,
            self.timestamp.display_datetime()
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecordOutcome {
    Recorded,
    Duplicate(PriorSubmission),
}
