//! Turns an `app_mention` event into a [`Submission`].

use serde::{Deserialize, Serialize};

use crate::domain::submission::{ChannelId, MessageId, SlackTimestamp, Submission, TeamId, UserId};

pub const MALFORMED_MENTION_TEXT: &str = "Your message should have a URL and a caption (e.g. `@NewsBot http://www.example.com this is an example url #example`).";

const TAG_TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', ')', ']', '"', '\''];

/// The subset of an `app_mention` event the parser reads.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct MentionEvent {
    #[serde(default)]
    pub client_msg_id: String,
    #[serde(default)]
    pub ts: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub team: String,
    #[serde(default)]
    pub blocks: Vec<RichBlock>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RichBlock {
    RichText {
        #[serde(default)]
        elements: Vec<RichTextContainer>,
    },
    #[serde(other)]
    Other,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RichTextContainer {
    RichTextSection {
        #[serde(default)]
        elements: Vec<RichTextElement>,
    },
    #[serde(other)]
    Other,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RichTextElement {
    Link {
        #[serde(default)]
        url: String,
    },
    Text {
        #[serde(default)]
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkPolicy {
    #[default]
    First,
    Longest,
}

impl std::str::FromStr for LinkPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "first" => Ok(Self::First),
            "longest" => Ok(Self::Longest),
            other => Err(format!("unsupported link policy `{other}` (expected first|longest)")),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MentionOptions {
    pub link_policy: LinkPolicy,
    /// Multi-tenant installs key every submission by team.
    pub require_team: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MentionField {
    MessageId,
    Timestamp,
    Submitter,
    Channel,
    Team,
    Url,
    Description,
}

impl MentionField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MessageId => "client_msg_id",
            Self::Timestamp => "ts",
            Self::Submitter => "user",
            Self::Channel => "channel",
            Self::Team => "team",
            Self::Url => "url",
            Self::Description => "description",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParsedMention {
    Complete(Submission),
    Incomplete { missing: Vec<MentionField> },
}

pub fn parse_mention(event: &MentionEvent, options: MentionOptions) -> ParsedMention {
    let mut url: Option<&str> = None;
    let mut pieces: Vec<&str> = Vec::new();

    for block in &event.blocks {
        let RichBlock::RichText { elements } = block else {
            continue;
        };
        let section = elements.iter().find_map(|container| match container {
            RichTextContainer::RichTextSection { elements } if !elements.is_empty() => Some(elements),
            _ => None,
        });
        let Some(section) = section else {
            continue;
        };

        for element in section {
            match element {
                RichTextElement::Link { url: candidate } if !candidate.trim().is_empty() => {
                    let candidate = candidate.trim();
                    url = match (url, options.link_policy) {
                        (None, _) => Some(candidate),
                        (Some(held), LinkPolicy::Longest) if candidate.len() > held.len() => {
                            Some(candidate)
                        }
                        (held, _) => held,
                    };
                }
                RichTextElement::Text { text } => {
                    let piece = text.trim();
                    if !piece.is_empty() {
                        pieces.push(piece);
                    }
                }
                _ => {}
            }
        }
    }

    let description = pieces.join(" ");
    let url = url.unwrap_or_default();

    let mut missing = Vec::new();
    let required = [
        (MentionField::MessageId, event.client_msg_id.as_str()),
        (MentionField::Timestamp, event.ts.as_str()),
        (MentionField::Submitter, event.user.as_str()),
        (MentionField::Channel, event.channel.as_str()),
        (MentionField::Url, url),
        (MentionField::Description, description.as_str()),
    ];
    for (field, value) in required {
        if value.trim().is_empty() {
            missing.push(field);
        }
    }
    if options.require_team && event.team.trim().is_empty() {
        missing.push(MentionField::Team);
    }
    if !missing.is_empty() {
        return ParsedMention::Incomplete { missing };
    }

    let team = event.team.trim();
    ParsedMention::Complete(Submission {
        message_id: MessageId(event.client_msg_id.clone()),
        channel_id: ChannelId(event.channel.clone()),
        team_id: (!team.is_empty()).then(|| TeamId(team.to_owned())),
        timestamp: SlackTimestamp(event.ts.clone()),
        submitter: UserId(event.user.clone()),
        url: url.to_owned(),
        tags: extract_hashtags(&description),
        description,
    })
}

/// Hashtags in order of first appearance, trailing punctuation stripped.
pub fn extract_hashtags(description: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for token in description.split(|ch: char| ch.is_whitespace() || ch == ',') {
        let tag = token.trim_end_matches(TAG_TRAILING_PUNCTUATION);
        if tag.len() < 2 || !tag.starts_with('#') {
            continue;
        }
        if !tags.iter().any(|seen| seen == tag) {
            tags.push(tag.to_owned());
        }
    }
    tags
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{
        extract_hashtags, parse_mention, LinkPolicy, MentionEvent, MentionField, MentionOptions,
        ParsedMention,
    };

    fn event(blocks: serde_json::Value) -> MentionEvent {
        serde_json::from_value(json!({
            "type": "app_mention",
            "client_msg_id": "5e2a-msg",
            "ts": "1700000000.000100",
            "user": "U1",
            "channel": "C1",
            "team": "T1",
            "blocks": blocks,
        }))
        .expect("mention event should decode")
    }

    fn section(elements: serde_json::Value) -> serde_json::Value {
        json!([{
            "type": "rich_text",
            "block_id": "abc",
            "elements": [{ "type": "rich_text_section", "elements": elements }],
        }])
    }

    #[test]
    fn well_formed_mention_yields_submission() {
        let event = event(section(json!([
            { "type": "user", "user_id": "UBOT" },
            { "type": "text", "text": " " },
            { "type": "link", "url": "https://example.com/a" },
            { "type": "text", "text": "  ransomware wave hits #breach, #infosec " },
        ])));

        let ParsedMention::Complete(submission) = parse_mention(&event, MentionOptions::default())
        else {
            panic!("expected a complete mention");
        };

        assert_eq!(submission.url, "https://example.com/a");
        assert_eq!(submission.description, "ransomware wave hits #breach, #infosec");
        assert_eq!(submission.tags, vec!["#breach".to_owned(), "#infosec".to_owned()]);
        assert_eq!(submission.message_id.0, "5e2a-msg");
        assert_eq!(submission.team_id.map(|team| team.0), Some("T1".to_owned()));
    }

    #[test]
    fn text_pieces_are_joined_by_single_space() {
        let event = event(section(json!([
            { "type": "text", "text": "first part " },
            { "type": "link", "url": "https://example.com/a" },
            { "type": "text", "text": " second part" },
        ])));

        let ParsedMention::Complete(submission) = parse_mention(&event, MentionOptions::default())
        else {
            panic!("expected a complete mention");
        };
        assert_eq!(submission.description, "first part second part");
    }

    #[test]
    fn missing_url_is_incomplete() {
        let event = event(section(json!([{ "type": "text", "text": "no link here" }])));

        assert_eq!(
            parse_mention(&event, MentionOptions::default()),
            ParsedMention::Incomplete { missing: vec![MentionField::Url] }
        );
    }

    #[test]
    fn missing_caption_is_incomplete() {
        let event = event(section(json!([
            { "type": "link", "url": "https://example.com/a" },
            { "type": "text", "text": "   " },
        ])));

        assert_eq!(
            parse_mention(&event, MentionOptions::default()),
            ParsedMention::Incomplete { missing: vec![MentionField::Description] }
        );
    }

    #[test]
    fn only_first_section_of_each_rich_text_block_is_read() {
        let event = event(json!([
            { "type": "section", "text": { "type": "mrkdwn", "text": "ignored" } },
            {
                "type": "rich_text",
                "elements": [
                    { "type": "rich_text_quote", "elements": [{ "type": "text", "text": "quoted" }] },
                    { "type": "rich_text_section", "elements": [
                        { "type": "link", "url": "https://example.com/first" },
                        { "type": "text", "text": "caption" },
                    ]},
                    { "type": "rich_text_section", "elements": [
                        { "type": "text", "text": "second section" },
                    ]},
                ],
            },
        ]));

        let ParsedMention::Complete(submission) = parse_mention(&event, MentionOptions::default())
        else {
            panic!("expected a complete mention");
        };
        assert_eq!(submission.url, "https://example.com/first");
        assert_eq!(submission.description, "caption");
    }

    #[test]
    fn empty_leading_section_falls_through_to_the_next() {
        let event = event(json!([{
            "type": "rich_text",
            "elements": [
                { "type": "rich_text_section", "elements": [] },
                { "type": "rich_text_section", "elements": [
                    { "type": "link", "url": "https://example.com/late" },
                    { "type": "text", "text": "late caption" },
                ]},
            ],
        }]));

        let ParsedMention::Complete(submission) = parse_mention(&event, MentionOptions::default())
        else {
            panic!("expected a complete mention");
        };
        assert_eq!(submission.url, "https://example.com/late");
        assert_eq!(submission.description, "late caption");
    }

    #[test]
    fn link_policy_controls_which_url_is_kept() {
        let event = event(section(json!([
            { "type": "link", "url": "https://a.io" },
            { "type": "link", "url": "https://example.com/much/longer" },
            { "type": "text", "text": "two links" },
        ])));

        let first = parse_mention(&event, MentionOptions::default());
        let longest = parse_mention(
            &event,
            MentionOptions { link_policy: LinkPolicy::Longest, require_team: false },
        );

        assert!(matches!(first, ParsedMention::Complete(ref s) if s.url == "https://a.io"));
        assert!(matches!(
            longest,
            ParsedMention::Complete(ref s) if s.url == "https://example.com/much/longer"
        ));
    }

    #[test]
    fn multi_tenant_mode_requires_team() {
        let mut event = event(section(json!([
            { "type": "link", "url": "https://example.com/a" },
            { "type": "text", "text": "caption" },
        ])));
        event.team.clear();

        let options = MentionOptions { require_team: true, ..MentionOptions::default() };
        assert_eq!(
            parse_mention(&event, options),
            ParsedMention::Incomplete { missing: vec![MentionField::Team] }
        );
        assert!(matches!(
            parse_mention(&event, MentionOptions::default()),
            ParsedMention::Complete(ref s) if s.team_id.is_none()
        ));
    }

    #[test]
    fn hashtags_are_deduplicated_in_order() {
        assert_eq!(
            extract_hashtags("#zero-day news #breach. more #breach and # alone #a"),
            vec!["#zero-day".to_owned(), "#breach".to_owned(), "#a".to_owned()]
        );
        assert!(extract_hashtags("no tags here").is_empty());
    }
}
