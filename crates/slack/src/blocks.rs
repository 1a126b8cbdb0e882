use serde::Serialize;

pub const ROUNDUP_HEADER_TEXT: &str = ":rotating_light: Weekly NewsBot Roundup :rotating_light:";
pub const RUNNER_UPS_HEADING: &str = "*Some other articles from the past week you may have missed:*\n";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum TextObject {
    #[serde(rename = "plain_text")]
    Plain {
        text: String,
        #[serde(skip_serializing_if = "std::ops::Not::not")]
        emoji: bool,
    },
    #[serde(rename = "mrkdwn")]
    Mrkdwn { text: String },
}

impl TextObject {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::Plain { text: text.into(), emoji: false }
    }

    pub fn emoji(text: impl Into<String>) -> Self {
        Self::Plain { text: text.into(), emoji: true }
    }

    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Self::Mrkdwn { text: text.into() }
    }

    pub fn text(&self) -> &str {
        match self {
            Self::Plain { text, .. } | Self::Mrkdwn { text } => text,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Header { block_id: String, text: TextObject },
    Divider,
    Section { block_id: String, text: TextObject },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessageTemplate {
    pub fallback_text: String,
    pub blocks: Vec<Block>,
}

pub struct MessageBuilder {
    fallback_text: String,
    blocks: Vec<Block>,
}

impl MessageBuilder {
    pub fn new(fallback_text: impl Into<String>) -> Self {
        Self { fallback_text: fallback_text.into(), blocks: Vec::new() }
    }

    pub fn header(mut self, block_id: impl Into<String>, text: impl Into<String>) -> Self {
        self.blocks.push(Block::Header { block_id: block_id.into(), text: TextObject::emoji(text) });
        self
    }

    pub fn divider(mut self) -> Self {
        self.blocks.push(Block::Divider);
        self
    }

    pub fn section<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut SectionBuilder),
    {
        let mut builder = SectionBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Section { block_id: block_id.into(), text: builder.build() });
        self
    }

    pub fn build(self) -> MessageTemplate {
        MessageTemplate { fallback_text: self.fallback_text, blocks: self.blocks }
    }
}

#[derive(Default)]
pub struct SectionBuilder {
    text: Option<TextObject>,
}

impl SectionBuilder {
    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::mrkdwn(text));
        self
    }

    fn build(self) -> TextObject {
        self.text.unwrap_or_else(|| TextObject::plain(""))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunnerUp {
    pub url: String,
    pub description: String,
}

/// The weekly roundup message for one channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DigestCard {
    url: String,
    title: Option<String>,
    summary: Option<String>,
    runner_ups: Vec<RunnerUp>,
}

impl DigestCard {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into(), title: None, summary: None, runner_ups: Vec::new() }
    }

    /// Empty strings count as absent.
    pub fn with_summary(mut self, title: Option<String>, summary: Option<String>) -> Self {
        self.title = title.filter(|value| !value.trim().is_empty());
        self.summary = summary.filter(|value| !value.trim().is_empty());
        self
    }

    /// Keeps only entries whose URL differs from the winner's.
    pub fn with_runner_ups(mut self, candidates: impl IntoIterator<Item = RunnerUp>) -> Self {
        let winner = self.url.clone();
        self.runner_ups.extend(candidates.into_iter().filter(|candidate| candidate.url != winner));
        self
    }

    pub fn runner_ups(&self) -> &[RunnerUp] {
        &self.runner_ups
    }

    pub fn render(&self) -> MessageTemplate {
        let read_more = format!("Read more <{}|here>", self.url);

        let mut builder = MessageBuilder::new(ROUNDUP_HEADER_TEXT)
            .header("roundup.header.v1", ROUNDUP_HEADER_TEXT)
            .divider();

        builder = match (&self.title, &self.summary) {
            (Some(title), Some(summary)) => builder
                .section("roundup.winner.title.v1", |section| {
                    section.mrkdwn(format!("*{title}*"));
                })
                .section("roundup.winner.summary.v1", |section| {
                    section.mrkdwn(format!("{summary}\n\n{read_more}"));
                }),
            (Some(title), None) => builder.section("roundup.winner.title.v1", |section| {
                section.mrkdwn(format!("*{title}*\n{read_more}"));
            }),
            (None, Some(summary)) => builder.section("roundup.winner.summary.v1", |section| {
                section.mrkdwn(format!("{summary}\n\n{read_more}"));
            }),
            (None, None) => builder.section("roundup.winner.link.v1", |section| {
                section.mrkdwn(read_more.clone());
            }),
        };

        if !self.runner_ups.is_empty() {
            let lines = self
                .runner_ups
                .iter()
                .map(|entry| format!("• <{}|{}>", entry.url, entry.description))
                .collect::<Vec<_>>()
                .join("\n");
            builder = builder.divider().section("roundup.runner_ups.v1", |section| {
                section.mrkdwn(format!("{RUNNER_UPS_HEADING}{lines}"));
            });
        }

        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::{
        Block, DigestCard, MessageBuilder, RunnerUp, TextObject, ROUNDUP_HEADER_TEXT,
        RUNNER_UPS_HEADING,
    };

    fn section_text(block: &Block) -> Option<&str> {
        if let Block::Section { text, .. } = block {
            Some(text.text())
        } else {
            None
        }
    }

    fn runner_up(url: &str, description: &str) -> RunnerUp {
        RunnerUp { url: url.to_string(), description: description.to_string() }
    }

    #[test]
    fn message_builder_creates_typed_block_structure() {
        let message = MessageBuilder::new("fallback")
            .header("digest.header.v1", "Header")
            .divider()
            .section("digest.body.v1", |section| {
                section.mrkdwn("*Body*");
            })
            .build();

        assert_eq!(message.blocks.len(), 3);
        assert!(matches!(
            &message.blocks[0],
            Block::Header { block_id, text: TextObject::Plain { emoji: true, .. } }
                if block_id == "digest.header.v1"
        ));
        assert_eq!(message.blocks[1], Block::Divider);
        assert_eq!(section_text(&message.blocks[2]), Some("*Body*"));
    }

    #[test]
    fn blocks_serialize_with_slack_type_names() {
        let message = MessageBuilder::new("fallback")
            .header("h", "Title")
            .divider()
            .section("s", |section| {
                section.mrkdwn("x");
            })
            .build();

        let json = serde_json::to_value(&message.blocks).expect("serialize");
        assert_eq!(json[0]["type"], "header");
        assert_eq!(json[0]["text"]["type"], "plain_text");
        assert_eq!(json[0]["text"]["emoji"], true);
        assert_eq!(json[1], serde_json::json!({"type": "divider"}));
        assert_eq!(json[2]["text"]["type"], "mrkdwn");
    }

    #[test]
    fn digest_with_title_and_summary_uses_two_sections() {
        let message = DigestCard::new("https://example.com/win")
            .with_summary(Some("Big Story".to_string()), Some("It happened.".to_string()))
            .render();

        assert_eq!(message.fallback_text, ROUNDUP_HEADER_TEXT);
        assert_eq!(message.blocks.len(), 4);
        assert_eq!(section_text(&message.blocks[2]), Some("*Big Story*"));
        assert_eq!(
            section_text(&message.blocks[3]),
            Some("It happened.\n\nRead more <https://example.com/win|here>")
        );
    }

    #[test]
    fn digest_title_only_and_summary_only_variants() {
        let title_only = DigestCard::new("https://example.com/win")
            .with_summary(Some("Big Story".to_string()), Some(String::new()))
            .render();
        assert_eq!(
            section_text(&title_only.blocks[2]),
            Some("*Big Story*\nRead more <https://example.com/win|here>")
        );

        let summary_only = DigestCard::new("https://example.com/win")
            .with_summary(None, Some("It happened.".to_string()))
            .render();
        assert_eq!(
            section_text(&summary_only.blocks[2]),
            Some("It happened.\n\nRead more <https://example.com/win|here>")
        );
    }

    #[test]
    fn digest_without_summary_still_links_winner() {
        let message = DigestCard::new("https://example.com/win").render();

        assert_eq!(message.blocks.len(), 3);
        assert!(matches!(&message.blocks[0], Block::Header { text, .. } if text.text() == ROUNDUP_HEADER_TEXT));
        assert_eq!(section_text(&message.blocks[2]), Some("Read more <https://example.com/win|here>"));
    }

    #[test]
    fn digest_lists_runner_ups_except_the_winner() {
        let card = DigestCard::new("https://example.com/win").with_runner_ups(vec![
            runner_up("https://example.com/a", "first caption"),
            runner_up("https://example.com/win", "winner caption"),
            runner_up("https://example.com/b", "second caption"),
        ]);
        assert_eq!(card.runner_ups().len(), 2);

        let message = card.render();
        assert_eq!(message.blocks[3], Block::Divider);
        assert_eq!(
            section_text(&message.blocks[4]).map(str::to_owned),
            Some(format!(
                "{RUNNER_UPS_HEADING}• <https://example.com/a|first caption>\n• <https://example.com/b|second caption>"
            ))
        );
    }
}
