//! Argument parsing for `/popular_news`.

pub const DEFAULT_DAY_WINDOW: u32 = 7;

pub const POPULAR_NEWS_HELP: &str = "
```
Usage: /popular_news num_days hashtags
A command to search for the most popular news articles posted in the current channel.
Popularity is evaluated by overall number of interactions (reactions, replies, etc.)

Arguments:
num_days    optional    number of days back to search for most popular news links (default: 7)
hashtags    optional    comma-separated list of hashtags to search with no spaces (i.e. #breach,#ransomware)
```
";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Advisory {
    ExtraTagsIgnored,
    MalformedTags,
}

impl Advisory {
    pub fn text(&self) -> &'static str {
        match self {
            Self::ExtraTagsIgnored => {
                "It also seems like you added extra tags after a space in the command arguments, but these tags will not be processed. Use the `/popular_news help` command for more info. "
            }
            Self::MalformedTags => {
                "It seems you may have provided hashtags but they are not formatted properly. I will return the most popular articles from the past week by default. Use the `/popular_news help` command for more info. "
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PopularQuery {
    pub day_window: u32,
    pub tags: Vec<String>,
    pub advisories: Vec<Advisory>,
}

impl PopularQuery {
    pub fn advisory_prefix(&self) -> String {
        self.advisories.iter().map(Advisory::text).collect()
    }
}

impl Default for PopularQuery {
    fn default() -> Self {
        Self { day_window: DEFAULT_DAY_WINDOW, tags: Vec::new(), advisories: Vec::new() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PopularCommand {
    Help,
    Invalid { message: String },
    Query(PopularQuery),
}

pub fn invalid_day_window_text() -> String {
    format!("Please submit a positive number of days. {POPULAR_NEWS_HELP}")
}

pub fn parse_popular_command(text: &str) -> PopularCommand {
    if text.is_empty() {
        return PopularCommand::Query(PopularQuery::default());
    }

    let args: Vec<&str> = text.split(' ').collect();
    let mut day_window = DEFAULT_DAY_WINDOW;
    let mut window_set = false;
    let mut tags: Vec<String> = Vec::new();
    let mut tag_token_seen = false;

    for arg in &args {
        if is_day_window(arg) && !window_set {
            match arg.parse::<u32>() {
                Ok(days) if days > 0 => day_window = days,
                _ => return PopularCommand::Invalid { message: invalid_day_window_text() },
            }
            window_set = true;
        } else if *arg == "help" {
            return PopularCommand::Help;
        } else if arg.contains('#') && !tag_token_seen {
            tags.extend(arg.split(',').filter(|part| is_tag(part)).map(str::to_owned));
            tag_token_seen = true;
        }
    }

    let mut advisories = Vec::new();
    let hash_tokens = args.iter().filter(|arg| arg.contains('#')).count();
    let crowded = args.len() > 2 || (!window_set && args.len() > 1);
    if tag_token_seen && crowded && hash_tokens > 1 {
        advisories.push(Advisory::ExtraTagsIgnored);
    }
    if !window_set && tags.is_empty() {
        advisories.push(Advisory::MalformedTags);
    }

    PopularCommand::Query(PopularQuery { day_window, tags, advisories })
}

fn is_day_window(arg: &str) -> bool {
    !arg.is_empty() && arg.bytes().all(|byte| byte.is_ascii_digit())
}

fn is_tag(part: &str) -> bool {
    part.split('#').nth(1).is_some_and(|rest| !rest.is_empty())
}

#[cfg(test)]
mod tests {
    use super::{
        parse_popular_command, Advisory, PopularCommand, PopularQuery, DEFAULT_DAY_WINDOW,
        POPULAR_NEWS_HELP,
    };

    fn query(text: &str) -> PopularQuery {
        match parse_popular_command(text) {
            PopularCommand::Query(query) => query,
            other => panic!("expected query for `{text}`, got {other:?}"),
        }
    }

    #[test]
    fn empty_text_uses_defaults() {
        assert_eq!(query(""), PopularQuery::default());
        assert_eq!(query("").day_window, DEFAULT_DAY_WINDOW);
    }

    #[test]
    fn window_and_tag_list_parse_without_advisory() {
        let parsed = query("3 #ransomware,#breach");

        assert_eq!(parsed.day_window, 3);
        assert_eq!(parsed.tags, vec!["#ransomware".to_owned(), "#breach".to_owned()]);
        assert!(parsed.advisories.is_empty());
    }

    #[test]
    fn help_overrides_numbers_and_tags() {
        assert_eq!(parse_popular_command("5 #breach help"), PopularCommand::Help);
        assert_eq!(parse_popular_command("help 5 #breach"), PopularCommand::Help);
    }

    #[test]
    fn zero_days_is_invalid_with_help_text() {
        let PopularCommand::Invalid { message } = parse_popular_command("0") else {
            panic!("zero days should be rejected");
        };

        assert!(message.starts_with("Please submit a positive number of days. "));
        assert!(message.ends_with(POPULAR_NEWS_HELP));
    }

    #[test]
    fn overflowing_day_window_is_invalid() {
        assert!(matches!(
            parse_popular_command("99999999999"),
            PopularCommand::Invalid { .. }
        ));
    }

    #[test]
    fn invalid_window_before_help_still_fails() {
        assert!(matches!(parse_popular_command("0 help"), PopularCommand::Invalid { .. }));
    }

    #[test]
    fn only_first_number_sets_window() {
        assert_eq!(query("4 9 #a").day_window, 4);
    }

    #[test]
    fn extra_tag_tokens_raise_advisory() {
        let parsed = query("#breach #ransomware");

        assert_eq!(parsed.tags, vec!["#breach".to_owned()]);
        assert_eq!(parsed.advisories, vec![Advisory::ExtraTagsIgnored]);
        assert!(parsed.advisory_prefix().starts_with("It also seems like you added extra tags"));
    }

    #[test]
    fn unformatted_tags_raise_malformed_advisory() {
        let parsed = query("ransomware");

        assert_eq!(parsed.day_window, DEFAULT_DAY_WINDOW);
        assert!(parsed.tags.is_empty());
        assert_eq!(parsed.advisories, vec![Advisory::MalformedTags]);
    }

    #[test]
    fn window_alone_needs_no_advisory() {
        let parsed = query("14");

        assert_eq!(parsed.day_window, 14);
        assert!(parsed.advisories.is_empty());
    }

    #[test]
    fn advisories_accumulate_in_order() {
        let parsed = query("# #");

        assert!(parsed.tags.is_empty());
        assert_eq!(parsed.advisories, vec![Advisory::ExtraTagsIgnored, Advisory::MalformedTags]);
        assert_eq!(
            parsed.advisory_prefix(),
            format!("{}{}", Advisory::ExtraTagsIgnored.text(), Advisory::MalformedTags.text())
        );
    }

    #[test]
    fn tag_part_needs_text_after_hash() {
        assert_eq!(query("7 #,#ok,plain,x#y").tags, vec!["#ok".to_owned(), "x#y".to_owned()]);
    }
}
