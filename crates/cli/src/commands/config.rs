use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use newsbot_core::config::{AppConfig, LoadOptions};
use secrecy::{ExposeSecret, SecretString};
use toml::Value;

use crate::commands::CommandResult;

pub fn run(options: LoadOptions) -> CommandResult {
    let config_file_path = detect_config_path(options.config_path.as_deref());
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                format!("config validation failed: {error}"),
                2,
            );
        }
    };

    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key_path, value, env_keys) in effective_fields(&config) {
        let source =
            field_source(key_path, env_keys, config_file_doc.as_ref(), config_file_path.as_deref());
        lines.push(render_line(key_path, &value, source));
    }

    CommandResult { exit_code: 0, output: lines.join("\n") }
}

type FieldRow = (&'static str, String, &'static [&'static str]);

fn effective_fields(config: &AppConfig) -> Vec<FieldRow> {
    vec![
        row("database.url", config.database.url.clone(), &["NEWSBOT_DATABASE_URL"]),
        row(
            "database.max_connections",
            config.database.max_connections.to_string(),
            &["NEWSBOT_DATABASE_MAX_CONNECTIONS"],
        ),
        row(
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            &["NEWSBOT_DATABASE_TIMEOUT_SECS"],
        ),
        row(
            "slack.signing_secret",
            redact_secret(Some(&config.slack.signing_secret)),
            &["NEWSBOT_SLACK_SIGNING_SECRET"],
        ),
        row(
            "slack.bot_token",
            config
                .slack
                .bot_token
                .as_ref()
                .map(|token| redact_token(token.expose_secret()))
                .unwrap_or_else(|| "<unset>".to_string()),
            &["NEWSBOT_SLACK_BOT_TOKEN"],
        ),
        row(
            "slack.client_id",
            config.slack.client_id.clone().unwrap_or_else(|| "<unset>".to_string()),
            &["NEWSBOT_SLACK_CLIENT_ID"],
        ),
        row(
            "slack.client_secret",
            redact_secret(config.slack.client_secret.as_ref()),
            &["NEWSBOT_SLACK_CLIENT_SECRET"],
        ),
        row("slack.api_base_url", config.slack.api_base_url.clone(), &["NEWSBOT_SLACK_API_BASE_URL"]),
        row(
            "slack.request_timeout_secs",
            config.slack.request_timeout_secs.to_string(),
            &["NEWSBOT_SLACK_REQUEST_TIMEOUT_SECS"],
        ),
        row("slack.command_name", config.slack.command_name.clone(), &["NEWSBOT_SLACK_COMMAND_NAME"]),
        row(
            "server.bind_address",
            config.server.bind_address.clone(),
            &["NEWSBOT_SERVER_BIND_ADDRESS"],
        ),
        row("server.port", config.server.port.to_string(), &["NEWSBOT_SERVER_PORT"]),
        row(
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            &["NEWSBOT_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        ),
        row(
            "ranking.link_policy",
            format!("{:?}", config.ranking.link_policy),
            &["NEWSBOT_RANKING_LINK_POLICY"],
        ),
        row(
            "ranking.distinct_tag_matches",
            config.ranking.distinct_tag_matches.to_string(),
            &["NEWSBOT_RANKING_DISTINCT_TAG_MATCHES"],
        ),
        row(
            "roundup.day_window",
            config.roundup.day_window.to_string(),
            &["NEWSBOT_ROUNDUP_DAY_WINDOW"],
        ),
        row(
            "roundup.max_concurrency",
            config.roundup.max_concurrency.to_string(),
            &["NEWSBOT_ROUNDUP_MAX_CONCURRENCY"],
        ),
        row(
            "summary.provider",
            format!("{:?}", config.summary.provider),
            &["NEWSBOT_SUMMARY_PROVIDER"],
        ),
        row(
            "summary.api_key",
            redact_secret(config.summary.api_key.as_ref()),
            &["NEWSBOT_SUMMARY_API_KEY", "SMMRY_API_KEY"],
        ),
        row("summary.base_url", config.summary.base_url.clone(), &["NEWSBOT_SUMMARY_BASE_URL"]),
        row(
            "summary.sentences",
            config.summary.sentences.to_string(),
            &["NEWSBOT_SUMMARY_SENTENCES"],
        ),
        row(
            "summary.timeout_secs",
            config.summary.timeout_secs.to_string(),
            &["NEWSBOT_SUMMARY_TIMEOUT_SECS"],
        ),
        row(
            "logging.level",
            config.logging.level.clone(),
            &["NEWSBOT_LOGGING_LEVEL", "NEWSBOT_LOG_LEVEL"],
        ),
        row(
            "logging.format",
            format!("{:?}", config.logging.format),
            &["NEWSBOT_LOGGING_FORMAT", "NEWSBOT_LOG_FORMAT"],
        ),
    ]
}

fn row(key_path: &'static str, value: String, env_keys: &'static [&'static str]) -> FieldRow {
    (key_path, value, env_keys)
}

fn detect_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then(|| path.to_path_buf());
    }

    [PathBuf::from("newsbot.toml"), PathBuf::from("config/newsbot.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_secret(secret: Option<&SecretString>) -> String {
    match secret {
        Some(secret) if !secret.expose_secret().trim().is_empty() => "<redacted>".to_string(),
        Some(_) => "<empty>".to_string(),
        None => "<unset>".to_string(),
    }
}

/// Keeps the `xoxb` style prefix so operators can tell token kinds apart.
fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}
