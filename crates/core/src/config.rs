use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::command::DEFAULT_DAY_WINDOW;
use crate::mention::LinkPolicy;

const MAX_ROUNDUP_CONCURRENCY: usize = 32;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub slack: SlackConfig,
    pub server: ServerConfig,
    pub ranking: RankingConfig,
    pub roundup: RoundupConfig,
    pub summary: SummaryConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct SlackConfig {
    pub signing_secret: SecretString,
    /// Set for single-tenant installs; multi-tenant installs resolve tokens per team.
    pub bot_token: Option<SecretString>,
    pub client_id: Option<String>,
    pub client_secret: Option<SecretString>,
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    pub command_name: String,
}

impl SlackConfig {
    pub fn is_multi_tenant(&self) -> bool {
        self.bot_token.is_none()
    }

    pub fn oauth_enabled(&self) -> bool {
        self.client_id.is_some() && self.client_secret.is_some()
    }
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct RankingConfig {
    pub link_policy: LinkPolicy,
    pub distinct_tag_matches: bool,
}

#[derive(Clone, Debug)]
pub struct RoundupConfig {
    pub day_window: u32,
    pub max_concurrency: usize,
}

#[derive(Clone, Debug)]
pub struct SummaryConfig {
    pub provider: SummaryProvider,
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub sentences: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryProvider {
    None,
    Smmry,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub slack_signing_secret: Option<String>,
    pub slack_bot_token: Option<String>,
    pub slack_api_base_url: Option<String>,
    pub server_port: Option<u16>,
    pub roundup_day_window: Option<u32>,
    pub summary_provider: Option<SummaryProvider>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://newsbot.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            slack: SlackConfig {
                signing_secret: String::new().into(),
                bot_token: None,
                client_id: None,
                client_secret: None,
                api_base_url: "https://slack.com/api".to_string(),
                request_timeout_secs: 10,
                command_name: "/popular_news".to_string(),
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 3000,
                graceful_shutdown_secs: 15,
            },
            ranking: RankingConfig { link_policy: LinkPolicy::First, distinct_tag_matches: false },
            roundup: RoundupConfig { day_window: DEFAULT_DAY_WINDOW, max_concurrency: 1 },
            summary: SummaryConfig {
                provider: SummaryProvider::None,
                api_key: None,
                base_url: "https://api.smmry.com".to_string(),
                sentences: 5,
                timeout_secs: 20,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for SummaryProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "smmry" => Ok(Self::Smmry),
            other => Err(ConfigError::Validation(format!(
                "unsupported summary provider `{other}` (expected none|smmry)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("newsbot.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(slack) = patch.slack {
            if let Some(signing_secret) = slack.signing_secret {
                self.slack.signing_secret = secret_value(signing_secret);
            }
            if let Some(bot_token) = slack.bot_token {
                self.slack.bot_token = Some(secret_value(bot_token));
            }
            if let Some(client_id) = slack.client_id {
                self.slack.client_id = Some(client_id);
            }
            if let Some(client_secret) = slack.client_secret {
                self.slack.client_secret = Some(secret_value(client_secret));
            }
            if let Some(api_base_url) = slack.api_base_url {
                self.slack.api_base_url = api_base_url;
            }
            if let Some(request_timeout_secs) = slack.request_timeout_secs {
                self.slack.request_timeout_secs = request_timeout_secs;
            }
            if let Some(command_name) = slack.command_name {
                self.slack.command_name = command_name;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(ranking) = patch.ranking {
            if let Some(link_policy) = ranking.link_policy {
                self.ranking.link_policy = link_policy;
            }
            if let Some(distinct_tag_matches) = ranking.distinct_tag_matches {
                self.ranking.distinct_tag_matches = distinct_tag_matches;
            }
        }

        if let Some(roundup) = patch.roundup {
            if let Some(day_window) = roundup.day_window {
                self.roundup.day_window = day_window;
            }
            if let Some(max_concurrency) = roundup.max_concurrency {
                self.roundup.max_concurrency = max_concurrency;
            }
        }

        if let Some(summary) = patch.summary {
            if let Some(provider) = summary.provider {
                self.summary.provider = provider;
            }
            if let Some(api_key) = summary.api_key {
                self.summary.api_key = Some(secret_value(api_key));
            }
            if let Some(base_url) = summary.base_url {
                self.summary.base_url = base_url;
            }
            if let Some(sentences) = summary.sentences {
                self.summary.sentences = sentences;
            }
            if let Some(timeout_secs) = summary.timeout_secs {
                self.summary.timeout_secs = timeout_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("NEWSBOT_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("NEWSBOT_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("NEWSBOT_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("NEWSBOT_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("NEWSBOT_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("NEWSBOT_SLACK_SIGNING_SECRET") {
            self.slack.signing_secret = secret_value(value);
        }
        if let Some(value) = read_env("NEWSBOT_SLACK_BOT_TOKEN") {
            self.slack.bot_token = Some(secret_value(value));
        }
        if let Some(value) = read_env("NEWSBOT_SLACK_CLIENT_ID") {
            self.slack.client_id = Some(value);
        }
        if let Some(value) = read_env("NEWSBOT_SLACK_CLIENT_SECRET") {
            self.slack.client_secret = Some(secret_value(value));
        }
        if let Some(value) = read_env("NEWSBOT_SLACK_API_BASE_URL") {
            self.slack.api_base_url = value;
        }
        if let Some(value) = read_env("NEWSBOT_SLACK_REQUEST_TIMEOUT_SECS") {
            self.slack.request_timeout_secs =
                parse_u64("NEWSBOT_SLACK_REQUEST_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("NEWSBOT_SLACK_COMMAND_NAME") {
            self.slack.command_name = value;
        }

        if let Some(value) = read_env("NEWSBOT_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("NEWSBOT_SERVER_PORT") {
            self.server.port = parse_u16("NEWSBOT_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("NEWSBOT_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("NEWSBOT_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("NEWSBOT_RANKING_LINK_POLICY") {
            self.ranking.link_policy = value.parse().map_err(ConfigError::Validation)?;
        }
        if let Some(value) = read_env("NEWSBOT_RANKING_DISTINCT_TAG_MATCHES") {
            self.ranking.distinct_tag_matches =
                parse_bool("NEWSBOT_RANKING_DISTINCT_TAG_MATCHES", &value)?;
        }

        if let Some(value) = read_env("NEWSBOT_ROUNDUP_DAY_WINDOW") {
            self.roundup.day_window = parse_u32("NEWSBOT_ROUNDUP_DAY_WINDOW", &value)?;
        }
        if let Some(value) = read_env("NEWSBOT_ROUNDUP_MAX_CONCURRENCY") {
            self.roundup.max_concurrency = parse_usize("NEWSBOT_ROUNDUP_MAX_CONCURRENCY", &value)?;
        }

        if let Some(value) = read_env("NEWSBOT_SUMMARY_PROVIDER") {
            self.summary.provider = value.parse()?;
        }
        let summary_key =
            read_env("NEWSBOT_SUMMARY_API_KEY").or_else(|| read_env("SMMRY_API_KEY"));
        if let Some(value) = summary_key {
            self.summary.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("NEWSBOT_SUMMARY_BASE_URL") {
            self.summary.base_url = value;
        }
        if let Some(value) = read_env("NEWSBOT_SUMMARY_SENTENCES") {
            self.summary.sentences = parse_u32("NEWSBOT_SUMMARY_SENTENCES", &value)?;
        }
        if let Some(value) = read_env("NEWSBOT_SUMMARY_TIMEOUT_SECS") {
            self.summary.timeout_secs = parse_u64("NEWSBOT_SUMMARY_TIMEOUT_SECS", &value)?;
        }

        let log_level = read_env("NEWSBOT_LOGGING_LEVEL").or_else(|| read_env("NEWSBOT_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("NEWSBOT_LOGGING_FORMAT").or_else(|| read_env("NEWSBOT_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(signing_secret) = overrides.slack_signing_secret {
            self.slack.signing_secret = secret_value(signing_secret);
        }
        if let Some(bot_token) = overrides.slack_bot_token {
            self.slack.bot_token = Some(secret_value(bot_token));
        }
        if let Some(api_base_url) = overrides.slack_api_base_url {
            self.slack.api_base_url = api_base_url;
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
        if let Some(day_window) = overrides.roundup_day_window {
            self.roundup.day_window = day_window;
        }
        if let Some(provider) = overrides.summary_provider {
            self.summary.provider = provider;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_slack(&self.slack)?;
        validate_server(&self.server)?;
        validate_roundup(&self.roundup)?;
        validate_summary(&self.summary)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("newsbot.toml"), PathBuf::from("config/newsbot.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_timeout(key: &str, value: u64) -> Result<(), ConfigError> {
    if value == 0 || value > 300 {
        return Err(ConfigError::Validation(format!("{key} must be in range 1..=300")));
    }
    Ok(())
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    validate_timeout("database.timeout_secs", database.timeout_secs)
}

fn validate_slack(slack: &SlackConfig) -> Result<(), ConfigError> {
    if slack.signing_secret.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "slack.signing_secret is required. Get it from https://api.slack.com/apps > Your App > Basic Information > Signing Secret".to_string()
        ));
    }

    if let Some(bot_token) = &slack.bot_token {
        let bot_token = bot_token.expose_secret();
        if !bot_token.starts_with("xoxb-") {
            let hint = if bot_token.starts_with("xapp-") {
                " (hint: you may have used the app-level token instead of the bot token)"
            } else {
                ""
            };
            return Err(ConfigError::Validation(format!(
                "slack.bot_token must start with `xoxb-`{hint}. Get it from https://api.slack.com/apps"
            )));
        }
    }

    if slack.client_id.is_some() != slack.client_secret.is_some() {
        return Err(ConfigError::Validation(
            "slack.client_id and slack.client_secret must be configured together".to_string(),
        ));
    }

    if slack.bot_token.is_none() && !slack.oauth_enabled() {
        return Err(ConfigError::Validation(
            "configure slack.bot_token for a single workspace or slack.client_id/slack.client_secret for OAuth installs".to_string(),
        ));
    }

    let base_url = slack.api_base_url.trim();
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "slack.api_base_url must start with http:// or https://".to_string(),
        ));
    }

    if !slack.command_name.starts_with('/') {
        return Err(ConfigError::Validation(
            "slack.command_name must start with `/`".to_string(),
        ));
    }

    validate_timeout("slack.request_timeout_secs", slack.request_timeout_secs)
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_roundup(roundup: &RoundupConfig) -> Result<(), ConfigError> {
    if roundup.day_window == 0 {
        return Err(ConfigError::Validation(
            "roundup.day_window must be greater than zero".to_string(),
        ));
    }

    if roundup.max_concurrency == 0 || roundup.max_concurrency > MAX_ROUNDUP_CONCURRENCY {
        return Err(ConfigError::Validation(format!(
            "roundup.max_concurrency must be in range 1..={MAX_ROUNDUP_CONCURRENCY}"
        )));
    }

    Ok(())
}

fn validate_summary(summary: &SummaryConfig) -> Result<(), ConfigError> {
    validate_timeout("summary.timeout_secs", summary.timeout_secs)?;

    if summary.provider == SummaryProvider::Smmry {
        let missing = summary
            .api_key
            .as_ref()
            .map(|value| value.expose_secret().trim().is_empty())
            .unwrap_or(true);
        if missing {
            return Err(ConfigError::Validation(
                "summary.api_key is required for the smmry provider".to_string(),
            ));
        }
        if summary.sentences == 0 {
            return Err(ConfigError::Validation(
                "summary.sentences must be greater than zero".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn invalid_override(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() }
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| invalid_override(key, value))
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| invalid_override(key, value))
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| invalid_override(key, value))
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse::<usize>().map_err(|_| invalid_override(key, value))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| invalid_override(key, value))
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    slack: Option<SlackPatch>,
    server: Option<ServerPatch>,
    ranking: Option<RankingPatch>,
    roundup: Option<RoundupPatch>,
    summary: Option<SummaryPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct SlackPatch {
    signing_secret: Option<String>,
    bot_token: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
    api_base_url: Option<String>,
    request_timeout_secs: Option<u64>,
    command_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct RankingPatch {
    link_policy: Option<LinkPolicy>,
    distinct_tag_matches: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct RoundupPatch {
    day_window: Option<u32>,
    max_concurrency: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct SummaryPatch {
    provider: Option<SummaryProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    sentences: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
