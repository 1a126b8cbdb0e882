use newsbot_core::config::{AppConfig, LoadOptions, SummaryProvider};
use newsbot_core::BotCredential;
use newsbot_db::{connect, DbPool};
use secrecy::ExposeSecret;
use serde::Serialize;

use crate::commands::{current_thread_runtime, CommandResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

impl DoctorCheck {
    fn pass(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Pass, details: details.into() }
    }

    fn fail(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Fail, details: details.into() }
    }

    fn skipped(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Skipped, details: details.into() }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(options: LoadOptions, json_output: bool) -> CommandResult {
    let report = build_report(options);
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { 1 };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

const DATABASE_CHECKS: [&str; 2] = ["database_connectivity", "schema"];

fn build_report(options: LoadOptions) -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(options) {
        Ok(config) => {
            checks.push(DoctorCheck::pass("config_validation", "configuration loaded and validated"));
            checks.push(check_slack_credentials(&config));
            checks.extend(check_database(&config));
            checks.push(check_summary_provider(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck::fail("config_validation", error.to_string()));
            for name in ["slack_credentials", "database_connectivity", "schema", "summary_provider"]
            {
                checks.push(DoctorCheck::skipped(
                    name,
                    "skipped because configuration did not load",
                ));
            }
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_slack_credentials(config: &AppConfig) -> DoctorCheck {
    let slack = &config.slack;
    match slack.bot_token.as_ref() {
        Some(token) => {
            let credential = BotCredential::new(token.expose_secret());
            if credential.is_well_formed() {
                DoctorCheck::pass("slack_credentials", "single-workspace bot token configured")
            } else {
                DoctorCheck::fail(
                    "slack_credentials",
                    "slack.bot_token does not look like a bot token (expected `xoxb-` prefix)",
                )
            }
        }
        None if slack.oauth_enabled() => DoctorCheck::pass(
            "slack_credentials",
            "multi-workspace mode; bot tokens are issued through /oauth",
        ),
        None => DoctorCheck::fail(
            "slack_credentials",
            "no slack.bot_token and no OAuth client configured; bot cannot post",
        ),
    }
}

fn check_database(config: &AppConfig) -> Vec<DoctorCheck> {
    let runtime = match current_thread_runtime() {
        Ok(runtime) => runtime,
        Err(error) => {
            let details = format!("failed to initialize async runtime: {error}");
            return DATABASE_CHECKS
                .into_iter()
                .map(|name| DoctorCheck::fail(name, details.clone()))
                .collect();
        }
    };

    runtime.block_on(async {
        let pool = match connect(&config.database).await {
            Ok(pool) => pool,
            Err(error) => {
                return vec![
                    DoctorCheck::fail(
                        "database_connectivity",
                        format!("failed to connect to database: {error}"),
                    ),
                    DoctorCheck::skipped("schema", "skipped because the database is unreachable"),
                ];
            }
        };

        let connectivity = DoctorCheck::pass(
            "database_connectivity",
            format!("connected using `{}`", config.database.url),
        );
        let schema = check_schema(&pool).await;
        pool.close().await;
        vec![connectivity, schema]
    })
}

async fn check_schema(pool: &DbPool) -> DoctorCheck {
    let table: Result<Option<String>, sqlx::Error> = sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'submission'",
    )
    .fetch_optional(pool)
    .await;

    match table {
        Ok(Some(_)) => DoctorCheck::pass("schema", "submission table present"),
        Ok(None) => DoctorCheck::fail("schema", "submission table missing; run `newsbot migrate`"),
        Err(error) => DoctorCheck::fail("schema", format!("schema inspection failed: {error}")),
    }
}

fn check_summary_provider(config: &AppConfig) -> DoctorCheck {
    match config.summary.provider {
        SummaryProvider::None => {
            DoctorCheck::pass("summary_provider", "summaries disabled; digests post without one")
        }
        SummaryProvider::Smmry if config.summary.api_key.is_some() => DoctorCheck::pass(
            "summary_provider",
            format!("smmry configured at `{}`", config.summary.base_url),
        ),
        SummaryProvider::Smmry => {
            DoctorCheck::fail("summary_provider", "smmry provider selected without summary.api_key")
        }
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
