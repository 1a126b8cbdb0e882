use std::sync::Arc;

use axum::Router;
use newsbot_core::config::{AppConfig, ConfigError, LoadOptions};
use newsbot_core::mention::MentionOptions;
use newsbot_db::repositories::{SqlSubmissionRepository, SqlTenantRepository, TagUnion};
use newsbot_db::{connect, migrations, DbPool};
use newsbot_slack::api::{HttpSlackConnector, SlackConnector};
use thiserror::Error;
use tracing::info;

use crate::health::HealthState;
use crate::newsroom::Newsroom;
use crate::roundup::Roundup;
use crate::routes::{self, AppState};
use crate::summary::summarizer_from_config;
use crate::tenancy::TenantResolver;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub newsroom: Newsroom,
    pub roundup: Roundup,
    state: AppState,
}

impl Application {
    pub fn router(&self) -> Router {
        let tenancy = if self.newsroom.tenants().is_single_tenant() { "single" } else { "multi" };
        routes::router(self.state.clone(), HealthState { db_pool: self.db_pool.clone(), tenancy })
    }
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("http client setup failed: {0}")]
    HttpClient(#[source] reqwest::Error),
    #[error("template setup failed: {0}")]
    Templates(#[source] tera::Error),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", correlation_id = "bootstrap", "starting application bootstrap");

    let db_pool = connect(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let submissions = Arc::new(SqlSubmissionRepository::new(db_pool.clone()));
    let tenants = TenantResolver::from_config(
        &config.slack,
        Arc::new(SqlTenantRepository::new(db_pool.clone())),
    );
    let connector: Arc<dyn SlackConnector> = Arc::new(
        HttpSlackConnector::new(&config.slack.api_base_url, config.slack.request_timeout_secs)
            .map_err(BootstrapError::HttpClient)?,
    );
    let summarizer = summarizer_from_config(&config.summary).map_err(BootstrapError::HttpClient)?;

    let newsroom = Newsroom::new(
        submissions.clone(),
        tenants.clone(),
        connector.clone(),
        MentionOptions {
            link_policy: config.ranking.link_policy,
            require_team: config.slack.is_multi_tenant(),
        },
        TagUnion::from_distinct_flag(config.ranking.distinct_tag_matches),
    );
    let roundup = Roundup::new(
        submissions,
        tenants,
        connector.clone(),
        summarizer,
        config.roundup.day_window,
        config.roundup.max_concurrency,
    );
    let state = AppState::new(newsroom.clone(), connector, &config.slack)
        .map_err(BootstrapError::Templates)?;

    info!(
        event_name = "system.bootstrap.ready",
        correlation_id = "bootstrap",
        multi_tenant = config.slack.is_multi_tenant(),
        summary_provider = ?config.summary.provider,
        "application services assembled"
    );

    Ok(Application { config, db_pool, newsroom, roundup, state })
}

#[cfg(test)]
mod tests {
    use axum::{body::Body, http::Request, http::StatusCode};
    use newsbot_core::config::{ConfigOverrides, LoadOptions};
    use tower::ServiceExt;

    use crate::bootstrap::bootstrap;

    fn overrides(signing_secret: Option<&str>) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:".to_string()),
                slack_signing_secret: signing_secret.map(str::to_string),
                slack_bot_token: Some("xoxb-test".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_without_signing_secret() {
        let result = bootstrap(overrides(None)).await;

        let message = result.err().expect("bootstrap should fail").to_string();
        assert!(message.contains("slack.signing_secret"));
    }

    #[tokio::test]
    async fn bootstrap_migrates_and_serves_health() {
        let app = bootstrap(overrides(Some("secret"))).await.expect("bootstrap should succeed");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('submission', 'tenant')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("baseline tables");
        assert_eq!(table_count, 2);
        assert!(app.newsroom.tenants().is_single_tenant());

        let response = app
            .router()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        let summary = app.roundup.run().await.expect("empty roundup");
        assert_eq!(summary.channels_total, 0);

        app.db_pool.close().await;
    }
}
