use std::sync::Arc;

use chrono::Utc;
use secrecy::ExposeSecret;
use thiserror::Error;
use tracing::{info, warn};

use newsbot_core::config::SlackConfig;
use newsbot_core::domain::submission::TeamId;
use newsbot_core::domain::tenant::{BotCredential, TenantCredential};
use newsbot_core::errors::ApplicationError;
use newsbot_db::repositories::{RepositoryError, TenantRepository};
use newsbot_slack::api::OAuthAccess;

#[derive(Debug, Error)]
pub enum TenantError {
    #[error("stored credential for team `{0}` is not a bot token")]
    InvalidCredential(String),
    #[error("tenant lookup failed: {0}")]
    Lookup(#[from] RepositoryError),
}

impl From<TenantError> for ApplicationError {
    fn from(value: TenantError) -> Self {
        match value {
            TenantError::Lookup(error) => error.into(),
            invalid @ TenantError::InvalidCredential(_) => Self::Configuration(invalid.to_string()),
        }
    }
}

/// Maps a team to the bot token used when acting on its behalf.
#[derive(Clone)]
pub struct TenantResolver {
    static_credential: Option<BotCredential>,
    tenants: Arc<dyn TenantRepository>,
}

impl TenantResolver {
    pub fn new(static_credential: Option<BotCredential>, tenants: Arc<dyn TenantRepository>) -> Self {
        Self { static_credential, tenants }
    }

    pub fn from_config(slack: &SlackConfig, tenants: Arc<dyn TenantRepository>) -> Self {
        let static_credential =
            slack.bot_token.as_ref().map(|token| BotCredential::new(token.expose_secret()));
        Self::new(static_credential, tenants)
    }

    pub fn is_single_tenant(&self) -> bool {
        self.static_credential.is_some()
    }

    /// A single-tenant install answers for every team, including an unknown one.
    pub async fn resolve(
        &self,
        team_id: Option<&TeamId>,
    ) -> Result<Option<BotCredential>, TenantError> {
        if let Some(credential) = &self.static_credential {
            return Ok(Some(credential.clone()));
        }
        let Some(team_id) = team_id else {
            return Ok(None);
        };

        match self.tenants.find(team_id).await? {
            Some(tenant) if tenant.bot_token.is_well_formed() => Ok(Some(tenant.bot_token)),
            Some(_) => Err(TenantError::InvalidCredential(team_id.0.clone())),
            None => Ok(None),
        }
    }

    pub async fn install(&self, access: OAuthAccess) -> Result<TenantCredential, TenantError> {
        let tenant = TenantCredential {
            team_id: TeamId(access.team_id),
            team_name: access.team_name,
            bot_user_id: access.bot_user_id,
            scope: access.scope,
            bot_token: BotCredential::new(access.access_token),
            installed_at: Utc::now(),
        };
        if !tenant.bot_token.is_well_formed() {
            warn!(
                event_name = "tenancy.install.rejected",
                team_id = %tenant.team_id.0,
                "oauth exchange returned a token that is not a bot token"
            );
            return Err(TenantError::InvalidCredential(tenant.team_id.0.clone()));
        }

        self.tenants.save(tenant.clone()).await?;
        info!(event_name = "tenancy.install.saved", team_id = %tenant.team_id.0, "tenant installed");
        Ok(tenant)
    }

    pub async fn revoke(&self, team_id: &TeamId) -> Result<bool, TenantError> {
        Ok(self.tenants.delete(team_id).await?)
    }
}
