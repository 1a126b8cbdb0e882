use chrono::{DateTime, Utc};
use sqlx::Row;

use newsbot_core::domain::submission::TeamId;
use newsbot_core::domain::tenant::{BotCredential, TenantCredential};

use super::{RepositoryError, TenantRepository};
use crate::DbPool;

pub struct SqlTenantRepository {
    pool: DbPool,
}

impl SqlTenantRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_tenant(row: &sqlx::sqlite::SqliteRow) -> Result<TenantCredential, RepositoryError> {
    let team_id: String =
        row.try_get("team_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let team_name: Option<String> =
        row.try_get("team_name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let bot_user_id: Option<String> =
        row.try_get("bot_user_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let scope: Option<String> =
        row.try_get("scope").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let bot_token: String =
        row.try_get("bot_token").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let installed_at_str: String =
        row.try_get("installed_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let installed_at = DateTime::parse_from_rfc3339(&installed_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("installed_at: {e}")))?;

    Ok(TenantCredential {
        team_id: TeamId(team_id),
        team_name,
        bot_user_id,
        scope,
        bot_token: BotCredential::new(bot_token),
        installed_at,
    })
}

#[async_trait::async_trait]
impl TenantRepository for SqlTenantRepository {
    async fn find(&self, team_id: &TeamId) -> Result<Option<TenantCredential>, RepositoryError> {
        let row = sqlx::query(
            "SELECT team_id, team_name, bot_user_id, scope, bot_token, installed_at
             FROM tenant WHERE team_id = ?",
        )
        .bind(&team_id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_tenant(r)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, tenant: TenantCredential) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO tenant (team_id, team_name, bot_user_id, scope, bot_token, installed_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(team_id) DO UPDATE SET
                 team_name = excluded.team_name,
                 bot_user_id = excluded.bot_user_id,
                 scope = excluded.scope,
                 bot_token = excluded.bot_token,
                 installed_at = excluded.installed_at",
        )
        .bind(&tenant.team_id.0)
        .bind(&tenant.team_name)
        .bind(&tenant.bot_user_id)
        .bind(&tenant.scope)
        .bind(tenant.bot_token.token())
        .bind(tenant.installed_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, team_id: &TeamId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM tenant WHERE team_id = ?")
            .bind(&team_id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use newsbot_core::domain::submission::TeamId;
    use newsbot_core::domain::tenant::{BotCredential, TenantCredential};

    use super::SqlTenantRepository;
    use crate::repositories::TenantRepository;
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    fn sample_tenant(team: &str, token: &str) -> TenantCredential {
        TenantCredential {
            team_id: TeamId(team.to_string()),
            team_name: Some("Newsroom".to_string()),
            bot_user_id: Some("UBOT".to_string()),
            scope: Some("app_mentions:read,chat:write,commands,reactions:read".to_string()),
            bot_token: BotCredential::new(token),
            installed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn save_find_and_delete_tenant() {
        let repo = SqlTenantRepository::new(setup().await);
        let team = TeamId("T1".to_string());

        repo.save(sample_tenant("T1", "xoxb-first")).await.expect("save");
        let found = repo.find(&team).await.expect("find").expect("should exist");
        assert_eq!(found.bot_token.token(), "xoxb-first");
        assert_eq!(found.team_name.as_deref(), Some("Newsroom"));

        assert!(repo.delete(&team).await.expect("delete"));
        assert!(repo.find(&team).await.expect("find after delete").is_none());
        assert!(!repo.delete(&team).await.expect("second delete"));
    }

    #[tokio::test]
    async fn reinstall_replaces_token() {
        let repo = SqlTenantRepository::new(setup().await);

        repo.save(sample_tenant("T1", "xoxb-first")).await.expect("save");
        repo.save(sample_tenant("T1", "xoxb-second")).await.expect("reinstall");

        let found = repo.find(&TeamId("T1".to_string())).await.expect("find").expect("exists");
        assert_eq!(found.bot_token.token(), "xoxb-second");
    }
}
