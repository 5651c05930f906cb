//! Service Profile Store
//!
//! Read-only lookup of webhook service profiles. Uses runtime queries
//! (`sqlx::query_as`) to avoid requiring a live database at compile
//! time.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::types::ServiceProfile;

/// Read-only service profile collaborator.
#[async_trait]
pub trait ServiceProfileStore: Send + Sync {
    /// Look up the profile for `(owning bot, service name)`.
    async fn get_profile(
        &self,
        bot_user_id: Uuid,
        service_name: &str,
    ) -> anyhow::Result<Option<ServiceProfile>>;

    /// Numeric service id echoed back by Slack-style protocols.
    ///
    /// The default is the profile's own row id, which is what the chat
    /// server assigns.
    async fn get_slack_service_id(
        &self,
        bot_user_id: Uuid,
        service_name: &str,
    ) -> anyhow::Result<Option<i64>> {
        Ok(self
            .get_profile(bot_user_id, service_name)
            .await?
            .map(|profile| profile.id))
    }
}

/// Production store backed by the chat server's `services` table.
pub struct PgServiceProfileStore {
    pool: PgPool,
}

impl PgServiceProfileStore {
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ServiceProfileStore for PgServiceProfileStore {
    async fn get_profile(
        &self,
        bot_user_id: Uuid,
        service_name: &str,
    ) -> anyhow::Result<Option<ServiceProfile>> {
        let profile = sqlx::query_as::<_, ServiceProfile>(
            r"
            SELECT id, name, base_url, token, bot_user_id, interface
            FROM services
            WHERE bot_user_id = $1 AND name = $2
            ",
        )
        .bind(bot_user_id)
        .bind(service_name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(profile)
    }
}
