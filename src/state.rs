use crate::auth::jwt::JwtKeys;
use crate::auth::repo::{MemoryUserStore, PgUserStore, UserStore};
use crate::config::AppConfig;
use crate::todos::repo::{MemoryTodoStore, PgTodoStore, TodoStore};
use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub jwt: JwtKeys,
    pub users: Arc<dyn UserStore>,
    pub todos: Arc<dyn TodoStore>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        if config.uses_memory_store() {
            tracing::warn!("using in-memory store; data is lost on shutdown");
            return Ok(Self::from_parts(
                config,
                Arc::new(MemoryUserStore::default()),
                Arc::new(MemoryTodoStore::default()),
            ));
        }

        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        if let Err(e) = sqlx::migrate!("./migrations").run(&db).await {
            tracing::warn!(error = %e, "migration failed; continuing");
        }

        Ok(Self::from_parts(
            config,
            Arc::new(PgUserStore::new(db.clone())),
            Arc::new(PgTodoStore::new(db)),
        ))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn UserStore>,
        todos: Arc<dyn TodoStore>,
    ) -> Self {
        let jwt = JwtKeys::from_config(&config.jwt);
        Self {
            config,
            jwt,
            users,
            todos,
        }
    }

    #[cfg(test)]
    pub fn test_config() -> Arc<AppConfig> {
        Arc::new(AppConfig {
            database_url: "memory:".into(),
            jwt: crate::config::JwtConfig {
                secret: "test".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 5,
            },
        })
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        Self::from_parts(
            Self::test_config(),
            Arc::new(MemoryUserStore::default()),
            Arc::new(MemoryTodoStore::default()),
        )
    }
}
