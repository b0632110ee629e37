use axum::async_trait;
use sqlx::PgPool;
use tokio::sync::RwLock;

pub use crate::auth::repo_types::User;
use crate::store::StoreError;

/// Lookups and inserts on user records. Username and email are each unique.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    /// Any user holding either `username` or `email`.
    async fn find_by_username_or_email(
        &self,
        username: &str,
        email: &str,
    ) -> Result<Option<User>, StoreError>;

    /// Inserts a user. `StoreError::Duplicate` if the username or email is taken.
    async fn create(
        &self,
        username: &str,
        email: &str,
        hashed_password: &str,
    ) -> Result<User, StoreError>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, hashed_password
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_username_or_email(
        &self,
        username: &str,
        email: &str,
    ) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, hashed_password
            FROM users
            WHERE username = $1 OR email = $2
            LIMIT 1
            "#,
        )
        .bind(username)
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn create(
        &self,
        username: &str,
        email: &str,
        hashed_password: &str,
    ) -> Result<User, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, email, hashed_password)
            VALUES ($1, $2, $3)
            RETURNING id, username, email, hashed_password
            "#,
        )
        .bind(username)
        .bind(email)
        .bind(hashed_password)
        .fetch_one(&self.db)
        .await?;
        Ok(user)
    }
}

/// Process-local user table, selected with `DATABASE_URL=memory:`.
#[derive(Default)]
pub struct MemoryUserStore {
    rows: RwLock<Vec<User>>,
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let rows = self.rows.read().await;
        Ok(rows.iter().find(|u| u.username == username).cloned())
    }

    async fn find_by_username_or_email(
        &self,
        username: &str,
        email: &str,
    ) -> Result<Option<User>, StoreError> {
        let rows = self.rows.read().await;
        Ok(rows
            .iter()
            .find(|u| u.username == username || u.email == email)
            .cloned())
    }

    async fn create(
        &self,
        username: &str,
        email: &str,
        hashed_password: &str,
    ) -> Result<User, StoreError> {
        let mut rows = self.rows.write().await;
        if rows
            .iter()
            .any(|u| u.username == username || u.email == email)
        {
            return Err(StoreError::Duplicate);
        }
        let user = User {
            id: rows.last().map_or(1, |u| u.id + 1),
            username: username.to_string(),
            email: email.to_string(),
            hashed_password: hashed_password.to_string(),
        };
        rows.push(user.clone());
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_assigns_sequential_ids() {
        let store = MemoryUserStore::default();
        let a = store.create("alice", "alice@x.com", "h1").await.unwrap();
        let b = store.create("bob", "bob@x.com", "h2").await.unwrap();
        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
    }

    #[tokio::test]
    async fn memory_store_enforces_uniqueness() {
        let store = MemoryUserStore::default();
        store.create("alice", "alice@x.com", "h").await.unwrap();

        let same_name = store.create("alice", "other@x.com", "h").await;
        assert!(matches!(same_name, Err(StoreError::Duplicate)));

        let same_email = store.create("alice2", "alice@x.com", "h").await;
        assert!(matches!(same_email, Err(StoreError::Duplicate)));
    }

    #[tokio::test]
    async fn memory_store_lookups() {
        let store = MemoryUserStore::default();
        store.create("alice", "alice@x.com", "h").await.unwrap();

        assert!(store.find_by_username("alice").await.unwrap().is_some());
        assert!(store.find_by_username("bob").await.unwrap().is_none());
        let by_email = store
            .find_by_username_or_email("nobody", "alice@x.com")
            .await
            .unwrap();
        assert_eq!(by_email.map(|u| u.username), Some("alice".to_string()));
    }
}
