use axum::async_trait;
use sqlx::PgPool;
use tokio::sync::RwLock;

pub use super::repo_types::{Todo, TodoFields};
use crate::store::StoreError;

/// Todo persistence. Every call is scoped to the owning user; a todo owned by
/// someone else behaves as if it did not exist.
#[async_trait]
pub trait TodoStore: Send + Sync {
    async fn list_by_user(&self, user_id: i64) -> Result<Vec<Todo>, StoreError>;
    async fn get(&self, user_id: i64, id: i64) -> Result<Option<Todo>, StoreError>;
    async fn create(&self, user_id: i64, fields: TodoFields) -> Result<Todo, StoreError>;
    async fn replace(
        &self,
        user_id: i64,
        id: i64,
        fields: TodoFields,
    ) -> Result<Option<Todo>, StoreError>;
    /// `true` if a row was removed.
    async fn delete(&self, user_id: i64, id: i64) -> Result<bool, StoreError>;
}

#[derive(Clone)]
pub struct PgTodoStore {
    db: PgPool,
}

impl PgTodoStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TodoStore for PgTodoStore {
    async fn list_by_user(&self, user_id: i64) -> Result<Vec<Todo>, StoreError> {
        let rows = sqlx::query_as::<_, Todo>(
            r#"
            SELECT id, title, description, completed, user_id
            FROM todos
            WHERE user_id = $1
            ORDER BY id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn get(&self, user_id: i64, id: i64) -> Result<Option<Todo>, StoreError> {
        let row = sqlx::query_as::<_, Todo>(
            r#"
            SELECT id, title, description, completed, user_id
            FROM todos
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn create(&self, user_id: i64, fields: TodoFields) -> Result<Todo, StoreError> {
        let row = sqlx::query_as::<_, Todo>(
            r#"
            INSERT INTO todos (title, description, completed, user_id)
            VALUES ($1, $2, $3, $4)
            RETURNING id, title, description, completed, user_id
            "#,
        )
        .bind(fields.title)
        .bind(fields.description)
        .bind(fields.completed)
        .bind(user_id)
        .fetch_one(&self.db)
        .await?;
        Ok(row)
    }

    async fn replace(
        &self,
        user_id: i64,
        id: i64,
        fields: TodoFields,
    ) -> Result<Option<Todo>, StoreError> {
        let row = sqlx::query_as::<_, Todo>(
            r#"
            UPDATE todos
            SET title = $1, description = $2, completed = $3
            WHERE id = $4 AND user_id = $5
            RETURNING id, title, description, completed, user_id
            "#,
        )
        .bind(fields.title)
        .bind(fields.description)
        .bind(fields.completed)
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn delete(&self, user_id: i64, id: i64) -> Result<bool, StoreError> {
        let res = sqlx::query(r#"DELETE FROM todos WHERE id = $1 AND user_id = $2"#)
            .bind(id)
            .bind(user_id)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}

#[derive(Default)]
struct MemoryTodos {
    next_id: i64,
    rows: Vec<Todo>,
}

/// Process-local todo table, selected with `DATABASE_URL=memory:`.
#[derive(Default)]
pub struct MemoryTodoStore {
    inner: RwLock<MemoryTodos>,
}

#[async_trait]
impl TodoStore for MemoryTodoStore {
    async fn list_by_user(&self, user_id: i64) -> Result<Vec<Todo>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .rows
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn get(&self, user_id: i64, id: i64) -> Result<Option<Todo>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .rows
            .iter()
            .find(|t| t.id == id && t.user_id == user_id)
            .cloned())
    }

    async fn create(&self, user_id: i64, fields: TodoFields) -> Result<Todo, StoreError> {
        let mut inner = self.inner.write().await;
        inner.next_id += 1;
        let todo = Todo {
            id: inner.next_id,
            title: fields.title,
            description: fields.description,
            completed: fields.completed,
            user_id,
        };
        inner.rows.push(todo.clone());
        Ok(todo)
    }

    async fn replace(
        &self,
        user_id: i64,
        id: i64,
        fields: TodoFields,
    ) -> Result<Option<Todo>, StoreError> {
        let mut inner = self.inner.write().await;
        let Some(todo) = inner
            .rows
            .iter_mut()
            .find(|t| t.id == id && t.user_id == user_id)
        else {
            return Ok(None);
        };
        todo.title = fields.title;
        todo.description = fields.description;
        todo.completed = fields.completed;
        Ok(Some(todo.clone()))
    }

    async fn delete(&self, user_id: i64, id: i64) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        let before = inner.rows.len();
        inner.rows.retain(|t| !(t.id == id && t.user_id == user_id));
        Ok(inner.rows.len() < before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(title: &str) -> TodoFields {
        TodoFields {
            title: title.into(),
            description: None,
            completed: false,
        }
    }

    #[tokio::test]
    async fn memory_store_scopes_by_owner() {
        let store = MemoryTodoStore::default();
        let mine = store.create(1, fields("mine")).await.unwrap();
        store.create(2, fields("theirs")).await.unwrap();

        let listed = store.list_by_user(1).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].title, "mine");

        assert!(store.get(2, mine.id).await.unwrap().is_none());
        assert!(store.replace(2, mine.id, fields("hijack")).await.unwrap().is_none());
        assert!(!store.delete(2, mine.id).await.unwrap());
        assert_eq!(store.get(1, mine.id).await.unwrap().unwrap().title, "mine");
    }

    #[tokio::test]
    async fn memory_store_ids_are_not_reused_after_delete() {
        let store = MemoryTodoStore::default();
        let a = store.create(1, fields("a")).await.unwrap();
        assert!(store.delete(1, a.id).await.unwrap());
        let b = store.create(1, fields("b")).await.unwrap();
        assert!(b.id > a.id);
    }
}
