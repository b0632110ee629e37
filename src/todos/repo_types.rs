use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct Todo {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub completed: bool,
    pub user_id: i64,
}

/// Writable fields of a todo, used for both create and replace.
#[derive(Debug, Clone)]
pub struct TodoFields {
    pub title: String,
    pub description: Option<String>,
    pub completed: bool,
}
