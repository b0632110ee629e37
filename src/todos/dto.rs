use serde::{Deserialize, Serialize};

use super::repo_types::{Todo, TodoFields};
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct TodoRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub completed: bool,
}

impl TryFrom<TodoRequest> for TodoFields {
    type Error = ApiError;

    fn try_from(r: TodoRequest) -> Result<Self, Self::Error> {
        let title = r.title.trim().to_string();
        if title.is_empty() {
            return Err(ApiError::Validation("Title must not be empty".into()));
        }
        Ok(Self {
            title,
            description: r.description,
            completed: r.completed,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct TodoResponse {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub completed: bool,
}

impl From<Todo> for TodoResponse {
    fn from(t: Todo) -> Self {
        Self {
            id: t.id,
            title: t.title,
            description: t.description,
            completed: t.completed,
        }
    }
}
