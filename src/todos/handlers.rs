use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument};

use super::{
    dto::{TodoRequest, TodoResponse},
    repo::TodoFields,
};
use crate::{
    auth::extractors::CurrentUser,
    error::{ApiError, ApiResult},
    state::AppState,
};

pub fn todo_routes() -> Router<AppState> {
    Router::new()
        .route("/todos", get(list_todos).post(create_todo))
        .route(
            "/todos/:id",
            get(get_todo).put(replace_todo).delete(delete_todo),
        )
}

fn not_found() -> ApiError {
    ApiError::NotFound("Todo not found".into())
}

#[instrument(skip(state, user), fields(user_id = user.id))]
pub async fn list_todos(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Json<Vec<TodoResponse>>> {
    let todos = state.todos.list_by_user(user.id).await?;
    Ok(Json(todos.into_iter().map(Into::into).collect()))
}

#[instrument(skip(state, user, body), fields(user_id = user.id))]
pub async fn create_todo(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<TodoRequest>,
) -> ApiResult<(StatusCode, Json<TodoResponse>)> {
    let fields = TodoFields::try_from(body)?;
    let todo = state.todos.create(user.id, fields).await?;
    info!(todo_id = todo.id, "todo created");
    Ok((StatusCode::CREATED, Json(todo.into())))
}

#[instrument(skip(state, user), fields(user_id = user.id))]
pub async fn get_todo(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<TodoResponse>> {
    let todo = state.todos.get(user.id, id).await?.ok_or_else(not_found)?;
    Ok(Json(todo.into()))
}

#[instrument(skip(state, user, body), fields(user_id = user.id))]
pub async fn replace_todo(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
    Json(body): Json<TodoRequest>,
) -> ApiResult<Json<TodoResponse>> {
    let fields = TodoFields::try_from(body)?;
    let todo = state
        .todos
        .replace(user.id, id, fields)
        .await?
        .ok_or_else(not_found)?;
    info!(todo_id = todo.id, "todo replaced");
    Ok(Json(todo.into()))
}

#[instrument(skip(state, user), fields(user_id = user.id))]
pub async fn delete_todo(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    if !state.todos.delete(user.id, id).await? {
        return Err(not_found());
    }
    info!(todo_id = id, "todo deleted");
    Ok(StatusCode::NO_CONTENT)
}
