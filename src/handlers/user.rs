//! 用户管理的 HTTP 处理器

use crate::{
    auth::middleware::AuthContext,
    error::AppError,
    middleware::AppState,
    models::user::*,
};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

/// 列出用户
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    _auth_context: AuthContext,
) -> Result<impl IntoResponse, AppError> {
    let users = state.users.list().await?;
    let user_responses: Vec<UserResponse> = users.into_iter().map(UserResponse::from).collect();

    Ok(Json(json!({
        "users": user_responses,
        "count": user_responses.len()
    })))
}

/// 获取用户详情
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    _auth_context: AuthContext,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user = state
        .users
        .find_by_id(id.into())
        .await?
        .ok_or_else(|| AppError::not_found("user"))?;

    Ok(Json(UserResponse::from(user)))
}

/// 更新用户，只能修改自己的资料
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Path(id): Path<i64>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    if auth_context.user_id.value() != id {
        tracing::warn!(user_id = %auth_context.user_id, target_id = id, "Update of another user denied");
        return Err(AppError::Forbidden);
    }

    let Json(req) = payload?;
    req.validate()?;

    let user = state
        .users
        .update(auth_context.user_id, &req)
        .await?
        .ok_or_else(|| AppError::not_found("user"))?;

    tracing::info!(user_id = user.id, "User updated");

    Ok(Json(UserResponse::from(user)))
}

/// 列出出版者及其图书数量
pub async fn list_publishers(
    State(state): State<Arc<AppState>>,
    _auth_context: AuthContext,
) -> Result<impl IntoResponse, AppError> {
    let publishers = state.users.list_publishers().await?;

    Ok(Json(json!({
        "count": publishers.len(),
        "publishers": publishers,
    })))
}
