//! 认证相关的 HTTP 处理器

use crate::{
    auth::middleware::AuthContext,
    error::AppError,
    middleware::AppState,
    models::{auth::*, user::UserResponse},
};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;

/// 登录
pub async fn login(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(req) = payload?;
    let response = state.auth_service.login(req).await?;

    Ok(Json(response))
}

/// 注册
pub async fn signup(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(req) = payload?;
    let response = state.auth_service.signup(req).await?;

    Ok((StatusCode::CREATED, Json(response)))
}

/// 刷新令牌
pub async fn refresh_token(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RefreshTokenRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(req) = payload?;
    let response = state.auth_service.refresh_token(req).await?;

    Ok(Json(response))
}

/// 登出
pub async fn logout(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    payload: Result<Json<LogoutRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(req) = payload?;
    state
        .auth_service
        .logout(&req.refresh_token, auth_context.user_id)
        .await?;

    Ok(Json(json!({"message": "logged out"})))
}

/// 受保护的示例端点
pub async fn protected(auth_context: AuthContext) -> impl IntoResponse {
    Json(json!({
        "message": format!("Hello, user {}", auth_context.user_id),
        "user_id": auth_context.user_id,
    }))
}

/// 获取当前用户信息
pub async fn profile(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
) -> Result<impl IntoResponse, AppError> {
    let user = state
        .users
        .find_by_id(auth_context.user_id)
        .await?
        .ok_or_else(|| AppError::not_found("user"))?;

    Ok(Json(UserResponse::from(user)))
}
