//! 图书的 HTTP 处理器

use crate::{
    auth::middleware::AuthContext,
    error::AppError,
    middleware::AppState,
    models::book::CreateBookRequest,
};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

/// 列出图书
pub async fn list_books(
    State(state): State<Arc<AppState>>,
    _auth_context: AuthContext,
) -> Result<impl IntoResponse, AppError> {
    let books = state.books.list().await?;

    Ok(Json(json!({
        "count": books.len(),
        "books": books,
    })))
}

/// 创建图书，出版者为当前用户
pub async fn create_book(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    payload: Result<Json<CreateBookRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(req) = payload?;
    req.validate()?;

    let book = state.books.create(&req, auth_context.user_id.value()).await?;

    tracing::info!(book_id = book.id, publisher_id = %auth_context.user_id, "Book created");

    Ok((StatusCode::CREATED, Json(book)))
}

/// 获取图书详情
pub async fn get_book(
    State(state): State<Arc<AppState>>,
    _auth_context: AuthContext,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let book = state
        .books
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::not_found("book"))?;

    Ok(Json(book))
}

/// 归还
pub async fn checkin(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let book = state.books.checkin(id).await?;

    tracing::info!(book_id = id, user_id = %auth_context.user_id, quantity = book.quantity, "Book checked in");

    Ok(Json(book))
}

/// 借出
pub async fn checkout(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let book = state.books.checkout(id).await?;

    tracing::info!(book_id = id, user_id = %auth_context.user_id, quantity = book.quantity, "Book checked out");

    Ok(Json(book))
}
