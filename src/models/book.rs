//! Book domain models

use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub published_year: i32,
    /// Copies currently available for checkout
    pub quantity: i32,
    pub genre: Option<String>,
    pub img_url: Option<String>,
    pub publisher_id: Option<i64>,
}

/// Create book request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateBookRequest {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[validate(range(min = 0, max = 9999))]
    pub published_year: i32,
    #[validate(range(min = 0))]
    pub quantity: i32,
    #[validate(length(max = 100))]
    pub genre: Option<String>,
    #[validate(url)]
    pub img_url: Option<String>,
}
