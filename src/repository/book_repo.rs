//! Book repository (数据库访问层)

use crate::{
    error::AppError,
    models::book::{Book, CreateBookRequest},
};
use async_trait::async_trait;
use sqlx::PgPool;

/// 图书存储
#[async_trait]
pub trait BookStore: Send + Sync {
    async fn create(&self, req: &CreateBookRequest, publisher_id: i64) -> Result<Book, AppError>;

    async fn list(&self) -> Result<Vec<Book>, AppError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<Book>, AppError>;

    /// 归还一本：库存 +1
    async fn checkin(&self, id: i64) -> Result<Book, AppError>;

    /// 借出一本：库存 -1，库存为 0 时返回 `Conflict`
    async fn checkout(&self, id: i64) -> Result<Book, AppError>;
}

pub struct BookRepository {
    db: PgPool,
}

impl BookRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl BookStore for BookRepository {
    async fn create(&self, req: &CreateBookRequest, publisher_id: i64) -> Result<Book, AppError> {
        let book = sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books (title, published_year, quantity, genre, img_url, publisher_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(&req.title)
        .bind(req.published_year)
        .bind(req.quantity)
        .bind(&req.genre)
        .bind(&req.img_url)
        .bind(publisher_id)
        .fetch_one(&self.db)
        .await?;

        Ok(book)
    }

    async fn list(&self) -> Result<Vec<Book>, AppError> {
        let books = sqlx::query_as::<_, Book>("SELECT * FROM books ORDER BY id")
            .fetch_all(&self.db)
            .await?;

        Ok(books)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Book>, AppError> {
        let book = sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        Ok(book)
    }

    async fn checkin(&self, id: i64) -> Result<Book, AppError> {
        sqlx::query_as::<_, Book>(
            "UPDATE books SET quantity = quantity + 1 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("book"))
    }

    async fn checkout(&self, id: i64) -> Result<Book, AppError> {
        // 条件更新保证并发借出不会把库存减为负数
        let updated = sqlx::query_as::<_, Book>(
            "UPDATE books SET quantity = quantity - 1 WHERE id = $1 AND quantity > 0 RETURNING *",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        match updated {
            Some(book) => Ok(book),
            None if self.find_by_id(id).await?.is_some() => {
                Err(AppError::Conflict("book not available for checkout".to_string()))
            }
            None => Err(AppError::not_found("book")),
        }
    }
}
