//! User repository (数据库访问层)

use crate::{
    auth::PrincipalId,
    error::AppError,
    models::user::{NewUser, PublisherWithCount, UpdateUserRequest, User},
};
use async_trait::async_trait;
use sqlx::PgPool;

/// 用户存储
///
/// 认证核心只通过 `find_by_id` 读取 id、密码哈希与角色。
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: PrincipalId) -> Result<Option<User>, AppError>;

    /// 创建用户，邮箱重复时返回 `Conflict`
    async fn create(&self, user: NewUser) -> Result<User, AppError>;

    async fn update(&self, id: PrincipalId, req: &UpdateUserRequest)
        -> Result<Option<User>, AppError>;

    async fn list(&self) -> Result<Vec<User>, AppError>;

    async fn list_publishers(&self) -> Result<Vec<PublisherWithCount>, AppError>;

    /// 存储连通性检查
    async fn ping(&self) -> Result<(), AppError>;
}

pub struct UserRepository {
    db: PgPool,
}

impl UserRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for UserRepository {
    /// 根据 ID 查找用户
    async fn find_by_id(&self, id: PrincipalId) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id.value())
            .fetch_optional(&self.db)
            .await?;

        Ok(user)
    }

    async fn create(&self, user: NewUser) -> Result<User, AppError> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (first_name, last_name, email, password_hash, role)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.role)
        .fetch_one(&self.db)
        .await
        .map_err(map_email_conflict)
    }

    /// 更新用户（仅更新提供的字段），邮箱与他人重复时返回 `Conflict`
    async fn update(
        &self,
        id: PrincipalId,
        req: &UpdateUserRequest,
    ) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET
                first_name = COALESCE($2, first_name),
                last_name = COALESCE($3, last_name),
                email = COALESCE($4, email),
                img_src = COALESCE($5, img_src),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id.value())
        .bind(&req.first_name)
        .bind(&req.last_name)
        .bind(&req.email)
        .bind(&req.img_src)
        .fetch_optional(&self.db)
        .await
        .map_err(map_email_conflict)?;

        Ok(user)
    }

    /// 列出所有用户
    async fn list(&self) -> Result<Vec<User>, AppError> {
        let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY id")
            .fetch_all(&self.db)
            .await?;

        Ok(users)
    }

    /// 列出出版者及其图书数量
    async fn list_publishers(&self) -> Result<Vec<PublisherWithCount>, AppError> {
        let publishers = sqlx::query_as::<_, PublisherWithCount>(
            r#"
            SELECT
                u.id, u.first_name, u.last_name, u.email, u.img_src, u.created_at,
                COUNT(b.id) AS book_count
            FROM users u
            LEFT JOIN books b ON b.publisher_id = u.id
            GROUP BY u.id
            ORDER BY u.id
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        Ok(publishers)
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.db).await?;
        Ok(())
    }
}

/// 邮箱唯一约束冲突映射为 `Conflict`
fn map_email_conflict(e: sqlx::Error) -> AppError {
    match e.as_database_error() {
        Some(db_err) if db_err.is_unique_violation() => {
            AppError::Conflict("email already registered".to_string())
        }
        _ => AppError::Database(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::error::{DatabaseError, ErrorKind};
    use std::{error::Error as StdError, fmt};

    #[derive(Debug)]
    struct FakeDbError {
        unique: bool,
    }

    impl fmt::Display for FakeDbError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "fake database error")
        }
    }

    impl StdError for FakeDbError {}

    impl DatabaseError for FakeDbError {
        fn message(&self) -> &str {
            "fake database error"
        }

        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            if self.unique {
                ErrorKind::UniqueViolation
            } else {
                ErrorKind::Other
            }
        }
    }

    #[test]
    fn test_unique_violation_maps_to_conflict() {
        let err = map_email_conflict(sqlx::Error::database(FakeDbError { unique: true }));
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(err.code(), 409);
    }

    #[test]
    fn test_other_database_errors_stay_internal() {
        let err = map_email_conflict(sqlx::Error::database(FakeDbError { unique: false }));
        assert!(matches!(err, AppError::Database(_)));

        let err = map_email_conflict(sqlx::Error::RowNotFound);
        assert_eq!(err.code(), 500);
    }
}
