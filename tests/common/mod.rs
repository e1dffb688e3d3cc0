//! 测试公共模块
//! 提供内存存储、测试配置和应用构建辅助函数

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{body::Body, http::Request, Router};
use chrono::Utc;
use http_body_util::BodyExt;
use lending_catalog::{
    auth::{InMemoryRefreshStore, PasswordHasher, PrincipalId, SessionPolicy, TokenIssuer, TokenValidator},
    config::{AppConfig, DatabaseConfig, LoggingConfig, SecurityConfig, ServerConfig},
    error::AppError,
    middleware::AppState,
    models::{
        book::{Book, CreateBookRequest},
        user::{NewUser, PublisherWithCount, UpdateUserRequest, User},
    },
    repository::{BookStore, UserStore},
    services::AuthService,
};
use secrecy::Secret;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

pub const TEST_SECRET: &str = "test-secret-key-for-testing-only-min-32-chars";
pub const TEST_ISSUER: &str = "lending-catalog";

/// 创建测试配置
pub fn create_test_config() -> AppConfig {
    AppConfig {
        server: ServerConfig {
            addr: "127.0.0.1:0".to_string(),
            graceful_shutdown_timeout_secs: 5,
            body_limit_bytes: 64 * 1024,
        },
        database: DatabaseConfig {
            url: Secret::new("postgresql://localhost/lending_catalog_test".to_string()),
            max_connections: 5,
            min_connections: 1,
            acquire_timeout_secs: 5,
            idle_timeout_secs: 300,
            max_lifetime_secs: 1800,
        },
        logging: LoggingConfig {
            level: "debug".to_string(),
            format: "pretty".to_string(),
        },
        security: SecurityConfig {
            jwt_secret: Secret::new(TEST_SECRET.to_string()),
            jwt_refresh_secret: None,
            issuer: TEST_ISSUER.to_string(),
            access_token_exp_secs: 300,
            refresh_token_exp_secs: Some(3600),
            password_min_length: 8,
            default_role: "member".to_string(),
        },
    }
}

/// 低成本哈希参数，避免测试过慢
pub fn test_hasher() -> PasswordHasher {
    PasswordHasher::with_params(1024, 1, 1).unwrap()
}

pub fn test_policy() -> SessionPolicy {
    SessionPolicy::from_config(&create_test_config()).unwrap()
}

/// 内存用户存储
#[derive(Default)]
pub struct InMemoryUserStore {
    users: Mutex<Vec<User>>,
    ping_fails: bool,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unreachable() -> Self {
        Self {
            users: Mutex::new(Vec::new()),
            ping_fails: true,
        }
    }

    /// 直接写入一个带明文密码的用户，返回其 ID
    pub fn seed(&self, hasher: &PasswordHasher, email: &str, password: &str, role: &str) -> i64 {
        let mut users = self.users.lock().unwrap();
        let id = users.len() as i64 + 1;
        let now = Utc::now();
        users.push(User {
            id,
            first_name: "Test".to_string(),
            last_name: format!("User{}", id),
            email: email.to_string(),
            password_hash: hasher.hash(password).unwrap(),
            role: role.to_string(),
            img_src: None,
            created_at: now,
            updated_at: now,
        });
        id
    }

    pub fn remove(&self, id: i64) {
        self.users.lock().unwrap().retain(|u| u.id != id);
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_id(&self, id: PrincipalId) -> Result<Option<User>, AppError> {
        let users = self.users.lock().unwrap();
        Ok(users.iter().find(|u| u.id == id.value()).cloned())
    }

    async fn create(&self, user: NewUser) -> Result<User, AppError> {
        let mut users = self.users.lock().unwrap();
        if users.iter().any(|u| u.email == user.email) {
            return Err(AppError::Conflict("email already registered".to_string()));
        }

        let now = Utc::now();
        let created = User {
            id: users.iter().map(|u| u.id).max().unwrap_or(0) + 1,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            img_src: None,
            created_at: now,
            updated_at: now,
        };
        users.push(created.clone());
        Ok(created)
    }

    async fn update(
        &self,
        id: PrincipalId,
        req: &UpdateUserRequest,
    ) -> Result<Option<User>, AppError> {
        let mut users = self.users.lock().unwrap();
        let Some(user) = users.iter_mut().find(|u| u.id == id.value()) else {
            return Ok(None);
        };

        if let Some(first_name) = &req.first_name {
            user.first_name = first_name.clone();
        }
        if let Some(last_name) = &req.last_name {
            user.last_name = last_name.clone();
        }
        if let Some(email) = &req.email {
            user.email = email.clone();
        }
        if let Some(img_src) = &req.img_src {
            user.img_src = Some(img_src.clone());
        }
        user.updated_at = Utc::now();

        Ok(Some(user.clone()))
    }

    async fn list(&self) -> Result<Vec<User>, AppError> {
        Ok(self.users.lock().unwrap().clone())
    }

    async fn list_publishers(&self) -> Result<Vec<PublisherWithCount>, AppError> {
        let users = self.users.lock().unwrap();
        Ok(users
            .iter()
            .map(|u| PublisherWithCount {
                id: u.id,
                first_name: u.first_name.clone(),
                last_name: u.last_name.clone(),
                email: u.email.clone(),
                img_src: u.img_src.clone(),
                created_at: u.created_at,
                book_count: 0,
            })
            .collect())
    }

    async fn ping(&self) -> Result<(), AppError> {
        if self.ping_fails {
            return Err(AppError::internal("connection refused"));
        }
        Ok(())
    }
}

/// 内存图书存储，记录被调用的次数
#[derive(Default)]
pub struct InMemoryBookStore {
    books: Mutex<Vec<Book>>,
    calls: AtomicUsize,
}

impl InMemoryBookStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn touch(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl BookStore for InMemoryBookStore {
    async fn create(&self, req: &CreateBookRequest, publisher_id: i64) -> Result<Book, AppError> {
        self.touch();
        let mut books = self.books.lock().unwrap();
        let book = Book {
            id: books.len() as i64 + 1,
            title: req.title.clone(),
            published_year: req.published_year,
            quantity: req.quantity,
            genre: req.genre.clone(),
            img_url: req.img_url.clone(),
            publisher_id: Some(publisher_id),
        };
        books.push(book.clone());
        Ok(book)
    }

    async fn list(&self) -> Result<Vec<Book>, AppError> {
        self.touch();
        Ok(self.books.lock().unwrap().clone())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Book>, AppError> {
        self.touch();
        Ok(self.books.lock().unwrap().iter().find(|b| b.id == id).cloned())
    }

    async fn checkin(&self, id: i64) -> Result<Book, AppError> {
        self.touch();
        let mut books = self.books.lock().unwrap();
        let book = books
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or_else(|| AppError::not_found("book"))?;
        book.quantity += 1;
        Ok(book.clone())
    }

    async fn checkout(&self, id: i64) -> Result<Book, AppError> {
        self.touch();
        let mut books = self.books.lock().unwrap();
        let book = books
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or_else(|| AppError::not_found("book"))?;
        if book.quantity == 0 {
            return Err(AppError::Conflict("book not available for checkout".to_string()));
        }
        book.quantity -= 1;
        Ok(book.clone())
    }
}

/// 测试应用及其可观察的存储
pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub users: Arc<InMemoryUserStore>,
    pub books: Arc<InMemoryBookStore>,
    pub hasher: PasswordHasher,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_users(InMemoryUserStore::new())
    }

    pub fn with_users(users: InMemoryUserStore) -> Self {
        let config = create_test_config();
        let policy = SessionPolicy::from_config(&config).unwrap();
        let token_validator = Arc::new(TokenValidator::new(&policy));
        let hasher = test_hasher();

        let users = Arc::new(users);
        let books = Arc::new(InMemoryBookStore::new());

        let auth_service = Arc::new(AuthService::new(
            users.clone(),
            Arc::new(TokenIssuer::new(&policy)),
            token_validator.clone(),
            Arc::new(InMemoryRefreshStore::new()),
            hasher.clone(),
            &config.security,
        )
        .unwrap());

        let state = Arc::new(AppState {
            config,
            users: users.clone(),
            books: books.clone(),
            auth_service,
            token_validator,
        });

        Self {
            router: lending_catalog::routes::create_router(state.clone()),
            state,
            users,
            books,
            hasher,
        }
    }

    /// 写入 id 为 1、密码为 "secret" 的用户
    pub fn with_default_user() -> Self {
        let app = Self::new();
        app.users.seed(&app.hasher, "reader@example.com", "secret", "member");
        app
    }

    pub async fn send(&self, request: Request<Body>) -> (axum::http::StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> (axum::http::StatusCode, Value) {
        self.send(json_request("POST", uri, body, None)).await
    }

    /// 登录并返回 (access_token, refresh_token)
    pub async fn login(&self, id: i64, pass: &str) -> (String, String) {
        let (_, json) = self
            .post_json("/login", serde_json::json!({"id": id, "pass": pass}))
            .await;
        (
            json["token"].as_str().unwrap().to_string(),
            json["refresh_token"].as_str().unwrap().to_string(),
        )
    }
}

pub fn json_request(method: &str, uri: &str, body: Value, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn get_request(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}
