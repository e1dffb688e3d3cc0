//! 图书借阅目录服务主入口

use lending_catalog::{
    auth::{InMemoryRefreshStore, PasswordHasher, SessionPolicy, TokenIssuer, TokenValidator},
    config::AppConfig,
    db,
    handlers::health,
    middleware::AppState,
    repository::{BookRepository, UserRepository},
    routes,
    services::AuthService,
    telemetry,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;

/// 过期刷新令牌的清理间隔
const REFRESH_PURGE_INTERVAL: Duration = Duration::from_secs(600);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ===== CLI 参数处理 =====
    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 {
        match args[1].as_str() {
            "--version" => {
                println!("lending-catalog {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" => {
                print_help();
                return Ok(());
            }
            _ => {
                eprintln!("未知参数: {}", args[1]);
                print_help();
                std::process::exit(1);
            }
        }
    }

    // 加载 .env 文件（开发环境），生产环境直接设置环境变量
    if let Ok(env) = std::env::var("CATALOG_ENV") {
        dotenv::from_filename(format!(".env.{}", env)).ok();
    } else {
        dotenv::from_filename(".env.local").ok();
        dotenv::dotenv().ok();
    }

    health::set_start_time();

    // 1. 加载配置
    let config = AppConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        anyhow::anyhow!("Failed to load configuration: {}", e)
    })?;

    // 2. 初始化日志
    telemetry::init_telemetry(&config);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Lending catalog starting...");

    // 3. 数据库连接池 + 迁移
    let db_pool = db::create_pool(&config.database).await?;
    db::run_migrations(&db_pool).await?;

    tracing::info!("Database initialized");

    // 4. 认证核心：启动时一次性构建，之后只读共享
    let policy = SessionPolicy::from_config(&config)?;
    let token_issuer = Arc::new(TokenIssuer::new(&policy));
    let token_validator = Arc::new(TokenValidator::new(&policy));

    let users = Arc::new(UserRepository::new(db_pool.clone()));
    let books = Arc::new(BookRepository::new(db_pool.clone()));

    let auth_service = Arc::new(AuthService::new(
        users.clone(),
        token_issuer,
        token_validator.clone(),
        Arc::new(InMemoryRefreshStore::new()),
        PasswordHasher::new(),
        &config.security,
    )?);

    spawn_refresh_purge(auth_service.clone());

    let app_state = Arc::new(AppState {
        config: config.clone(),
        users,
        books,
        auth_service,
        token_validator,
    });

    // 5. 构建路由
    let app = routes::create_router(app_state);

    // 6. 启动服务器
    let addr = &config.server.addr;
    let listener = TcpListener::bind(addr).await?;

    tracing::info!(addr = %addr, "Server listening");

    // 7. 优雅关闭
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(config.server.graceful_shutdown_timeout_secs))
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// 定期清理过期的刷新令牌记录
fn spawn_refresh_purge(auth_service: Arc<AuthService>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(REFRESH_PURGE_INTERVAL);
        loop {
            interval.tick().await;
            let purged = auth_service.purge_expired_refresh_tokens().await;
            if purged > 0 {
                tracing::debug!(purged, "Purged expired refresh tokens");
            }
        }
    });
}

/// 优雅关闭信号处理
///
/// 收到信号后开始关闭，超过 `timeout_secs` 仍未结束则强制退出。
async fn shutdown_signal(timeout_secs: u64) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Ctrl+C received, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Terminate signal received, starting graceful shutdown");
        },
    }

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(timeout_secs)).await;
        tracing::warn!("Graceful shutdown timeout reached, forcing exit");
        std::process::exit(1);
    });
}

/// 打印帮助信息
fn print_help() {
    println!("lending-catalog {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("用法: lending-catalog [选项]");
    println!();
    println!("选项:");
    println!("  --version     打印版本信息并退出");
    println!("  --help        打印此帮助信息并退出");
    println!();
    println!("环境变量:");
    println!("  所有配置通过 CATALOG_ 前缀的环境变量完成");
    println!("  例如 CATALOG_SECURITY__JWT_SECRET、CATALOG_DATABASE__URL");
}
