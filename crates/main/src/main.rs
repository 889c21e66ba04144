//! 主应用程序入口
//!
//! 启动 Axum Web API 服务。

use std::sync::Arc;

use application::{
    ChatService, ChatServiceDependencies, RegistrationService, RegistrationServiceDependencies,
    SystemClock,
};
use config::AppConfig;
use infrastructure::{create_pg_pool, BcryptPasswordHasher, PgStorage, MIGRATOR};
use tracing_subscriber::EnvFilter;
use web_api::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // 读取环境变量配置
    let config = AppConfig::from_env()?;

    tracing::info!(
        "连接数据库: {}",
        config.database.url.split('@').last().unwrap_or("unknown")
    );
    let pool = create_pg_pool(&config.database.url, config.database.max_connections).await?;

    // 运行迁移
    MIGRATOR.run(&pool).await?;

    let storage = PgStorage::new(pool);

    // 组装应用层服务
    let password_hasher: Arc<dyn application::PasswordHasher> = Arc::new(
        BcryptPasswordHasher::new(config.security.bcrypt_work_factor),
    );
    let clock: Arc<dyn application::Clock> = Arc::new(SystemClock);

    let registration_service = RegistrationService::new(RegistrationServiceDependencies {
        guest_request_repository: storage.guest_request_repository.clone(),
        user_repository: storage.user_repository.clone(),
        password_hasher,
        clock: clock.clone(),
    });
    let chat_service = ChatService::new(ChatServiceDependencies {
        message_repository: storage.message_repository.clone(),
        user_repository: storage.user_repository.clone(),
        clock,
    });

    let state = AppState::new(Arc::new(registration_service), Arc::new(chat_service));

    // 启动 Web 服务器
    let app = router(state);
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("注册审批与聊天板服务启动在 http://{addr}");
    axum::serve(listener, app).await?;

    Ok(())
}
