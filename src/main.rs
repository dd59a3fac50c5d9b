use std::sync::Arc;
use axum::http::{HeaderValue, Method};
use tower_http::{
    cors::{Any, CorsLayer},
    compression::CompressionLayer,
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tracing::{error, info, warn};

use smart_retail_catalog::{
    config::Config,
    routes,
    services::{mirror::MirrorStatus, DocumentStore, MemoryStore, SurrealStore},
    state::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载配置
    dotenv::dotenv().ok();
    let config = Config::from_env()?;

    // 初始化日志（生产环境输出 JSON）
    let json_logs = config.is_production();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.clone()))
        .with(json_logs.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json_logs).then(tracing_subscriber::fmt::layer))
        .init();

    info!("Starting Smart Retail Catalog service...");

    // 初始化文档存储
    let store: Arc<dyn DocumentStore> = if config.uses_surreal() {
        match SurrealStore::connect(&config).await {
            Ok(store) => {
                info!("Database connection established successfully");
                Arc::new(store)
            }
            Err(e) => {
                error!("Failed to create database connection: {}", e);
                return Err(anyhow::anyhow!("Database initialization failed"));
            }
        }
    } else {
        warn!("Using the in-memory store; data is lost on restart");
        Arc::new(MemoryStore::new())
    };

    // 初始化所有服务并激活实时镜像
    let app_state = Arc::new(AppState::build(config.clone(), store).await?);

    for (name, status) in [
        ("products", app_state.product_service.mirror().status()),
        ("notifications", app_state.notification_service.mirror().status()),
    ] {
        if let MirrorStatus::Failed { message, permission_denied } = status {
            error!(
                "Live mirror for '{}' failed (permission denied: {}): {}",
                name, permission_denied, message
            );
        }
    }

    // 按配置创建管理员账户
    match (&config.admin_email, &config.admin_password) {
        (Some(email), Some(password)) => {
            app_state.auth_service.bootstrap_admin(email, password).await?;
        }
        (Some(_), None) | (None, Some(_)) => {
            warn!("ADMIN_EMAIL and ADMIN_PASSWORD must both be set to provision an admin account");
        }
        (None, None) => {}
    }

    // 配置 CORS
    let origins = config
        .cors_allowed_origins
        .split(',')
        .filter_map(|origin| match origin.trim().parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Ignoring invalid CORS origin '{}': {}", origin, e);
                None
            }
        })
        .collect::<Vec<_>>();
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any)
        .allow_origin(origins);

    let app = routes::app(app_state)
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http());

    // 启动主服务器
    let addr = format!("{}:{}", config.server_host, config.server_port);
    info!("Starting server on http://{}", addr);

    axum::Server::bind(&addr.parse()?)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}
