//! 数据库管理网关服务入口

use admin_gateway::{create_router, AppState, SERVICE_NAME};
use anyhow::Context;
use common::config::{load_dotenv, AppConfig, LogFormat};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env 优先于一切加载
    load_dotenv();

    // 加载配置
    let config = AppConfig::load_with_service(SERVICE_NAME);

    // 初始化日志追踪
    init_tracing(config.log_format);

    // 创建应用状态
    let state = AppState::new(config.clone());
    let registry = state.registry.clone();

    // 创建路由
    let app = create_router(state);

    // 启动服务
    let addr = config.bind_addr();
    info!(service = SERVICE_NAME, address = %addr, "启动服务");

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("绑定地址失败: {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("服务运行失败")?;

    // 关闭前释放当前连接
    registry.close().await;
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry.with(fmt::layer()).init(),
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
