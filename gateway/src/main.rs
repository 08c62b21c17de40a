use syncservice_gateway::{
    AppState, BootOutcome, ConnectionManager, GatewayConfig, Result, boot_service, create_app,
    shutdown_signal, spawn_event_relay,
};
use syncservice_sdk::SyncSupervisor;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "syncservice_gateway=debug,syncservice_sdk=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = GatewayConfig::from_env()?;
    let supervisor = SyncSupervisor::new(config.supervisor_options())?;
    let manager = ConnectionManager::new();
    let cancel = CancellationToken::new();

    // 先挂上事件转发，启动阶段的输出也能进日志
    let relay = spawn_event_relay(supervisor.clone(), manager.clone(), cancel.clone());

    match boot_service(&supervisor, &config).await {
        BootOutcome::Quit => {
            info!("Sync service could not be started, exiting");
            cancel.cancel();
            supervisor.shutdown().await?;
            let _ = relay.await;
            return Ok(());
        }
        BootOutcome::ContinueWithoutService => {
            warn!("Continuing without the sync service");
        }
        BootOutcome::Running(confirmation) => {
            info!(?confirmation, "Sync service boot finished");
        }
    }

    let app = create_app(AppState {
        connection_manager: manager,
        supervisor: supervisor.clone(),
    });

    let listener = tokio::net::TcpListener::bind(&config.addr).await?;
    info!("Gateway listening on {}", config.addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel.clone()))
        .await?;

    // 退出前停止同步服务
    cancel.cancel();
    supervisor.shutdown().await?;
    let _ = relay.await;
    info!("Gateway stopped");
    Ok(())
}
