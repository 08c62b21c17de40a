//! 启动时拉起同步服务，失败时走恢复流程

use syncservice_sdk::{PresetPrompter, RecoveryOutcome, StartConfirmation, SyncSupervisor};
use tracing::{info, warn};

use crate::config::GatewayConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootOutcome {
    /// 服务已启动（或至少没有在窗口期内崩溃）
    Running(StartConfirmation),
    /// 服务未运行，网关继续提供控制面
    ContinueWithoutService,
    /// 网关应当退出
    Quit,
}

pub async fn boot_service(supervisor: &SyncSupervisor, config: &GatewayConfig) -> BootOutcome {
    info!(home_dir = %config.home_dir.display(), "Starting sync service");

    let error = match supervisor.start_with_soft_timeout(&config.home_dir).await {
        Ok(confirmation) => {
            info!(?confirmation, "Sync service launched");
            return BootOutcome::Running(confirmation);
        }
        Err(e) => e,
    };

    warn!("Sync service failed to start: {}", error);
    let prompter = PresetPrompter {
        failure: config.on_start_failure,
        conflict: config.conflict_choice(),
    };

    match config.recovery_flow().run(supervisor, &prompter, &error).await {
        RecoveryOutcome::Recovered(confirmation) => BootOutcome::Running(confirmation),
        RecoveryOutcome::ContinueWithoutService => BootOutcome::ContinueWithoutService,
        RecoveryOutcome::Quit => BootOutcome::Quit,
    }
}
