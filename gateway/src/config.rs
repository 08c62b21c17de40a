//! 网关配置，从环境变量读取

use std::env;
use std::path::PathBuf;
use syncservice_sdk::{ConflictChoice, FailureChoice, RecoveryFlow, SupervisorOptions};

use crate::error::{GatewayError, Result};

pub const DEFAULT_ADDR: &str = "127.0.0.1:3000";

/// 默认的服务目录名，位于用户主目录下
const DEFAULT_HOME_DIR_NAME: &str = ".syncservice";

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// 监听地址 (`SYNC_GATEWAY_ADDR`)
    pub addr: String,
    /// 同步服务的 home 目录 (`SYNC_HOME_DIR`)
    pub home_dir: PathBuf,
    /// 同步服务可执行文件 (`SYNC_BINARY`)
    pub binary: Option<PathBuf>,
    /// REST 管理端点 (`SYNC_ENDPOINT`)
    pub endpoint: Option<String>,
    /// 日志文件 (`SYNC_LOG_FILE`)
    pub log_file: Option<PathBuf>,
    /// 启动失败时的选择 (`SYNC_ON_START_FAILURE`: ignore | exit)
    pub on_start_failure: FailureChoice,
    /// 退出前是否停止冲突的实例 (`SYNC_STOP_CONFLICTING`)
    pub stop_conflicting: bool,
    /// 停止冲突实例后是否重试一次 (`SYNC_RETRY_AFTER_STOP`)
    pub retry_after_stop: bool,
}

impl GatewayConfig {
    /// 从进程环境变量读取配置
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// 从任意键值来源读取配置
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let home_dir = match lookup("SYNC_HOME_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => lookup("HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("."))
                .join(DEFAULT_HOME_DIR_NAME)
                .join("syncthing"),
        };

        let on_start_failure = match lookup("SYNC_ON_START_FAILURE").as_deref() {
            None => FailureChoice::Ignore,
            Some(value) => parse_failure_choice(value)?,
        };

        Ok(Self {
            addr: lookup("SYNC_GATEWAY_ADDR").unwrap_or_else(|| DEFAULT_ADDR.to_string()),
            home_dir,
            binary: lookup("SYNC_BINARY").map(PathBuf::from),
            endpoint: lookup("SYNC_ENDPOINT"),
            log_file: lookup("SYNC_LOG_FILE").map(PathBuf::from),
            on_start_failure,
            stop_conflicting: parse_flag("SYNC_STOP_CONFLICTING", lookup("SYNC_STOP_CONFLICTING"))?,
            retry_after_stop: parse_flag("SYNC_RETRY_AFTER_STOP", lookup("SYNC_RETRY_AFTER_STOP"))?,
        })
    }

    /// 构造 supervisor 选项
    pub fn supervisor_options(&self) -> SupervisorOptions {
        let mut options = SupervisorOptions::new().with_home_dir(&self.home_dir);
        if let Some(binary) = &self.binary {
            options = options.with_binary_path(binary);
        }
        if let Some(endpoint) = &self.endpoint {
            options = options.with_endpoint(endpoint);
        }
        if let Some(log_file) = &self.log_file {
            options = options.with_log_file(log_file);
        }
        options
    }

    pub fn recovery_flow(&self) -> RecoveryFlow {
        RecoveryFlow::new().with_retry_after_stop(self.retry_after_stop)
    }

    pub fn conflict_choice(&self) -> ConflictChoice {
        if self.stop_conflicting {
            ConflictChoice::StopConflicting
        } else {
            ConflictChoice::LeaveRunning
        }
    }
}

fn parse_failure_choice(value: &str) -> Result<FailureChoice> {
    match value.trim().to_ascii_lowercase().as_str() {
        "ignore" => Ok(FailureChoice::Ignore),
        "exit" => Ok(FailureChoice::Exit),
        other => Err(GatewayError::Config(format!(
            "SYNC_ON_START_FAILURE must be 'ignore' or 'exit', got '{}'",
            other
        ))),
    }
}

fn parse_flag(name: &str, value: Option<String>) -> Result<bool> {
    let Some(value) = value else {
        return Ok(false);
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(GatewayError::Config(format!(
            "{} must be a boolean, got '{}'",
            name, other
        ))),
    }
}
