//! 客户端配置和持久化
//!
//! 提供显示名称、下载目录和轮询节奏等设置的存储和读取。

use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// 默认轮询间隔 (毫秒)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 200;

/// 默认等待后台任务退出的时间 (毫秒)
pub const DEFAULT_JOIN_TIMEOUT_MS: u64 = 1000;

/// 客户端设置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// 显示名称（发送时告知接收端）
    pub display_name: String,
    /// 默认保存目录
    pub download_dir: PathBuf,
    /// 进度/状态轮询间隔
    pub poll_interval_ms: u64,
    /// 发送结束后等待进度监控退出的上限，超时则放弃
    pub monitor_join_timeout_ms: u64,
    /// 接收端停止后等待监听线程退出的上限
    pub listener_join_timeout_ms: u64,
    /// 详细日志模式
    pub verbose: bool,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            display_name: get_default_display_name(),
            download_dir: dirs::download_dir().unwrap_or_else(|| PathBuf::from(".")),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            monitor_join_timeout_ms: DEFAULT_JOIN_TIMEOUT_MS,
            listener_join_timeout_ms: DEFAULT_JOIN_TIMEOUT_MS,
            verbose: false,
        }
    }
}

impl ClientSettings {
    /// 获取配置文件路径
    pub fn config_path() -> PathBuf {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("voidwarp");
        config_dir.join("settings.toml")
    }

    /// 加载设置（如果文件不存在则使用默认值）
    pub fn load() -> Self {
        let path = Self::config_path();
        if path.exists() {
            match fs::read_to_string(&path) {
                Ok(content) => match Self::from_toml(&content) {
                    Ok(settings) => {
                        debug!("Loaded settings from {:?}", path);
                        return settings;
                    }
                    Err(e) => {
                        log::warn!("Failed to parse settings: {}, using defaults", e);
                    }
                },
                Err(e) => {
                    log::warn!("Failed to read settings file: {}, using defaults", e);
                }
            }
        }
        Self::default()
    }

    /// 保存设置
    pub fn save(&self) -> anyhow::Result<()> {
        let path = Self::config_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(&path, content)?;
        debug!("Saved settings to {:?}", path);
        Ok(())
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn poll_interval(&self) -> Duration {
        // 0 会让轮询循环空转
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn monitor_join_timeout(&self) -> Duration {
        Duration::from_millis(self.monitor_join_timeout_ms)
    }

    pub fn listener_join_timeout(&self) -> Duration {
        Duration::from_millis(self.listener_join_timeout_ms)
    }
}

/// 获取默认显示名称（主机名）
fn get_default_display_name() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "VoidWarp".to_string())
}
