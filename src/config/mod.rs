// 配置管理模块

pub mod service;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;

pub use service::{ConfigService, ConfigSource, TomlConfigSource};

/// 默认最大同时上传数（配置缺省或为 0 时使用）
pub const DEFAULT_MAX_CONCURRENT_UPLOADS: usize = 3;

/// 应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// 上传策略
    #[serde(default)]
    pub upload: UploadConfig,
    /// 模拟传输参数
    #[serde(default)]
    pub simulator: SimulatorConfig,
    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// 配置加载错误
///
/// 加载失败时整个上传视图处于阻塞错误状态，直到重试成功
#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("读取配置失败: {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("解析配置失败: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("配置源不可用: {0}")]
    Unavailable(String),
}

/// 上传配置
///
/// 对外字段使用 camelCase：`maxFileSize` / `allowedTypes` / `maxConcurrentUploads`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadConfig {
    /// 单个文件最大字节数
    pub max_file_size: u64,
    /// 允许的类型：MIME 片段（如 "image/"）或扩展名（如 ".txt"），为空表示不限制
    #[serde(default)]
    pub allowed_types: Vec<String>,
    /// 最大同时上传文件数
    #[serde(default = "default_max_concurrent_uploads")]
    pub max_concurrent_uploads: usize,
}

fn default_max_concurrent_uploads() -> usize {
    DEFAULT_MAX_CONCURRENT_UPLOADS
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size: 10 * 1024 * 1024, // 10MB
            allowed_types: vec![
                "image/".to_string(),
                "application/pdf".to_string(),
                ".txt".to_string(),
                ".doc".to_string(),
                ".docx".to_string(),
                ".zip".to_string(),
            ],
            max_concurrent_uploads: DEFAULT_MAX_CONCURRENT_UPLOADS,
        }
    }
}

impl UploadConfig {
    /// 实际生效的并发上限，0 视为未设置
    pub fn concurrency_limit(&self) -> usize {
        if self.max_concurrent_uploads == 0 {
            DEFAULT_MAX_CONCURRENT_UPLOADS
        } else {
            self.max_concurrent_uploads
        }
    }

    /// 按字段合并更新，返回新的配置快照
    pub fn merged(&self, patch: &UploadConfigPatch) -> Self {
        let mut next = self.clone();
        if let Some(max_file_size) = patch.max_file_size {
            next.max_file_size = max_file_size;
        }
        if let Some(ref allowed_types) = patch.allowed_types {
            next.allowed_types = allowed_types.clone();
        }
        if let Some(max_concurrent_uploads) = patch.max_concurrent_uploads {
            next.max_concurrent_uploads = max_concurrent_uploads;
        }
        next
    }
}

/// 上传配置的局部更新
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadConfigPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_file_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_types: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrent_uploads: Option<usize>,
}

/// 模拟传输配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatorConfig {
    /// 每个进度间隔的最小值（毫秒，含）
    #[serde(default = "default_tick_min_ms")]
    pub tick_min_ms: u64,
    /// 每个进度间隔的最大值（毫秒，不含）
    #[serde(default = "default_tick_max_ms")]
    pub tick_max_ms: u64,
    /// 单次进度最大增量（不含）
    #[serde(default = "default_max_increment")]
    pub max_increment: f64,
    /// 进度到达 100 后的收尾延迟（毫秒）
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    /// 模拟失败概率 [0, 1]，默认 0 即永不失败
    #[serde(default)]
    pub failure_rate: f64,
    /// 目标地址前缀，文件名直接拼接在后面
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// 随机数种子（测试用，None 表示使用系统熵）
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_tick_min_ms() -> u64 {
    100
}

fn default_tick_max_ms() -> u64 {
    300
}

fn default_max_increment() -> f64 {
    20.0
}

fn default_settle_delay_ms() -> u64 {
    200
}

fn default_base_url() -> String {
    "https://example.com/files/".to_string()
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            tick_min_ms: default_tick_min_ms(),
            tick_max_ms: default_tick_max_ms(),
            max_increment: default_max_increment(),
            settle_delay_ms: default_settle_delay_ms(),
            failure_rate: 0.0,
            base_url: default_base_url(),
            seed: None,
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// 是否启用日志文件持久化
    #[serde(default = "default_log_enabled")]
    pub enabled: bool,
    /// 日志文件保存目录
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// 日志保留天数（默认 7 天）
    #[serde(default = "default_log_retention_days")]
    pub retention_days: u32,
    /// 日志级别（默认 info）
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_enabled() -> bool {
    false
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_log_retention_days() -> u32 {
    7
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: default_log_enabled(),
            log_dir: default_log_dir(),
            retention_days: default_log_retention_days(),
            level: default_log_level(),
        }
    }
}

impl AppConfig {
    /// 从文件加载配置
    pub async fn load_from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .context("Failed to read config file")?;

        let config: AppConfig = toml::from_str(&content).context("Failed to parse config file")?;

        Ok(config)
    }

    /// 保存配置到文件
    pub async fn save_to_file(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        // 确保父目录存在
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .context("Failed to create config directory")?;
            }
        }

        fs::write(path, content)
            .await
            .context("Failed to write config file")?;

        tracing::info!("✓ 配置已保存: {}", path);

        Ok(())
    }

    /// 加载或创建默认配置
    pub async fn load_or_default(path: &str) -> Self {
        match Self::load_from_file(path).await {
            Ok(config) => {
                tracing::info!("配置文件加载成功: {}", path);
                config
            }
            Err(e) => {
                tracing::warn!("配置文件加载失败，使用默认配置: {:#}", e);
                let default_config = Self::default();

                // 首次启动：写出默认配置，便于用户修改
                if let Err(e) = default_config.save_to_file(path).await {
                    tracing::error!("保存默认配置失败: {:#}", e);
                }

                default_config
            }
        }
    }
}
