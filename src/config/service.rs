// 上传配置服务
//
// - ConfigService：内存中的配置存储，支持按字段合并更新
// - ConfigSource：上传会话启动时拉取配置的来源

use super::{AppConfig, ConfigLoadError, UploadConfig, UploadConfigPatch};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::path::PathBuf;
use tracing::info;

/// 配置来源
#[async_trait]
pub trait ConfigSource: Send + Sync {
    /// 拉取一次上传配置快照
    async fn fetch(&self) -> Result<UploadConfig, ConfigLoadError>;
}

/// 内存配置服务
///
/// 读取返回快照，修改只能通过 `update_config` 合并
#[derive(Debug, Default)]
pub struct ConfigService {
    config: RwLock<UploadConfig>,
}

impl ConfigService {
    pub fn new(config: UploadConfig) -> Self {
        Self {
            config: RwLock::new(config),
        }
    }

    /// 获取当前配置快照
    pub fn get_config(&self) -> UploadConfig {
        self.config.read().clone()
    }

    /// 合并更新配置，返回更新后的快照
    pub fn update_config(&self, patch: &UploadConfigPatch) -> UploadConfig {
        let mut config = self.config.write();
        *config = config.merged(patch);
        info!(
            "上传配置已更新: max_file_size={}, allowed_types={:?}, max_concurrent={}",
            config.max_file_size, config.allowed_types, config.max_concurrent_uploads
        );
        config.clone()
    }
}

#[async_trait]
impl ConfigSource for ConfigService {
    async fn fetch(&self) -> Result<UploadConfig, ConfigLoadError> {
        Ok(self.get_config())
    }
}

/// 从 TOML 配置文件读取 `[upload]` 段
#[derive(Debug, Clone)]
pub struct TomlConfigSource {
    path: PathBuf,
}

impl TomlConfigSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ConfigSource for TomlConfigSource {
    async fn fetch(&self) -> Result<UploadConfig, ConfigLoadError> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| ConfigLoadError::Read {
                path: self.path.clone(),
                source,
            })?;

        let config: AppConfig = toml::from_str(&content)?;
        Ok(config.upload)
    }
}
