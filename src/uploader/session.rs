// 上传会话
//
// 启动时拉取配置并创建队列管理器；配置加载失败时整个会话处于错误状态，
// 通过 retry() 直接重新加载

use crate::clipboard::Clipboard;
use crate::config::{ConfigLoadError, ConfigSource, SimulatorConfig};
use crate::uploader::{UploadQueueManager, UploadRecordStore, UploadSimulator};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{error, info};

/// 会话加载状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    /// 加载中（包括尚未开始加载）
    Loading,
    /// 已就绪，可以入队上传
    Ready,
    /// 加载失败，携带错误信息
    Failed(String),
}

/// 上传会话
pub struct UploadSession {
    source: Arc<dyn ConfigSource>,
    store: Arc<UploadRecordStore>,
    simulator: Arc<UploadSimulator>,
    state: RwLock<LoadState>,
    manager: RwLock<Option<Arc<UploadQueueManager>>>,
    clipboard_factory: fn() -> Clipboard,
}

impl UploadSession {
    pub fn new(
        source: Arc<dyn ConfigSource>,
        store: Arc<UploadRecordStore>,
        simulator_config: SimulatorConfig,
    ) -> Self {
        Self {
            source,
            store,
            simulator: Arc::new(UploadSimulator::new(simulator_config)),
            state: RwLock::new(LoadState::Loading),
            manager: RwLock::new(None),
            clipboard_factory: Clipboard::system,
        }
    }

    /// 指定管理器使用的剪贴板
    pub fn with_clipboard_factory(mut self, factory: fn() -> Clipboard) -> Self {
        self.clipboard_factory = factory;
        self
    }

    /// 当前加载状态
    pub fn state(&self) -> LoadState {
        self.state.read().clone()
    }

    /// 队列管理器，未就绪时为 None
    pub fn manager(&self) -> Option<Arc<UploadQueueManager>> {
        self.manager.read().clone()
    }

    /// 加载配置并创建管理器
    ///
    /// 已就绪时直接返回现有管理器
    pub async fn load(&self) -> Result<Arc<UploadQueueManager>, ConfigLoadError> {
        if let Some(manager) = self.manager() {
            return Ok(manager);
        }

        *self.state.write() = LoadState::Loading;

        match self.source.fetch().await {
            Ok(config) => {
                let manager = Arc::new(
                    UploadQueueManager::new(config, self.store.clone(), self.simulator.clone())
                        .with_clipboard((self.clipboard_factory)()),
                );
                *self.manager.write() = Some(manager.clone());
                *self.state.write() = LoadState::Ready;
                info!("上传会话已就绪");
                Ok(manager)
            }
            Err(e) => {
                error!("加载上传配置失败: {}", e);
                *self.state.write() = LoadState::Failed(e.to_string());
                Err(e)
            }
        }
    }

    /// 重试加载
    pub async fn retry(&self) -> Result<Arc<UploadQueueManager>, ConfigLoadError> {
        info!("重新加载上传会话");
        self.load().await
    }

    /// 从配置源重新拉取配置并应用到已就绪的管理器
    pub async fn refresh_config(&self) -> Result<(), ConfigLoadError> {
        let config = self.source.fetch().await?;
        if let Some(manager) = self.manager() {
            manager.set_config(config);
        }
        Ok(())
    }
}
