// DropZone 文件上传核心库
//
// 校验、缩略图、模拟上传与上传队列状态机

// 配置管理模块
pub mod config;

// 日志模块
pub mod logging;

// 上传模块
pub mod uploader;

// 剪贴板导出
pub mod clipboard;

// 公共模块（文件大小格式化、文件类别）
pub mod common;

// 导出常用类型
pub use clipboard::{Clipboard, CopyMethod};
pub use config::{AppConfig, ConfigLoadError, ConfigService, UploadConfig, UploadConfigPatch};
pub use uploader::{
    LoadState, QueuedFile, SelectedFile, UploadEvent, UploadQueueManager, UploadRecord,
    UploadRecordStore, UploadSession, UploadSimulator, UploadStatus,
};
