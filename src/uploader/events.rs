// 上传事件
//
// 管理器在状态变化时通过 broadcast 通道发布，外层界面据此展示通知

use crate::uploader::{UploadRecord, UploadStatus};
use serde::Serialize;

/// 广播通道容量
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// 上传事件
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum UploadEvent {
    /// 文件加入队列
    Queued { count: usize },
    /// 文件未通过校验（只携带第一条原因）
    Rejected { name: String, reason: String },
    /// 状态变更
    StatusChanged {
        task_id: String,
        old_status: UploadStatus,
        new_status: UploadStatus,
    },
    /// 进度更新
    Progress { task_id: String, progress: u8 },
    /// 上传完成
    Completed { task_id: String, record: UploadRecord },
    /// 上传失败
    Failed {
        task_id: String,
        name: String,
        error: String,
    },
    /// 用户移除了队列或活跃列表中的条目
    Removed { task_id: String, name: String },
    /// 地址已复制到剪贴板
    UrlCopied { url: String },
}

impl UploadEvent {
    /// 获取任务 ID（与单个文件无关的事件返回 None）
    pub fn task_id(&self) -> Option<&str> {
        match self {
            UploadEvent::StatusChanged { task_id, .. }
            | UploadEvent::Progress { task_id, .. }
            | UploadEvent::Completed { task_id, .. }
            | UploadEvent::Failed { task_id, .. }
            | UploadEvent::Removed { task_id, .. } => Some(task_id),
            UploadEvent::Queued { .. }
            | UploadEvent::Rejected { .. }
            | UploadEvent::UrlCopied { .. } => None,
        }
    }

    /// 获取事件类型名称
    pub fn event_type_name(&self) -> &'static str {
        match self {
            UploadEvent::Queued { .. } => "queued",
            UploadEvent::Rejected { .. } => "rejected",
            UploadEvent::StatusChanged { .. } => "status_changed",
            UploadEvent::Progress { .. } => "progress",
            UploadEvent::Completed { .. } => "completed",
            UploadEvent::Failed { .. } => "failed",
            UploadEvent::Removed { .. } => "removed",
            UploadEvent::UrlCopied { .. } => "url_copied",
        }
    }
}
