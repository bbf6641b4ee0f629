// 上传队列条目定义
//
// SelectedFile 是用户选择的原始文件，QueuedFile 是通过校验后进入队列的条目

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// 上传状态
///
/// `Pending` / `Uploading` 可变；`Completed` / `Error` 为终态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    /// 等待中
    Pending,
    /// 上传中
    Uploading,
    /// 已完成
    Completed,
    /// 失败
    Error,
}

impl UploadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadStatus::Pending => "pending",
            UploadStatus::Uploading => "uploading",
            UploadStatus::Completed => "completed",
            UploadStatus::Error => "error",
        }
    }

    /// 是否为终态
    pub fn is_terminal(&self) -> bool {
        matches!(self, UploadStatus::Completed | UploadStatus::Error)
    }
}

/// 用户选择的原始文件
#[derive(Debug, Clone)]
pub struct SelectedFile {
    /// 文件名
    pub name: String,
    /// 文件大小（字节，以来源报告为准）
    pub size: u64,
    /// MIME 类型，未知时为空字符串
    pub mime_type: String,
    /// 文件内容
    pub data: Arc<Vec<u8>>,
}

impl SelectedFile {
    /// 从内存内容创建，大小取内容长度
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            size: data.len() as u64,
            mime_type: mime_type.into(),
            data: Arc::new(data),
        }
    }

    /// 只有元数据、没有内容的文件
    pub fn metadata_only(name: impl Into<String>, mime_type: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
            mime_type: mime_type.into(),
            data: Arc::new(Vec::new()),
        }
    }
}

/// 队列中的上传条目
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedFile {
    /// 会话内唯一 ID
    pub id: String,
    pub name: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub mime_type: String,
    pub status: UploadStatus,
    /// 进度 0-100
    pub progress: u8,
    pub uploaded_url: Option<String>,
    /// 缩略图 data URL
    pub thumbnail: Option<String>,
    /// 完成时间（Unix 毫秒）
    pub uploaded_at: Option<i64>,
    pub error: Option<String>,
    /// 原始文件引用
    #[serde(skip)]
    pub source: SelectedFile,
}

impl QueuedFile {
    /// 由通过校验的文件创建等待中的条目
    pub fn new(source: SelectedFile, thumbnail: Option<String>) -> Self {
        Self {
            id: generate_upload_id(),
            name: source.name.clone(),
            size: source.size,
            mime_type: source.mime_type.clone(),
            status: UploadStatus::Pending,
            progress: 0,
            uploaded_url: None,
            thumbnail,
            uploaded_at: None,
            error: None,
            source,
        }
    }

    /// 标记为上传中
    pub fn mark_uploading(&mut self) {
        self.status = UploadStatus::Uploading;
    }

    /// 更新进度，超过 100 按 100 计
    pub fn set_progress(&mut self, progress: u8) {
        self.progress = progress.min(100);
    }

    /// 标记为失败，条目保留在活跃列表中等待用户移除
    pub fn mark_failed(&mut self, error: String) {
        self.status = UploadStatus::Error;
        self.error = Some(error);
    }
}

/// 生成条目 ID：`upload_<毫秒时间戳>_<随机9位>`
fn generate_upload_id() -> String {
    let suffix: String = Uuid::new_v4().simple().to_string().chars().take(9).collect();
    format!(
        "upload_{}_{}",
        chrono::Utc::now().timestamp_millis(),
        suffix
    )
}
