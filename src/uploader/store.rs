// 已完成上传记录存储
//
// 内存中的有界集合：新记录插入头部（最新在前），超过上限时淘汰最旧的记录。
// 记录 ID 单调递增，删除或清空后也不会复用

use crate::uploader::UploadStatus;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// 记录数量上限
pub const MAX_UPLOAD_RECORDS: usize = 50;

/// 已完成的上传记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRecord {
    #[serde(rename = "Id")]
    pub id: u64,
    pub name: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub mime_type: String,
    pub status: UploadStatus,
    pub progress: u8,
    pub uploaded_url: String,
    #[serde(default)]
    pub thumbnail: Option<String>,
    /// 完成时间（Unix 毫秒）
    pub uploaded_at: i64,
    #[serde(default)]
    pub error: Option<String>,
}

/// 新记录所需的文件信息
#[derive(Debug, Clone)]
pub struct CompletedUpload {
    pub name: String,
    pub size: u64,
    pub mime_type: String,
    pub uploaded_url: String,
    pub thumbnail: Option<String>,
}

/// 存储错误
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("读取种子数据失败: {0}")]
    Io(#[from] std::io::Error),

    #[error("解析种子数据失败: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Default)]
struct StoreInner {
    /// 最新在前
    records: Vec<UploadRecord>,
    /// 已分配过的最大 ID
    high_water: u64,
}

/// 上传记录存储
#[derive(Debug, Default)]
pub struct UploadRecordStore {
    inner: RwLock<StoreInner>,
}

impl UploadRecordStore {
    /// 创建空存储
    pub fn new() -> Self {
        Self::default()
    }

    /// 使用种子数据创建（按给定顺序，视为最新在前）
    pub fn with_seed(mut records: Vec<UploadRecord>) -> Self {
        records.truncate(MAX_UPLOAD_RECORDS);
        let high_water = records.iter().map(|r| r.id).max().unwrap_or(0);
        Self {
            inner: RwLock::new(StoreInner {
                records,
                high_water,
            }),
        }
    }

    /// 从 JSON 数组文件加载种子数据
    pub async fn load_seed_file(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let content = tokio::fs::read_to_string(path.as_ref()).await?;
        let records: Vec<UploadRecord> = serde_json::from_str(&content)?;
        info!(
            "已加载上传记录种子数据: {:?}, {} 条",
            path.as_ref(),
            records.len()
        );
        Ok(Self::with_seed(records))
    }

    /// 全部记录（最新在前）
    pub fn list(&self) -> Vec<UploadRecord> {
        self.inner.read().records.clone()
    }

    pub fn get(&self, id: u64) -> Option<UploadRecord> {
        self.inner.read().records.iter().find(|r| r.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().records.is_empty()
    }

    /// 写入一条完成记录，返回新记录
    ///
    /// ID = max(现有 ID, 历史最大 ID, 0) + 1
    pub fn add_completed(&self, upload: CompletedUpload) -> UploadRecord {
        let mut inner = self.inner.write();

        let current_max = inner.records.iter().map(|r| r.id).max().unwrap_or(0);
        let id = current_max.max(inner.high_water) + 1;
        inner.high_water = id;

        let record = UploadRecord {
            id,
            name: upload.name,
            size: upload.size,
            mime_type: upload.mime_type,
            status: UploadStatus::Completed,
            progress: 100,
            uploaded_url: upload.uploaded_url,
            thumbnail: upload.thumbnail,
            uploaded_at: chrono::Utc::now().timestamp_millis(),
            error: None,
        };

        inner.records.insert(0, record.clone());
        if inner.records.len() > MAX_UPLOAD_RECORDS {
            let evicted = inner.records.len() - MAX_UPLOAD_RECORDS;
            inner.records.truncate(MAX_UPLOAD_RECORDS);
            debug!("上传记录超过上限，淘汰最旧的 {} 条", evicted);
        }

        record
    }

    /// 删除记录，不存在时返回 None
    pub fn remove(&self, id: u64) -> Option<UploadRecord> {
        let mut inner = self.inner.write();
        let index = inner.records.iter().position(|r| r.id == id)?;
        Some(inner.records.remove(index))
    }

    /// 清空全部记录（ID 计数不回退）
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.records.clear();
        info!("已清空全部上传记录");
    }
}
