// 上传队列管理器
//
// 负责驱动文件完成 pending → uploading → completed / error：
// - 入队（校验 + 缩略图）
// - 按并发上限把队首文件提升到活跃列表
// - 进度跟踪与事件发布
// - 移除与取消
//
// 三个列表（等待、活跃、已完成）由同一把锁保护，每次状态转换在锁内一次完成

use crate::clipboard::{Clipboard, CopyMethod};
use crate::config::UploadConfig;
use crate::uploader::store::MAX_UPLOAD_RECORDS;
use crate::uploader::{
    validate, CompletedUpload, QueuedFile, SelectedFile, ThumbnailGenerator, TransferError,
    UploadEvent, UploadRecord, UploadRecordStore, UploadSimulator, UploadStatus,
    EVENT_CHANNEL_CAPACITY,
};
use anyhow::Result;
use dashmap::DashMap;
use futures::StreamExt;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

/// 同时生成缩略图的文件数
const THUMBNAIL_CONCURRENCY: usize = 4;

/// 未通过校验的文件
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rejection {
    pub name: String,
    /// 第一条校验错误
    pub reason: String,
}

/// 入队结果
#[derive(Debug, Clone, Default, Serialize)]
pub struct EnqueueReport {
    /// 成功入队的条目 ID（按提交顺序）
    pub queued: Vec<String>,
    pub rejected: Vec<Rejection>,
}

/// 上传统计
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadStats {
    pub files_uploaded: usize,
    pub total_size_bytes: u64,
    /// 四舍五入到整数 MB
    pub total_size_mb: u64,
    /// 等待中 + 活跃
    pub in_queue: usize,
}

#[derive(Debug, Default)]
struct QueueState {
    /// 等待队列（FIFO）
    queued: VecDeque<QueuedFile>,
    /// 活跃列表（上传中与失败的条目）
    active: Vec<QueuedFile>,
    /// 已完成记录（最新在前）
    completed: Vec<UploadRecord>,
}

/// 后台上传任务共享的上下文
#[derive(Clone)]
struct TransferContext {
    /// 当前上传配置快照，worker 取队列时按它检查并发名额
    config: Arc<RwLock<UploadConfig>>,
    state: Arc<Mutex<QueueState>>,
    cancel_tokens: Arc<DashMap<String, CancellationToken>>,
    store: Arc<UploadRecordStore>,
    simulator: Arc<UploadSimulator>,
    event_tx: broadcast::Sender<UploadEvent>,
}

/// 上传队列管理器
pub struct UploadQueueManager {
    thumbnailer: ThumbnailGenerator,
    clipboard: Arc<Clipboard>,
    ctx: TransferContext,
    /// 跟踪所有后台上传任务
    tracker: TaskTracker,
}

impl UploadQueueManager {
    /// 创建管理器，已完成列表从存储中读取
    pub fn new(
        config: UploadConfig,
        store: Arc<UploadRecordStore>,
        simulator: Arc<UploadSimulator>,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let state = QueueState {
            completed: store.list(),
            ..QueueState::default()
        };

        info!(
            "上传队列管理器已创建: max_file_size={}, max_concurrent={}, 已有记录 {} 条",
            config.max_file_size,
            config.concurrency_limit(),
            state.completed.len()
        );

        Self {
            thumbnailer: ThumbnailGenerator::default(),
            clipboard: Arc::new(Clipboard::system()),
            ctx: TransferContext {
                config: Arc::new(RwLock::new(config)),
                state: Arc::new(Mutex::new(state)),
                cancel_tokens: Arc::new(DashMap::new()),
                store,
                simulator,
                event_tx,
            },
            tracker: TaskTracker::new(),
        }
    }

    /// 替换剪贴板实现
    pub fn with_clipboard(mut self, clipboard: Clipboard) -> Self {
        self.clipboard = Arc::new(clipboard);
        self
    }

    /// 替换缩略图生成器
    pub fn with_thumbnailer(mut self, thumbnailer: ThumbnailGenerator) -> Self {
        self.thumbnailer = thumbnailer;
        self
    }

    /// 订阅上传事件
    pub fn subscribe(&self) -> broadcast::Receiver<UploadEvent> {
        self.ctx.event_tx.subscribe()
    }

    /// 获取当前配置快照
    pub fn config(&self) -> UploadConfig {
        self.ctx.config.read().clone()
    }

    /// 替换配置（只影响之后的入队与提升，包括运行中 worker 的下一次取队列）
    pub fn set_config(&self, config: UploadConfig) {
        *self.ctx.config.write() = config;
    }

    /// 等待队列快照
    pub fn queued(&self) -> Vec<QueuedFile> {
        self.ctx.state.lock().queued.iter().cloned().collect()
    }

    /// 活跃列表快照
    pub fn active(&self) -> Vec<QueuedFile> {
        self.ctx.state.lock().active.clone()
    }

    /// 已完成记录快照（最新在前）
    pub fn completed(&self) -> Vec<UploadRecord> {
        self.ctx.state.lock().completed.clone()
    }

    /// 文件入队
    ///
    /// 逐个校验，未通过的文件只报告第一条错误并跳过；
    /// 通过的文件生成缩略图（失败视为无缩略图）后按提交顺序追加到等待队列
    pub async fn enqueue(&self, files: Vec<SelectedFile>) -> EnqueueReport {
        let config = self.config();
        let mut report = EnqueueReport::default();
        let mut accepted = Vec::with_capacity(files.len());

        for file in files {
            let errors = validate(&file, &config);
            if let Some(first) = errors.into_iter().next() {
                let reason = first.to_string();
                warn!("文件未通过校验: {}: {}", file.name, reason);
                self.ctx.publish(UploadEvent::Rejected {
                    name: file.name.clone(),
                    reason: reason.clone(),
                });
                report.rejected.push(Rejection {
                    name: file.name,
                    reason,
                });
                continue;
            }
            accepted.push(file);
        }

        let thumbnailer = self.thumbnailer;
        let prepared: Vec<QueuedFile> = futures::stream::iter(accepted)
            .map(move |file| async move {
                let thumbnail = match thumbnailer.generate(&file).await {
                    Ok(thumbnail) => thumbnail,
                    Err(e) => {
                        warn!("缩略图生成失败，按无缩略图处理: {}: {}", file.name, e);
                        None
                    }
                };
                QueuedFile::new(file, thumbnail)
            })
            .buffered(THUMBNAIL_CONCURRENCY)
            .collect()
            .await;

        if prepared.is_empty() {
            return report;
        }

        report.queued = prepared.iter().map(|f| f.id.clone()).collect();
        let count = prepared.len();
        self.ctx.state.lock().queued.extend(prepared);

        info!("{} 个文件已加入上传队列", count);
        self.ctx.publish(UploadEvent::Queued { count });

        report
    }

    /// 开始上传一批文件
    ///
    /// 从队首取出不超过剩余并发名额的文件移入活跃列表，每个文件一个后台任务；
    /// 本批完成后不会自动继续取队列
    ///
    /// # 返回
    /// 本次移入活跃列表的文件数
    pub fn start_uploads(&self) -> usize {
        self.launch(false)
    }

    /// 启动固定数量的上传 worker，持续从等待队列取文件直到队列为空
    ///
    /// # 返回
    /// 启动的 worker 数
    pub fn start_all_uploads(&self) -> usize {
        self.launch(true)
    }

    fn launch(&self, keep_pulling: bool) -> usize {
        let limit = self.ctx.config.read().concurrency_limit();

        let batch: Vec<QueuedFile> = {
            let mut state = self.ctx.state.lock();
            let mut batch = Vec::new();
            while let Some(file) = self.ctx.promote_front(&mut state) {
                batch.push(file);
            }
            batch
        };

        if batch.is_empty() {
            debug!("没有可启动的上传: 等待队列为空或并发名额已满");
            return 0;
        }

        info!(
            "开始上传 {} 个文件 (并发上限 {}, 持续取队列: {})",
            batch.len(),
            limit,
            keep_pulling
        );

        let started = batch.len();
        for file in batch {
            self.ctx.announce_started(&file);
            let ctx = self.ctx.clone();
            self.tracker.spawn(async move {
                ctx.run_worker(file, keep_pulling).await;
            });
        }

        started
    }

    /// 从等待队列移除（不存在时无操作）
    pub fn remove_queued(&self, id: &str) -> bool {
        let removed = {
            let mut state = self.ctx.state.lock();
            let index = state.queued.iter().position(|f| f.id == id);
            index.and_then(|i| state.queued.remove(i))
        };

        match removed {
            Some(file) => {
                info!("已从等待队列移除: {}", file.name);
                self.ctx.publish(UploadEvent::Removed {
                    task_id: file.id,
                    name: file.name,
                });
                true
            }
            None => false,
        }
    }

    /// 从活跃列表移除，同时取消正在进行的模拟传输（不存在时无操作）
    pub fn remove_active(&self, id: &str) -> bool {
        let removed = {
            let mut state = self.ctx.state.lock();
            let index = state.active.iter().position(|f| f.id == id);
            index.map(|i| state.active.remove(i))
        };

        if let Some((_, token)) = self.ctx.cancel_tokens.remove(id) {
            token.cancel();
        }

        match removed {
            Some(file) => {
                info!("已取消上传: {}", file.name);
                self.ctx.publish(UploadEvent::Removed {
                    task_id: file.id,
                    name: file.name,
                });
                true
            }
            None => false,
        }
    }

    /// 删除已完成记录
    pub fn remove_completed(&self, id: u64) -> Option<UploadRecord> {
        let removed = self.ctx.store.remove(id);
        self.ctx.state.lock().completed.retain(|r| r.id != id);
        removed
    }

    /// 清空已完成记录
    pub fn clear_completed(&self) {
        self.ctx.store.clear();
        self.ctx.state.lock().completed.clear();
    }

    /// 复制地址到剪贴板
    pub fn copy_url(&self, url: &str) -> Result<CopyMethod> {
        let method = self.clipboard.copy(url)?;
        self.ctx.publish(UploadEvent::UrlCopied {
            url: url.to_string(),
        });
        Ok(method)
    }

    /// 上传统计
    pub fn stats(&self) -> UploadStats {
        let state = self.ctx.state.lock();
        let total_size_bytes: u64 = state.completed.iter().map(|r| r.size).sum();
        UploadStats {
            files_uploaded: state.completed.len(),
            total_size_bytes,
            total_size_mb: (total_size_bytes as f64 / (1024.0 * 1024.0)).round() as u64,
            in_queue: state.queued.len() + state.active.len(),
        }
    }

    /// 等待所有后台上传任务结束
    pub async fn wait_idle(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    /// 取消全部进行中的传输
    pub fn shutdown(&self) {
        for entry in self.ctx.cancel_tokens.iter() {
            entry.value().cancel();
        }
        self.ctx.cancel_tokens.clear();
    }
}

impl std::fmt::Debug for UploadQueueManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.ctx.state.lock();
        f.debug_struct("UploadQueueManager")
            .field("config", &*self.ctx.config.read())
            .field("queued", &state.queued.len())
            .field("active", &state.active.len())
            .field("completed", &state.completed.len())
            .finish_non_exhaustive()
    }
}

impl Drop for UploadQueueManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl TransferContext {
    fn publish(&self, event: UploadEvent) {
        // 没有订阅者时发送失败，忽略
        let _ = self.event_tx.send(event);
    }

    /// 把队首文件移入活跃列表并标记为上传中（调用方持有锁）
    ///
    /// 上传中的条目数已达到并发上限时返回 None；名额检查与提升在同一把锁内完成
    fn promote_front(&self, state: &mut QueueState) -> Option<QueuedFile> {
        let limit = self.config.read().concurrency_limit();
        let in_flight = state
            .active
            .iter()
            .filter(|f| f.status == UploadStatus::Uploading)
            .count();
        if in_flight >= limit {
            return None;
        }

        let mut file = state.queued.pop_front()?;
        file.mark_uploading();
        self.cancel_tokens
            .insert(file.id.clone(), CancellationToken::new());
        state.active.push(file.clone());
        Some(file)
    }

    fn announce_started(&self, file: &QueuedFile) {
        self.publish(UploadEvent::StatusChanged {
            task_id: file.id.clone(),
            old_status: UploadStatus::Pending,
            new_status: UploadStatus::Uploading,
        });
    }

    /// worker 主循环：完成当前文件后按需继续取队首，没有空闲名额时退出
    async fn run_worker(&self, first: QueuedFile, keep_pulling: bool) {
        let mut next = Some(first);
        while let Some(file) = next.take() {
            self.transfer(file).await;
            if keep_pulling {
                next = {
                    let mut state = self.state.lock();
                    self.promote_front(&mut state)
                };
                if let Some(ref file) = next {
                    self.announce_started(file);
                }
            }
        }
    }

    async fn transfer(&self, file: QueuedFile) {
        let id = file.id.clone();
        let token = match self.cancel_tokens.get(&id) {
            Some(token) => token.clone(),
            // 启动前已被移除
            None => return,
        };

        let on_progress = {
            let state = self.state.clone();
            let event_tx = self.event_tx.clone();
            let id = id.clone();
            move |progress: u8| {
                let updated = {
                    let mut state = state.lock();
                    match state.active.iter_mut().find(|f| f.id == id) {
                        Some(entry) => {
                            entry.set_progress(progress);
                            true
                        }
                        None => false,
                    }
                };
                if updated {
                    let _ = event_tx.send(UploadEvent::Progress {
                        task_id: id.clone(),
                        progress,
                    });
                }
            }
        };

        let result = self.simulator.upload(&file.name, on_progress, token).await;
        self.cancel_tokens.remove(&id);

        match result {
            Ok(outcome) => self.finish(&id, outcome.url),
            Err(TransferError::Cancelled) => {
                debug!("上传已取消，丢弃结果: {}", file.name);
            }
            Err(e) => self.fail(&id, e),
        }
    }

    /// 成功：写入存储，从活跃列表移除，记录插入已完成列表头部
    fn finish(&self, id: &str, url: String) {
        let record = {
            let mut state = self.state.lock();
            let Some(index) = state.active.iter().position(|f| f.id == id) else {
                debug!("条目已被移除，不写入记录: {}", id);
                return;
            };
            let entry = state.active.remove(index);

            let record = self.store.add_completed(CompletedUpload {
                name: entry.name,
                size: entry.size,
                mime_type: entry.mime_type,
                uploaded_url: url,
                thumbnail: entry.thumbnail,
            });

            state.completed.insert(0, record.clone());
            state.completed.truncate(MAX_UPLOAD_RECORDS);
            record
        };

        info!("✓ 上传完成: {} -> {}", record.name, record.uploaded_url);
        self.publish(UploadEvent::Completed {
            task_id: id.to_string(),
            record,
        });
    }

    /// 失败：条目保留在活跃列表中，状态置为 error，等待用户移除
    fn fail(&self, id: &str, error: TransferError) {
        let message = error.to_string();
        let name = {
            let mut state = self.state.lock();
            match state.active.iter_mut().find(|f| f.id == id) {
                Some(entry) => {
                    entry.mark_failed(message.clone());
                    entry.name.clone()
                }
                None => return,
            }
        };

        warn!("上传失败: {}: {}", name, message);
        self.publish(UploadEvent::StatusChanged {
            task_id: id.to_string(),
            old_status: UploadStatus::Uploading,
            new_status: UploadStatus::Error,
        });
        self.publish(UploadEvent::Failed {
            task_id: id.to_string(),
            name,
            error: message,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clipboard::BufferClipboard;
    use crate::config::SimulatorConfig;
    use base64::Engine;
    use image::{DynamicImage, RgbImage};
    use std::io::Cursor;
    use std::time::Duration;

    fn upload_config(max_file_size: u64, allowed: &[&str], max_concurrent: usize) -> UploadConfig {
        UploadConfig {
            max_file_size,
            allowed_types: allowed.iter().map(|s| s.to_string()).collect(),
            max_concurrent_uploads: max_concurrent,
        }
    }

    fn manager_with(config: UploadConfig, simulator: SimulatorConfig) -> UploadQueueManager {
        UploadQueueManager::new(
            config,
            Arc::new(UploadRecordStore::new()),
            Arc::new(UploadSimulator::new(simulator)),
        )
        .with_clipboard(Clipboard::new(
            Box::new(BufferClipboard::default()),
            Box::new(BufferClipboard::default()),
        ))
    }

    fn manager(config: UploadConfig) -> UploadQueueManager {
        manager_with(
            config,
            SimulatorConfig {
                seed: Some(42),
                ..SimulatorConfig::default()
            },
        )
    }

    fn uploading_count(manager: &UploadQueueManager) -> usize {
        manager
            .active()
            .iter()
            .filter(|f| f.status == UploadStatus::Uploading)
            .count()
    }

    fn image_file(name: &str) -> SelectedFile {
        SelectedFile::metadata_only(name, "image/png", 100)
    }

    fn png_file(name: &str, width: u32, height: u32) -> SelectedFile {
        let img = DynamicImage::ImageRgb8(RgbImage::new(width, height));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        SelectedFile::new(name, "image/png", buf)
    }

    #[tokio::test]
    async fn test_oversized_text_file_rejected_with_size_reason() {
        let manager = manager(upload_config(1000, &["image/"], 2));
        let report = manager
            .enqueue(vec![SelectedFile::metadata_only("notes.txt", "text/plain", 2000)])
            .await;

        assert!(report.queued.is_empty());
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].name, "notes.txt");
        assert_eq!(report.rejected[0].reason, "File size exceeds 1000 Bytes limit");
        assert!(manager.queued().is_empty());
    }

    #[tokio::test]
    async fn test_enqueue_preserves_order_and_generates_thumbnail() {
        let manager = manager(upload_config(10_000_000, &["image/", ".txt"], 2));
        let report = manager
            .enqueue(vec![
                png_file("a.png", 128, 64),
                SelectedFile::new("b.txt", "text/plain", b"hello".to_vec()),
                image_file("c.png"),
            ])
            .await;

        assert_eq!(report.queued.len(), 3);
        let queued = manager.queued();
        let names: Vec<&str> = queued.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a.png", "b.txt", "c.png"]);
        assert_eq!(
            queued.iter().map(|f| f.id.clone()).collect::<Vec<_>>(),
            report.queued
        );

        assert!(queued[0]
            .thumbnail
            .as_deref()
            .unwrap()
            .starts_with("data:image/png;base64,"));
        assert!(queued[1].thumbnail.is_none());
        // 内容无法解码：没有缩略图，但仍然入队
        assert!(queued[2].thumbnail.is_none());
        assert!(queued.iter().all(|f| f.status == UploadStatus::Pending));
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_moves_up_to_limit() {
        let manager = manager(upload_config(1000, &["image/"], 2));
        let files = (0..5).map(|i| image_file(&format!("{}.png", i))).collect();
        manager.enqueue(files).await;

        assert_eq!(manager.start_uploads(), 2);

        let active = manager.active();
        assert_eq!(active.len(), 2);
        assert!(active.iter().all(|f| f.status == UploadStatus::Uploading));
        assert_eq!(active[0].name, "0.png");
        assert_eq!(active[1].name, "1.png");

        let queued = manager.queued();
        assert_eq!(queued.len(), 3);
        assert_eq!(queued[0].name, "2.png");

        // 名额已满，再次调用不会提升
        assert_eq!(manager.start_uploads(), 0);

        manager.wait_idle().await;
        assert!(manager.active().is_empty());
        assert_eq!(manager.queued().len(), 3);

        let completed = manager.completed();
        assert_eq!(completed.len(), 2);
        assert!(completed
            .iter()
            .all(|r| r.status == UploadStatus::Completed && r.progress == 100));
        let mut ids: Vec<u64> = completed.iter().map(|r| r.id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2]);
        // 最新在前
        assert!(completed[0].id > completed[1].id);
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_events_and_single_completion() {
        let manager = manager(upload_config(1000, &[], 3));
        let mut events = manager.subscribe();
        manager.enqueue(vec![image_file("only.png")]).await;
        let id = manager.queued()[0].id.clone();

        manager.start_uploads();
        manager.wait_idle().await;

        let mut progress = Vec::new();
        let mut completions = 0;
        while let Ok(event) = events.try_recv() {
            match event {
                UploadEvent::Progress { task_id, progress: p } => {
                    assert_eq!(task_id, id);
                    progress.push(p);
                }
                UploadEvent::Completed { task_id, record } => {
                    assert_eq!(task_id, id);
                    assert_eq!(record.uploaded_url, "https://example.com/files/only.png");
                    completions += 1;
                }
                _ => {}
            }
        }

        assert_eq!(completions, 1);
        assert_eq!(progress.iter().filter(|&&p| p == 100).count(), 1);
        assert_eq!(progress.last(), Some(&100));
    }

    #[tokio::test]
    async fn test_remove_queued_is_idempotent() {
        let manager = manager(upload_config(1000, &[], 2));
        manager
            .enqueue(vec![image_file("a.png"), image_file("b.png")])
            .await;
        let id = manager.queued()[0].id.clone();

        assert!(manager.remove_queued(&id));
        assert!(!manager.remove_queued(&id));
        assert_eq!(manager.queued().len(), 1);
        assert_eq!(manager.queued()[0].name, "b.png");
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_active_cancels_transfer() {
        let manager = manager(upload_config(1000, &[], 2));
        manager
            .enqueue(vec![image_file("keep.png"), image_file("drop.png")])
            .await;
        manager.start_uploads();

        let drop_id = manager.active()[1].id.clone();
        assert!(manager.remove_active(&drop_id));
        assert!(!manager.remove_active(&drop_id));

        manager.wait_idle().await;

        let completed = manager.completed();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].name, "keep.png");
        assert!(manager.active().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_upload_stays_in_active() {
        let manager = manager_with(
            upload_config(1000, &[], 2),
            SimulatorConfig {
                failure_rate: 1.0,
                seed: Some(9),
                ..SimulatorConfig::default()
            },
        );
        manager
            .enqueue(vec![image_file("a.png"), image_file("b.png"), image_file("c.png")])
            .await;

        manager.start_uploads();
        manager.wait_idle().await;

        let active = manager.active();
        assert_eq!(active.len(), 2);
        assert!(active.iter().all(|f| f.status == UploadStatus::Error));
        assert!(active
            .iter()
            .all(|f| f.error.as_deref().unwrap().starts_with("Upload failed")));
        // 条目进度停在失败点，与错误信息一致
        assert!(active.iter().all(|f| f
            .error
            .as_deref()
            .unwrap()
            .contains(&format!("at {}%", f.progress))));
        assert!(manager.completed().is_empty());

        // 失败的条目不占用并发名额，剩余文件仍可继续
        assert_eq!(manager.start_uploads(), 1);
        manager.wait_idle().await;
        assert_eq!(manager.active().len(), 3);

        // 用户手动移除失败条目
        let id = active[0].id.clone();
        assert!(manager.remove_active(&id));
        assert_eq!(manager.active().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_all_uploads_drains_queue_with_bounded_workers() {
        let manager = manager(upload_config(1000, &[], 2));
        let files = (0..5).map(|i| image_file(&format!("{}.png", i))).collect();
        manager.enqueue(files).await;

        assert_eq!(manager.start_all_uploads(), 2);
        assert_eq!(manager.active().len(), 2);
        assert_eq!(manager.queued().len(), 3);

        manager.wait_idle().await;

        assert!(manager.queued().is_empty());
        assert!(manager.active().is_empty());
        let completed = manager.completed();
        assert_eq!(completed.len(), 5);
        let mut ids: Vec<u64> = completed.iter().map(|r| r.id).collect();
        ids.dedup();
        assert_eq!(ids.len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_limit_holds_when_restarting_after_remove() {
        let manager = manager(upload_config(1000, &[], 2));
        let limit = manager.config().concurrency_limit();
        let files = (0..6).map(|i| image_file(&format!("{}.png", i))).collect();
        manager.enqueue(files).await;

        assert_eq!(manager.start_all_uploads(), 2);
        assert_eq!(uploading_count(&manager), limit);

        let removed = manager.active()[0].id.clone();
        assert!(manager.remove_active(&removed));
        assert_eq!(uploading_count(&manager), limit - 1);

        // 被取消的 worker 尚未醒来，名额已被新一批占用
        assert_eq!(manager.start_uploads(), 1);
        assert_eq!(uploading_count(&manager), limit);

        for _ in 0..2000 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let uploading = uploading_count(&manager);
            assert!(
                uploading <= limit,
                "uploading {} exceeds limit {}",
                uploading,
                limit
            );
            if manager.queued().is_empty() && uploading == 0 {
                break;
            }
        }

        manager.wait_idle().await;
        assert!(manager.queued().is_empty());
        assert!(manager.active().is_empty());
        assert_eq!(manager.completed().len(), 5);
        assert!(manager.completed().iter().all(|r| r.name != "0.png"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_workers_respect_lowered_limit() {
        let manager = manager(upload_config(1000, &[], 3));
        let files = (0..6).map(|i| image_file(&format!("{}.png", i))).collect();
        manager.enqueue(files).await;

        assert_eq!(manager.start_all_uploads(), 3);
        manager.set_config(upload_config(1000, &[], 1));

        let mut drained_to_limit = false;
        for _ in 0..2000 {
            tokio::time::sleep(Duration::from_millis(50)).await;
            let uploading = uploading_count(&manager);
            if uploading <= 1 {
                drained_to_limit = true;
            }
            // 降到新上限之后不再超过
            assert!(!drained_to_limit || uploading <= 1);
            if manager.queued().is_empty() && uploading == 0 {
                break;
            }
        }

        manager.wait_idle().await;
        assert!(drained_to_limit);
        assert!(manager.queued().is_empty());
        assert_eq!(manager.completed().len(), 6);
    }

    #[tokio::test]
    async fn test_debug_output_summarizes_lists() {
        let manager = manager(upload_config(1000, &[], 2));
        manager.enqueue(vec![image_file("a.png")]).await;

        let debug = format!("{:?}", manager);
        assert!(debug.starts_with("UploadQueueManager"));
        assert!(debug.contains("queued: 1"));
        assert!(debug.contains("active: 0"));
    }

    #[tokio::test]
    async fn test_custom_thumbnail_size() {
        let manager = manager(upload_config(10_000_000, &["image/"], 2))
            .with_thumbnailer(ThumbnailGenerator::new(16));
        manager.enqueue(vec![png_file("wide.png", 128, 64)]).await;

        let url = manager.queued()[0].thumbnail.clone().unwrap();
        let payload = url.strip_prefix("data:image/png;base64,").unwrap();
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(payload)
            .unwrap();
        let thumb = image::load_from_memory(&bytes).unwrap();
        assert_eq!((thumb.width(), thumb.height()), (16, 8));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stats_and_completed_maintenance() {
        let manager = manager(upload_config(10 * 1024 * 1024, &[], 3));
        manager
            .enqueue(vec![
                SelectedFile::metadata_only("a.bin", "", 1024 * 1024),
                SelectedFile::metadata_only("b.bin", "", 2 * 1024 * 1024),
                SelectedFile::metadata_only("c.bin", "", 10),
            ])
            .await;

        let stats = manager.stats();
        assert_eq!(stats.files_uploaded, 0);
        assert_eq!(stats.in_queue, 3);

        manager.start_uploads();
        manager.wait_idle().await;

        let stats = manager.stats();
        assert_eq!(stats.files_uploaded, 3);
        assert_eq!(stats.total_size_bytes, 3 * 1024 * 1024 + 10);
        assert_eq!(stats.total_size_mb, 3);
        assert_eq!(stats.in_queue, 0);

        let id = manager.completed()[0].id;
        assert!(manager.remove_completed(id).is_some());
        assert!(manager.remove_completed(id).is_none());
        assert_eq!(manager.completed().len(), 2);

        manager.clear_completed();
        assert!(manager.completed().is_empty());
    }

    #[tokio::test]
    async fn test_existing_records_loaded_and_copy_url() {
        let store = Arc::new(UploadRecordStore::new());
        store.add_completed(CompletedUpload {
            name: "seed.png".to_string(),
            size: 1,
            mime_type: "image/png".to_string(),
            uploaded_url: "https://example.com/files/seed.png".to_string(),
            thumbnail: None,
        });

        let manager = UploadQueueManager::new(
            UploadConfig::default(),
            store,
            Arc::new(UploadSimulator::default()),
        )
        .with_clipboard(Clipboard::new(
            Box::new(BufferClipboard::default()),
            Box::new(BufferClipboard::default()),
        ));
        let mut events = manager.subscribe();

        assert_eq!(manager.completed().len(), 1);

        let url = manager.completed()[0].uploaded_url.clone();
        assert_eq!(manager.copy_url(&url).unwrap(), CopyMethod::Primary);
        assert!(matches!(
            events.try_recv(),
            Ok(UploadEvent::UrlCopied { url: copied }) if copied == url
        ));
    }
}
