use anyhow::{Context, Result};
use dropzone_uploader::{
    config::AppConfig, logging, ConfigService, SelectedFile, UploadEvent, UploadRecordStore,
    UploadSession,
};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

/// 配置文件路径，可通过 DROPZONE_CONFIG 覆盖
const DEFAULT_CONFIG_PATH: &str = "config/app.toml";

/// 根据扩展名推断 MIME 类型
fn guess_mime_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "json" => "application/json",
        "zip" => "application/zip",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "mp4" => "video/mp4",
        "mp3" => "audio/mpeg",
        _ => "",
    }
}

async fn read_selected_file(path: &Path) -> Result<SelectedFile> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("无法读取文件: {:?}", path))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string());

    Ok(SelectedFile::new(name, guess_mime_type(path), data))
}

#[tokio::main]
async fn main() -> Result<()> {
    let config_path =
        std::env::var("DROPZONE_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = AppConfig::load_or_default(&config_path).await;

    let _log_guard = logging::init_logging(&config.log);

    info!("DropZone 上传器启动, 配置文件: {}", config_path);

    let store = match std::env::var("DROPZONE_SEED") {
        Ok(seed_path) => UploadRecordStore::load_seed_file(&seed_path)
            .await
            .with_context(|| format!("加载种子数据失败: {}", seed_path))?,
        Err(_) => UploadRecordStore::new(),
    };

    let session = UploadSession::new(
        Arc::new(ConfigService::new(config.upload.clone())),
        Arc::new(store),
        config.simulator.clone(),
    );
    let manager = session.load().await.context("上传会话初始化失败")?;

    let mut files = Vec::new();
    for arg in std::env::args().skip(1) {
        match read_selected_file(Path::new(&arg)).await {
            Ok(file) => files.push(file),
            Err(e) => warn!("{:#}", e),
        }
    }

    if files.is_empty() {
        info!("没有指定要上传的文件");
        return Ok(());
    }

    // 事件输出
    let mut events = manager.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(UploadEvent::Progress { task_id, progress }) => {
                    tracing::debug!("进度 {}: {}%", task_id, progress);
                }
                Ok(UploadEvent::Rejected { name, reason }) => warn!("{}: {}", name, reason),
                Ok(UploadEvent::Failed { name, error, .. }) => warn!("上传失败 {}: {}", name, error),
                Ok(UploadEvent::Completed { record, .. }) => {
                    info!("{} 上传成功: {}", record.name, record.uploaded_url)
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => warn!("事件输出落后，跳过 {} 条", skipped),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let report = manager.enqueue(files).await;
    info!(
        "入队 {} 个文件, 拒绝 {} 个",
        report.queued.len(),
        report.rejected.len()
    );

    manager.start_all_uploads();
    manager.wait_idle().await;
    printer.abort();

    let stats = manager.stats();
    info!(
        "上传结束: 共 {} 个文件, {} MB, 未完成 {} 个",
        stats.files_uploaded, stats.total_size_mb, stats.in_queue
    );

    println!(
        "{}",
        serde_json::to_string_pretty(&manager.completed()).context("序列化上传记录失败")?
    );

    Ok(())
}
