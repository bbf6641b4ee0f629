//! 剪贴板导出
//!
//! 先写系统剪贴板，失败时退回到进程内缓冲区，不向调用方抛出平台错误

use anyhow::{Context, Result};
use parking_lot::Mutex;
use tracing::{info, warn};

/// 剪贴板写入接口
pub trait ClipboardWriter: Send + Sync {
    fn write_text(&self, text: &str) -> Result<()>;
}

/// 系统剪贴板
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClipboard;

impl ClipboardWriter for SystemClipboard {
    fn write_text(&self, text: &str) -> Result<()> {
        let mut clipboard = arboard::Clipboard::new().context("无法打开系统剪贴板")?;
        clipboard
            .set_text(text.to_string())
            .context("写入系统剪贴板失败")?;
        Ok(())
    }
}

/// 进程内剪贴板缓冲区
///
/// 没有可用的系统剪贴板时（无图形环境、权限不足）使用
#[derive(Debug, Default)]
pub struct BufferClipboard {
    contents: Mutex<Option<String>>,
}

impl BufferClipboard {
    pub fn contents(&self) -> Option<String> {
        self.contents.lock().clone()
    }
}

impl ClipboardWriter for BufferClipboard {
    fn write_text(&self, text: &str) -> Result<()> {
        *self.contents.lock() = Some(text.to_string());
        Ok(())
    }
}

/// 实际使用的写入方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyMethod {
    Primary,
    Fallback,
}

/// 带退路的剪贴板
pub struct Clipboard {
    primary: Box<dyn ClipboardWriter>,
    fallback: Box<dyn ClipboardWriter>,
}

impl Clipboard {
    pub fn new(primary: Box<dyn ClipboardWriter>, fallback: Box<dyn ClipboardWriter>) -> Self {
        Self { primary, fallback }
    }

    /// 系统剪贴板 + 进程内缓冲区
    pub fn system() -> Self {
        Self::new(
            Box::new(SystemClipboard),
            Box::new(BufferClipboard::default()),
        )
    }

    /// 复制文本，主通道失败时改用退路
    pub fn copy(&self, text: &str) -> Result<CopyMethod> {
        match self.primary.write_text(text) {
            Ok(()) => {
                info!("已复制到剪贴板: {}", text);
                Ok(CopyMethod::Primary)
            }
            Err(e) => {
                warn!("系统剪贴板不可用，改用备用方式: {:#}", e);
                self.fallback
                    .write_text(text)
                    .context("备用剪贴板写入失败")?;
                info!("已复制到备用剪贴板: {}", text);
                Ok(CopyMethod::Fallback)
            }
        }
    }
}

impl std::fmt::Debug for Clipboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Clipboard").finish_non_exhaustive()
    }
}
