// 缩略图生成
//
// 图片文件解码后按比例缩放（最长边不超过 64），编码为 PNG data URL；
// 非图片直接返回 None，不做解码

use crate::common::is_image_mime;
use crate::uploader::SelectedFile;
use base64::Engine;
use image::imageops::FilterType;
use std::io::Cursor;
use tracing::debug;

/// 缩略图最长边
pub const THUMBNAIL_MAX_SIZE: u32 = 64;

/// 缩略图错误
///
/// 调用方应视为"无缩略图"，不能中断文件入队
#[derive(Debug, thiserror::Error)]
pub enum ThumbnailError {
    #[error("图片解码失败: {0}")]
    Decode(#[source] image::ImageError),

    #[error("缩略图编码失败: {0}")]
    Encode(#[source] image::ImageError),

    #[error("缩略图任务异常退出: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// 缩略图生成器
#[derive(Debug, Clone, Copy)]
pub struct ThumbnailGenerator {
    max_size: u32,
}

impl Default for ThumbnailGenerator {
    fn default() -> Self {
        Self::new(THUMBNAIL_MAX_SIZE)
    }
}

impl ThumbnailGenerator {
    pub fn new(max_size: u32) -> Self {
        Self {
            max_size: max_size.max(1),
        }
    }

    /// 生成缩略图
    ///
    /// # 返回
    /// - `Ok(None)`：非图片文件
    /// - `Ok(Some(data_url))`：`data:image/png;base64,...`
    pub async fn generate(&self, file: &SelectedFile) -> Result<Option<String>, ThumbnailError> {
        if !is_image_mime(&file.mime_type) {
            return Ok(None);
        }

        let data = file.data.clone();
        let max_size = self.max_size;
        let name = file.name.clone();

        // 解码与缩放是 CPU 密集操作，放到阻塞线程池
        let png = tokio::task::spawn_blocking(move || render_thumbnail(&data, max_size)).await??;

        debug!("缩略图生成完成: {}, {} bytes", name, png.len());

        let encoded = base64::engine::general_purpose::STANDARD.encode(&png);
        Ok(Some(format!("data:image/png;base64,{}", encoded)))
    }
}

fn render_thumbnail(data: &[u8], max_size: u32) -> Result<Vec<u8>, ThumbnailError> {
    let img = image::load_from_memory(data).map_err(ThumbnailError::Decode)?;
    let (width, height) = thumbnail_dimensions(img.width(), img.height(), max_size);
    let thumb = img.resize_exact(width, height, FilterType::Triangle);

    let mut png = Vec::new();
    thumb
        .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
        .map_err(ThumbnailError::Encode)?;
    Ok(png)
}

/// 计算缩略图尺寸：保持宽高比，只缩小不放大，最长边等于 `max_size`
pub fn thumbnail_dimensions(width: u32, height: u32, max_size: u32) -> (u32, u32) {
    let longest = width.max(height);
    if longest <= max_size {
        return (width.max(1), height.max(1));
    }

    let scale = max_size as f64 / longest as f64;
    let scaled = |v: u32| ((v as f64 * scale).round() as u32).clamp(1, max_size);

    if width > height {
        (max_size, scaled(height))
    } else {
        (scaled(width), max_size)
    }
}
