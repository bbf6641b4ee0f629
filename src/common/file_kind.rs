// 文件类别识别
//
// 根据 MIME 类型推断文件类别，供外层界面选择图标

use serde::{Deserialize, Serialize};

/// 文件类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Image,
    Video,
    Audio,
    Pdf,
    Document,
    Spreadsheet,
    Presentation,
    Archive,
    Other,
}

impl FileKind {
    /// 从 MIME 类型推断类别
    ///
    /// 匹配顺序固定：先前缀（image/ video/ audio/），再按关键字
    pub fn from_mime(mime: &str) -> Self {
        let contains_any = |keys: &[&str]| keys.iter().any(|k| mime.contains(k));

        if mime.starts_with("image/") {
            FileKind::Image
        } else if mime.starts_with("video/") {
            FileKind::Video
        } else if mime.starts_with("audio/") {
            FileKind::Audio
        } else if mime.contains("pdf") {
            FileKind::Pdf
        } else if contains_any(&["document", "word"]) {
            FileKind::Document
        } else if contains_any(&["spreadsheet", "excel"]) {
            FileKind::Spreadsheet
        } else if contains_any(&["presentation", "powerpoint"]) {
            FileKind::Presentation
        } else if contains_any(&["zip", "rar", "7z"]) {
            FileKind::Archive
        } else {
            FileKind::Other
        }
    }
}

/// 是否为图片类型（MIME 以 `image/` 开头）
pub fn is_image_mime(mime: &str) -> bool {
    mime.starts_with("image/")
}
