// 文件校验
//
// 纯函数，无副作用。检查顺序固定：先大小后类型，调用方只展示第一条

use crate::common::format_file_size;
use crate::config::UploadConfig;
use crate::uploader::SelectedFile;

/// 校验错误
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("File size exceeds {} limit", format_file_size(*.limit))]
    FileTooLarge { size: u64, limit: u64 },

    #[error("File type {mime} is not supported")]
    UnsupportedType { mime: String },
}

/// 校验文件，返回全部违规项（为空表示通过）
pub fn validate(file: &SelectedFile, config: &UploadConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if file.size > config.max_file_size {
        errors.push(ValidationError::FileTooLarge {
            size: file.size,
            limit: config.max_file_size,
        });
    }

    if !config.allowed_types.is_empty() && !is_type_allowed(file, &config.allowed_types) {
        let mime = if file.mime_type.is_empty() {
            "unknown".to_string()
        } else {
            file.mime_type.clone()
        };
        errors.push(ValidationError::UnsupportedType { mime });
    }

    errors
}

/// MIME 包含任一片段，或文件名以该片段结尾（扩展名，不区分大小写）
fn is_type_allowed(file: &SelectedFile, allowed_types: &[String]) -> bool {
    let lower_name = file.name.to_lowercase();
    allowed_types.iter().any(|allowed| {
        file.mime_type.contains(allowed.as_str()) || lower_name.ends_with(&allowed.to_lowercase())
    })
}
