//! 公共模块
//!
//! 提供跨模块使用的文件工具

mod file_kind;
mod file_size;

pub use file_kind::{is_image_mime, FileKind};
pub use file_size::format_file_size;
