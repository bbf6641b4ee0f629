// 文件大小格式化

const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

/// 将字节数格式化为人类可读的字符串
///
/// 以 1024 为进制，最多保留两位小数并去掉末尾的 0，
/// 例如 `1536 -> "1.5 KB"`，`10485760 -> "10 MB"`。
/// 超过 GB 的数值仍以 GB 表示。
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut size = bytes as f64;
    let mut unit_index = 0;
    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    let formatted = format!("{:.2}", size);
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');

    format!("{} {}", trimmed, UNITS[unit_index])
}
