/// 工具函数集合

const BYTES_PER_GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// 格式化字节大小
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB", "PB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_index])
}

/// 字节数转换为 GiB
pub fn bytes_to_gib(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_GIB
}

/// 计算已用百分比，结果限制在 [0, 100]
///
/// `total` 为 0 时返回 0.0，`available` 大于 `total` 视为未使用
pub fn used_percent(total: u64, available: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let used = total.saturating_sub(available);
    clamp_percent(used as f64 / total as f64 * 100.0)
}

/// 按 df 的口径计算文件系统使用率
///
/// used = blocks - free，结果为 used / (used + avail)，
/// 保留给 root 的块（free - avail）不计入分母
pub fn fs_used_percent(blocks: u64, free: u64, avail: u64) -> f64 {
    let used = blocks.saturating_sub(free);
    let denominator = used.saturating_add(avail);
    if denominator == 0 {
        return 0.0;
    }
    clamp_percent(used as f64 / denominator as f64 * 100.0)
}

/// 将百分比限制在 [0, 100]，NaN 视为 0
pub fn clamp_percent(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 100.0)
}
