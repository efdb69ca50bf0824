/// TCP 连接统计
/// 
/// 读取 /proc/net/tcp 与 /proc/net/tcp6，统计 ESTABLISHED 状态的连接数

use std::fs;
use tracing::debug;

const PROC_NET_TABLES: &[&str] = &["/proc/net/tcp", "/proc/net/tcp6"];

/// ESTABLISHED 在内核连接表中的状态码
const TCP_ESTABLISHED: &str = "01";

/// 统计当前主机的活跃 TCP 连接数
///
/// 所有连接表都无法读取时（例如非 Linux 主机）返回 None
pub fn count_established() -> Option<u64> {
    let mut total = 0;
    let mut readable = false;

    for path in PROC_NET_TABLES {
        match fs::read_to_string(path) {
            Ok(content) => {
                readable = true;
                total += count_established_in(&content);
            }
            Err(e) => {
                debug!("读取 {} 失败: {}", path, e);
            }
        }
    }

    readable.then_some(total)
}

/// 解析一张连接表，返回 ESTABLISHED 行数
pub fn count_established_in(content: &str) -> u64 {
    content
        .lines()
        .skip(1)
        .filter(|line| {
            // sl local_address rem_address st ...
            line.split_whitespace().nth(3) == Some(TCP_ESTABLISHED)
        })
        .count() as u64
}
