//! 缓存键：规范化后取 SHA-256
//!
//! 规范化 = 去首尾空白、转小写；内部空白原样保留。

use sha2::{Digest, Sha256};

/// 规范化请求文本
pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// 定长（64 位十六进制）缓存键
pub fn fingerprint(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize(text).as_bytes());
    hex::encode(hasher.finalize())
}
