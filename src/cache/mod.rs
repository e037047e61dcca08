//! 结果缓存：请求指纹 + 限容量 TTL 存储

pub mod fingerprint;
pub mod result_cache;

pub use fingerprint::{fingerprint, normalize};
pub use result_cache::{CacheStats, ResultCache};
