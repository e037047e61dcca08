//! 限容量、带 TTL 的结果缓存
//!
//! 键为请求文本的指纹；过期条目在查找时立即淘汰；满容量时淘汰创建时间最早的一条。
//! 条目与命中计数都在同一把锁内维护。

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::cache::fingerprint;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    created_at: Instant,
    last_accessed_at: Instant,
    access_count: u64,
}

#[derive(Debug)]
struct CacheState<V> {
    entries: HashMap<String, CacheEntry<V>>,
    hits: u64,
    misses: u64,
}

/// 缓存统计快照
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub max_size: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub ttl_secs: u64,
}

/// 结果缓存
#[derive(Debug)]
pub struct ResultCache<V> {
    name: &'static str,
    max_size: usize,
    ttl: Duration,
    state: Mutex<CacheState<V>>,
}

impl<V: Clone> ResultCache<V> {
    /// name 仅用于日志区分实例；max_size 至少为 1
    pub fn new(name: &'static str, max_size: usize, ttl: Duration) -> Self {
        Self {
            name,
            max_size: max_size.max(1),
            ttl,
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                hits: 0,
                misses: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState<V>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 查找；不存在或已过期计为 miss
    pub fn get(&self, text: &str) -> Option<V> {
        let key = fingerprint(text);
        let now = Instant::now();
        let mut state = self.lock();

        let expired = state
            .entries
            .get(&key)
            .map(|entry| now.saturating_duration_since(entry.created_at) > self.ttl);
        let Some(expired) = expired else {
            state.misses += 1;
            return None;
        };
        if expired {
            state.entries.remove(&key);
            state.misses += 1;
            tracing::debug!(cache = self.name, key = &key[..8], "Cache entry expired");
            return None;
        }

        state.hits += 1;
        let hit_rate = hit_rate(state.hits, state.misses);
        let entry = state.entries.get_mut(&key)?;
        entry.access_count += 1;
        entry.last_accessed_at = now;
        let value = entry.value.clone();
        tracing::debug!(cache = self.name, key = &key[..8], hit_rate, "Cache hit");
        Some(value)
    }

    /// 写入；满容量时先淘汰创建最早的条目。覆盖已有键不触发淘汰
    pub fn set(&self, text: &str, value: V) {
        let key = fingerprint(text);
        let now = Instant::now();
        let mut state = self.lock();

        if !state.entries.contains_key(&key) && state.entries.len() >= self.max_size {
            let oldest = state
                .entries
                .iter()
                .min_by_key(|(_, e)| e.created_at)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                state.entries.remove(&oldest);
                tracing::debug!(cache = self.name, key = &oldest[..8], "Cache evicted");
            }
        }

        state.entries.insert(
            key.clone(),
            CacheEntry {
                value,
                created_at: now,
                last_accessed_at: now,
                access_count: 0,
            },
        );
        tracing::debug!(
            cache = self.name,
            key = &key[..8],
            total = state.entries.len(),
            "Cache stored"
        );
    }

    pub fn invalidate(&self, text: &str) {
        let key = fingerprint(text);
        if self.lock().entries.remove(&key).is_some() {
            tracing::debug!(cache = self.name, key = &key[..8], "Cache invalidated");
        }
    }

    /// 清空条目并重置命中计数
    pub fn clear(&self) {
        let mut state = self.lock();
        state.entries.clear();
        state.hits = 0;
        state.misses = 0;
        tracing::info!(cache = self.name, "Cache cleared");
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.lock();
        CacheStats {
            size: state.entries.len(),
            max_size: self.max_size,
            hits: state.hits,
            misses: state.misses,
            hit_rate: hit_rate(state.hits, state.misses),
            ttl_secs: self.ttl.as_secs(),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn hit_rate(hits: u64, misses: u64) -> f64 {
    let total = hits + misses;
    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64
    }
}
