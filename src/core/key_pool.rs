//! API Key 池：多 Key 健康状态与选择
//!
//! 失败的 Key 进入冷却期（默认 60s），冷却内选择时跳过；全部冷却时强制重试最早失败的那个，
//! 而不是整体停摆。所有状态变更都在同一把锁内完成。

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tokio::time::Instant;

use crate::core::ConfigurationError;

/// 默认冷却时长
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(60);

/// 池中的一个凭据：按下标标识，密钥本身不会出现在 Debug 输出里
#[derive(Clone, Debug)]
pub struct Credential {
    pub index: usize,
    secret: Arc<SecretString>,
}

impl Credential {
    pub fn new(index: usize, secret: impl Into<String>) -> Self {
        Self {
            index,
            secret: Arc::new(SecretString::from(secret.into())),
        }
    }

    pub fn secret(&self) -> &str {
        self.secret.expose_secret()
    }
}

/// 只读快照，供诊断接口轮询
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyPoolStats {
    pub total: usize,
    pub current: usize,
    pub failed_count: usize,
    pub available_count: usize,
    /// 仍在冷却中的 Key 下标
    pub failed: Vec<usize>,
}

#[derive(Debug, Default)]
struct PoolState {
    current: usize,
    /// 下标 -> 最近一次失败时间
    failures: HashMap<usize, Instant>,
}

/// Key 池
#[derive(Debug)]
pub struct KeyPool {
    credentials: Vec<Credential>,
    cooldown: Duration,
    state: Mutex<PoolState>,
}

impl KeyPool {
    /// 创建 Key 池；空列表直接报 ConfigurationError
    pub fn new(keys: Vec<String>, cooldown: Duration) -> Result<Self, ConfigurationError> {
        let credentials: Vec<Credential> = keys
            .into_iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .enumerate()
            .map(|(i, k)| Credential::new(i, k))
            .collect();
        if credentials.is_empty() {
            return Err(ConfigurationError::NoCredentials);
        }
        tracing::info!(keys = credentials.len(), "KeyPool initialized");
        Ok(Self {
            credentials,
            cooldown,
            state: Mutex::new(PoolState::default()),
        })
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 返回当前可用的 Key：先清理过期失败记录，再从 current 起向后找未冷却的 Key
    pub fn current_credential(&self) -> Credential {
        let now = Instant::now();
        let len = self.credentials.len();
        let mut state = self.lock();

        let cooldown = self.cooldown;
        state
            .failures
            .retain(|_, failed_at| now.saturating_duration_since(*failed_at) < cooldown);

        for _ in 0..len {
            if !state.failures.contains_key(&state.current) {
                return self.credentials[state.current].clone();
            }
            state.current = (state.current + 1) % len;
        }

        // 全部在冷却中：挑最早失败的那个，清掉其记录再给一次机会
        let oldest = state
            .failures
            .iter()
            .min_by_key(|(_, failed_at)| **failed_at)
            .map(|(index, _)| *index)
            .unwrap_or(state.current);
        state.failures.remove(&oldest);
        state.current = oldest;
        tracing::warn!(
            key = oldest + 1,
            "All API keys failed recently, retrying least-recently-failed key"
        );
        self.credentials[oldest].clone()
    }

    /// 记录某个 Key（缺省为当前 Key）失败并轮换到下一个；越界下标只记日志
    pub fn report_failure(&self, index: Option<usize>) {
        let len = self.credentials.len();
        let mut state = self.lock();
        let index = index.unwrap_or(state.current);
        if index >= len {
            tracing::warn!(key = index + 1, total = len, "Ignoring failure report for unknown key");
            return;
        }
        state.failures.insert(index, Instant::now());
        let next = (index + 1) % len;
        state.current = next;
        tracing::warn!(key = index + 1, next = next + 1, "API key failed, rotating");
    }

    /// 只读统计，不修改失败记录
    pub fn stats(&self) -> KeyPoolStats {
        let now = Instant::now();
        let state = self.lock();
        let mut failed: Vec<usize> = state
            .failures
            .iter()
            .filter(|(_, failed_at)| now.saturating_duration_since(**failed_at) < self.cooldown)
            .map(|(index, _)| *index)
            .collect();
        failed.sort_unstable();
        KeyPoolStats {
            total: self.credentials.len(),
            current: state.current,
            failed_count: failed.len(),
            available_count: self.credentials.len() - failed.len(),
            failed,
        }
    }
}
