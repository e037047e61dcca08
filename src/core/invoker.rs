//! 带 Key 轮换的提供方调用
//!
//! 每次尝试：从 KeyPool 取 Key → 工厂绑定新客户端 → 执行操作。
//! Transient 错误上报 KeyPool 并换 Key 重试，最多 max_attempts 次（默认等于 Key 数）；
//! Fatal 错误立即返回，不轮换。

use std::future::Future;
use std::sync::Arc;

use crate::core::{InvokeError, KeyPool, ProviderError};
use crate::llm::{ClientFactory, GenerationOptions, LlmClient, Message};

/// 弹性调用器：KeyPool 的唯一写入方是 report_failure
pub struct ResilientInvoker {
    pool: Arc<KeyPool>,
    factory: Arc<dyn ClientFactory>,
}

impl ResilientInvoker {
    pub fn new(pool: Arc<KeyPool>, factory: Arc<dyn ClientFactory>) -> Self {
        Self { pool, factory }
    }

    pub fn pool(&self) -> &Arc<KeyPool> {
        &self.pool
    }

    /// 以 Key 数为上限执行 operation
    pub async fn invoke<T, F, Fut>(&self, operation: F) -> Result<T, InvokeError>
    where
        F: FnMut(Arc<dyn LlmClient>) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        self.invoke_with_attempts(operation, self.pool.len()).await
    }

    /// 指定最大尝试次数执行 operation（至少 1 次）
    pub async fn invoke_with_attempts<T, F, Fut>(
        &self,
        mut operation: F,
        max_attempts: usize,
    ) -> Result<T, InvokeError>
    where
        F: FnMut(Arc<dyn LlmClient>) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let max_attempts = max_attempts.max(1);
        let mut last_error = None;

        for attempt in 0..max_attempts {
            let credential = self.pool.current_credential();
            let client = self.factory.bind(&credential);

            match operation(client).await {
                Ok(value) => {
                    if attempt > 0 {
                        tracing::info!(
                            key = credential.index + 1,
                            fallbacks = attempt,
                            "Succeeded after API key fallback"
                        );
                    }
                    return Ok(value);
                }
                Err(err) if err.is_transient() => {
                    tracing::warn!(
                        key = credential.index + 1,
                        attempt = attempt + 1,
                        max_attempts,
                        error = %truncate(&err.message, 100),
                        "API key hit limit"
                    );
                    self.pool.report_failure(Some(credential.index));
                    last_error = Some(err);
                }
                Err(err) => {
                    tracing::warn!(error = %truncate(&err.message, 200), "Non-key provider error");
                    return Err(InvokeError::Operation(err));
                }
            }
        }

        Err(InvokeError::AllCredentialsExhausted {
            attempts: max_attempts,
            last: last_error
                .unwrap_or_else(|| ProviderError::transient("no attempt was made")),
        })
    }

    /// 便捷封装：一次完整的 chat 调用
    pub async fn complete(
        &self,
        messages: &[Message],
        options: GenerationOptions,
    ) -> Result<String, InvokeError> {
        self.invoke(move |client| async move { client.complete(messages, &options).await })
            .await
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() > max_chars {
        format!("{}...", s.chars().take(max_chars).collect::<String>())
    } else {
        s.to_string()
    }
}
