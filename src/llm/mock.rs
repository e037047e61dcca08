//! Mock LLM 客户端（用于测试与离线运行，无需 API）
//!
//! 由一个闭包按 (Key 下标, 消息) 决定回复或错误；工厂记录每次 complete 使用的 Key 下标。

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::core::{Credential, ProviderError};
use crate::llm::{ClientFactory, GenerationOptions, LlmClient, Message, Role};

type Responder = dyn Fn(usize, &[Message]) -> Result<String, ProviderError> + Send + Sync;

/// Mock 客户端：绑定某个 Key 下标，回复交给共享的 responder
pub struct MockLlmClient {
    key: usize,
    responder: Arc<Responder>,
    calls: Arc<Mutex<Vec<usize>>>,
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(
        &self,
        messages: &[Message],
        _options: &GenerationOptions,
    ) -> Result<String, ProviderError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(self.key);
        (self.responder)(self.key, messages)
    }
}

/// Mock 工厂
#[derive(Clone)]
pub struct MockClientFactory {
    responder: Arc<Responder>,
    calls: Arc<Mutex<Vec<usize>>>,
}

impl MockClientFactory {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(usize, &[Message]) -> Result<String, ProviderError> + Send + Sync + 'static,
    {
        Self {
            responder: Arc::new(responder),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// 回显最后一条 User 消息
    pub fn echo() -> Self {
        Self::new(|_, messages| {
            Ok(messages
                .iter()
                .rev()
                .find(|m| m.role == Role::User)
                .map(|m| m.content.clone())
                .unwrap_or_else(|| "(no input)".to_string()))
        })
    }

    /// 每次调用都以同一错误失败
    pub fn failing(error: ProviderError) -> Self {
        Self::new(move |_, _| Err(error.clone()))
    }

    /// 按顺序记录的每次调用所用 Key 下标
    pub fn calls(&self) -> Vec<usize> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl ClientFactory for MockClientFactory {
    fn bind(&self, credential: &Credential) -> Arc<dyn LlmClient> {
        Arc::new(MockLlmClient {
            key: credential.index,
            responder: self.responder.clone(),
            calls: self.calls.clone(),
        })
    }
}
