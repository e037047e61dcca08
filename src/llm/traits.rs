//! LLM 客户端抽象
//!
//! LlmClient 代表「已绑定某个 Key 的提供方上下文」；ClientFactory 负责按 Key 构造它。
//! ResilientInvoker 每次尝试都通过工厂拿一个新的客户端。

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::{Credential, ProviderError};

/// 消息角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// 一条对话消息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// 生成参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationOptions {
    pub temperature: f32,
}

impl GenerationOptions {
    pub fn with_temperature(temperature: f32) -> Self {
        Self { temperature }
    }
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self { temperature: 0.4 }
    }
}

/// 绑定了单个 Key 的 LLM 客户端
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 非流式完成，返回首条回复文本；失败时 ProviderError 已完成归类
    async fn complete(
        &self,
        messages: &[Message],
        options: &GenerationOptions,
    ) -> Result<String, ProviderError>;
}

/// 按 Key 构造客户端
pub trait ClientFactory: Send + Sync {
    fn bind(&self, credential: &Credential) -> Arc<dyn LlmClient>;
}
