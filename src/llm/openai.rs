//! OpenAI 兼容 API 客户端
//!
//! 通过 async_openai 调用任意 OpenAI 兼容端点；默认指向 Gemini 的 OpenAI 兼容接口。
//! 每个客户端只绑定一个 Key，由 OpenAiClientFactory 在每次尝试时新建。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::chat::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;

use crate::core::{ConfigurationError, Credential, ProviderError};
use crate::llm::{ClientFactory, GenerationOptions, LlmClient, Message, Role};

/// Gemini 的 OpenAI 兼容端点
pub const GEMINI_OPENAI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";
pub const GEMINI_FLASH: &str = "gemini-2.5-flash";

/// Token 使用统计（累计值，跨客户端共享）
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub prompt_tokens: Arc<AtomicU64>,
    pub completion_tokens: Arc<AtomicU64>,
}

impl TokenUsage {
    pub fn add(&self, prompt: u64, completion: u64) {
        self.prompt_tokens.fetch_add(prompt, Ordering::Relaxed);
        self.completion_tokens.fetch_add(completion, Ordering::Relaxed);
    }

    /// (prompt, completion, total)
    pub fn get(&self) -> (u64, u64, u64) {
        let prompt = self.prompt_tokens.load(Ordering::Relaxed);
        let completion = self.completion_tokens.load(Ordering::Relaxed);
        (prompt, completion, prompt + completion)
    }
}

/// OpenAI 兼容客户端：持有 Client 与 model 名
pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
    model: String,
    usage: TokenUsage,
}

impl OpenAiClient {
    pub fn new(
        base_url: &str,
        model: &str,
        api_key: &str,
        http: reqwest::Client,
        usage: TokenUsage,
    ) -> Self {
        let config = OpenAIConfig::new()
            .with_api_base(base_url)
            .with_api_key(api_key);
        // 关闭 async_openai 自带的 429 重试：限流应交给 ResilientInvoker 换 Key
        let no_retry = backoff::ExponentialBackoffBuilder::new()
            .with_max_elapsed_time(Some(Duration::ZERO))
            .build();
        Self {
            client: Client::with_config(config)
                .with_http_client(http)
                .with_backoff(no_retry),
            model: model.to_string(),
            usage,
        }
    }

    fn to_openai_messages(
        messages: &[Message],
    ) -> Result<Vec<ChatCompletionRequestMessage>, ProviderError> {
        messages
            .iter()
            .map(|m| {
                let built = match m.role {
                    Role::System => ChatCompletionRequestSystemMessageArgs::default()
                        .content(m.content.clone())
                        .build()
                        .map(ChatCompletionRequestMessage::System),
                    Role::User => ChatCompletionRequestUserMessageArgs::default()
                        .content(m.content.clone())
                        .build()
                        .map(ChatCompletionRequestMessage::User),
                    Role::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                        .content(m.content.clone())
                        .build()
                        .map(ChatCompletionRequestMessage::Assistant),
                };
                built.map_err(|e| ProviderError::fatal(e.to_string()))
            })
            .collect()
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(
        &self,
        messages: &[Message],
        options: &GenerationOptions,
    ) -> Result<String, ProviderError> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(Self::to_openai_messages(messages)?)
            .temperature(options.temperature)
            .build()
            .map_err(|e| ProviderError::fatal(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(provider_error)?;

        if let Some(usage) = &response.usage {
            self.usage
                .add(usage.prompt_tokens as u64, usage.completion_tokens as u64);
        }

        Ok(response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default())
    }
}

/// 调用边界上的错误归类：API 错误体按 code / type，有 HTTP 状态码时按状态码，否则按错误文本
fn provider_error(err: OpenAIError) -> ProviderError {
    let message = err.to_string();
    match err {
        OpenAIError::ApiError(api) => {
            ProviderError::from_api_code(api.code.as_deref(), api.r#type.as_deref(), message)
        }
        OpenAIError::Reqwest(e) => match e.status() {
            Some(status) => ProviderError::from_status(status.as_u16(), message),
            None => ProviderError::classify(message),
        },
        _ => ProviderError::classify(message),
    }
}

/// 按 Key 新建 OpenAiClient；底层 HTTP 连接池在所有客户端间共享
pub struct OpenAiClientFactory {
    base_url: String,
    model: String,
    http: reqwest::Client,
    usage: TokenUsage,
}

impl OpenAiClientFactory {
    /// request_timeout 作用于 HTTP 层，ResilientInvoker 本身不设超时
    pub fn new(
        base_url: &str,
        model: &str,
        request_timeout: Duration,
    ) -> Result<Self, ConfigurationError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| ConfigurationError::HttpClient(e.to_string()))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            http,
            usage: TokenUsage::default(),
        })
    }

    pub fn token_usage(&self) -> (u64, u64, u64) {
        self.usage.get()
    }
}

impl ClientFactory for OpenAiClientFactory {
    fn bind(&self, credential: &Credential) -> Arc<dyn LlmClient> {
        Arc::new(OpenAiClient::new(
            &self.base_url,
            &self.model,
            credential.secret(),
            self.http.clone(),
            self.usage.clone(),
        ))
    }
}
