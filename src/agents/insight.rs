//! 旧版单句摘要服务
//!
//! 对原始文本生成一句话概括 + 可选的不确定说明，结果按文本指纹存入分析缓存。

use std::sync::Arc;

use async_trait::async_trait;

use crate::agents::{parse_json, InsightSource, LegacyInsight};
use crate::cache::ResultCache;
use crate::core::{AnalysisError, ResilientInvoker};
use crate::llm::{GenerationOptions, Message};

const SYSTEM_PROMPT: &str = r#"You are a food intelligence assistant.
Read the product text and describe what the product IS in ONE sentence (max 20 words).
Avoid jargon, medical claims and consumption-frequency advice.

Return JSON only:
{"insight": "one sentence", "uncertainty_note": null or "brief reason if the text is incomplete"}"#;

pub struct LlmInsightService {
    invoker: Arc<ResilientInvoker>,
    cache: Arc<ResultCache<LegacyInsight>>,
}

impl LlmInsightService {
    pub fn new(invoker: Arc<ResilientInvoker>, cache: Arc<ResultCache<LegacyInsight>>) -> Self {
        Self { invoker, cache }
    }
}

#[async_trait]
impl InsightSource for LlmInsightService {
    async fn analyze_text(&self, text: &str) -> Result<LegacyInsight, AnalysisError> {
        if let Some(hit) = self.cache.get(text) {
            tracing::debug!("Legacy insight served from cache");
            return Ok(hit);
        }

        let messages = vec![Message::system(SYSTEM_PROMPT), Message::user(text)];
        let raw = self
            .invoker
            .complete(&messages, GenerationOptions::default())
            .await?;
        let insight: LegacyInsight =
            parse_json(&raw).map_err(|e| AnalysisError::MalformedResponse {
                stage: "legacy insight",
                detail: e.to_string(),
            })?;

        self.cache.set(text, insight.clone());
        Ok(insight)
    }
}
