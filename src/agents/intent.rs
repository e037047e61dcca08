//! 意图识别
//!
//! 轻量分类，在分析前判断用户想要什么样的回答。

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::agents::{parse_json, IntentClassifier};
use crate::core::{AnalysisError, ResilientInvoker};
use crate::llm::{GenerationOptions, Message};

/// 用户意图
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// "Is this healthy?" 一类是/否问题
    QuickYesNo,
    /// 与其它产品比较
    Comparison,
    /// 过敏、风险、安全性
    RiskCheck,
    /// 泛泛了解
    #[default]
    Curiosity,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::QuickYesNo => "quick_yes_no",
            Intent::Comparison => "comparison",
            Intent::RiskCheck => "risk_check",
            Intent::Curiosity => "curiosity",
        }
    }

    /// 宽松解析：未知标签返回 None
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "quick_yes_no" => Some(Intent::QuickYesNo),
            "comparison" => Some(Intent::Comparison),
            "risk_check" => Some(Intent::RiskCheck),
            "curiosity" => Some(Intent::Curiosity),
            _ => None,
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const SYSTEM_PROMPT: &str = r#"You classify the intent behind a question about a food product.

Return ONLY a JSON object: {"intent": "quick_yes_no | comparison | risk_check | curiosity"}

- quick_yes_no: simple yes/no questions like "Is this healthy?" or "Should I eat this?"
- comparison: comparing products, "better than X?"
- risk_check: risks, allergies, concerns, "Is this safe?"
- curiosity: general questions, "What's in this?""#;

#[derive(Deserialize)]
struct IntentReply {
    #[serde(default)]
    intent: String,
}

/// 基于 LLM 的意图识别器
pub struct LlmIntentClassifier {
    invoker: Arc<ResilientInvoker>,
}

impl LlmIntentClassifier {
    pub fn new(invoker: Arc<ResilientInvoker>) -> Self {
        Self { invoker }
    }

    /// 回复 → Intent；无法解析或标签未知时为 Curiosity
    fn interpret_reply(raw: &str) -> Intent {
        let label = match parse_json::<IntentReply>(raw) {
            Ok(reply) => reply.intent,
            Err(_) => raw.trim().trim_matches('"').to_string(),
        };
        Intent::parse(&label).unwrap_or_else(|| {
            tracing::debug!(label = %label, "Unknown intent label, using curiosity");
            Intent::Curiosity
        })
    }
}

#[async_trait]
impl IntentClassifier for LlmIntentClassifier {
    async fn classify(&self, text: &str) -> Result<Intent, AnalysisError> {
        let messages = vec![Message::system(SYSTEM_PROMPT), Message::user(text)];
        let raw = self
            .invoker
            .complete(&messages, GenerationOptions::with_temperature(0.1))
            .await?;
        Ok(Self::interpret_reply(&raw))
    }
}
