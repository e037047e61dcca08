//! 协作 Agent：意图识别、配料解读、旧版摘要、解释、配料翻译
//!
//! 每个角色一个 async trait，编排器只依赖 trait；Llm* 实现均经由 ResilientInvoker 调用提供方。

pub mod explainer;
pub mod insight;
pub mod intent;
pub mod interpreter;
pub mod translator;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::core::AnalysisError;
use crate::decision::{Decision, StructuredAnalysis};

pub use explainer::LlmExplainer;
pub use insight::LlmInsightService;
pub use intent::{Intent, LlmIntentClassifier};
pub use interpreter::LlmInterpreter;
pub use translator::LlmTranslator;

/// 旧版单句摘要（原始文本分析）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyInsight {
    pub insight: String,
    #[serde(default)]
    pub uncertainty_note: Option<String>,
}

/// 一句话速览
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuickInsight {
    pub summary: String,
    #[serde(default)]
    pub uncertainty_reason: Option<String>,
}

/// 面向消费者的解释
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerExplanation {
    pub why_this_matters: Vec<String>,
    pub when_it_makes_sense: String,
    pub what_to_know: String,
}

/// 复杂配料名的通俗说明
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngredientTranslation {
    pub term: String,
    pub plain_meaning: String,
}

#[async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<Intent, AnalysisError>;
}

#[async_trait]
pub trait Interpreter: Send + Sync {
    async fn interpret(
        &self,
        text: &str,
        nutrition: Option<&str>,
    ) -> Result<StructuredAnalysis, AnalysisError>;
}

#[async_trait]
pub trait InsightSource: Send + Sync {
    async fn analyze_text(&self, text: &str) -> Result<LegacyInsight, AnalysisError>;
}

#[async_trait]
pub trait Explainer: Send + Sync {
    async fn explain(&self, decision: &Decision) -> Result<ConsumerExplanation, AnalysisError>;

    async fn quick_insight(
        &self,
        decision: &Decision,
        analysis: &StructuredAnalysis,
    ) -> Result<QuickInsight, AnalysisError>;
}

#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str) -> Result<Vec<IngredientTranslation>, AnalysisError>;
}

/// 从模型输出中取出 JSON：容忍 ```json 代码块与前后杂字
pub(crate) fn parse_json<T: DeserializeOwned>(raw: &str) -> Result<T, serde_json::Error> {
    let trimmed = raw.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .map(|s| s.trim_end().trim_end_matches("```"))
        .unwrap_or(trimmed)
        .trim();

    match serde_json::from_str(body) {
        Ok(value) => Ok(value),
        Err(err) => {
            let start = body.find(['{', '[']);
            let end = body.rfind(['}', ']']);
            match (start, end) {
                (Some(s), Some(e)) if s < e => serde_json::from_str(&body[s..=e]),
                _ => Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_json() {
        let v: LegacyInsight = parse_json(r#"{"insight": "Plain oats"}"#).unwrap();
        assert_eq!(v.insight, "Plain oats");
        assert_eq!(v.uncertainty_note, None);
    }

    #[test]
    fn test_parse_fenced_json() {
        let raw = "```json\n{\"summary\": \"Sweet snack\", \"uncertainty_reason\": null}\n```";
        let v: QuickInsight = parse_json(raw).unwrap();
        assert_eq!(v.summary, "Sweet snack");
    }

    #[test]
    fn test_parse_json_with_chatter() {
        let raw = "Sure! Here you go: [{\"term\": \"E330\", \"plain_meaning\": \"citric acid\"}] Hope that helps.";
        let v: Vec<IngredientTranslation> = parse_json(raw).unwrap();
        assert_eq!(v[0].plain_meaning, "citric acid");
    }

    #[test]
    fn test_parse_garbage_fails() {
        assert!(parse_json::<LegacyInsight>("no json here").is_err());
    }
}
