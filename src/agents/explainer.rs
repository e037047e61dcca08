//! 解释 Agent：把已算出的决策讲给普通消费者听
//!
//! 只解释，不改判；失败时由编排器换用 `fallback_explanation` / `fallback_quick_insight`。

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::agents::{parse_json, ConsumerExplanation, Explainer, QuickInsight};
use crate::core::{AnalysisError, ResilientInvoker};
use crate::decision::{Decision, StructuredAnalysis, MAX_KEY_SIGNALS};
use crate::llm::{GenerationOptions, Message};

const EXPLAIN_SYSTEM_PROMPT: &str = r#"You are a consumer food explanation assistant.
Explain a pre-computed decision clearly and calmly, in simple everyday language.
Avoid fear-based tone, medical claims and consumption-frequency language.
Focus on what the product IS and its characteristics."#;

const QUICK_SYSTEM_PROMPT: &str = r#"You are a food intelligence assistant.
Generate a ONE-SENTENCE summary (max 15 words) that gives instant understanding.
Be clear and direct, avoid jargon and consumption-frequency language."#;

pub const FALLBACK_WHEN_IT_MAKES_SENSE: &str =
    "Consider your individual dietary needs and preferences";
pub const FALLBACK_WHAT_TO_KNOW: &str = "This analysis is informational and not medical advice";

/// 解释失败时的中性兜底：直接列出关键信号
pub fn fallback_explanation(decision: &Decision) -> ConsumerExplanation {
    ConsumerExplanation {
        why_this_matters: decision
            .key_signals
            .iter()
            .take(MAX_KEY_SIGNALS)
            .cloned()
            .collect(),
        when_it_makes_sense: FALLBACK_WHEN_IT_MAKES_SENSE.to_string(),
        what_to_know: FALLBACK_WHAT_TO_KNOW.to_string(),
    }
}

/// 速览失败时由首条信号拼出一句话
pub fn fallback_quick_insight(decision: &Decision) -> QuickInsight {
    let summary = match decision.key_signals.first() {
        Some(signal) => format!(
            "{} - analyzed based on ingredient profile.",
            signal.to_lowercase()
        ),
        None => "Analyzed based on ingredient profile.".to_string(),
    };
    QuickInsight {
        summary,
        uncertainty_reason: None,
    }
}

/// 枚举以 wire 名写入 prompt（如 "high"）
fn wire_name<T: Serialize>(value: &T) -> String {
    serde_json::to_value(value)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default()
}

pub struct LlmExplainer {
    invoker: Arc<ResilientInvoker>,
}

impl LlmExplainer {
    pub fn new(invoker: Arc<ResilientInvoker>) -> Self {
        Self { invoker }
    }

    fn explain_prompt(decision: &Decision) -> String {
        let signals: Vec<String> = decision
            .key_signals
            .iter()
            .map(|s| format!("- {s}"))
            .collect();
        format!(
            r#"Using the key signals below, explain the product characteristics to a general consumer.

KEY SIGNALS:
{}

OUTPUT FORMAT (STRICT JSON):
{{
  "why_this_matters": ["up to three short sentences, max 12 words each"],
  "when_it_makes_sense": "one sentence, max 15 words, about when this product fits well",
  "what_to_know": "one sentence, max 15 words, key takeaway"
}}"#,
            signals.join("\n")
        )
    }

    fn quick_prompt(decision: &Decision, analysis: &StructuredAnalysis) -> String {
        format!(
            r#"Create a one-sentence summary for this product:

Key Signals: {}
Processing Level: {}
Sugar Dominant: {}
Energy Release: {}

Return JSON:
{{"summary": "one clear sentence", "uncertainty_reason": null or "brief reason if information is incomplete"}}"#,
            decision.key_signals.join(", "),
            wire_name(&analysis.ingredient_summary.processing_level),
            analysis.food_properties.sugar_dominant,
            wire_name(&analysis.food_properties.energy_release_pattern),
        )
    }
}

#[async_trait]
impl Explainer for LlmExplainer {
    async fn explain(&self, decision: &Decision) -> Result<ConsumerExplanation, AnalysisError> {
        let messages = vec![
            Message::system(EXPLAIN_SYSTEM_PROMPT),
            Message::user(Self::explain_prompt(decision)),
        ];
        let raw = self
            .invoker
            .complete(&messages, GenerationOptions::with_temperature(0.5))
            .await?;
        let mut explanation: ConsumerExplanation =
            parse_json(&raw).map_err(|e| AnalysisError::MalformedResponse {
                stage: "explanation",
                detail: e.to_string(),
            })?;
        explanation.why_this_matters.truncate(MAX_KEY_SIGNALS);
        Ok(explanation)
    }

    async fn quick_insight(
        &self,
        decision: &Decision,
        analysis: &StructuredAnalysis,
    ) -> Result<QuickInsight, AnalysisError> {
        let messages = vec![
            Message::system(QUICK_SYSTEM_PROMPT),
            Message::user(Self::quick_prompt(decision, analysis)),
        ];
        let raw = self
            .invoker
            .complete(&messages, GenerationOptions::with_temperature(0.4))
            .await?;
        parse_json(&raw).map_err(|e| AnalysisError::MalformedResponse {
            stage: "quick insight",
            detail: e.to_string(),
        })
    }
}
