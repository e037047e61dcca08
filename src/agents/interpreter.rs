//! 配料解读：原始配料 / 营养文本 → StructuredAnalysis
//!
//! 只产出中性信号，不下结论；结论由 DecisionEngine 给出。

use std::sync::Arc;

use async_trait::async_trait;

use crate::agents::{parse_json, Interpreter};
use crate::core::{AnalysisError, ResilientInvoker};
use crate::decision::StructuredAnalysis;
use crate::llm::{GenerationOptions, Message};

const SYSTEM_PROMPT: &str = r#"You are a food-ingredient interpretation assistant.
Convert food ingredient and nutrition information into structured, neutral signals.
Do not give medical advice, verdicts, health labels or consumption recommendations.
Your output feeds a separate rule-based decision engine."#;

const OUTPUT_FORMAT: &str = r#"OUTPUT FORMAT (STRICT JSON):
{
  "ingredient_summary": {
    "primary_components": [],
    "added_sugars_present": true/false,
    "sweetener_type": "none | natural | added | mixed",
    "fiber_level": "none | low | moderate | high",
    "protein_level": "none | low | moderate | high",
    "fat_level": "none | low | moderate | high",
    "processing_level": "low | moderate | high",
    "ultra_processed_markers": [],
    "ingredient_count": number
  },
  "food_properties": {
    "sugar_dominant": true/false,
    "fiber_protein_support": "none | weak | moderate | strong",
    "energy_release_pattern": "rapid | mixed | slow",
    "satiety_support": "low | moderate | high",
    "formulation_complexity": "simple | moderate | complex"
  },
  "confidence_notes": {
    "data_completeness": "high | medium | low",
    "ambiguity_flags": []
  }
}
If information is missing, infer conservatively and flag it in ambiguity_flags.
Do not add extra fields."#;

pub struct LlmInterpreter {
    invoker: Arc<ResilientInvoker>,
}

impl LlmInterpreter {
    pub fn new(invoker: Arc<ResilientInvoker>) -> Self {
        Self { invoker }
    }

    fn user_prompt(text: &str, nutrition: Option<&str>) -> String {
        let mut prompt = format!("Analyze the following food product information.\n\nINPUT:\n{text}\n");
        if let Some(nutrition) = nutrition.filter(|n| !n.trim().is_empty()) {
            prompt.push_str(&format!("Nutrition Info: {nutrition}\n"));
        }
        prompt.push('\n');
        prompt.push_str(OUTPUT_FORMAT);
        prompt
    }
}

#[async_trait]
impl Interpreter for LlmInterpreter {
    async fn interpret(
        &self,
        text: &str,
        nutrition: Option<&str>,
    ) -> Result<StructuredAnalysis, AnalysisError> {
        let messages = vec![
            Message::system(SYSTEM_PROMPT),
            Message::user(Self::user_prompt(text, nutrition)),
        ];
        let raw = self
            .invoker
            .complete(&messages, GenerationOptions::with_temperature(0.2))
            .await?;

        parse_json(&raw).map_err(|e| {
            tracing::warn!(error = %e, "Structured analysis did not parse");
            AnalysisError::Interpretation(e.to_string())
        })
    }
}
