//! 配料翻译：为复杂配料名给出通俗说明

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::agents::{parse_json, IngredientTranslation, Translator};
use crate::core::{AnalysisError, ResilientInvoker};
use crate::llm::{GenerationOptions, Message};

const SYSTEM_PROMPT: &str = r#"You explain complex food ingredient names in plain language.
Pick only the technical, chemical or unfamiliar terms (E-numbers, additives, processed derivatives).
Skip common ingredients such as water, salt, sugar or flour.

Return JSON only:
{"translations": [{"term": "ingredient as written", "plain_meaning": "short plain explanation"}]}"#;

/// 回复可能是包装对象，也可能直接是数组
#[derive(Deserialize)]
#[serde(untagged)]
enum TranslationReply {
    Wrapped {
        #[serde(default)]
        translations: Vec<IngredientTranslation>,
    },
    Bare(Vec<IngredientTranslation>),
}

pub struct LlmTranslator {
    invoker: Arc<ResilientInvoker>,
}

impl LlmTranslator {
    pub fn new(invoker: Arc<ResilientInvoker>) -> Self {
        Self { invoker }
    }
}

#[async_trait]
impl Translator for LlmTranslator {
    async fn translate(&self, text: &str) -> Result<Vec<IngredientTranslation>, AnalysisError> {
        let messages = vec![Message::system(SYSTEM_PROMPT), Message::user(text)];
        let raw = self
            .invoker
            .complete(&messages, GenerationOptions::with_temperature(0.3))
            .await?;
        let reply: TranslationReply =
            parse_json(&raw).map_err(|e| AnalysisError::MalformedResponse {
                stage: "translation",
                detail: e.to_string(),
            })?;
        Ok(match reply {
            TranslationReply::Wrapped { translations } => translations,
            TranslationReply::Bare(list) => list,
        })
    }
}
