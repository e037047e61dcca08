//! 分析编排器：一次请求的完整流程
//!
//! 缓存查找 → 并发扇出（意图 / 旧版摘要 / 配料解读）→ 规则决策 → 解释 → 速览 → 配料翻译 → 写回缓存（仅完整结果）。
//! 意图与解读失败即请求失败；其余步骤失败时以 DegradedDefault 兜底，并在响应中标记降级。

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::Instrument;

use crate::agents::explainer::{fallback_explanation, fallback_quick_insight};
use crate::agents::{
    ConsumerExplanation, Explainer, IngredientTranslation, InsightSource, Intent,
    IntentClassifier, Interpreter, QuickInsight, Translator,
};
use crate::cache::ResultCache;
use crate::core::{or_degraded, AnalysisError, DegradedDefault};
use crate::decision::{DecisionEngine, StructuredAnalysis};

/// 一次分析请求
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecisionRequest {
    pub text: String,
    /// 调用方已知意图时跳过意图识别
    #[serde(default)]
    pub user_intent: Option<Intent>,
    #[serde(default)]
    pub include_nutrition: Option<String>,
    #[serde(default)]
    pub conversation_context: Option<String>,
}

impl DecisionRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseConfidence {
    /// 所有步骤均正常完成
    Full,
    /// 至少一个非关键步骤使用了兜底值
    Reduced,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionResponse {
    pub quick_insight: QuickInsight,
    pub explanation: ConsumerExplanation,
    pub intent_classified: Intent,
    pub key_signals: Vec<String>,
    pub ingredient_translations: Vec<IngredientTranslation>,
    pub uncertainty_flags: Vec<String>,
    pub structured_analysis: StructuredAnalysis,
    pub confidence: ResponseConfidence,
    /// 使用了兜底值的步骤名
    #[serde(default)]
    pub degraded_steps: Vec<String>,
}

/// 编排器依赖的协作方
pub struct Collaborators {
    pub intent: Arc<dyn IntentClassifier>,
    pub interpreter: Arc<dyn Interpreter>,
    pub insight: Arc<dyn InsightSource>,
    pub explainer: Arc<dyn Explainer>,
    pub translator: Arc<dyn Translator>,
}

pub struct Orchestrator {
    agents: Collaborators,
    engine: DecisionEngine,
    cache: Arc<ResultCache<DecisionResponse>>,
}

/// 降级步骤收集器
#[derive(Default)]
struct Degradation {
    steps: Vec<String>,
}

impl Degradation {
    fn settle<T>(&mut self, step: &'static str, result: Result<T, DegradedDefault<T>>) -> T {
        match result {
            Ok(value) => value,
            Err(DegradedDefault { value, reason }) => {
                tracing::warn!(step, reason = %reason, "Step degraded, using fallback");
                self.steps.push(step.to_string());
                value
            }
        }
    }
}

impl Orchestrator {
    pub fn new(agents: Collaborators, cache: Arc<ResultCache<DecisionResponse>>) -> Self {
        Self {
            agents,
            engine: DecisionEngine::new(),
            cache,
        }
    }

    pub fn cache(&self) -> &Arc<ResultCache<DecisionResponse>> {
        &self.cache
    }

    /// 处理一次请求。context 与 request.conversation_context 任一存在时不读写缓存。
    pub async fn process(
        &self,
        request: &DecisionRequest,
        context: Option<&str>,
    ) -> Result<DecisionResponse, AnalysisError> {
        let span = tracing::info_span!("process", request_id = %uuid::Uuid::new_v4());
        self.process_inner(request, context).instrument(span).await
    }

    async fn process_inner(
        &self,
        request: &DecisionRequest,
        context: Option<&str>,
    ) -> Result<DecisionResponse, AnalysisError> {
        let context = request
            .conversation_context
            .as_deref()
            .or(context)
            .filter(|c| !c.trim().is_empty());

        if context.is_none() {
            if let Some(cached) = self.cache.get(&request.text) {
                tracing::info!("Returning cached decision");
                return Ok(cached);
            }
        }

        let intent_text = match context {
            Some(ctx) => format!("Previous context: {ctx}\n\nCurrent query: {}", request.text),
            None => request.text.clone(),
        };

        let intent_task = async {
            match request.user_intent {
                Some(intent) => Ok(intent),
                None => self.agents.intent.classify(&intent_text).await,
            }
        };
        let legacy_task = self.agents.insight.analyze_text(&request.text);
        let interpret_task = self
            .agents
            .interpreter
            .interpret(&request.text, request.include_nutrition.as_deref());

        let (intent, legacy, analysis) = tokio::join!(intent_task, legacy_task, interpret_task);

        let mut degradation = Degradation::default();
        let legacy = degradation.settle("legacy_insight", or_degraded(legacy.map(Some), || None));
        let intent = intent?;
        let analysis = analysis?;

        let decision = self.engine.decide(&analysis);

        let explanation = degradation.settle(
            "explanation",
            or_degraded(self.agents.explainer.explain(&decision).await, || {
                fallback_explanation(&decision)
            }),
        );

        let quick_insight = match legacy.filter(|l| !l.insight.trim().is_empty()) {
            Some(legacy) => QuickInsight {
                summary: legacy.insight,
                uncertainty_reason: legacy.uncertainty_note,
            },
            None => degradation.settle(
                "quick_insight",
                or_degraded(
                    self.agents.explainer.quick_insight(&decision, &analysis).await,
                    || fallback_quick_insight(&decision),
                ),
            ),
        };

        let ingredient_translations = degradation.settle(
            "translation",
            or_degraded(self.agents.translator.translate(&request.text).await, Vec::new),
        );

        let confidence = if degradation.steps.is_empty() {
            ResponseConfidence::Full
        } else {
            ResponseConfidence::Reduced
        };

        let response = DecisionResponse {
            quick_insight,
            explanation,
            intent_classified: intent,
            key_signals: decision.key_signals,
            ingredient_translations,
            uncertainty_flags: analysis.confidence_notes.ambiguity_flags.clone(),
            structured_analysis: analysis,
            confidence,
            degraded_steps: degradation.steps,
        };

        // 降级结果不写缓存，下次同样的请求会重新计算
        if context.is_none() && response.degraded_steps.is_empty() {
            self.cache.set(&request.text, response.clone());
            tracing::debug!("Cached decision");
        } else if !response.degraded_steps.is_empty() {
            tracing::debug!(steps = ?response.degraded_steps, "Degraded decision not cached");
        }

        Ok(response)
    }
}
