//! 编排器集成测试：真实 Runtime + Mock 提供方，以及桩协作方

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use unlabel::agents::{
    ConsumerExplanation, Explainer, IngredientTranslation, InsightSource, Intent,
    IntentClassifier, Interpreter, LegacyInsight, QuickInsight, Translator,
};
use unlabel::cache::ResultCache;
use unlabel::config::AppConfig;
use unlabel::core::{
    AnalysisError, Collaborators, DecisionRequest, InvokeError, Orchestrator, ProviderError,
    ResponseConfidence, Runtime,
};
use unlabel::decision::{Decision, StructuredAnalysis};
use unlabel::llm::{Message, MockClientFactory};

const ANALYSIS: &str = r#"{
  "ingredient_summary": {
    "primary_components": ["sugar", "wheat flour"],
    "added_sugars_present": true,
    "sweetener_type": "added",
    "fiber_level": "low",
    "protein_level": "low",
    "fat_level": "moderate",
    "processing_level": "high",
    "ultra_processed_markers": ["E471", "flavouring"],
    "ingredient_count": 18
  },
  "food_properties": {
    "sugar_dominant": true,
    "fiber_protein_support": "none",
    "energy_release_pattern": "rapid",
    "satiety_support": "low",
    "formulation_complexity": "complex"
  },
  "confidence_notes": {"data_completeness": "medium", "ambiguity_flags": ["flavouring unspecified"]}
}"#;

/// 按 system prompt 识别是哪个协作方在调用
fn route(messages: &[Message]) -> &'static str {
    let system = messages.first().map(|m| m.content.as_str()).unwrap_or_default();
    if system.contains("classify the intent") {
        "intent"
    } else if system.contains("interpretation assistant") {
        "interpret"
    } else if system.contains("Read the product text") {
        "insight"
    } else if system.contains("ONE-SENTENCE") {
        "quick"
    } else if system.contains("explanation assistant") {
        "explain"
    } else if system.contains("plain language") {
        "translate"
    } else {
        "unknown"
    }
}

fn happy_reply(stage: &str) -> Result<String, ProviderError> {
    Ok(match stage {
        "intent" => r#"{"intent": "quick_yes_no"}"#.to_string(),
        "interpret" => format!("```json\n{ANALYSIS}\n```"),
        "insight" => r#"{"insight": "A sweet biscuit", "uncertainty_note": null}"#.to_string(),
        "quick" => r#"{"summary": "Sugary snack", "uncertainty_reason": null}"#.to_string(),
        "explain" => r#"{"why_this_matters": ["a", "b", "c", "d"],
                        "when_it_makes_sense": "As a treat", "what_to_know": "Mostly sugar"}"#
            .to_string(),
        "translate" => {
            r#"{"translations": [{"term": "E471", "plain_meaning": "an emulsifier"}]}"#.to_string()
        }
        other => return Err(ProviderError::fatal(format!("unexpected stage {other}"))),
    })
}

/// 记录每次调用的阶段与 user 消息
#[derive(Clone, Default)]
struct Transcript(Arc<Mutex<Vec<(String, String)>>>);

impl Transcript {
    fn record(&self, messages: &[Message]) -> &'static str {
        let stage = route(messages);
        let user = messages.last().map(|m| m.content.clone()).unwrap_or_default();
        self.0.lock().unwrap().push((stage.to_string(), user));
        stage
    }

    fn stages(&self) -> Vec<String> {
        self.0.lock().unwrap().iter().map(|(s, _)| s.clone()).collect()
    }

    fn count(&self, stage: &str) -> usize {
        self.stages().iter().filter(|s| *s == stage).count()
    }

    fn user_message(&self, stage: &str) -> Option<String> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .find(|(s, _)| s == stage)
            .map(|(_, u)| u.clone())
    }
}

fn runtime_with<F>(keys: usize, transcript: Transcript, reply: F) -> Runtime
where
    F: Fn(&str) -> Result<String, ProviderError> + Send + Sync + 'static,
{
    let factory = MockClientFactory::new(move |_, messages| reply(transcript.record(messages)));
    let keys = (0..keys).map(|i| format!("key-{i}")).collect();
    Runtime::with_factory(&AppConfig::default(), keys, Arc::new(factory)).unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_full_flow_and_cache_hit_on_normalized_text() {
    let transcript = Transcript::default();
    let runtime = runtime_with(2, transcript.clone(), happy_reply);
    let orchestrator = runtime.orchestrator();

    let response = orchestrator
        .process(&DecisionRequest::new("Sugar, wheat flour, E471"), None)
        .await
        .unwrap();

    assert_eq!(response.intent_classified, Intent::QuickYesNo);
    assert_eq!(
        response.key_signals,
        vec![
            "Highly processed",
            "Contains 2 ultra-processed marker(s)",
            "Sugar-dominant formulation",
        ]
    );
    assert_eq!(response.quick_insight.summary, "A sweet biscuit");
    assert_eq!(response.explanation.why_this_matters, vec!["a", "b", "c"]);
    assert_eq!(response.ingredient_translations[0].term, "E471");
    assert_eq!(response.uncertainty_flags, vec!["flavouring unspecified"]);
    assert_eq!(response.confidence, ResponseConfidence::Full);
    assert!(response.degraded_steps.is_empty());
    // 有旧版摘要时不再生成速览
    assert_eq!(transcript.count("quick"), 0);

    let calls_before = transcript.stages().len();
    let cached = orchestrator
        .process(&DecisionRequest::new("  sugar, WHEAT flour, e471 "), None)
        .await
        .unwrap();
    assert_eq!(cached, response);
    assert_eq!(transcript.stages().len(), calls_before);

    let stats = runtime.stats();
    assert_eq!(stats.decision_cache.hits, 1);
    assert_eq!(stats.decision_cache.size, 1);
    assert_eq!(stats.analysis_cache.size, 1);
}

#[tokio::test(start_paused = true)]
async fn test_legacy_failure_is_tolerated() {
    let transcript = Transcript::default();
    let runtime = runtime_with(1, transcript.clone(), |stage| match stage {
        "insight" => Err(ProviderError::fatal("safety block")),
        other => happy_reply(other),
    });

    let response = runtime
        .orchestrator()
        .process(&DecisionRequest::new("biscuits"), None)
        .await
        .unwrap();

    assert_eq!(response.quick_insight.summary, "Sugary snack");
    assert_eq!(response.degraded_steps, vec!["legacy_insight"]);
    assert_eq!(response.confidence, ResponseConfidence::Reduced);
    assert_eq!(response.intent_classified, Intent::QuickYesNo);
    assert_eq!(
        response.key_signals,
        vec![
            "Highly processed",
            "Contains 2 ultra-processed marker(s)",
            "Sugar-dominant formulation",
        ]
    );
    assert_eq!(transcript.count("interpret"), 1);

    // 降级结果不进缓存，同样的请求会重新走完整流程
    assert!(runtime.decision_cache().is_empty());
    runtime
        .orchestrator()
        .process(&DecisionRequest::new("biscuits"), None)
        .await
        .unwrap();
    assert_eq!(transcript.count("interpret"), 2);
    assert_eq!(runtime.stats().decision_cache.hits, 0);
}

#[tokio::test(start_paused = true)]
async fn test_explanation_and_translation_fallbacks() {
    let runtime = runtime_with(1, Transcript::default(), |stage| match stage {
        "explain" | "translate" | "insight" | "quick" => Err(ProviderError::fatal("boom")),
        other => happy_reply(other),
    });

    let response = runtime
        .orchestrator()
        .process(&DecisionRequest::new("biscuits"), None)
        .await
        .unwrap();

    assert_eq!(
        response.explanation.why_this_matters,
        response.key_signals
    );
    assert_eq!(
        response.explanation.when_it_makes_sense,
        "Consider your individual dietary needs and preferences"
    );
    assert_eq!(
        response.explanation.what_to_know,
        "This analysis is informational and not medical advice"
    );
    assert_eq!(
        response.quick_insight.summary,
        "highly processed - analyzed based on ingredient profile."
    );
    assert!(response.ingredient_translations.is_empty());
    assert_eq!(
        response.degraded_steps,
        vec!["legacy_insight", "explanation", "quick_insight", "translation"]
    );
    assert_eq!(response.confidence, ResponseConfidence::Reduced);
    assert!(runtime.decision_cache().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_intent_failure_is_fatal() {
    let transcript = Transcript::default();
    let runtime = runtime_with(2, transcript.clone(), |stage| match stage {
        "intent" => Err(ProviderError::classify("invalid argument")),
        other => happy_reply(other),
    });

    let err = runtime
        .orchestrator()
        .process(&DecisionRequest::new("biscuits"), None)
        .await
        .unwrap_err();

    assert!(matches!(err, AnalysisError::Invoke(InvokeError::Operation(_))));
    assert!(!err.is_temporary());
    // 扇出是 join：其余两个任务照常跑完
    assert_eq!(transcript.count("interpret"), 1);
    assert_eq!(transcript.count("insight"), 1);
    assert_eq!(transcript.count("explain"), 0);
    assert!(runtime.decision_cache().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_interpretation_failure_is_fatal() {
    let runtime = runtime_with(1, Transcript::default(), |stage| match stage {
        "interpret" => Ok("Sorry, I can't read that label.".to_string()),
        other => happy_reply(other),
    });

    let err = runtime
        .orchestrator()
        .process(&DecisionRequest::new("blurry photo text"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, AnalysisError::Interpretation(_)));
}

#[tokio::test(start_paused = true)]
async fn test_user_intent_skips_classifier() {
    let transcript = Transcript::default();
    let runtime = runtime_with(1, transcript.clone(), happy_reply);

    let request = DecisionRequest {
        user_intent: Some(Intent::RiskCheck),
        ..DecisionRequest::new("peanuts")
    };
    let response = runtime.orchestrator().process(&request, None).await.unwrap();

    assert_eq!(response.intent_classified, Intent::RiskCheck);
    assert_eq!(transcript.count("intent"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_context_bypasses_cache() {
    let transcript = Transcript::default();
    let runtime = runtime_with(1, transcript.clone(), happy_reply);
    let orchestrator = runtime.orchestrator();
    let request = DecisionRequest::new("oat bar");

    orchestrator
        .process(&request, Some("I am diabetic"))
        .await
        .unwrap();
    assert_eq!(
        transcript.user_message("intent").as_deref(),
        Some("Previous context: I am diabetic\n\nCurrent query: oat bar")
    );
    assert!(runtime.decision_cache().is_empty());

    // 请求自带上下文同样绕过缓存
    let with_ctx = DecisionRequest {
        conversation_context: Some("I am diabetic".into()),
        ..request.clone()
    };
    orchestrator.process(&with_ctx, None).await.unwrap();
    assert_eq!(transcript.count("interpret"), 2);
    assert_eq!(runtime.decision_cache().stats().hits, 0);
    assert_eq!(runtime.decision_cache().stats().misses, 0);
}

#[tokio::test(start_paused = true)]
async fn test_all_keys_exhausted_surfaces() {
    let runtime = runtime_with(2, Transcript::default(), |_| {
        Err(ProviderError::classify("429 Resource exhausted"))
    });

    let err = runtime
        .orchestrator()
        .process(&DecisionRequest::new("biscuits"), None)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AnalysisError::Invoke(InvokeError::AllCredentialsExhausted { attempts: 2, .. })
    ));
    assert!(err.is_temporary());
    let pool = runtime.key_pool().stats();
    assert_eq!(pool.failed_count, 2);
    assert_eq!(pool.available_count, 0);
}

// ---- 桩协作方：验证扇出并发 ----

const STEP: Duration = Duration::from_millis(100);

struct SlowIntent;

#[async_trait]
impl IntentClassifier for SlowIntent {
    async fn classify(&self, _text: &str) -> Result<Intent, AnalysisError> {
        tokio::time::sleep(STEP).await;
        Ok(Intent::Curiosity)
    }
}

struct SlowInterpreter;

#[async_trait]
impl Interpreter for SlowInterpreter {
    async fn interpret(
        &self,
        _text: &str,
        _nutrition: Option<&str>,
    ) -> Result<StructuredAnalysis, AnalysisError> {
        tokio::time::sleep(STEP).await;
        serde_json::from_str(ANALYSIS).map_err(|e| AnalysisError::Interpretation(e.to_string()))
    }
}

struct SlowInsight;

#[async_trait]
impl InsightSource for SlowInsight {
    async fn analyze_text(&self, _text: &str) -> Result<LegacyInsight, AnalysisError> {
        tokio::time::sleep(STEP).await;
        Ok(LegacyInsight {
            insight: String::new(),
            uncertainty_note: None,
        })
    }
}

#[derive(Default)]
struct CountingExplainer {
    quick_calls: AtomicUsize,
}

#[async_trait]
impl Explainer for CountingExplainer {
    async fn explain(&self, decision: &Decision) -> Result<ConsumerExplanation, AnalysisError> {
        Ok(ConsumerExplanation {
            why_this_matters: decision.key_signals.clone(),
            when_it_makes_sense: "Any time".into(),
            what_to_know: "Nothing".into(),
        })
    }

    async fn quick_insight(
        &self,
        _decision: &Decision,
        _analysis: &StructuredAnalysis,
    ) -> Result<QuickInsight, AnalysisError> {
        self.quick_calls.fetch_add(1, Ordering::SeqCst);
        Ok(QuickInsight {
            summary: "From explainer".into(),
            uncertainty_reason: Some("partial label".into()),
        })
    }
}

struct NoTranslations;

#[async_trait]
impl Translator for NoTranslations {
    async fn translate(&self, _text: &str) -> Result<Vec<IngredientTranslation>, AnalysisError> {
        Ok(Vec::new())
    }
}

#[tokio::test(start_paused = true)]
async fn test_fan_out_runs_concurrently() {
    let explainer = Arc::new(CountingExplainer::default());
    let orchestrator = Orchestrator::new(
        Collaborators {
            intent: Arc::new(SlowIntent),
            interpreter: Arc::new(SlowInterpreter),
            insight: Arc::new(SlowInsight),
            explainer: explainer.clone(),
            translator: Arc::new(NoTranslations),
        },
        Arc::new(ResultCache::new("decision", 10, Duration::from_secs(60))),
    );

    let started = tokio::time::Instant::now();
    let response = orchestrator
        .process(&DecisionRequest::new("cookies"), None)
        .await
        .unwrap();

    let elapsed = started.elapsed();
    assert!(elapsed >= STEP && elapsed < STEP * 2, "{elapsed:?}");
    // 旧版摘要为空串时改由解释 Agent 生成速览
    assert_eq!(response.quick_insight.summary, "From explainer");
    assert_eq!(
        response.quick_insight.uncertainty_reason.as_deref(),
        Some("partial label")
    );
    assert_eq!(explainer.quick_calls.load(Ordering::SeqCst), 1);
    assert_eq!(response.confidence, ResponseConfidence::Full);
    assert_eq!(orchestrator.cache().len(), 1);
}
