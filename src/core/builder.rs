//! 运行时构建：组合根
//!
//! KeyPool、ResilientInvoker、两个 ResultCache、各协作 Agent 与 Orchestrator 在此各建一次，
//! 共享状态全部由 Runtime 持有的 Arc 承载，没有全局变量。

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::agents::{
    LegacyInsight, LlmExplainer, LlmInsightService, LlmIntentClassifier, LlmInterpreter,
    LlmTranslator,
};
use crate::cache::{CacheStats, ResultCache};
use crate::config::AppConfig;
use crate::core::orchestrator::{Collaborators, DecisionResponse, Orchestrator};
use crate::core::{ConfigurationError, KeyPool, KeyPoolStats, ResilientInvoker};
use crate::llm::{ClientFactory, OpenAiClientFactory};

/// 运行期诊断快照
#[derive(Debug, Clone, Serialize)]
pub struct RuntimeStats {
    pub key_pool: KeyPoolStats,
    pub analysis_cache: CacheStats,
    pub decision_cache: CacheStats,
}

pub struct Runtime {
    key_pool: Arc<KeyPool>,
    invoker: Arc<ResilientInvoker>,
    analysis_cache: Arc<ResultCache<LegacyInsight>>,
    decision_cache: Arc<ResultCache<DecisionResponse>>,
    orchestrator: Orchestrator,
}

impl Runtime {
    /// 按配置连接真实提供方（OpenAI 兼容端点）
    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigurationError> {
        let factory = OpenAiClientFactory::new(
            &config.llm.base_url,
            &config.llm.model,
            Duration::from_secs(config.llm.timeouts.request),
        )?;
        tracing::info!(model = %config.llm.model, "Using OpenAI-compatible provider");
        Self::with_factory(config, config.llm.resolve_api_keys(), Arc::new(factory))
    }

    /// 指定 Key 列表与客户端工厂（测试时传入 MockClientFactory）
    pub fn with_factory(
        config: &AppConfig,
        api_keys: Vec<String>,
        factory: Arc<dyn ClientFactory>,
    ) -> Result<Self, ConfigurationError> {
        let key_pool = Arc::new(KeyPool::new(api_keys, config.llm.cooldown())?);
        tracing::info!(keys = key_pool.len(), "Key pool initialized");

        let invoker = Arc::new(ResilientInvoker::new(key_pool.clone(), factory));
        let analysis_cache = Arc::new(ResultCache::new(
            "analysis",
            config.cache.analysis.max_size,
            config.cache.analysis.ttl(),
        ));
        let decision_cache = Arc::new(ResultCache::new(
            "decision",
            config.cache.decision.max_size,
            config.cache.decision.ttl(),
        ));

        let agents = Collaborators {
            intent: Arc::new(LlmIntentClassifier::new(invoker.clone())),
            interpreter: Arc::new(LlmInterpreter::new(invoker.clone())),
            insight: Arc::new(LlmInsightService::new(
                invoker.clone(),
                analysis_cache.clone(),
            )),
            explainer: Arc::new(LlmExplainer::new(invoker.clone())),
            translator: Arc::new(LlmTranslator::new(invoker.clone())),
        };
        let orchestrator = Orchestrator::new(agents, decision_cache.clone());

        Ok(Self {
            key_pool,
            invoker,
            analysis_cache,
            decision_cache,
            orchestrator,
        })
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn invoker(&self) -> &Arc<ResilientInvoker> {
        &self.invoker
    }

    pub fn key_pool(&self) -> &Arc<KeyPool> {
        &self.key_pool
    }

    pub fn analysis_cache(&self) -> &Arc<ResultCache<LegacyInsight>> {
        &self.analysis_cache
    }

    pub fn decision_cache(&self) -> &Arc<ResultCache<DecisionResponse>> {
        &self.decision_cache
    }

    pub fn stats(&self) -> RuntimeStats {
        RuntimeStats {
            key_pool: self.key_pool.stats(),
            analysis_cache: self.analysis_cache.stats(),
            decision_cache: self.decision_cache.stats(),
        }
    }
}

/// 便捷函数：从默认路径加载配置并构建 Runtime
pub fn create_runtime(config_path: Option<PathBuf>) -> Result<Runtime, ConfigurationError> {
    let config = crate::config::load_config(config_path)?;
    Runtime::from_config(&config)
}
