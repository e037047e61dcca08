//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `UNLABEL__*` 覆盖（双下划线表示嵌套，如 `UNLABEL__LLM__MODEL=gemini-2.5-pro`）。
//! `UNLABEL__LLM__API_KEYS` 按逗号切分为列表。

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub llm: LlmSection,
    pub cache: CacheSection,
}

/// [llm] 段：端点、模型、Key 列表与冷却
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    pub base_url: String,
    pub model: String,
    /// 为空时回退到 GEMINI_API_KEYS / GEMINI_API_KEY
    pub api_keys: Vec<String>,
    /// 失败 Key 的冷却时长（秒）
    pub cooldown_secs: u64,
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            base_url: crate::llm::GEMINI_OPENAI_BASE_URL.to_string(),
            model: crate::llm::GEMINI_FLASH.to_string(),
            api_keys: Vec::new(),
            cooldown_secs: 60,
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

impl LlmSection {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    /// 解析最终使用的 Key 列表：配置 > GEMINI_API_KEYS（逗号分隔）> GEMINI_API_KEY
    pub fn resolve_api_keys(&self) -> Vec<String> {
        self.resolve_api_keys_with(|name| std::env::var(name).ok())
    }

    fn resolve_api_keys_with(&self, env: impl Fn(&str) -> Option<String>) -> Vec<String> {
        let configured = clean_keys(self.api_keys.iter().map(String::as_str));
        if !configured.is_empty() {
            return configured;
        }
        if let Some(list) = env("GEMINI_API_KEYS") {
            let keys = clean_keys(list.split(','));
            if !keys.is_empty() {
                return keys;
            }
        }
        env("GEMINI_API_KEY")
            .map(|k| clean_keys(std::iter::once(k.as_str())))
            .unwrap_or_default()
    }
}

fn clean_keys<'a>(keys: impl Iterator<Item = &'a str>) -> Vec<String> {
    keys.map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmTimeoutsSection {
    /// 单次 HTTP 请求超时（秒）
    pub request: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self { request: 60 }
    }
}

/// [cache] 段：两个缓存实例各自的容量与 TTL
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    pub analysis: CacheTierSection,
    pub decision: CacheTierSection,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            analysis: CacheTierSection {
                max_size: 1000,
                ttl_secs: 3600,
            },
            decision: CacheTierSection {
                max_size: 500,
                ttl_secs: 1800,
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheTierSection {
    pub max_size: usize,
    pub ttl_secs: u64,
}

impl CacheTierSection {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// 默认配置文件的查找顺序（不含扩展名）
const DEFAULT_CONFIG_NAMES: &[&str] = &["config/default", "../config/default", "default"];

/// 从 config 目录加载配置，环境变量 UNLABEL__* 可覆盖
///
/// 0. 以 `CacheSection::default()` 作为缓存各字段的底值，只覆盖部分字段时其余字段保持默认
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 UNLABEL__*
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    build_config(DEFAULT_CONFIG_NAMES, config_path, None)
}

fn build_config(
    default_names: &[&str],
    config_path: Option<PathBuf>,
    env_source: Option<HashMap<String, String>>,
) -> Result<AppConfig, config::ConfigError> {
    let cache = CacheSection::default();
    let mut builder = config::Config::builder()
        .set_default("cache.analysis.max_size", cache.analysis.max_size as u64)?
        .set_default("cache.analysis.ttl_secs", cache.analysis.ttl_secs)?
        .set_default("cache.decision.max_size", cache.decision.max_size as u64)?
        .set_default("cache.decision.ttl_secs", cache.decision.ttl_secs)?;

    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("UNLABEL")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("llm.api_keys")
            .try_parsing(true)
            .source(env_source.map(|vars| vars.into_iter().collect())),
    );

    builder.build()?.try_deserialize()
}
