//! 错误类型与降级默认值
//!
//! 分层：ConfigurationError（启动期致命）→ ProviderError（单次调用，带 ErrorClass）
//! → InvokeError（轮换后仍失败）→ AnalysisError（整个请求失败）。
//! 非关键步骤不报错，而是以 `Result<T, DegradedDefault<T>>` 携带兜底值。

use thiserror::Error;

/// 触发 Key 轮换的错误特征（小写子串匹配）
const TRANSIENT_SIGNATURES: &[&str] = &[
    "rate limit",
    "quota",
    "resource exhausted",
    "429",
    "too many requests",
    "resource_exhausted",
    "invalid api key",
    "api_key_invalid",
];

/// 结构化错误体中触发 Key 轮换的 code / type（精确匹配）
const TRANSIENT_CODES: &[&str] = &[
    "invalid_api_key",
    "rate_limit_exceeded",
    "insufficient_quota",
    "rate_limit_error",
];

/// 启动期配置错误；出现即不应启动进程
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("No API keys configured (set llm.api_keys, GEMINI_API_KEYS or GEMINI_API_KEY)")]
    NoCredentials,

    #[error("Config load failed: {0}")]
    Load(#[from] config::ConfigError),

    #[error("HTTP client init failed: {0}")]
    HttpClient(String),
}

/// 提供方错误的二分类：换 Key 可能解决 / 换 Key 无济于事
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// 限流、配额、Key 无效等
    Transient,
    /// 输入非法、提供方逻辑错误等
    Fatal,
}

/// 单次提供方调用失败
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ProviderError {
    pub class: ErrorClass,
    pub message: String,
}

impl ProviderError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            class: ErrorClass::Transient,
            message: message.into(),
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            class: ErrorClass::Fatal,
            message: message.into(),
        }
    }

    /// 在调用边界上按错误文本归类，只做一次
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        let class = if TRANSIENT_SIGNATURES.iter().any(|s| lower.contains(s)) {
            ErrorClass::Transient
        } else {
            ErrorClass::Fatal
        };
        Self { class, message }
    }

    /// 已知 HTTP 状态码时优先按状态码归类（429 / 401 / 403 视为 Key 问题）
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        match status {
            429 | 401 | 403 => Self::transient(message),
            _ => Self::classify(message),
        }
    }

    /// 提供方返回结构化错误体时先看 code / type，都不认识再退回文本匹配
    pub fn from_api_code(
        code: Option<&str>,
        kind: Option<&str>,
        message: impl Into<String>,
    ) -> Self {
        let known = [code, kind]
            .into_iter()
            .flatten()
            .any(|c| TRANSIENT_CODES.contains(&c.to_lowercase().as_str()));
        if known {
            Self::transient(message)
        } else {
            Self::classify(message)
        }
    }

    pub fn is_transient(&self) -> bool {
        self.class == ErrorClass::Transient
    }
}

/// ResilientInvoker 的失败结果
#[derive(Error, Debug, Clone)]
pub enum InvokeError {
    #[error("All {attempts} API key attempt(s) failed. Last error: {last}")]
    AllCredentialsExhausted { attempts: usize, last: ProviderError },

    #[error("Provider operation failed: {0}")]
    Operation(ProviderError),
}

/// 一次分析请求的失败结果
#[derive(Error, Debug, Clone)]
pub enum AnalysisError {
    #[error(transparent)]
    Invoke(#[from] InvokeError),

    #[error("Failed to parse structured analysis: {0}")]
    Interpretation(String),

    #[error("Malformed {stage} response: {detail}")]
    MalformedResponse { stage: &'static str, detail: String },
}

impl AnalysisError {
    /// 是否属于临时性服务故障（调用方可稍后重试），而非数据错误
    pub fn is_temporary(&self) -> bool {
        matches!(
            self,
            AnalysisError::Invoke(InvokeError::AllCredentialsExhausted { .. })
        )
    }
}

/// 非关键步骤失败时的兜底值，放在 `Err` 分支里，让降级在类型上可见
#[derive(Debug, Clone, PartialEq)]
pub struct DegradedDefault<T> {
    pub value: T,
    pub reason: String,
}

impl<T> DegradedDefault<T> {
    pub fn new(value: T, reason: impl Into<String>) -> Self {
        Self {
            value,
            reason: reason.into(),
        }
    }
}

/// 将可失败步骤的结果转为 `Result<T, DegradedDefault<T>>`；失败时惰性构造兜底值
pub fn or_degraded<T, E, F>(result: Result<T, E>, fallback: F) -> Result<T, DegradedDefault<T>>
where
    E: std::fmt::Display,
    F: FnOnce() -> T,
{
    result.map_err(|e| DegradedDefault::new(fallback(), e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_rate_limit_variants() {
        for msg in [
            "429 Too Many Requests",
            "Resource exhausted (e.g. check quota).",
            "Rate limit reached for requests",
            "API_KEY_INVALID: API key not valid",
            "Invalid API key provided",
        ] {
            assert!(ProviderError::classify(msg).is_transient(), "{msg}");
        }
    }

    #[test]
    fn test_classify_logic_error_is_fatal() {
        let err = ProviderError::classify("Request contains an invalid argument");
        assert_eq!(err.class, ErrorClass::Fatal);
        assert_eq!(err.to_string(), "Request contains an invalid argument");
    }

    #[test]
    fn test_from_status() {
        assert!(ProviderError::from_status(429, "slow down").is_transient());
        assert!(ProviderError::from_status(401, "unauthorized").is_transient());
        assert!(!ProviderError::from_status(400, "bad request").is_transient());
        assert!(ProviderError::from_status(500, "quota exceeded").is_transient());
    }

    #[test]
    fn test_from_api_code_invalid_api_key() {
        let err = ProviderError::from_api_code(Some("invalid_api_key"), None, "Incorrect key");
        assert!(err.is_transient());
        assert_eq!(err.message, "Incorrect key");
    }

    #[test]
    fn test_from_api_code_rate_limit_exceeded() {
        let err = ProviderError::from_api_code(Some("rate_limit_exceeded"), None, "slow down");
        assert!(err.is_transient());
    }

    #[test]
    fn test_from_api_code_insufficient_quota() {
        let err = ProviderError::from_api_code(None, Some("insufficient_quota"), "billing");
        assert!(err.is_transient());
    }

    #[test]
    fn test_from_api_code_rate_limit_error() {
        let err = ProviderError::from_api_code(None, Some("rate_limit_error"), "busy");
        assert!(err.is_transient());
    }

    #[test]
    fn test_from_api_code_unknown_falls_back_to_text() {
        let err = ProviderError::from_api_code(
            Some("invalid_request_error"),
            Some("invalid_request_error"),
            "Unsupported parameter",
        );
        assert_eq!(err.class, ErrorClass::Fatal);
        assert!(ProviderError::from_api_code(None, None, "RESOURCE_EXHAUSTED").is_transient());
    }

    #[test]
    fn test_or_degraded() {
        let ok: Result<u8, String> = Ok(1);
        assert_eq!(or_degraded(ok, || 0), Ok(1));

        let err: Result<u8, String> = Err("boom".into());
        let degraded = or_degraded(err, || 7).unwrap_err();
        assert_eq!(degraded.value, 7);
        assert_eq!(degraded.reason, "boom");
    }

    #[test]
    fn test_exhausted_is_temporary() {
        let err = AnalysisError::from(InvokeError::AllCredentialsExhausted {
            attempts: 2,
            last: ProviderError::transient("quota"),
        });
        assert!(err.is_temporary());
        assert!(!AnalysisError::Interpretation("x".into()).is_temporary());
    }
}
