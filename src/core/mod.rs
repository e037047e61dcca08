//! 核心层：错误分类、Key 池、弹性调用、请求编排与运行时组装

pub mod builder;
pub mod error;
pub mod invoker;
pub mod key_pool;
pub mod orchestrator;

pub use builder::{create_runtime, Runtime, RuntimeStats};
pub use error::{
    or_degraded, AnalysisError, ConfigurationError, DegradedDefault, ErrorClass, InvokeError,
    ProviderError,
};
pub use invoker::ResilientInvoker;
pub use key_pool::{Credential, KeyPool, KeyPoolStats, DEFAULT_COOLDOWN};
pub use orchestrator::{
    Collaborators, DecisionRequest, DecisionResponse, Orchestrator, ResponseConfidence,
};
