//! unlabel - 食品配料分析的弹性核心
//!
//! 模块划分：
//! - **agents**: 协作 Agent（意图识别、配料解读、旧版摘要、解释、配料翻译）
//! - **cache**: 请求指纹与限容量 TTL 结果缓存
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误分类、Key 池、弹性调用、编排器与运行时组装
//! - **decision**: 结构化信号与规则决策引擎
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Mock）
//! - **observability**: tracing 日志初始化

pub mod agents;
pub mod cache;
pub mod config;
pub mod core;
pub mod decision;
pub mod llm;
pub mod observability;

pub use crate::core::{DecisionRequest, DecisionResponse, Orchestrator, Runtime};
