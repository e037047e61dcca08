//! LLM 层：客户端抽象与实现（OpenAI 兼容 / Mock）

pub mod mock;
pub mod openai;
pub mod traits;

pub use mock::{MockClientFactory, MockLlmClient};
pub use openai::{OpenAiClient, OpenAiClientFactory, TokenUsage, GEMINI_FLASH, GEMINI_OPENAI_BASE_URL};
pub use traits::{ClientFactory, GenerationOptions, LlmClient, Message, Role};
