//! 可观测性：tracing 日志
//!
//! 默认 info，可通过 RUST_LOG 覆盖；日志写 stderr，stdout 留给分析结果。

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}
