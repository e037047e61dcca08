//! unlabel 命令行
//!
//! 用法：`unlabel [--context TEXT] [--intent INTENT] [TEXT...]`，未给出文本时读取 stdin。
//! 结果以 JSON 打印到 stdout，随后在日志中输出 Key 池与缓存统计。

use std::io::Read;

use anyhow::{bail, Context};
use unlabel::agents::Intent;
use unlabel::core::create_runtime;
use unlabel::DecisionRequest;

struct CliArgs {
    context: Option<String>,
    intent: Option<Intent>,
    text: Vec<String>,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> anyhow::Result<CliArgs> {
    let mut cli = CliArgs {
        context: None,
        intent: None,
        text: Vec::new(),
    };
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--context" => {
                cli.context = Some(args.next().context("--context needs a value")?);
            }
            "--intent" => {
                let label = args.next().context("--intent needs a value")?;
                match Intent::parse(&label) {
                    Some(intent) => cli.intent = Some(intent),
                    None => bail!(
                        "unknown intent '{label}' (expected quick_yes_no, comparison, risk_check or curiosity)"
                    ),
                }
            }
            _ => cli.text.push(arg),
        }
    }
    Ok(cli)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    unlabel::observability::init();

    let cli = parse_args(std::env::args().skip(1))?;
    let text = if cli.text.is_empty() {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read product text from stdin")?;
        buf
    } else {
        cli.text.join(" ")
    };
    if text.trim().is_empty() {
        bail!("no product text given");
    }

    let runtime = create_runtime(None).context("Failed to build runtime")?;

    let request = DecisionRequest {
        user_intent: cli.intent,
        ..DecisionRequest::new(text.trim())
    };
    let response = runtime
        .orchestrator()
        .process(&request, cli.context.as_deref())
        .await
        .context("Analysis failed")?;

    println!("{}", serde_json::to_string_pretty(&response)?);

    let stats = runtime.stats();
    tracing::info!(stats = %serde_json::to_string(&stats)?, "Runtime stats");
    Ok(())
}
