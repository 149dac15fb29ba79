use anyhow::{Context, Result};
use loopee::{Invocation, Rendered};
use std::io::Read;

fn main() -> Result<()> {
    // 初始化日志，输出到stderr以免混入渲染结果；诊断信息由库以warn级别输出
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let json = args.iter().any(|arg| arg == "--json");
    let strict = args.iter().any(|arg| arg == "--strict");

    // 从stdin读取YAML调用描述
    let mut input = String::new();
    std::io::stdin()
        .read_to_string(&mut input)
        .context("Failed to read invocation from stdin")?;

    let invocation = Invocation::from_yaml_str(&input)?;

    if strict {
        let output = invocation.run_strict()?;
        print!("{}", output);
        return Ok(());
    }

    let rendered = invocation.run();
    print!("{}", format_report(&rendered, json)?);

    Ok(())
}

/// 生成标准输出内容：纯文本只包含渲染结果，JSON 报告包含诊断信息
fn format_report(rendered: &Rendered, json: bool) -> Result<String> {
    if json {
        let report = serde_json::to_string_pretty(rendered)
            .context("Failed to serialize render report")?;
        return Ok(format!("{}\n", report));
    }
    Ok(rendered.output.clone())
}
