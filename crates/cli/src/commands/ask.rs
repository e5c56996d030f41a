//! `zhifa ask`: Single-question or interactive consultation.

use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use zhifa_agent::{ConsultationPipeline, ConsultationResult};
use zhifa_config::AppConfig;
use zhifa_core::consultation::{ConsultationRequest, Turn};
use zhifa_core::tool::ToolStatus;

use super::{build_pipeline, load_config, CliResult};

const EXIT_WORDS: &[&str] = &["退出", "exit", "quit"];

pub async fn run(message: Option<String>, show_decision: bool, json: bool) -> CliResult {
    let config = load_config()?;

    if !config.has_api_key() {
        eprintln!();
        eprintln!("  提示：未检测到 API Key，本地部署的模型服务可以忽略此提示。");
        eprintln!("  设置环境变量 ZHIFA_API_KEY（或 LLM_API_KEY / OPENAI_API_KEY），");
        eprintln!("  或在 {} 中填写 api_key。", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
    }

    let pipeline = build_pipeline(&config)?;

    if let Some(question) = message {
        let request = ConsultationRequest::new(question, Vec::new())
            .map_err(|_| "问题不能为空")?;
        if json {
            let result = pipeline.process(&request).await;
            println!("{}", serde_json::to_string_pretty(&result)?);
            return Ok(());
        }
        eprint!("  思考中...");
        let result = pipeline.process(&request).await;
        eprint!("\r            \r");
        println!("{}", result.reply.text);
        if show_decision {
            print_details(&result);
        }
        return Ok(());
    }

    interactive(&pipeline, &config, show_decision).await
}

async fn interactive(pipeline: &ConsultationPipeline, config: &AppConfig, show_decision: bool) -> CliResult {
    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║        智法 · 法律咨询助手（交互模式）         ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Provider:  {}", config.default_provider);
    println!("  Model:     {}", config.default_model);
    println!("  Tools:     {}", pipeline.tools().names().join(", "));
    println!();
    println!("  请输入您的法律问题，输入“退出”结束咨询。");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut history: Vec<Turn> = Vec::new();

    loop {
        print!("  您 > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if EXIT_WORDS.iter().any(|w| input.eq_ignore_ascii_case(w)) {
            break;
        }
        let request = match ConsultationRequest::new(input, history.clone()) {
            Ok(request) => request,
            Err(_) => {
                println!("  请输入有效的问题。");
                continue;
            }
        };

        eprint!("  ...");
        let result = pipeline.process(&request).await;
        eprint!("\r     \r");

        println!();
        for line in result.reply.text.lines() {
            println!("  智法 > {line}");
        }
        if show_decision {
            print_details(&result);
        }
        println!();

        history.push(Turn::user(input));
        history.push(Turn::assistant(result.reply.text));
    }

    println!();
    println!("  感谢使用，再见！");
    println!();
    Ok(())
}

fn print_details(result: &ConsultationResult) {
    let decision = result
        .decision
        .as_ref()
        .map(|d| d.directive())
        .unwrap_or_else(|| "（未作出决策）".to_string());
    eprintln!("  [决策] {decision}");
    for observation in &result.observations {
        let marker = match observation.status {
            ToolStatus::Success => "✅",
            ToolStatus::NotFound => "➖",
            ToolStatus::Error => "❌",
        };
        eprintln!("  [工具] {marker} {} ({})", observation.tool_name, observation.status);
    }
    if result.failed {
        eprintln!("  [状态] 处理失败，已返回致歉信息（详见日志）");
    }
}
