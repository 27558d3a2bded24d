//! Wasp - Rust 自主任务编排智能体
//!
//! 入口：初始化日志、加载配置、创建 TaskAgent，跑一个行式对话循环。

use std::io::Write;

use anyhow::Context;
use tokio::io::AsyncBufReadExt;
use wasp::agent::TaskAgent;
use wasp::config::{load_config, AppConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    wasp::observability::init();

    let cfg = load_config(None).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    });

    let name = cfg.app.name.clone().unwrap_or_else(|| "wasp".to_string());
    let mut agent = TaskAgent::from_config(&cfg);

    println!("{} ready. Type a query, or \"quit\" to exit.", name);

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    loop {
        print!("> ");
        std::io::stdout().flush().context("stdout flush failed")?;

        let Some(line) = lines.next_line().await.context("stdin read failed")? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "quit" || line == "exit" {
            break;
        }

        let response = agent.process_query(line).await;
        println!("{}", response.content);
        if let Some(display) = response.display {
            println!("{}", display);
        }
    }

    Ok(())
}
