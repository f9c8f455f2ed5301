// apps/cf_cli/src/main.rs

//! CondensFlow 命令行界面
//!
//! 提供两相凝结喷管流计算的命令行工具。
//!
//! # 架构层级
//!
//! 本模块属于 **Layer 5: Application**：
//! - 读取 `CaseConfig`，转换为 `PhaseParams`
//! - 构建网格、初始场与通量，驱动 `PhaseSolver`
//! - 库 crate 通过 `log` 输出，本层安装 `tracing` 订阅器并桥接

mod commands;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::FmtSubscriber;

/// CondensFlow 两相凝结流求解器命令行工具
#[derive(Parser)]
#[command(name = "cf_cli")]
#[command(author = "CondensFlow Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "CondensFlow two-phase condensing flow solver", long_about = None)]
struct Cli {
    /// 日志级别 (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 运行喷管算例
    Run(commands::run::RunArgs),
    /// 显示信息
    Info(commands::info::InfoArgs),
    /// 验证配置
    Validate(commands::validate::ValidateArgs),
}

fn parse_level(name: &str) -> Level {
    match name.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 初始化日志（同时接管 log 宏的输出）
    let subscriber = FmtSubscriber::builder()
        .with_max_level(parse_level(&cli.log_level))
        .with_target(false)
        .finish();
    subscriber.try_init()?;

    match cli.command {
        Commands::Run(args) => commands::run::execute(args),
        Commands::Info(args) => commands::info::execute(args),
        Commands::Validate(args) => commands::validate::execute(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("DEBUG"), Level::DEBUG);
        assert_eq!(parse_level("unknown"), Level::INFO);
    }

    #[test]
    fn test_parse_run_arguments() {
        let cli = Cli::try_parse_from(["cf_cli", "-l", "warn", "run", "--cells", "40", "--uniform"]).unwrap();
        assert_eq!(cli.log_level, "warn");
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.cells, 40);
                assert!(args.uniform);
            }
            _ => panic!("期望 run 子命令"),
        }
    }
}
