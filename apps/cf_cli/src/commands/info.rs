// apps/cf_cli/src/commands/info.rs

//! 信息显示命令
//!
//! 显示系统信息、默认配置与场目录。

use anyhow::{Context, Result};
use cf_config::CaseConfig;
use cf_io::{FieldClass, FIELD_CATALOG};
use cf_physics::thermo::{P_TRIPLE, T_MIN, T_TRIPLE};
use clap::Args;
use std::path::PathBuf;
use tracing::info;

/// 信息显示参数
#[derive(Args)]
pub struct InfoArgs {
    /// 显示指定配置文件（补齐默认值后）
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 显示系统信息
    #[arg(long)]
    pub system: bool,

    /// 显示默认配置
    #[arg(long)]
    pub defaults: bool,

    /// 显示场目录
    #[arg(long)]
    pub fields: bool,
}

/// 执行信息命令
pub fn execute(args: InfoArgs) -> Result<()> {
    info!("=== CondensFlow 信息 ===");

    if args.system {
        print_system_info();
    }

    if args.defaults {
        print_config(&CaseConfig::default(), "默认配置")?;
    }

    if args.fields {
        print_field_catalog();
    }

    if let Some(path) = &args.config {
        let config = CaseConfig::from_file(path)
            .with_context(|| format!("无法加载配置文件 {}", path.display()))?;
        print_config(&config, &path.display().to_string())?;
    }

    if args.config.is_none() && !args.system && !args.defaults && !args.fields {
        print_system_info();
        println!();
        print_config(&CaseConfig::default(), "默认配置")?;
        println!();
        print_field_catalog();
    }

    Ok(())
}

fn print_system_info() {
    println!("=== 系统信息 ===");
    println!("CondensFlow CLI 版本: {}", env!("CARGO_PKG_VERSION"));
    println!("目标平台: {}", std::env::consts::ARCH);
    println!("操作系统: {}", std::env::consts::OS);
    println!("并行线程: {}", std::thread::available_parallelism().map_or(1, |n| n.get()));

    println!("\n闭合范围:");
    println!("  三相点: {} K, {} Pa", T_TRIPLE, P_TRIPLE);
    println!("  温度下限: {} K", T_MIN);
    println!("  T > {} K 用液相曲线, 否则用冰面曲线", T_TRIPLE);
}

fn print_config(config: &CaseConfig, title: &str) -> Result<()> {
    println!("=== {} ===", title);
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}

fn class_label(class: FieldClass) -> &'static str {
    match class {
        FieldClass::Persisted => "必读",
        FieldClass::Checkpointed => "仅写出",
        FieldClass::Ephemeral => "每步重算",
    }
}

fn print_field_catalog() {
    println!("=== 场目录 ===");
    println!("{:<32} {:<10} {:<8} 单位", "名称", "类别", "类型");
    for spec in FIELD_CATALOG {
        println!(
            "{:<32} {:<10} {:<8} {}",
            spec.name,
            class_label(spec.class),
            format!("{:?}", spec.kind),
            spec.unit
        );
    }
}
