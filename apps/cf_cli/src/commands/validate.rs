// apps/cf_cli/src/commands/validate.rs

//! 配置验证命令
//!
//! 验证算例配置文件：JSON 格式、字段类型、取值范围，以及若干可疑但合法的设置。

use anyhow::{bail, Context, Result};
use cf_config::{CaseConfig, DepositionLaw};
use cf_physics::thermo::T_TRIPLE;
use clap::Args;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// 顶层已知字段
const KNOWN_SECTIONS: [&str; 7] = ["thermo", "nucleation", "relaxation", "time", "wall", "monitor", "output"];

/// 验证参数
#[derive(Args)]
pub struct ValidateArgs {
    /// 配置文件路径
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 严格模式（警告也视为错误）
    #[arg(long)]
    pub strict: bool,
}

/// 验证结果
#[derive(Default)]
struct ValidationResult {
    errors: Vec<String>,
    warnings: Vec<String>,
}

impl ValidationResult {
    fn add_error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    fn add_warning(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    fn is_ok_strict(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }
}

/// 执行验证命令
pub fn execute(args: ValidateArgs) -> Result<()> {
    info!("=== CondensFlow 配置验证 ===");

    let Some(config_path) = &args.config else {
        println!("用法: cf_cli validate --config <配置文件> [--strict]");
        return Ok(());
    };

    let mut result = ValidationResult::default();
    validate_config(config_path, &mut result)?;
    print_validation_result(&result, args.strict)
}

fn validate_config(path: &Path, result: &mut ValidationResult) -> Result<()> {
    println!("\n检查配置文件: {}", path.display());

    if !path.exists() {
        result.add_error(format!("配置文件不存在: {}", path.display()));
        return Ok(());
    }

    let content = std::fs::read_to_string(path).context("无法读取配置文件")?;
    validate_content(&content, result);
    if result.is_ok() {
        println!("  ✓ 配置文件格式有效");
    }
    Ok(())
}

fn validate_content(content: &str, result: &mut ValidationResult) {
    let json: serde_json::Value = match serde_json::from_str(content) {
        Ok(v) => v,
        Err(e) => {
            result.add_error(format!("JSON 解析错误: {}", e));
            return;
        }
    };

    match json.as_object() {
        Some(map) => {
            for key in map.keys().filter(|k| !KNOWN_SECTIONS.contains(&k.as_str())) {
                result.add_warning(format!("未知的配置段 '{}' 将被忽略", key));
            }
        }
        None => {
            result.add_error("配置顶层必须是 JSON 对象");
            return;
        }
    }

    let config: CaseConfig = match serde_json::from_value(json) {
        Ok(c) => c,
        Err(e) => {
            result.add_error(format!("字段类型错误: {}", e));
            return;
        }
    };

    if let Err(e) = config.validate() {
        result.add_error(e.to_string());
        return;
    }

    check_settings(&config, result);
}

fn check_settings(config: &CaseConfig, result: &mut ValidationResult) {
    let time = &config.time;
    if time.adaptive && time.cfl > 0.8 {
        result.add_warning(format!("CFL = {} 较大，显式通量可能不稳定", time.cfl));
    }
    if time.end_time < time.dt {
        result.add_warning("结束时间小于初始时间步长，只会推进一步");
    }
    if time.write_interval > time.end_time {
        result.add_warning("写出间隔大于结束时间，只会写出最终状态");
    }

    let relax = &config.relaxation;
    if relax.omega < 0.1 {
        result.add_warning(format!("松弛因子 ω = {} 很小，外迭代收敛缓慢", relax.omega));
    }

    if let DepositionLaw::Kinetic { wall_temperature, .. } = config.wall.law {
        if wall_temperature > T_TRIPLE {
            result.add_warning(format!("壁面温度 {} K 高于三相点，冰层无法稳定存在", wall_temperature));
        }
    }

    if !config.monitor.enabled {
        result.add_warning("稳态监测已关闭，将一直推进到结束时间");
    }
}

fn print_validation_result(result: &ValidationResult, strict: bool) -> Result<()> {
    println!("\n=== 验证结果 ===");

    if !result.errors.is_empty() {
        println!("\n错误 ({}):", result.errors.len());
        for err in &result.errors {
            error!("  ✗ {}", err);
            println!("  ✗ {}", err);
        }
    }

    if !result.warnings.is_empty() {
        println!("\n警告 ({}):", result.warnings.len());
        for warning in &result.warnings {
            warn!("  ⚠ {}", warning);
            println!("  ⚠ {}", warning);
        }
    }

    let success = if strict {
        result.is_ok_strict()
    } else {
        result.is_ok()
    };

    if success {
        println!("\n✓ 验证通过");
        Ok(())
    } else {
        println!("\n✗ 验证失败");
        bail!(
            "验证失败：发现 {} 个错误，{} 个警告",
            result.errors.len(),
            result.warnings.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(content: &str) -> ValidationResult {
        let mut result = ValidationResult::default();
        validate_content(content, &mut result);
        result
    }

    #[test]
    fn test_empty_object_is_valid() {
        let result = check("{}");
        assert!(result.is_ok());
    }

    #[test]
    fn test_syntax_error() {
        let result = check("{ \"time\": ");
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("JSON"));
    }

    #[test]
    fn test_out_of_range_value() {
        let result = check(r#"{ "relaxation": { "omega": 1.5 } }"#);
        assert!(!result.is_ok());
        assert!(result.errors[0].contains("relaxation.omega"));
    }

    #[test]
    fn test_wrong_type() {
        let result = check(r#"{ "time": { "dt": "fast" } }"#);
        assert!(!result.is_ok());
    }

    #[test]
    fn test_warnings_fail_only_in_strict_mode() {
        let result = check(r#"{ "solver": {}, "time": { "cfl": 0.95 } }"#);
        assert!(result.is_ok());
        assert_eq!(result.warnings.len(), 2);
        assert!(print_validation_result(&result, false).is_ok());
        assert!(print_validation_result(&result, true).is_err());
    }

    #[test]
    fn test_warm_kinetic_wall() {
        let result = check(
            r#"{ "wall": { "law": { "type": "kinetic", "sticking_coefficient": 0.5,
                 "sublimation_coefficient": 0.5, "wall_temperature": 280.0 } } }"#,
        );
        assert!(result.is_ok());
        assert!(result.warnings.iter().any(|w| w.contains("三相点")));
    }

    #[test]
    fn test_missing_file() {
        let mut result = ValidationResult::default();
        let path = std::env::temp_dir().join("cf_cli_validate_missing.json");
        let _ = std::fs::remove_file(&path);
        validate_config(&path, &mut result).unwrap();
        assert!(!result.is_ok());
    }
}
