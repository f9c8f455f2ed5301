// crates/cf_config/src/lib.rs

//! CondensFlow Config Layer (Layer 2)
//!
//! 配置层，提供算例参数包 [`CaseConfig`] 及其 JSON 读写与校验。
//! 配置在运行开始时读取一次，之后在物理层转换为不可变参数。
//!
//! # 模块概览
//!
//! - [`case_config`]: 热力学、成核、松弛、时间、壁面、监控参数
//! - [`error`]: 配置错误类型
//!
//! # 层级架构
//!
//! ```text
//! Layer 5: cf_cli      ─> 读取 CaseConfig
//! Layer 3: cf_physics  ─> CaseConfig → PhaseParams
//! Layer 2: cf_config   ─> CaseConfig (本层)
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod case_config;
pub mod error;

pub use case_config::{
    CaseConfig, DepositionLaw, FieldThresholds, ImplicitGrowth, MonitorConfig, NucleationConfig,
    OutputConfig, RelaxationConfig, ThermoConfig, TimeConfig, WallConfig,
};
pub use error::ConfigError;
