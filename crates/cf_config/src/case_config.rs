// crates/cf_config/src/case_config.rs

//! CaseConfig - 算例参数包
//!
//! 描述一次两相凝结流计算所需的全部参数。所有数值以 f64 存储以便 JSON 序列化，
//! 缺省字段通过 `#[serde(default = ...)]` 补齐，因此一个空的 `{}` 也是合法配置。

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// 算例配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CaseConfig {
    /// 气相与液相物性
    #[serde(default)]
    pub thermo: ThermoConfig,

    /// 成核与液滴生长
    #[serde(default)]
    pub nucleation: NucleationConfig,

    /// 外迭代与亚松弛
    #[serde(default)]
    pub relaxation: RelaxationConfig,

    /// 时间推进
    #[serde(default)]
    pub time: TimeConfig,

    /// 壁面沉积/升华
    #[serde(default)]
    pub wall: WallConfig,

    /// 稳态监控
    #[serde(default)]
    pub monitor: MonitorConfig,

    /// 输出与检查点
    #[serde(default)]
    pub output: OutputConfig,
}

// ============================================================================
// 热力学参数
// ============================================================================

/// 热力学参数（水蒸气理想气体 + 液相表面张力关联式）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThermoConfig {
    /// 气体常数 R [J/(kg·K)]
    #[serde(default = "default_gas_constant")]
    pub gas_constant: f64,

    /// 比热比 γ
    #[serde(default = "default_gamma")]
    pub gamma: f64,

    /// 表面张力系数 σ_B [N/m]
    #[serde(default = "default_sigma_b_coeff")]
    pub sigma_b_coeff: f64,

    /// 表面张力指数 σ_μ
    #[serde(default = "default_sigma_mu")]
    pub sigma_mu: f64,

    /// 表面张力修正 σ_b
    #[serde(default = "default_sigma_b")]
    pub sigma_b: f64,

    /// 临界温度 [K]，同时是气相温度上限
    #[serde(default = "default_t_crit")]
    pub t_crit: f64,

    /// 参考动力粘度 [Pa·s]
    #[serde(default = "default_viscosity_ref")]
    pub viscosity_ref: f64,

    /// 粘度参考温度 [K]
    #[serde(default = "default_viscosity_t_ref")]
    pub viscosity_t_ref: f64,

    /// 粘度幂律指数
    #[serde(default = "default_viscosity_exponent")]
    pub viscosity_exponent: f64,

    /// 气相导热系数 [W/(m·K)]
    #[serde(default = "default_thermal_conductivity")]
    pub thermal_conductivity: f64,
}

fn default_gas_constant() -> f64 { 461.52 }
fn default_gamma() -> f64 { 1.333 }
fn default_sigma_b_coeff() -> f64 { 0.2358 }
fn default_sigma_mu() -> f64 { 1.256 }
fn default_sigma_b() -> f64 { -0.625 }
fn default_t_crit() -> f64 { 647.096 }
fn default_viscosity_ref() -> f64 { 9.2e-6 }
fn default_viscosity_t_ref() -> f64 { 273.16 }
fn default_viscosity_exponent() -> f64 { 1.0 }
fn default_thermal_conductivity() -> f64 { 0.0171 }

impl Default for ThermoConfig {
    fn default() -> Self {
        Self {
            gas_constant: default_gas_constant(),
            gamma: default_gamma(),
            sigma_b_coeff: default_sigma_b_coeff(),
            sigma_mu: default_sigma_mu(),
            sigma_b: default_sigma_b(),
            t_crit: default_t_crit(),
            viscosity_ref: default_viscosity_ref(),
            viscosity_t_ref: default_viscosity_t_ref(),
            viscosity_exponent: default_viscosity_exponent(),
            thermal_conductivity: default_thermal_conductivity(),
        }
    }
}

// ============================================================================
// 成核参数
// ============================================================================

/// 经典成核理论与 Young 液滴生长参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NucleationConfig {
    /// 凝结系数 q_c
    #[serde(default = "default_condensation_coefficient")]
    pub condensation_coefficient: f64,

    /// 是否启用 Kantrowitz 非等温修正
    #[serde(default = "default_true")]
    pub kantrowitz_correction: bool,

    /// Young 模型 α
    #[serde(default = "default_young_alpha")]
    pub young_alpha: f64,

    /// Young 模型 β
    #[serde(default)]
    pub young_beta: f64,

    /// 新核半径与临界半径之比（必须大于 1）
    #[serde(default = "default_nucleation_radius_factor")]
    pub nucleation_radius_factor: f64,
}

fn default_true() -> bool { true }
fn default_condensation_coefficient() -> f64 { 1.0 }
fn default_young_alpha() -> f64 { 9.0 }
fn default_nucleation_radius_factor() -> f64 { 1.01 }

impl Default for NucleationConfig {
    fn default() -> Self {
        Self {
            condensation_coefficient: default_condensation_coefficient(),
            kantrowitz_correction: true,
            young_alpha: default_young_alpha(),
            young_beta: 0.0,
            nucleation_radius_factor: default_nucleation_radius_factor(),
        }
    }
}

// ============================================================================
// 外迭代参数
// ============================================================================

/// 生长源项的隐式化策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ImplicitGrowth {
    /// 仅当线性化系数为负（蒸发）时隐式处理
    #[default]
    NegativeOnly,
    /// 始终隐式
    Always,
    /// 始终显式
    Never,
}

/// 外迭代与亚松弛参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelaxationConfig {
    /// 亚松弛因子 ω ∈ (0, 1]
    #[serde(default = "default_omega")]
    pub omega: f64,

    /// 每个时间步的最大外迭代次数
    #[serde(default = "default_max_outer_iterations")]
    pub max_outer_iterations: usize,

    /// 源项残差收敛容差
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,

    /// 生长源项隐式化策略
    #[serde(default)]
    pub implicit_growth: ImplicitGrowth,
}

fn default_omega() -> f64 { 0.5 }
fn default_max_outer_iterations() -> usize { 30 }
fn default_tolerance() -> f64 { 1e-6 }

impl Default for RelaxationConfig {
    fn default() -> Self {
        Self {
            omega: default_omega(),
            max_outer_iterations: default_max_outer_iterations(),
            tolerance: default_tolerance(),
            implicit_growth: ImplicitGrowth::default(),
        }
    }
}

// ============================================================================
// 时间参数
// ============================================================================

/// 时间推进参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeConfig {
    /// 初始（或固定）时间步长 [s]
    #[serde(default = "default_dt")]
    pub dt: f64,

    /// 结束时间 [s]
    #[serde(default = "default_end_time")]
    pub end_time: f64,

    /// 是否按 CFL 自适应时间步
    #[serde(default = "default_true")]
    pub adaptive: bool,

    /// CFL 数
    #[serde(default = "default_cfl")]
    pub cfl: f64,

    /// 最小时间步长 [s]
    #[serde(default = "default_dt_min")]
    pub dt_min: f64,

    /// 步长拒绝后的缩减因子 ∈ (0, 1)
    #[serde(default = "default_shrink_factor")]
    pub shrink_factor: f64,

    /// 单步最大拒绝次数
    #[serde(default = "default_max_rejections")]
    pub max_rejections: usize,

    /// 写出间隔 [s]
    #[serde(default = "default_write_interval")]
    pub write_interval: f64,
}

fn default_dt() -> f64 { 1e-7 }
fn default_end_time() -> f64 { 1e-4 }
fn default_cfl() -> f64 { 0.4 }
fn default_dt_min() -> f64 { 1e-14 }
fn default_shrink_factor() -> f64 { 0.5 }
fn default_max_rejections() -> usize { 6 }
fn default_write_interval() -> f64 { 1e-5 }

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            dt: default_dt(),
            end_time: default_end_time(),
            adaptive: true,
            cfl: default_cfl(),
            dt_min: default_dt_min(),
            shrink_factor: default_shrink_factor(),
            max_rejections: default_max_rejections(),
            write_interval: default_write_interval(),
        }
    }
}

// ============================================================================
// 壁面参数
// ============================================================================

/// 壁面沉积/升华速率的来源
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DepositionLaw {
    /// 使用场中给定的 mdot_a / mdot_s
    #[default]
    Prescribed,
    /// Hertz–Knudsen 碰撞沉积 + 冰面升华
    Kinetic {
        /// 粘附系数
        sticking_coefficient: f64,
        /// 升华系数
        sublimation_coefficient: f64,
        /// 壁面温度 [K]
        wall_temperature: f64,
    },
}

/// 壁面模型参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WallConfig {
    /// 沉积速率律
    #[serde(default)]
    pub law: DepositionLaw,

    /// 单层冰厚度 [m]
    #[serde(default = "default_layer_thickness")]
    pub layer_thickness: f64,

    /// 壁面退缩阈值占局部通道高度的比例
    #[serde(default = "default_threshold_fraction")]
    pub threshold_fraction: f64,

    /// 壁面时间步安全系数
    #[serde(default = "default_recession_safety")]
    pub recession_safety: f64,

    /// 壁面时间步下限 [s]
    #[serde(default = "default_wall_dt_min")]
    pub wall_dt_min: f64,

    /// 壁面时间步上限 [s]
    #[serde(default = "default_wall_dt_max")]
    pub wall_dt_max: f64,
}

fn default_layer_thickness() -> f64 { 3e-10 }
fn default_threshold_fraction() -> f64 { 0.05 }
fn default_recession_safety() -> f64 { 0.2 }
fn default_wall_dt_min() -> f64 { 1e-4 }
fn default_wall_dt_max() -> f64 { 3600.0 }

impl Default for WallConfig {
    fn default() -> Self {
        Self {
            law: DepositionLaw::default(),
            layer_thickness: default_layer_thickness(),
            threshold_fraction: default_threshold_fraction(),
            recession_safety: default_recession_safety(),
            wall_dt_min: default_wall_dt_min(),
            wall_dt_max: default_wall_dt_max(),
        }
    }
}

// ============================================================================
// 监控与输出
// ============================================================================

/// 各场 RMS 相对变化阈值
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldThresholds {
    /// 压力
    #[serde(default = "default_field_threshold")]
    pub p: f64,
    /// 速度模
    #[serde(default = "default_field_threshold")]
    pub u: f64,
    /// 温度
    #[serde(default = "default_field_threshold")]
    pub t: f64,
    /// 成核率
    #[serde(default = "default_field_threshold")]
    pub j: f64,
    /// 过饱和度
    #[serde(default = "default_field_threshold")]
    pub s_sat: f64,
    /// 液滴数密度
    #[serde(default = "default_field_threshold")]
    pub n: f64,
    /// 液相质量分数
    #[serde(default = "default_field_threshold")]
    pub y: f64,
}

fn default_field_threshold() -> f64 { 1e-4 }

impl Default for FieldThresholds {
    fn default() -> Self {
        let v = default_field_threshold();
        Self { p: v, u: v, t: v, j: v, s_sat: v, n: v, y: v }
    }
}

impl FieldThresholds {
    /// 以 (场名, 阈值) 形式列出
    pub fn entries(&self) -> [(&'static str, f64); 7] {
        [
            ("p", self.p),
            ("U", self.u),
            ("T", self.t),
            ("J", self.j),
            ("S_sat", self.s_sat),
            ("N", self.n),
            ("Y", self.y),
        ]
    }
}

/// 稳态监控参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// 是否启用
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// 各场阈值
    #[serde(default)]
    pub thresholds: FieldThresholds,

    /// 连续满足阈值的次数
    #[serde(default = "default_steady_count")]
    pub steady_count_required: usize,
}

fn default_steady_count() -> usize { 5 }

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            thresholds: FieldThresholds::default(),
            steady_count_required: default_steady_count(),
        }
    }
}

/// 输出配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// 输出目录
    #[serde(default = "default_output_dir")]
    pub directory: PathBuf,

    /// 保留的检查点数量
    #[serde(default = "default_keep_checkpoints")]
    pub keep_checkpoints: usize,
}

fn default_output_dir() -> PathBuf { PathBuf::from("output") }
fn default_keep_checkpoints() -> usize { 3 }

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_dir(),
            keep_checkpoints: default_keep_checkpoints(),
        }
    }
}

// ============================================================================
// 读写与校验
// ============================================================================

fn positive(key: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::invalid(key, value, "必须为正的有限值"))
    }
}

fn non_negative(key: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::invalid(key, value, "不能为负"))
    }
}

impl CaseConfig {
    /// 从 JSON 文件加载配置并校验
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: CaseConfig =
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// 保存配置到文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content =
            serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<(), ConfigError> {
        let th = &self.thermo;
        positive("thermo.gas_constant", th.gas_constant)?;
        if !(th.gamma > 1.0 && th.gamma.is_finite()) {
            return Err(ConfigError::invalid("thermo.gamma", th.gamma, "比热比必须大于 1"));
        }
        positive("thermo.sigma_b_coeff", th.sigma_b_coeff)?;
        positive("thermo.sigma_mu", th.sigma_mu)?;
        if th.t_crit <= 273.16 {
            return Err(ConfigError::invalid("thermo.t_crit", th.t_crit, "临界温度必须高于三相点"));
        }
        positive("thermo.viscosity_ref", th.viscosity_ref)?;
        positive("thermo.viscosity_t_ref", th.viscosity_t_ref)?;
        non_negative("thermo.viscosity_exponent", th.viscosity_exponent)?;
        positive("thermo.thermal_conductivity", th.thermal_conductivity)?;

        let nu = &self.nucleation;
        let qc = nu.condensation_coefficient;
        if !(qc > 0.0 && qc <= 1.0) {
            return Err(ConfigError::invalid("nucleation.condensation_coefficient", qc, "必须在 (0, 1] 范围内"));
        }
        non_negative("nucleation.young_alpha", nu.young_alpha)?;
        non_negative("nucleation.young_beta", nu.young_beta)?;
        if !(nu.nucleation_radius_factor > 1.0 && nu.nucleation_radius_factor.is_finite()) {
            return Err(ConfigError::invalid(
                "nucleation.nucleation_radius_factor",
                nu.nucleation_radius_factor,
                "新核半径必须大于临界半径",
            ));
        }

        let rx = &self.relaxation;
        if !(rx.omega > 0.0 && rx.omega <= 1.0) {
            return Err(ConfigError::invalid("relaxation.omega", rx.omega, "必须在 (0, 1] 范围内"));
        }
        if rx.max_outer_iterations == 0 {
            return Err(ConfigError::invalid("relaxation.max_outer_iterations", 0, "至少为 1"));
        }
        positive("relaxation.tolerance", rx.tolerance)?;

        let tm = &self.time;
        positive("time.dt", tm.dt)?;
        positive("time.end_time", tm.end_time)?;
        positive("time.dt_min", tm.dt_min)?;
        if tm.dt < tm.dt_min {
            return Err(ConfigError::invalid("time.dt", tm.dt, "不能小于 time.dt_min"));
        }
        if tm.cfl <= 0.0 || tm.cfl > 1.0 {
            return Err(ConfigError::invalid("time.cfl", tm.cfl, "CFL 必须在 (0, 1] 范围内"));
        }
        if !(tm.shrink_factor > 0.0 && tm.shrink_factor < 1.0) {
            return Err(ConfigError::invalid("time.shrink_factor", tm.shrink_factor, "必须在 (0, 1) 范围内"));
        }
        positive("time.write_interval", tm.write_interval)?;

        let wl = &self.wall;
        if let DepositionLaw::Kinetic {
            sticking_coefficient,
            sublimation_coefficient,
            wall_temperature,
        } = wl.law
        {
            if !(0.0..=1.0).contains(&sticking_coefficient) {
                return Err(ConfigError::invalid("wall.law.sticking_coefficient", sticking_coefficient, "必须在 [0, 1] 范围内"));
            }
            if !(0.0..=1.0).contains(&sublimation_coefficient) {
                return Err(ConfigError::invalid("wall.law.sublimation_coefficient", sublimation_coefficient, "必须在 [0, 1] 范围内"));
            }
            positive("wall.law.wall_temperature", wall_temperature)?;
        }
        positive("wall.layer_thickness", wl.layer_thickness)?;
        if !(wl.threshold_fraction > 0.0 && wl.threshold_fraction < 1.0) {
            return Err(ConfigError::invalid("wall.threshold_fraction", wl.threshold_fraction, "必须在 (0, 1) 范围内"));
        }
        positive("wall.recession_safety", wl.recession_safety)?;
        positive("wall.wall_dt_min", wl.wall_dt_min)?;
        if wl.wall_dt_max < wl.wall_dt_min {
            return Err(ConfigError::invalid("wall.wall_dt_max", wl.wall_dt_max, "不能小于 wall.wall_dt_min"));
        }

        for (name, threshold) in self.monitor.thresholds.entries() {
            positive(&format!("monitor.thresholds.{name}"), threshold)?;
        }
        if self.monitor.steady_count_required == 0 {
            return Err(ConfigError::invalid("monitor.steady_count_required", 0, "至少为 1"));
        }

        if self.output.keep_checkpoints == 0 {
            return Err(ConfigError::invalid("output.keep_checkpoints", 0, "至少保留 1 个检查点"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CaseConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.relaxation.implicit_growth, ImplicitGrowth::NegativeOnly);
        assert_eq!(config.wall.law, DepositionLaw::Prescribed);
    }

    #[test]
    fn test_empty_json_uses_defaults() {
        let config: CaseConfig = serde_json::from_str("{}").unwrap();
        assert!((config.thermo.gas_constant - 461.52).abs() < 1e-12);
        assert!((config.relaxation.omega - 0.5).abs() < 1e-12);
        assert_eq!(config.monitor.steady_count_required, 5);
    }

    #[test]
    fn test_invalid_omega() {
        let mut config = CaseConfig::default();
        config.relaxation.omega = 0.0;
        assert!(config.validate().is_err());
        config.relaxation.omega = 1.2;
        assert!(config.validate().is_err());
        config.relaxation.omega = 1.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_radius_factor() {
        let mut config = CaseConfig::default();
        config.nucleation.nucleation_radius_factor = 1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_kinetic_law_json() {
        let json = r#"{
            "wall": {
                "law": {
                    "type": "kinetic",
                    "sticking_coefficient": 0.8,
                    "sublimation_coefficient": 1.0,
                    "wall_temperature": 190.0
                }
            }
        }"#;
        let config: CaseConfig = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_ok());
        match config.wall.law {
            DepositionLaw::Kinetic { sticking_coefficient, .. } => {
                assert!((sticking_coefficient - 0.8).abs() < 1e-12)
            }
            DepositionLaw::Prescribed => panic!("应解析为 kinetic"),
        }
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join("cf_config_test_case.json");
        let mut config = CaseConfig::default();
        config.time.end_time = 2e-3;
        config.save_to_file(&path).unwrap();

        let loaded = CaseConfig::from_file(&path).unwrap();
        assert!((loaded.time.end_time - 2e-3).abs() < 1e-15);
        let _ = std::fs::remove_file(&path);
    }
}
