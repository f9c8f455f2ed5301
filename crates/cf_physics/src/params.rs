// crates/cf_physics/src/params.rs

//! 不可变物理参数
//!
//! 运行开始时由 [`CaseConfig`] 转换一次，之后以 `&PhaseParams` 在各单元计算间共享。

use cf_config::{CaseConfig, NucleationConfig, RelaxationConfig, TimeConfig, WallConfig};

use crate::error::PhaseResult;
use crate::thermo::{IdealGas, SurfaceTensionCoeffs, ThermoClosure};

/// 气相输运性质
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransportProperties {
    /// 参考粘度 [Pa·s]
    pub viscosity_ref: f64,
    /// 参考温度 [K]
    pub t_ref: f64,
    /// 幂律指数
    pub exponent: f64,
    /// 导热系数 [W/(m·K)]
    pub thermal_conductivity: f64,
}

impl TransportProperties {
    /// 动力粘度 μ = μ_ref·(T/T_ref)^n
    #[inline]
    pub fn viscosity(&self, t: f64) -> f64 {
        self.viscosity_ref * (t / self.t_ref).powf(self.exponent)
    }
}

impl Default for TransportProperties {
    fn default() -> Self {
        let th = cf_config::ThermoConfig::default();
        Self {
            viscosity_ref: th.viscosity_ref,
            t_ref: th.viscosity_t_ref,
            exponent: th.viscosity_exponent,
            thermal_conductivity: th.thermal_conductivity,
        }
    }
}

/// 物理参数包
#[derive(Debug, Clone, Default)]
pub struct PhaseParams {
    /// 热力学闭合
    pub closure: ThermoClosure,
    /// 输运性质
    pub transport: TransportProperties,
    /// 成核与生长
    pub nucleation: NucleationConfig,
    /// 外迭代
    pub relaxation: RelaxationConfig,
    /// 时间推进
    pub time: TimeConfig,
    /// 壁面
    pub wall: WallConfig,
}

impl PhaseParams {
    /// 从算例配置构建（先校验）
    pub fn from_config(config: &CaseConfig) -> PhaseResult<Self> {
        config.validate()?;
        let th = &config.thermo;
        Ok(Self {
            closure: ThermoClosure::new(
                IdealGas::new(th.gas_constant, th.gamma),
                SurfaceTensionCoeffs {
                    sigma_b_coeff: th.sigma_b_coeff,
                    sigma_mu: th.sigma_mu,
                    sigma_b: th.sigma_b,
                    t_crit: th.t_crit,
                },
            ),
            transport: TransportProperties {
                viscosity_ref: th.viscosity_ref,
                t_ref: th.viscosity_t_ref,
                exponent: th.viscosity_exponent,
                thermal_conductivity: th.thermal_conductivity,
            },
            nucleation: config.nucleation.clone(),
            relaxation: config.relaxation.clone(),
            time: config.time.clone(),
            wall: config.wall.clone(),
        })
    }

    /// 气相
    #[inline]
    pub fn gas(&self) -> &IdealGas {
        &self.closure.gas
    }
}
