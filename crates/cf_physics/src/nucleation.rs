// crates/cf_physics/src/nucleation.rs

//! 成核动力学与液滴生长
//!
//! # 经典成核理论
//!
//! ```text
//! r* = 2σ / (ρ_l·R·T·ln S)                                   (S > 1)
//! J  = q_c·(ρ_v²/ρ_l)·sqrt(2σ/(π·m³))·exp(−4π·r*²·σ/(3kT)) / (1 + η)
//! η  = 2(γ−1)/(γ+1)·(h_fg/RT)·(h_fg/RT − 0.5)                 (Kantrowitz 修正)
//! ```
//!
//! S ≤ 1 时 J = 0，临界半径不存在。
//!
//! # Young 液滴生长
//!
//! ```text
//! dr/dt = λ_v·(Tsat − T)·(1 − r*/r) / (ρ_l·h_fg·r·[1/(1 + 2βKn) + 3.78(1 − ν)·Kn/Pr])
//! Kn    = λ / (2r),  λ = (μ/p)·sqrt(πRT/2)
//! ν     = (R·Tsat/h_fg)·(α − 0.5 − (2 − q_c)/(2q_c)·(γ + 1)/(2γ)·(cp·Tsat/h_fg))
//! ```
//!
//! 只有已有液滴（Y > 0 且 r > 0）时才允许 dr/dt < 0。

use std::f64::consts::PI;

use crate::params::PhaseParams;
use crate::thermo::ClosureState;

/// 水分子质量 [kg]
pub const M_H2O: f64 = 2.99e-26;

/// Boltzmann 常数 [J/K]
pub const K_BOLTZMANN: f64 = 1.380649e-23;

/// 单元成核/生长结果
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct KineticsState {
    /// 临界半径 [m]，S ≤ 1 时为 `None`
    pub r_critical: Option<f64>,
    /// 新核半径 [m]
    pub r_nucleation: Option<f64>,
    /// 本次生长计算使用的半径 [m]
    pub r_growth: f64,
    /// 成核率 [1/(m³·s)]
    pub j: f64,
    /// 液滴半径增长率 [m/s]
    pub drdt: f64,
    /// 液滴 Knudsen 数
    pub knudsen: f64,
    /// 分子平均自由程 [m]
    pub mean_free_path: f64,
    /// Young 修正 ν
    pub v_corr: f64,
}

/// 单元输入
#[derive(Debug, Clone, Copy)]
pub struct KineticsInput {
    /// 压力 [Pa]
    pub p: f64,
    /// 温度 [K]
    pub t: f64,
    /// 气相密度 [kg/m³]
    pub rho: f64,
    /// 液相质量分数
    pub y: f64,
    /// 持久化的实际液滴半径 [m]
    pub r_actual: f64,
}

/// 成核动力学模型
#[derive(Debug, Clone, Copy)]
pub struct NucleationModel<'a> {
    params: &'a PhaseParams,
}

impl<'a> NucleationModel<'a> {
    /// 创建模型
    pub fn new(params: &'a PhaseParams) -> Self {
        Self { params }
    }

    /// 临界半径
    pub fn critical_radius(&self, closure: &ClosureState, t: f64) -> Option<f64> {
        if !closure.is_supersaturated() {
            return None;
        }
        let r = self.params.gas().r;
        let ln_s = closure.s_sat.ln();
        let r_star = 2.0 * closure.surface_tension / (closure.rho_liquid * r * t * ln_s);
        (r_star.is_finite() && r_star > 0.0).then_some(r_star)
    }

    /// Kantrowitz 非等温修正因子 1/(1+η)
    pub fn kantrowitz_factor(&self, h_fg: f64, t: f64) -> f64 {
        let gas = self.params.gas();
        let a = h_fg / (gas.r * t);
        let eta = 2.0 * (gas.gamma - 1.0) / (gas.gamma + 1.0) * a * (a - 0.5);
        1.0 / (1.0 + eta.max(0.0))
    }

    /// 成核率
    pub fn nucleation_rate(&self, closure: &ClosureState, rho_v: f64, t: f64, r_star: f64) -> f64 {
        let nu = &self.params.nucleation;
        let sigma = closure.surface_tension;
        let prefactor = nu.condensation_coefficient * rho_v * rho_v / closure.rho_liquid
            * (2.0 * sigma / (PI * M_H2O.powi(3))).sqrt();
        let barrier = 4.0 * PI * r_star * r_star * sigma / (3.0 * K_BOLTZMANN * t);
        let mut j = prefactor * (-barrier).exp();
        if nu.kantrowitz_correction {
            j *= self.kantrowitz_factor(closure.h_fg, t);
        }
        if j.is_finite() { j.max(0.0) } else { 0.0 }
    }

    /// 分子平均自由程
    pub fn mean_free_path(&self, p: f64, t: f64) -> f64 {
        let mu = self.params.transport.viscosity(t);
        let r = self.params.gas().r;
        mu / p * (PI * r * t / 2.0).sqrt()
    }

    /// Young 修正 ν
    pub fn young_correction(&self, closure: &ClosureState) -> f64 {
        let gas = self.params.gas();
        let nu = &self.params.nucleation;
        let qc = nu.condensation_coefficient;
        let ts = closure.tsat;
        gas.r * ts / closure.h_fg
            * (nu.young_alpha
                - 0.5
                - (2.0 - qc) / (2.0 * qc) * (gas.gamma + 1.0) / (2.0 * gas.gamma) * gas.cp() * ts
                    / closure.h_fg)
    }

    /// 给定半径下的生长率（未做符号限制）
    pub fn growth_rate(
        &self,
        closure: &ClosureState,
        r: f64,
        r_star: Option<f64>,
        knudsen: f64,
        v_corr: f64,
        t: f64,
    ) -> f64 {
        if r <= 0.0 {
            return 0.0;
        }
        let tr = &self.params.transport;
        let cp = self.params.gas().cp();
        let prandtl = tr.viscosity(t) * cp / tr.thermal_conductivity;
        let beta = self.params.nucleation.young_beta;

        let capillary = match r_star {
            Some(rs) if closure.is_supersaturated() => 1.0 - rs / r,
            _ => 1.0,
        };
        let denom = closure.rho_liquid
            * closure.h_fg
            * r
            * (1.0 / (1.0 + 2.0 * beta * knudsen) + 3.78 * (1.0 - v_corr) * knudsen / prandtl);
        let drdt = tr.thermal_conductivity * closure.t_sc * capillary / denom;
        if drdt.is_finite() { drdt } else { 0.0 }
    }

    /// 计算单元成核与生长
    ///
    /// 尚无液滴而成核率为正时，以新核半径作为生长半径。
    pub fn evaluate(&self, input: &KineticsInput, closure: &ClosureState) -> KineticsState {
        let r_critical = self.critical_radius(closure, input.t);
        let r_nucleation = r_critical.map(|r| r * self.params.nucleation.nucleation_radius_factor);
        let j = match r_critical {
            Some(rs) => self.nucleation_rate(closure, input.rho, input.t, rs),
            None => 0.0,
        };

        let has_droplets = input.r_actual > 0.0;
        let r_growth = if has_droplets {
            input.r_actual
        } else if j > 0.0 {
            r_nucleation.unwrap_or(0.0)
        } else {
            0.0
        };

        let mean_free_path = self.mean_free_path(input.p, input.t);
        let knudsen = if r_growth > 0.0 {
            mean_free_path / (2.0 * r_growth)
        } else {
            0.0
        };
        let v_corr = self.young_correction(closure);

        let mut drdt = self.growth_rate(closure, r_growth, r_critical, knudsen, v_corr, input.t);
        if !(input.y > 0.0 && has_droplets) {
            drdt = drdt.max(0.0);
        }

        KineticsState {
            r_critical,
            r_nucleation,
            r_growth,
            j,
            drdt,
            knudsen,
            mean_free_path,
            v_corr,
        }
    }
}
