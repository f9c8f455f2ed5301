// crates/cf_physics/src/thermo/closure.rs

//! 热力学闭合
//!
//! 由 (p, T, U, h) 计算饱和状态与液相物性。液相物性按温度分为两个互不重叠的区间：
//!
//! | 区间 | 温度范围 | h_fg [J/kg] | σ | ρ_l [kg/m³] | 饱和曲线 |
//! |---|---|---|---|---|---|
//! | `WarmLiquid` | 273.16 < T < T_crit | 2.257e6 | σ_B·τ^σ_μ·(1+σ_b·τ) | 1000 | 气-液 |
//! | `ColdLiquid` | 173.16 ≤ T ≤ 273.16 | 2.836e6 | 93.6635e-3 + 9.133e-6·T − 2.75e-7·T² | 917 | 气-固 |
//! | `OutOfRange` | 其余 | - | - | - | - |
//!
//! T = 273.16 K 属于冷区间，物性在此处不连续（潜热跳变约 5.8e5 J/kg）。
//! 区间外不外推，返回 [`PhaseError::ModelDomain`]。

use cf_foundation::require;
use glam::DVec3;

use super::gas::IdealGas;
use super::saturation::{SaturationCurve, T_MIN, T_TRIPLE};
use crate::error::{PhaseError, PhaseResult};

/// 过饱和度上限（饱和压力趋近于零时的哨兵值）
pub const S_SAT_MAX: f64 = 1e10;

/// 暖区间汽化潜热 [J/kg]
pub const H_FG_WARM: f64 = 2.257e6;

/// 冷区间潜热 [J/kg]
pub const H_FG_COLD: f64 = 2.836e6;

/// 暖区间液相密度 [kg/m³]
pub const RHO_LIQUID_WARM: f64 = 1000.0;

/// 冷区间凝结相密度 [kg/m³]
pub const RHO_LIQUID_COLD: f64 = 917.0;

/// 液相物性区间
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiquidRegime {
    /// T > 273.16 K
    WarmLiquid,
    /// 173.16 K ≤ T ≤ 273.16 K
    ColdLiquid,
    /// 超出模型范围
    OutOfRange,
}

/// 表面张力关联式系数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceTensionCoeffs {
    /// σ_B [N/m]
    pub sigma_b_coeff: f64,
    /// σ_μ
    pub sigma_mu: f64,
    /// σ_b
    pub sigma_b: f64,
    /// 临界温度 [K]
    pub t_crit: f64,
}

impl Default for SurfaceTensionCoeffs {
    fn default() -> Self {
        Self {
            sigma_b_coeff: 0.2358,
            sigma_mu: 1.256,
            sigma_b: -0.625,
            t_crit: 647.096,
        }
    }
}

impl LiquidRegime {
    /// 按温度分类
    pub fn classify(t: f64, t_crit: f64) -> Self {
        if !t.is_finite() || t >= t_crit || t < T_MIN {
            Self::OutOfRange
        } else if t > T_TRIPLE {
            Self::WarmLiquid
        } else {
            Self::ColdLiquid
        }
    }

    /// 潜热 [J/kg]
    pub fn latent_heat(self) -> Option<f64> {
        match self {
            Self::WarmLiquid => Some(H_FG_WARM),
            Self::ColdLiquid => Some(H_FG_COLD),
            Self::OutOfRange => None,
        }
    }

    /// 凝结相密度 [kg/m³]
    pub fn liquid_density(self) -> Option<f64> {
        match self {
            Self::WarmLiquid => Some(RHO_LIQUID_WARM),
            Self::ColdLiquid => Some(RHO_LIQUID_COLD),
            Self::OutOfRange => None,
        }
    }

    /// 该区间使用的饱和曲线
    pub fn curve(self) -> Option<SaturationCurve> {
        match self {
            Self::WarmLiquid => Some(SaturationCurve::VaporLiquid),
            Self::ColdLiquid => Some(SaturationCurve::VaporIce),
            Self::OutOfRange => None,
        }
    }

    /// 表面张力 [N/m]
    pub fn surface_tension(self, t: f64, coeffs: &SurfaceTensionCoeffs) -> Option<f64> {
        match self {
            Self::WarmLiquid => {
                let tau = (1.0 - t / coeffs.t_crit).max(0.0);
                Some(coeffs.sigma_b_coeff * tau.powf(coeffs.sigma_mu) * (1.0 + coeffs.sigma_b * tau))
            }
            Self::ColdLiquid => Some(93.6635e-3 + 9.133e-6 * t - 2.75e-7 * t * t),
            Self::OutOfRange => None,
        }
    }
}

/// 单元的闭合结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClosureState {
    /// 物性区间
    pub regime: LiquidRegime,
    /// 饱和压力 [Pa]
    pub psat: f64,
    /// 饱和温度 [K]
    pub tsat: f64,
    /// 过饱和度 p/psat
    pub s_sat: f64,
    /// 过冷度 Tsat − T [K]
    pub t_sc: f64,
    /// 潜热 [J/kg]
    pub h_fg: f64,
    /// 表面张力 [N/m]
    pub surface_tension: f64,
    /// 凝结相密度 [kg/m³]
    pub rho_liquid: f64,
    /// 气相比焓 [J/kg]
    pub h: f64,
    /// 液相比焓 h − h_fg [J/kg]
    pub h_liquid: f64,
    /// 液滴携带的比焓 h_liquid + ½|U|² [J/kg]
    pub h_droplet: f64,
}

impl ClosureState {
    /// 是否过饱和
    #[inline]
    pub fn is_supersaturated(&self) -> bool {
        self.s_sat > 1.0
    }
}

/// 热力学闭合计算器
#[derive(Debug, Clone, Copy, Default)]
pub struct ThermoClosure {
    /// 气相
    pub gas: IdealGas,
    /// 表面张力系数
    pub sigma: SurfaceTensionCoeffs,
}

impl ThermoClosure {
    /// 创建闭合计算器
    pub fn new(gas: IdealGas, sigma: SurfaceTensionCoeffs) -> Self {
        Self { gas, sigma }
    }

    /// 温度对应的物性区间
    #[inline]
    pub fn regime(&self, t: f64) -> LiquidRegime {
        LiquidRegime::classify(t, self.sigma.t_crit)
    }

    /// 计算单元闭合状态
    ///
    /// 错误中的单元索引为 0，由调用方通过 [`PhaseError::at_cell`] 补全。
    pub fn evaluate(&self, p: f64, t: f64, u: DVec3) -> PhaseResult<ClosureState> {
        let regime = self.regime(t);
        let (h_fg, rho_liquid, curve, surface_tension) = match (
            regime.latent_heat(),
            regime.liquid_density(),
            regime.curve(),
            regime.surface_tension(t, &self.sigma),
        ) {
            (Some(h_fg), Some(rho_l), Some(curve), Some(sigma)) => (h_fg, rho_l, curve, sigma),
            _ => {
                let reason = if t < T_MIN {
                    "低于液相物性下限 173.16 K"
                } else {
                    "超出气相温度上限或非有限"
                };
                return Err(PhaseError::model_domain(0, "T", t, reason));
            }
        };

        // psat 与 Tsat 取自同一条曲线，S > 1 与 T_sc > 0 一致
        let psat = curve.psat(t);
        let tsat = require!(
            curve.tsat(p),
            PhaseError::model_domain(0, "p", p, "压力必须为正且有限")
        );
        let s_sat = saturation_ratio(p, psat);

        let h = self.gas.enthalpy(t);
        let h_liquid = h - h_fg;
        let h_droplet = h_liquid + 0.5 * u.length_squared();

        Ok(ClosureState {
            regime,
            psat,
            tsat,
            s_sat,
            t_sc: tsat - t,
            h_fg,
            surface_tension,
            rho_liquid,
            h,
            h_liquid,
            h_droplet,
        })
    }
}

/// 受保护的过饱和度 p/psat，上限为 [`S_SAT_MAX`]
#[inline]
pub fn saturation_ratio(p: f64, psat: f64) -> f64 {
    if psat * S_SAT_MAX <= p || !psat.is_finite() {
        S_SAT_MAX
    } else {
        (p / psat).min(S_SAT_MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thermo::saturation::{psat_ice, psat_liquid};

    fn closure() -> ThermoClosure {
        ThermoClosure::default()
    }

    #[test]
    fn test_regime_boundaries() {
        let t_crit = 647.096;
        assert_eq!(LiquidRegime::classify(273.17, t_crit), LiquidRegime::WarmLiquid);
        assert_eq!(LiquidRegime::classify(273.16, t_crit), LiquidRegime::ColdLiquid);
        assert_eq!(LiquidRegime::classify(173.16, t_crit), LiquidRegime::ColdLiquid);
        assert_eq!(LiquidRegime::classify(173.15, t_crit), LiquidRegime::OutOfRange);
        assert_eq!(LiquidRegime::classify(t_crit, t_crit), LiquidRegime::OutOfRange);
        assert_eq!(LiquidRegime::classify(f64::NAN, t_crit), LiquidRegime::OutOfRange);
    }

    #[test]
    fn test_regime_jump_at_triple_point() {
        let c = closure();
        let cold = c.evaluate(600.0, 273.16, DVec3::ZERO).unwrap();
        let warm = c.evaluate(600.0, 273.16 + 1e-9, DVec3::ZERO).unwrap();
        assert!((cold.h_fg - H_FG_COLD).abs() < 1e-6);
        assert!((warm.h_fg - H_FG_WARM).abs() < 1e-6);
        assert!(cold.h_fg - warm.h_fg > 5e5);
        assert!((cold.rho_liquid - 917.0).abs() < 1e-12);
        assert!((warm.rho_liquid - 1000.0).abs() < 1e-12);

        // 两条表面张力关联式在三相点处几乎衔接：σ_warm − σ_cold ≈ +7.507e-6 N/m
        let jump = warm.surface_tension - cold.surface_tension;
        assert!((jump - 7.507e-6).abs() < 1e-8, "σ 跳跃 = {jump:e}");
        assert!((cold.surface_tension - 0.075_638_764).abs() < 1e-9);
    }

    #[test]
    fn test_saturation_ratio_monotonic_in_pressure() {
        let c = closure();
        for t in [200.0, 250.0, 273.16, 300.0, 350.0] {
            let psat = c.evaluate(1000.0, t, DVec3::ZERO).unwrap().psat;
            let mut prev = 0.0;
            for k in 1..=40 {
                let p = psat * 0.05 * k as f64;
                let s = c.evaluate(p, t, DVec3::ZERO).unwrap();
                assert!(s.s_sat > prev, "T={t}, p={p}: S 不随 p 单调增");
                if (s.s_sat - 1.0).abs() > 1e-6 {
                    assert_eq!(s.is_supersaturated(), s.t_sc > 0.0, "T={t}, p={p}");
                }
                prev = s.s_sat;
            }

            let at = c.evaluate(psat, t, DVec3::ZERO).unwrap();
            assert_eq!(at.s_sat, 1.0);
            assert!(!at.is_supersaturated());
            assert!(at.t_sc.abs() < 1e-6, "T={t}: T_sc = {}", at.t_sc);
        }
    }

    #[test]
    fn test_tsat_consistent_just_above_triple_point() {
        // 液线压力略低于三相点压力时，过饱和与过冷仍同号
        let t = 273.165;
        let p = 611.3;
        assert!(psat_liquid(t) < p);
        let s = closure().evaluate(p, t, DVec3::ZERO).unwrap();
        assert_eq!(s.regime, LiquidRegime::WarmLiquid);
        assert!(s.s_sat > 1.0);
        assert!(s.t_sc > 0.0);
    }

    #[test]
    fn test_out_of_range_is_error() {
        let c = closure();
        assert!(matches!(
            c.evaluate(100.0, 150.0, DVec3::ZERO),
            Err(PhaseError::ModelDomain { quantity: "T", .. })
        ));
        assert!(c.evaluate(1e5, 700.0, DVec3::ZERO).is_err());
        assert!(c.evaluate(1000.0, f64::INFINITY, DVec3::ZERO).is_err());
        assert!(matches!(
            c.evaluate(0.0, 250.0, DVec3::ZERO),
            Err(PhaseError::ModelDomain { quantity: "p", .. })
        ));
    }

    #[test]
    fn test_surface_tension_values() {
        let coeffs = SurfaceTensionCoeffs::default();
        let warm = LiquidRegime::WarmLiquid.surface_tension(300.0, &coeffs).unwrap();
        assert!((warm - 0.0717).abs() < 2e-3);
        let cold = LiquidRegime::ColdLiquid.surface_tension(250.0, &coeffs).unwrap();
        let expected = 93.6635e-3 + 9.133e-6 * 250.0 - 2.75e-7 * 250.0 * 250.0;
        assert!((cold - expected).abs() < 1e-15);
    }

    #[test]
    fn test_enthalpies() {
        let c = closure();
        let u = DVec3::new(300.0, 40.0, 0.0);
        let s = c.evaluate(1000.0, 250.0, u).unwrap();
        assert!((s.h - c.gas.cp() * 250.0).abs() < 1e-9);
        assert!((s.h_liquid - (s.h - s.h_fg)).abs() < 1e-9);
        assert!((s.h_droplet - (s.h_liquid + 0.5 * u.length_squared())).abs() < 1e-9);
    }

    #[test]
    fn test_supersaturated_cold_state() {
        let s = closure().evaluate(1000.0, 250.0, DVec3::ZERO).unwrap();
        assert_eq!(s.regime, LiquidRegime::ColdLiquid);
        assert!((s.psat - psat_ice(250.0)).abs() < 1e-12);
        assert!(s.psat < 1000.0);
        assert!(s.s_sat > 10.0);
        assert!(s.t_sc > 0.0);
    }

    #[test]
    fn test_subsaturated_warm_state() {
        let s = closure().evaluate(1000.0, 320.0, DVec3::ZERO).unwrap();
        assert!((s.psat - psat_liquid(320.0)).abs() < 1e-9);
        assert!(s.s_sat < 1.0);
        assert!(s.t_sc < 0.0);
    }

    #[test]
    fn test_saturation_ratio_guard() {
        assert_eq!(saturation_ratio(1000.0, 0.0), S_SAT_MAX);
        assert_eq!(saturation_ratio(1000.0, 1e-20), S_SAT_MAX);
        assert!((saturation_ratio(1000.0, 500.0) - 2.0).abs() < 1e-15);
    }
}
