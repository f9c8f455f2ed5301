// crates/cf_physics/src/sources/wall.rs

//! 壁面沉积/升华模型
//!
//! 贴壁单元中的体积源项：
//!
//! ```text
//! S_ρ  = −mdot_a + mdot_s
//! S_ρU = −mdot_a·U                        (升华自静止壁面，不带动量)
//! S_ρE = −h_liquid·mdot_a + h·mdot_s      (Source_e_wall = h_liquid·mdot_a)
//! ```
//!
//! 速率来源由 [`DepositionLaw`] 决定：
//!
//! - `Prescribed`：读取持久化场 mdot_a / mdot_s
//! - `Kinetic`：Hertz–Knudsen 碰撞沉积 mdot_a = S_stick·ρ·v̄/4·A/V（仅 S > 1），
//!   冰面升华 mdot_s = α_s·psat_ice(T_w)·sqrt(m/(2πkT_w))·A/V（仅有冰时）
//!
//! 另提供慢时间尺度上的冰层增厚积分 [`IceLayerModel`]。

use std::f64::consts::PI;

use cf_config::{DepositionLaw, WallConfig};

use super::traits::{CellView, SourceContext, SourceContribution, SourceTerm};
use crate::mesh::PhaseMesh;
use crate::nucleation::{K_BOLTZMANN, M_H2O};
use crate::thermo::psat_ice;

/// 单元壁面速率
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WallRates {
    /// 沉积速率 [kg/(m³·s)]
    pub mdot_a: f64,
    /// 升华速率 [kg/(m³·s)]
    pub mdot_s: f64,
    /// 沉积带走的能量 h_liquid·mdot_a [W/m³]
    pub source_e_wall: f64,
    /// 升华带入的能量 h·mdot_s [W/m³]
    pub source_e_sublimation: f64,
}

impl WallRates {
    /// 净气相质量源
    #[inline]
    pub fn mass_source(&self) -> f64 {
        self.mdot_s - self.mdot_a
    }

    /// 净气相能量源
    #[inline]
    pub fn energy_source(&self) -> f64 {
        self.source_e_sublimation - self.source_e_wall
    }
}

/// 壁面沉积模型
#[derive(Debug, Clone)]
pub struct WallModel {
    law: DepositionLaw,
    /// 每个单元的壁面积/体积 [1/m]，非贴壁单元为 0
    area_per_volume: Vec<f64>,
}

impl WallModel {
    /// 由配置和网格构建
    pub fn new(config: &WallConfig, mesh: &PhaseMesh) -> Self {
        let mut area_per_volume = vec![0.0; mesh.n_cells()];
        for wall in mesh.walls() {
            area_per_volume[wall.cell] += wall.area / mesh.volume(wall.cell);
        }
        Self {
            law: config.law,
            area_per_volume,
        }
    }

    /// 沉积速率律
    pub fn law(&self) -> DepositionLaw {
        self.law
    }

    /// 是否贴壁单元
    #[inline]
    pub fn is_wall_cell(&self, cell: usize) -> bool {
        self.area_per_volume.get(cell).is_some_and(|&a| a > 0.0)
    }

    /// 壁面积/体积
    #[inline]
    pub fn area_per_volume(&self, cell: usize) -> f64 {
        self.area_per_volume.get(cell).copied().unwrap_or(0.0)
    }

    /// 计算单元壁面速率
    pub fn rates(&self, view: &CellView<'_>) -> WallRates {
        let a_v = self.area_per_volume(view.cell);
        if a_v <= 0.0 {
            return WallRates::default();
        }

        let (mdot_a, mdot_s) = match self.law {
            DepositionLaw::Prescribed => (view.mdot_a_prescribed, view.mdot_s_prescribed),
            DepositionLaw::Kinetic {
                sticking_coefficient,
                sublimation_coefficient,
                wall_temperature,
            } => {
                let mdot_a = if view.closure.is_supersaturated() {
                    sticking_coefficient * view.rho * mean_molecular_speed(view.t) / 4.0 * a_v
                } else {
                    0.0
                };
                let mdot_s = if view.ice_thickness > 0.0 {
                    sublimation_coefficient
                        * psat_ice(wall_temperature)
                        * (M_H2O / (2.0 * PI * K_BOLTZMANN * wall_temperature)).sqrt()
                        * a_v
                } else {
                    0.0
                };
                (mdot_a, mdot_s)
            }
        };

        WallRates {
            mdot_a,
            mdot_s,
            source_e_wall: view.closure.h_liquid * mdot_a,
            source_e_sublimation: view.closure.h * mdot_s,
        }
    }
}

impl SourceTerm for WallModel {
    fn name(&self) -> &'static str {
        "WallDeposition"
    }

    fn is_enabled(&self) -> bool {
        self.area_per_volume.iter().any(|&a| a > 0.0)
    }

    fn compute_cell(&self, view: &CellView<'_>, _ctx: &SourceContext<'_>) -> SourceContribution {
        let rates = self.rates(view);
        SourceContribution::new(rates.mass_source(), -rates.mdot_a * view.u, rates.energy_source())
    }
}

/// 分子平均热运动速率 v̄ = sqrt(8kT/(πm))
#[inline]
pub fn mean_molecular_speed(t: f64) -> f64 {
    (8.0 * K_BOLTZMANN * t / (PI * M_H2O)).sqrt()
}

// ============================================================================
// 冰层增厚
// ============================================================================

/// 贴壁单元的冰层输入
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WallSample {
    /// 局部通道高度 [m]
    pub channel_height: f64,
    /// 净沉积面通量（沉积 − 升华）[kg/(m²·s)]
    pub net_mass_flux: f64,
}

/// 冰层演化结果
#[derive(Debug, Clone, PartialEq)]
pub struct RecessionOutcome {
    /// 经过的壁面时间 [s]
    pub elapsed: f64,
    /// 各贴壁单元的冰层增量 [m]
    pub growth: Vec<f64>,
    /// 演化后的通道高度 [m]
    pub heights: Vec<f64>,
    /// 是否有单元完全堵塞
    pub closed: bool,
    /// 积分步数
    pub steps: usize,
}

const MAX_RECESSION_STEPS: usize = 1_000_000;

/// 冰层增厚模型
///
/// dRw/dt = δ·mdot/m_layer，m_layer = (1/δ)²·m_H2O，δ 为单分子层厚度。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IceLayerModel {
    layer_thickness: f64,
    threshold_fraction: f64,
    safety: f64,
    dt_min: f64,
    dt_max: f64,
}

impl IceLayerModel {
    /// 由配置构建
    pub fn new(config: &WallConfig) -> Self {
        Self {
            layer_thickness: config.layer_thickness,
            threshold_fraction: config.threshold_fraction,
            safety: config.recession_safety,
            dt_min: config.wall_dt_min,
            dt_max: config.wall_dt_max,
        }
    }

    /// 单层冰的面密度 [kg/m²]
    pub fn mass_per_layer(&self) -> f64 {
        (1.0 / self.layer_thickness).powi(2) * M_H2O
    }

    /// 冰层增厚速率 [m/s]
    pub fn growth_rate(&self, net_mass_flux: f64) -> f64 {
        self.layer_thickness * net_mass_flux / self.mass_per_layer()
    }

    /// 积分冰层，直到任一单元达到阈值（通道高度的固定比例）或通道堵塞
    pub fn evolve(&self, samples: &[WallSample]) -> RecessionOutcome {
        let rates: Vec<f64> = samples.iter().map(|s| self.growth_rate(s.net_mass_flux)).collect();
        let thresholds: Vec<f64> = samples
            .iter()
            .map(|s| self.threshold_fraction * s.channel_height)
            .collect();
        let mut growth = vec![0.0; samples.len()];
        let mut heights: Vec<f64> = samples.iter().map(|s| s.channel_height).collect();

        let max_rate = rates.iter().fold(0.0_f64, |m, r| m.max(r.abs()));
        let mut elapsed = 0.0;
        let mut steps = 0;
        let mut closed = false;

        if max_rate <= 0.0 || samples.is_empty() {
            return RecessionOutcome {
                elapsed,
                growth,
                heights,
                closed,
                steps,
            };
        }

        let below = |g: &[f64]| g.iter().zip(&thresholds).all(|(g, th)| g.abs() < *th);
        while below(&growth) && !closed {
            if steps >= MAX_RECESSION_STEPS {
                log::warn!("冰层积分达到最大步数 {}", MAX_RECESSION_STEPS);
                break;
            }
            let max_delta = growth
                .iter()
                .zip(&thresholds)
                .fold(0.0_f64, |m, (g, th)| m.max((th - g).abs()));
            let dt = if max_delta > 0.0 {
                (self.safety * max_delta / max_rate).clamp(self.dt_min, self.dt_max)
            } else {
                self.dt_min
            };

            for ((g, h), rate) in growth.iter_mut().zip(heights.iter_mut()).zip(&rates) {
                *g += rate * dt;
                *h -= rate * dt;
            }
            elapsed += dt;
            steps += 1;

            if heights.iter().any(|&h| h <= 0.0) {
                log::info!("壁面在 t = {:.3} s 时完全堵塞", elapsed);
                closed = true;
            }
        }

        RecessionOutcome {
            elapsed,
            growth,
            heights,
            closed,
            steps,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thermo::ThermoClosure;
    use glam::DVec3;

    fn view<'a>(closure: &'a crate::thermo::ClosureState, ice: f64) -> CellView<'a> {
        CellView {
            cell: 0,
            p: 1000.0,
            t: 250.0,
            u: DVec3::ZERO,
            rho: 1000.0 / (461.52 * 250.0),
            closure,
            ice_thickness: ice,
            mdot_a_prescribed: 2e-3,
            mdot_s_prescribed: 5e-4,
        }
    }

    fn wall_mesh() -> PhaseMesh {
        PhaseMesh::uniform_channel(2, 0.02, 1e-3)
    }

    #[test]
    fn test_prescribed_rates_and_energy() {
        let closure = ThermoClosure::default().evaluate(1000.0, 250.0, DVec3::ZERO).unwrap();
        let model = WallModel::new(&WallConfig::default(), &wall_mesh());
        let rates = model.rates(&view(&closure, 0.0));
        assert!((rates.mdot_a - 2e-3).abs() < 1e-15);
        assert!((rates.mdot_s - 5e-4).abs() < 1e-15);
        assert!((rates.source_e_wall - closure.h_liquid * 2e-3).abs() < 1e-9);
        assert!((rates.mass_source() + 1.5e-3).abs() < 1e-15);
    }

    #[test]
    fn test_kinetic_sublimation_requires_ice() {
        let closure = ThermoClosure::default().evaluate(1000.0, 250.0, DVec3::ZERO).unwrap();
        let config = WallConfig {
            law: DepositionLaw::Kinetic {
                sticking_coefficient: 1.0,
                sublimation_coefficient: 1.0,
                wall_temperature: 200.0,
            },
            ..WallConfig::default()
        };
        let model = WallModel::new(&config, &wall_mesh());

        let bare = model.rates(&view(&closure, 0.0));
        assert!(bare.mdot_a > 0.0);
        assert_eq!(bare.mdot_s, 0.0);

        let iced = model.rates(&view(&closure, 1e-6));
        assert!(iced.mdot_s > 0.0);
        assert!((iced.mdot_a - bare.mdot_a).abs() < 1e-15);
    }

    #[test]
    fn test_source_term_contribution() {
        let closure = ThermoClosure::default().evaluate(1000.0, 250.0, DVec3::ZERO).unwrap();
        let params = crate::params::PhaseParams::default();
        let model = WallModel::new(&WallConfig::default(), &wall_mesh());
        assert!(model.is_enabled());
        let ctx = SourceContext::new(0.0, 1e-7, &params);
        let c = model.compute_cell(&view(&closure, 0.0), &ctx);
        assert!(c.s_rho < 0.0);
        assert_eq!(c.s_rho_u, DVec3::ZERO);

        // 沉积带走自身动量，升华不带动量
        let mut moving = view(&closure, 0.0);
        moving.u = DVec3::new(100.0, 0.0, 0.0);
        let c = model.compute_cell(&moving, &ctx);
        assert!((c.s_rho_u.x + 2e-3 * 100.0).abs() < 1e-12);
        assert_eq!(c.s_rho_u.y, 0.0);
    }

    #[test]
    fn test_mass_per_layer() {
        let model = IceLayerModel::new(&WallConfig::default());
        let expected = (1.0 / 3e-10_f64).powi(2) * M_H2O;
        assert!((model.mass_per_layer() - expected).abs() / expected < 1e-12);
    }

    #[test]
    fn test_evolve_stops_at_threshold() {
        let model = IceLayerModel::new(&WallConfig::default());
        let samples = [
            WallSample {
                channel_height: 1e-3,
                net_mass_flux: 1e-6,
            },
            WallSample {
                channel_height: 2e-3,
                net_mass_flux: 5e-7,
            },
        ];
        let out = model.evolve(&samples);
        assert!(!out.closed);
        assert!(out.elapsed > 0.0);
        assert!(out.growth[0] >= 0.05 * 1e-3);
        assert!(out.heights[0] < 1e-3);
    }

    #[test]
    fn test_evolve_without_flux_is_noop() {
        let model = IceLayerModel::new(&WallConfig::default());
        let out = model.evolve(&[WallSample {
            channel_height: 1e-3,
            net_mass_flux: 0.0,
        }]);
        assert_eq!(out.steps, 0);
        assert_eq!(out.elapsed, 0.0);
    }
}
