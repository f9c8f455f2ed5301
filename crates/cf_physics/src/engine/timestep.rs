// crates/cf_physics/src/engine/timestep.rs

//! 时间步长控制
//!
//! ```text
//! Δt = C · min_i  L_i / (|U_i| + c_i),   L_i = 2V_i / ΣA_f
//! ```
//!
//! 非自适应时取配置中的固定步长。两种情况都不越过结束时间。

use std::sync::atomic::{AtomicU64, Ordering};

use cf_config::TimeConfig;
use rayon::prelude::*;

use crate::mesh::PhaseMesh;
use crate::state::PrimitiveState;
use crate::thermo::IdealGas;

/// CFL 时间步计算器
#[derive(Debug, Clone)]
pub struct CflCalculator {
    cfl: f64,
    dt_min: f64,
    dt_max: f64,
    adaptive: bool,
    fixed_dt: f64,
}

impl CflCalculator {
    /// 由时间配置创建
    pub fn new(config: &TimeConfig) -> Self {
        Self {
            cfl: config.cfl,
            dt_min: config.dt_min,
            dt_max: config.dt,
            adaptive: config.adaptive,
            fixed_dt: config.dt,
        }
    }

    /// 最小步长
    pub fn dt_min(&self) -> f64 {
        self.dt_min
    }

    /// 最大波速 max(|U| + c)
    pub fn max_wave_speed(&self, prim: &PrimitiveState, gas: &IdealGas) -> f64 {
        let max_speed = AtomicU64::new(0u64);
        (0..prim.n_cells()).into_par_iter().for_each(|i| {
            let speed = prim.u[i].length() + gas.sound_speed(prim.t[i]);
            if speed.is_finite() {
                max_speed.fetch_max(speed.to_bits(), Ordering::Relaxed);
            }
        });
        f64::from_bits(max_speed.load(Ordering::Relaxed))
    }

    /// 计算时间步长
    pub fn compute_dt(&self, mesh: &PhaseMesh, prim: &PrimitiveState, gas: &IdealGas) -> f64 {
        if !self.adaptive || prim.n_cells() == 0 {
            return self.fixed_dt;
        }

        // 正浮点数的位序与数值序一致
        let min_dt = AtomicU64::new(f64::MAX.to_bits());
        (0..prim.n_cells()).into_par_iter().for_each(|i| {
            let speed = prim.u[i].length() + gas.sound_speed(prim.t[i]);
            if !(speed > 0.0) || !speed.is_finite() {
                return;
            }
            let dt = self.cfl * mesh.characteristic_length(i) / speed;
            min_dt.fetch_min(dt.to_bits(), Ordering::Relaxed);
        });

        f64::from_bits(min_dt.load(Ordering::Relaxed)).clamp(self.dt_min, self.dt_max)
    }

    /// 截断到结束时间
    #[inline]
    pub fn limit_to_end(dt: f64, time: f64, end_time: f64) -> f64 {
        let remaining = end_time - time;
        if remaining > 0.0 {
            dt.min(remaining)
        } else {
            dt
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;

    #[test]
    fn test_adaptive_dt_matches_formula() {
        let gas = IdealGas::water_vapor();
        let mesh = PhaseMesh::uniform_channel(10, 1.0, 0.01);
        let prim = PrimitiveState::uniform(10, &gas, 1000.0, 250.0, DVec3::new(100.0, 0.0, 0.0));
        let config = TimeConfig {
            dt: 1.0,
            ..TimeConfig::default()
        };
        let calc = CflCalculator::new(&config);
        let dt = calc.compute_dt(&mesh, &prim, &gas);
        let expected = config.cfl * 0.1 / (100.0 + gas.sound_speed(250.0));
        assert!((dt - expected).abs() / expected < 1e-12);
    }

    #[test]
    fn test_dt_capped_by_max() {
        let gas = IdealGas::water_vapor();
        let mesh = PhaseMesh::uniform_channel(10, 1.0, 0.01);
        let prim = PrimitiveState::uniform(10, &gas, 1000.0, 250.0, DVec3::ZERO);
        let calc = CflCalculator::new(&TimeConfig::default());
        assert_eq!(calc.compute_dt(&mesh, &prim, &gas), TimeConfig::default().dt);
    }

    #[test]
    fn test_fixed_dt() {
        let gas = IdealGas::water_vapor();
        let mesh = PhaseMesh::uniform_channel(4, 1.0, 0.01);
        let prim = PrimitiveState::uniform(4, &gas, 1000.0, 250.0, DVec3::ZERO);
        let config = TimeConfig {
            adaptive: false,
            dt: 3e-6,
            ..TimeConfig::default()
        };
        assert_eq!(CflCalculator::new(&config).compute_dt(&mesh, &prim, &gas), 3e-6);
    }

    #[test]
    fn test_limit_to_end() {
        assert_eq!(CflCalculator::limit_to_end(1e-3, 0.0, 5e-4), 5e-4);
        assert_eq!(CflCalculator::limit_to_end(1e-4, 0.0, 5e-4), 1e-4);
    }

    #[test]
    fn test_max_wave_speed() {
        let gas = IdealGas::water_vapor();
        let mut prim = PrimitiveState::uniform(3, &gas, 1000.0, 250.0, DVec3::ZERO);
        prim.u[1] = DVec3::new(0.0, 50.0, 0.0);
        let calc = CflCalculator::new(&TimeConfig::default());
        let s = calc.max_wave_speed(&prim, &gas);
        assert!((s - 50.0 - gas.sound_speed(250.0)).abs() < 1e-9);
    }
}
