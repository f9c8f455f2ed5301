// crates/cf_physics/src/state.rs

//! 两相流状态
//!
//! 采用 SoA 布局：
//!
//! ```text
//! 原始变量:  p, T, U, ρ, Y, N
//! 守恒变量:  ρ, ρU, ρE, ρN, ρY
//! ```
//!
//! ρ 为气相密度；液相以 ρY（单位体积液体质量）和 ρN（单位体积液滴数）输运。
//! 派生通量 ρUN = ρU·N、ρUY = ρU·Y 不单独存储。

use cf_foundation::KahanSum;
use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::error::{PhaseError, PhaseResult};
use crate::thermo::IdealGas;

// ============================================================
// 原始变量
// ============================================================

/// 原始变量
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrimitiveState {
    /// 压力 [Pa]
    pub p: Vec<f64>,
    /// 温度 [K]
    pub t: Vec<f64>,
    /// 速度 [m/s]
    pub u: Vec<DVec3>,
    /// 气相密度 [kg/m³]
    pub rho: Vec<f64>,
    /// 液相质量分数
    pub y: Vec<f64>,
    /// 液滴数 [1/kg]
    pub n: Vec<f64>,
}

impl PrimitiveState {
    /// 创建零状态
    pub fn new(n_cells: usize) -> Self {
        Self {
            p: vec![0.0; n_cells],
            t: vec![0.0; n_cells],
            u: vec![DVec3::ZERO; n_cells],
            rho: vec![0.0; n_cells],
            y: vec![0.0; n_cells],
            n: vec![0.0; n_cells],
        }
    }

    /// 均匀状态
    pub fn uniform(n_cells: usize, gas: &IdealGas, p: f64, t: f64, u: DVec3) -> Self {
        Self {
            p: vec![p; n_cells],
            t: vec![t; n_cells],
            u: vec![u; n_cells],
            rho: vec![gas.density(p, t); n_cells],
            y: vec![0.0; n_cells],
            n: vec![0.0; n_cells],
        }
    }

    /// 单元数
    #[inline]
    pub fn n_cells(&self) -> usize {
        self.p.len()
    }

    /// 由 p、T 重新计算 ρ
    pub fn update_density(&mut self, gas: &IdealGas) {
        for ((rho, &p), &t) in self.rho.iter_mut().zip(&self.p).zip(&self.t) {
            *rho = gas.density(p, t);
        }
    }

    /// 单元 Mach 数
    #[inline]
    pub fn mach(&self, cell: usize, gas: &IdealGas) -> f64 {
        gas.mach(self.u[cell], self.t[cell])
    }

    /// 校验各数组长度一致
    pub fn check_sizes(&self) -> PhaseResult<()> {
        let n = self.n_cells();
        PhaseError::check_size("T", n, self.t.len())?;
        PhaseError::check_size("U", n, self.u.len())?;
        PhaseError::check_size("rho", n, self.rho.len())?;
        PhaseError::check_size("Y", n, self.y.len())?;
        PhaseError::check_size("N", n, self.n.len())
    }
}

// ============================================================
// 守恒变量
// ============================================================

/// 守恒变量
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConservedState {
    /// 气相密度 [kg/m³]
    pub rho: Vec<f64>,
    /// 动量 [kg/(m²·s)]
    pub rho_u: Vec<DVec3>,
    /// 总能 [J/m³]
    pub rho_e: Vec<f64>,
    /// 液滴数密度 [1/m³]
    pub rho_n: Vec<f64>,
    /// 液相质量密度 [kg/m³]
    pub rho_y: Vec<f64>,
}

impl ConservedState {
    /// 创建零状态
    pub fn new(n_cells: usize) -> Self {
        Self {
            rho: vec![0.0; n_cells],
            rho_u: vec![DVec3::ZERO; n_cells],
            rho_e: vec![0.0; n_cells],
            rho_n: vec![0.0; n_cells],
            rho_y: vec![0.0; n_cells],
        }
    }

    /// 从原始变量构建
    pub fn from_primitive(prim: &PrimitiveState, gas: &IdealGas) -> Self {
        let n = prim.n_cells();
        let mut cons = Self::new(n);
        for i in 0..n {
            let rho = gas.density(prim.p[i], prim.t[i]);
            cons.rho[i] = rho;
            cons.rho_u[i] = rho * prim.u[i];
            cons.rho_e[i] = gas.total_energy(rho, prim.t[i], prim.u[i]);
            cons.rho_n[i] = rho * prim.n[i];
            cons.rho_y[i] = rho * prim.y[i];
        }
        cons
    }

    /// 单元数
    #[inline]
    pub fn n_cells(&self) -> usize {
        self.rho.len()
    }

    /// 液滴数通量密度 ρU·N
    #[inline]
    pub fn rho_un(&self, cell: usize, n: f64) -> DVec3 {
        self.rho_u[cell] * n
    }

    /// 液相质量通量密度 ρU·Y
    #[inline]
    pub fn rho_uy(&self, cell: usize, y: f64) -> DVec3 {
        self.rho_u[cell] * y
    }

    /// 水的总质量（气相 + 液相）[kg]
    pub fn total_water_mass(&self, volumes: &[f64]) -> f64 {
        self.rho
            .iter()
            .zip(&self.rho_y)
            .zip(volumes)
            .map(|((r, ry), v)| (r + ry) * v)
            .sum::<KahanSum>()
            .value()
    }

    /// 液相总质量 [kg]
    pub fn total_liquid_mass(&self, volumes: &[f64]) -> f64 {
        self.rho_y
            .iter()
            .zip(volumes)
            .map(|(ry, v)| ry * v)
            .sum::<KahanSum>()
            .value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_primitive() {
        let gas = IdealGas::water_vapor();
        let mut prim = PrimitiveState::uniform(3, &gas, 1000.0, 250.0, DVec3::new(100.0, 0.0, 0.0));
        prim.y[1] = 0.02;
        prim.n[1] = 1e16;
        let cons = ConservedState::from_primitive(&prim, &gas);

        let rho = 1000.0 / (461.52 * 250.0);
        assert!((cons.rho[0] - rho).abs() < 1e-12);
        assert!((cons.rho_u[0].x - rho * 100.0).abs() < 1e-10);
        assert!((cons.rho_y[1] - 0.02 * rho).abs() < 1e-14);
        assert!((cons.rho_un(1, prim.n[1]).x - rho * 100.0 * 1e16).abs() / (rho * 1e18) < 1e-12);
        let e = cons.rho_e[0] / cons.rho[0] - 0.5 * 100.0 * 100.0;
        assert!((gas.temperature_from_energy(e) - 250.0).abs() < 1e-9);
    }

    #[test]
    fn test_total_water_mass() {
        let gas = IdealGas::water_vapor();
        let mut prim = PrimitiveState::uniform(2, &gas, 1000.0, 250.0, DVec3::ZERO);
        prim.y[0] = 0.5;
        let cons = ConservedState::from_primitive(&prim, &gas);
        let total = cons.total_water_mass(&[1.0, 2.0]);
        assert!((total - cons.rho[0] * 3.5).abs() < 1e-12);
        assert!((cons.total_liquid_mass(&[1.0, 2.0]) - cons.rho[0] * 0.5).abs() < 1e-14);
    }

    #[test]
    fn test_size_check() {
        let mut prim = PrimitiveState::new(3);
        assert!(prim.check_sizes().is_ok());
        prim.y.pop();
        assert!(prim.check_sizes().is_err());
    }
}
