// crates/cf_physics/src/sources/traits.rs

//! 源项 Trait 定义
//!
//! 定义气相源项的核心接口和数据结构。液相（ρY、ρN）源项由
//! [`SourceBuilder`](super::builder::SourceBuilder) 以分解形式给出，不经过本接口。

use glam::DVec3;

use crate::params::PhaseParams;
use crate::thermo::ClosureState;

/// 气相源项贡献
///
/// 单个单元对 (ρ, ρU, ρE) 的体积源项。
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SourceContribution {
    /// 质量源 [kg/(m³·s)]
    pub s_rho: f64,
    /// 动量源 [kg/(m²·s²)]
    pub s_rho_u: DVec3,
    /// 能量源 [W/m³]
    pub s_rho_e: f64,
}

impl SourceContribution {
    /// 零贡献常量
    pub const ZERO: Self = Self {
        s_rho: 0.0,
        s_rho_u: DVec3::ZERO,
        s_rho_e: 0.0,
    };

    /// 创建新的源项贡献
    #[inline]
    pub fn new(s_rho: f64, s_rho_u: DVec3, s_rho_e: f64) -> Self {
        Self {
            s_rho,
            s_rho_u,
            s_rho_e,
        }
    }

    /// 仅质量与能量
    #[inline]
    pub fn mass_energy(s_rho: f64, s_rho_e: f64) -> Self {
        Self::new(s_rho, DVec3::ZERO, s_rho_e)
    }

    /// 检查是否有效
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.s_rho.is_finite() && self.s_rho_u.is_finite() && self.s_rho_e.is_finite()
    }
}

impl std::ops::Add for SourceContribution {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            s_rho: self.s_rho + rhs.s_rho,
            s_rho_u: self.s_rho_u + rhs.s_rho_u,
            s_rho_e: self.s_rho_e + rhs.s_rho_e,
        }
    }
}

impl std::ops::AddAssign for SourceContribution {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

/// 源项计算上下文
#[derive(Debug, Clone, Copy)]
pub struct SourceContext<'a> {
    /// 当前模拟时间 [s]
    pub time: f64,
    /// 时间步长 [s]
    pub dt: f64,
    /// 物理参数
    pub params: &'a PhaseParams,
}

impl<'a> SourceContext<'a> {
    /// 创建新的源项上下文
    pub fn new(time: f64, dt: f64, params: &'a PhaseParams) -> Self {
        Self { time, dt, params }
    }
}

/// 单元视图：源项计算所需的单元局部量
#[derive(Debug, Clone, Copy)]
pub struct CellView<'a> {
    /// 单元索引
    pub cell: usize,
    /// 压力 [Pa]
    pub p: f64,
    /// 温度 [K]
    pub t: f64,
    /// 速度 [m/s]
    pub u: DVec3,
    /// 气相密度 [kg/m³]
    pub rho: f64,
    /// 闭合状态
    pub closure: &'a ClosureState,
    /// 壁面冰层厚度 [m]
    pub ice_thickness: f64,
    /// 给定的沉积速率 [kg/(m³·s)]
    pub mdot_a_prescribed: f64,
    /// 给定的升华速率 [kg/(m³·s)]
    pub mdot_s_prescribed: f64,
}

/// 气相源项 Trait
pub trait SourceTerm: Send + Sync {
    /// 源项名称
    fn name(&self) -> &'static str;

    /// 是否启用
    fn is_enabled(&self) -> bool {
        true
    }

    /// 计算单个单元的源项贡献
    fn compute_cell(&self, view: &CellView<'_>, ctx: &SourceContext<'_>) -> SourceContribution;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contribution_ops() {
        let a = SourceContribution::mass_energy(1.0, 10.0);
        let b = SourceContribution::new(-0.5, DVec3::X, 2.0);
        let mut c = a + b;
        assert!((c.s_rho - 0.5).abs() < 1e-15);
        assert!((c.s_rho_e - 12.0).abs() < 1e-15);
        c += SourceContribution::ZERO;
        assert!(c.is_valid());
        assert!(!SourceContribution::mass_energy(f64::NAN, 0.0).is_valid());
    }
}
