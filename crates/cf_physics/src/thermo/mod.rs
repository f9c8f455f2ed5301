// crates/cf_physics/src/thermo/mod.rs

//! 热力学模块
//!
//! - [`gas`]: 水蒸气理想气体闭合
//! - [`saturation`]: 气-液 / 气-固饱和曲线及其逆
//! - [`closure`]: 分区间液相物性与单元闭合状态

pub mod closure;
pub mod gas;
pub mod saturation;

pub use closure::{
    ClosureState, LiquidRegime, S_SAT_MAX, SurfaceTensionCoeffs, ThermoClosure, saturation_ratio,
};
pub use gas::IdealGas;
pub use saturation::{P_TRIPLE, SaturationCurve, T_MIN, T_TRIPLE, psat_ice, psat_liquid};
