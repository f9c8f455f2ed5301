// crates/cf_physics/src/thermo/gas.rs

//! 理想气体闭合
//!
//! 气相按量热完全气体处理：
//!
//! ```text
//! p = ρRT,  e = Cv·T,  h = Cp·T,  c = sqrt(γRT)
//! ```

use cf_foundation::float::safe_sqrt;
use glam::DVec3;

/// 理想气体
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IdealGas {
    /// 气体常数 R [J/(kg·K)]
    pub r: f64,
    /// 比热比 γ
    pub gamma: f64,
}

impl Default for IdealGas {
    fn default() -> Self {
        Self::water_vapor()
    }
}

impl IdealGas {
    /// 创建理想气体
    pub fn new(r: f64, gamma: f64) -> Self {
        Self { r, gamma }
    }

    /// 水蒸气（R = 461.52, γ = 1.333）
    pub fn water_vapor() -> Self {
        Self::new(461.52, 1.333)
    }

    /// 定压比热 Cp
    #[inline]
    pub fn cp(&self) -> f64 {
        self.gamma * self.r / (self.gamma - 1.0)
    }

    /// 定容比热 Cv
    #[inline]
    pub fn cv(&self) -> f64 {
        self.r / (self.gamma - 1.0)
    }

    /// 比内能 e = Cv·T
    #[inline]
    pub fn internal_energy(&self, t: f64) -> f64 {
        self.cv() * t
    }

    /// 比焓 h = Cp·T
    #[inline]
    pub fn enthalpy(&self, t: f64) -> f64 {
        self.cp() * t
    }

    /// 由比内能求温度
    #[inline]
    pub fn temperature_from_energy(&self, e: f64) -> f64 {
        e / self.cv()
    }

    /// 状态方程 p = ρRT
    #[inline]
    pub fn pressure(&self, rho: f64, t: f64) -> f64 {
        rho * self.r * t
    }

    /// 由压力和温度求密度
    #[inline]
    pub fn density(&self, p: f64, t: f64) -> f64 {
        p / (self.r * t)
    }

    /// 声速
    #[inline]
    pub fn sound_speed(&self, t: f64) -> f64 {
        safe_sqrt(self.gamma * self.r * t)
    }

    /// 马赫数
    #[inline]
    pub fn mach(&self, u: DVec3, t: f64) -> f64 {
        let c = self.sound_speed(t);
        if c > 0.0 { u.length() / c } else { 0.0 }
    }

    /// 单位体积总能 ρE = ρ(e + ½|U|²)
    #[inline]
    pub fn total_energy(&self, rho: f64, t: f64, u: DVec3) -> f64 {
        rho * (self.internal_energy(t) + 0.5 * u.length_squared())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_water_vapor_heat_capacities() {
        let gas = IdealGas::water_vapor();
        assert!((gas.cp() - gas.cv() - gas.r).abs() < 1e-9);
        assert!((gas.cp() / gas.cv() - gas.gamma).abs() < 1e-12);
        assert!((gas.cp() - 1847.5).abs() < 1.0);
    }

    #[test]
    fn test_energy_temperature_inverse() {
        let gas = IdealGas::water_vapor();
        let e = gas.internal_energy(250.0);
        assert!((gas.temperature_from_energy(e) - 250.0).abs() < 1e-10);
    }

    #[test]
    fn test_equation_of_state() {
        let gas = IdealGas::water_vapor();
        let rho = gas.density(1000.0, 250.0);
        assert!((gas.pressure(rho, 250.0) - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn test_mach() {
        let gas = IdealGas::water_vapor();
        let c = gas.sound_speed(300.0);
        let m = gas.mach(DVec3::new(c, 0.0, 0.0), 300.0);
        assert!((m - 1.0).abs() < 1e-12);
    }
}
