// crates/cf_physics/src/thermo/saturation.rs

//! 饱和曲线
//!
//! - 气-液线：psat = 610.8·exp(−5.1421·ln(T/273.16) − 6828.77·(1/T − 1/273.16))
//! - 气-固线：psat = 10^(−2663.5/T + 12.537)
//!
//! 饱和温度 Tsat(p) 在给出 psat 的同一条曲线上求逆：冰线闭式求解，
//! 液线做 Newton 迭代。

/// 三相点温度 [K]
pub const T_TRIPLE: f64 = 273.16;

/// 三相点压力 [Pa]
pub const P_TRIPLE: f64 = 611.657;

/// 液相物性的最低温度 [K]
pub const T_MIN: f64 = 173.16;

const LIQUID_P_REF: f64 = 610.8;
const LIQUID_A: f64 = 5.1421;
const LIQUID_B: f64 = 6828.77;

const ICE_A: f64 = 2663.5;
const ICE_B: f64 = 12.537;

const NEWTON_MAX_ITER: usize = 50;
const NEWTON_TOL: f64 = 1e-10;

/// 饱和曲线
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaturationCurve {
    /// 气-液平衡
    VaporLiquid,
    /// 气-固平衡
    VaporIce,
}

impl SaturationCurve {
    /// 饱和压力 [Pa]
    #[inline]
    pub fn psat(self, t: f64) -> f64 {
        match self {
            Self::VaporLiquid => psat_liquid(t),
            Self::VaporIce => psat_ice(t),
        }
    }

    /// 饱和温度 [K]，`psat` 的逆
    ///
    /// `p` 非正或非有限时返回 `None`。
    pub fn tsat(self, p: f64) -> Option<f64> {
        if !(p > 0.0 && p.is_finite()) {
            return None;
        }
        match self {
            Self::VaporLiquid => tsat_liquid(p),
            Self::VaporIce => Some(ICE_A / (ICE_B - p.log10())),
        }
    }
}

/// 气-液饱和压力 [Pa]
#[inline]
pub fn psat_liquid(t: f64) -> f64 {
    LIQUID_P_REF * (-LIQUID_A * (t / T_TRIPLE).ln() - LIQUID_B * (1.0 / t - 1.0 / T_TRIPLE)).exp()
}

/// 气-固饱和压力 [Pa]
#[inline]
pub fn psat_ice(t: f64) -> f64 {
    10f64.powf(-ICE_A / t + ICE_B)
}

fn tsat_liquid(p: f64) -> Option<f64> {
    // ln psat(T) − ln p = 0
    let target = (p / LIQUID_P_REF).ln();
    let mut t = T_TRIPLE;
    for _ in 0..NEWTON_MAX_ITER {
        let f = -LIQUID_A * (t / T_TRIPLE).ln() - LIQUID_B * (1.0 / t - 1.0 / T_TRIPLE) - target;
        let df = -LIQUID_A / t + LIQUID_B / (t * t);
        if df.abs() < f64::EPSILON {
            return None;
        }
        let step = f / df;
        t -= step;
        if !(t > 0.0 && t.is_finite()) {
            return None;
        }
        if step.abs() < NEWTON_TOL * t {
            return Some(t);
        }
    }
    log::debug!("Tsat Newton 迭代在 p={:.6e} 处未达到容差", p);
    Some(t)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_triple_point_values() {
        assert!((psat_liquid(T_TRIPLE) - 610.8).abs() < 1e-9);
        assert!((psat_ice(T_TRIPLE) - P_TRIPLE).abs() < 2.0);
    }

    #[test]
    fn test_saturation_monotonic() {
        let mut prev_l = 0.0;
        let mut prev_i = 0.0;
        let mut t = T_MIN;
        while t < 600.0 {
            let pl = psat_liquid(t);
            let pi = psat_ice(t);
            assert!(pl > prev_l, "液线在 T={t} 处不单调");
            assert!(pi > prev_i, "冰线在 T={t} 处不单调");
            prev_l = pl;
            prev_i = pi;
            t += 2.5;
        }
    }

    #[test]
    fn test_tsat_inverts_ice_curve() {
        for t in [180.0, 200.0, 230.0, 260.0] {
            let p = psat_ice(t);
            let ts = SaturationCurve::VaporIce.tsat(p).unwrap();
            assert!((ts - t).abs() < 1e-8, "T={t}, Tsat={ts}");
        }
    }

    #[test]
    fn test_tsat_inverts_liquid_curve() {
        // 包括略低于三相点压力的液线段
        for t in [273.165, 280.0, 300.0, 373.15, 450.0] {
            let p = psat_liquid(t);
            let ts = SaturationCurve::VaporLiquid.tsat(p).unwrap();
            assert!((ts - t).abs() < 1e-6, "T={t}, Tsat={ts}");
        }
    }

    #[test]
    fn test_tsat_boiling_point() {
        let ts = SaturationCurve::VaporLiquid.tsat(101_325.0).unwrap();
        assert!((ts - 373.15).abs() < 3.0);
    }

    #[test]
    fn test_tsat_invalid_pressure() {
        for curve in [SaturationCurve::VaporLiquid, SaturationCurve::VaporIce] {
            assert!(curve.tsat(0.0).is_none());
            assert!(curve.tsat(-5.0).is_none());
            assert!(curve.tsat(f64::NAN).is_none());
        }
    }
}
