// crates/cf_physics/src/initial.rs

//! 初始条件
//!
//! 准一维等熵喷管流：由截面积分布求 Mach 数，再由滞止状态得到 p、T、U。
//!
//! ```text
//! A/A* = (1/M)·[2/(γ+1)·(1 + (γ−1)/2·M²)]^((γ+1)/(2(γ−1)))
//! T    = T0 / (1 + (γ−1)/2·M²)
//! p    = p0·(T/T0)^(γ/(γ−1))
//! U    = M·sqrt(γRT)
//! ```
//!
//! 喉部（最小截面）之前取亚声速解；之后先取超声速解，截面收缩时切换到亚声速，
//! 再次扩张时切换回超声速。

use glam::DVec3;

use crate::error::{PhaseError, PhaseResult};
use crate::mesh::PhaseMesh;
use crate::state::PrimitiveState;
use crate::thermo::{IdealGas, P_TRIPLE, T_TRIPLE};

const NEWTON_MAX_ITER: usize = 200;
const NEWTON_TOL: f64 = 1e-12;

/// 滞止状态
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stagnation {
    /// 滞止温度 [K]
    pub t0: f64,
    /// 滞止压力 [Pa]
    pub p0: f64,
}

impl Default for Stagnation {
    fn default() -> Self {
        Self {
            t0: T_TRIPLE,
            p0: P_TRIPLE,
        }
    }
}

/// 各站位的等熵解
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IsentropicProfile {
    /// Mach 数
    pub mach: Vec<f64>,
    /// 温度 [K]
    pub t: Vec<f64>,
    /// 压力 [Pa]
    pub p: Vec<f64>,
    /// 速度大小 [m/s]
    pub u: Vec<f64>,
}

/// 面积比 A/A*
pub fn area_ratio(mach: f64, gamma: f64) -> f64 {
    let g = 2.0 / (gamma + 1.0) * (1.0 + 0.5 * (gamma - 1.0) * mach * mach);
    let k = (gamma + 1.0) / (2.0 * (gamma - 1.0));
    g.powf(k) / mach
}

fn area_ratio_derivative(mach: f64, gamma: f64) -> f64 {
    let g = 2.0 / (gamma + 1.0) * (1.0 + 0.5 * (gamma - 1.0) * mach * mach);
    let dg = 2.0 / (gamma + 1.0) * (gamma - 1.0) * mach;
    let k = (gamma + 1.0) / (2.0 * (gamma - 1.0));
    area_ratio(mach, gamma) * (k * dg / g - 1.0 / mach)
}

/// 由面积比求 Mach 数（Newton 迭代）
pub fn mach_from_area_ratio(ratio: f64, gamma: f64, supersonic: bool) -> PhaseResult<f64> {
    if !(ratio >= 1.0) {
        return Err(PhaseError::model_domain(0, "A/A*", ratio, "面积比必须不小于 1"));
    }
    if ratio - 1.0 < 1e-12 {
        return Ok(1.0);
    }

    let mut m: f64 = if supersonic { 2.0 } else { 0.2 };
    for _ in 0..NEWTON_MAX_ITER {
        let f = area_ratio(m, gamma) - ratio;
        let df = area_ratio_derivative(m, gamma);
        let mut next = m - f / df;
        // 保持在所选分支内
        if supersonic && !(next > 1.0) {
            next = 0.5 * (m + 1.0);
        } else if !supersonic && !(next > 0.0 && next < 1.0) {
            next = if next >= 1.0 { 0.5 * (m + 1.0) } else { 0.5 * m };
        }
        if (next - m).abs() < NEWTON_TOL * m {
            return Ok(next);
        }
        m = next;
    }

    if ((area_ratio(m, gamma) - ratio) / ratio).abs() < 1e-8 {
        Ok(m)
    } else {
        Err(PhaseError::model_domain(0, "A/A*", ratio, "面积-Mach 关系不收敛"))
    }
}

/// 一阶差分的 dA/dx（内部中心差分，两端单侧）
fn area_gradient(x: &[f64], area: &[f64]) -> Vec<f64> {
    let n = x.len();
    (0..n)
        .map(|i| {
            let (a, b) = match i {
                0 => (0, 1.min(n - 1)),
                _ if i == n - 1 => (i - 1, i),
                _ => (i - 1, i + 1),
            };
            if b == a {
                0.0
            } else {
                (area[b] - area[a]) / (x[b] - x[a])
            }
        })
        .collect()
}

/// 各站位的准一维等熵解
pub fn quasi_1d_isentropic(
    x: &[f64],
    area: &[f64],
    gas: &IdealGas,
    stagnation: Stagnation,
) -> PhaseResult<IsentropicProfile> {
    PhaseError::check_size("area", x.len(), area.len())?;
    if x.is_empty() {
        return Ok(IsentropicProfile::default());
    }

    let (throat, a_star) = area
        .iter()
        .copied()
        .enumerate()
        .fold((0, f64::INFINITY), |(ti, ta), (i, a)| if a < ta { (i, a) } else { (ti, ta) });
    if !(a_star > 0.0) {
        return Err(PhaseError::Config(format!("截面积必须为正: {a_star}")));
    }
    let gradient = area_gradient(x, area);
    let gamma = gas.gamma;

    let mut mach = vec![0.0; x.len()];
    for i in 0..=throat {
        mach[i] = mach_from_area_ratio(area[i] / a_star, gamma, false).map_err(|e| e.at_cell(i))?;
    }
    let mut supersonic = true;
    for i in throat + 1..x.len() {
        mach[i] = mach_from_area_ratio(area[i] / a_star, gamma, supersonic).map_err(|e| e.at_cell(i))?;
        if supersonic && gradient[i] < 0.0 {
            supersonic = false;
        } else if !supersonic && gradient[i] > 0.0 {
            supersonic = true;
        }
    }

    let mut profile = IsentropicProfile::default();
    for &m in &mach {
        let t = stagnation.t0 / (1.0 + 0.5 * (gamma - 1.0) * m * m);
        let p = stagnation.p0 * (t / stagnation.t0).powf(gamma / (gamma - 1.0));
        profile.mach.push(m);
        profile.t.push(t);
        profile.p.push(p);
        profile.u.push(m * gas.sound_speed(t));
    }
    Ok(profile)
}

/// 线性插值（超出范围取端值）
pub fn interpolate(x: &[f64], values: &[f64], at: f64) -> f64 {
    match x.len() {
        0 => f64::NAN,
        1 => values[0],
        n => {
            if at <= x[0] {
                return values[0];
            }
            if at >= x[n - 1] {
                return values[n - 1];
            }
            let j = x.partition_point(|&xi| xi <= at).clamp(1, n - 1);
            let w = (at - x[j - 1]) / (x[j] - x[j - 1]);
            values[j - 1] + w * (values[j] - values[j - 1])
        }
    }
}

/// 准一维喷管的初始原始变量（站位解插值到单元形心）
pub fn quasi_1d_state(
    mesh: &PhaseMesh,
    x: &[f64],
    area: &[f64],
    gas: &IdealGas,
    stagnation: Stagnation,
) -> PhaseResult<PrimitiveState> {
    let profile = quasi_1d_isentropic(x, area, gas, stagnation)?;
    let n = mesh.n_cells();
    let mut prim = PrimitiveState::new(n);
    for i in 0..n {
        let xc = mesh.centroid(i).x;
        prim.p[i] = interpolate(x, &profile.p, xc);
        prim.t[i] = interpolate(x, &profile.t, xc);
        prim.u[i] = DVec3::new(interpolate(x, &profile.u, xc), 0.0, 0.0);
    }
    prim.update_density(gas);
    log::info!(
        "准一维等熵初值: 出口 Mach {:.3}, 最低温度 {:.2} K",
        profile.mach.last().copied().unwrap_or(0.0),
        prim.t.iter().copied().fold(f64::INFINITY, f64::min)
    );
    Ok(prim)
}
