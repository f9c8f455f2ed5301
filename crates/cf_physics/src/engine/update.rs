// crates/cf_physics/src/engine/update.rs

//! 守恒量更新与原始变量恢复
//!
//! 每次外迭代都从时间步开始时的守恒量出发：
//!
//! ```text
//! (ρY)_new = [ρY_old + Δt(−∇·F + passive + active_explicit + nucleation)] / (1 − Δt·active_coeff)
//! Source_Y = growth_at((ρY)_new) + nucleation
//! ρ_new    = ρ_old  + Δt(−∇·F − Source_Y + S_wall)
//! ρU_new   = (ρU_old − Δt∇·F) / (1 + Δt·k)            k = Source_Y/ρ > 0
//!          = ρU_old + Δt(−∇·F − k·ρU_old)             其他
//! ρE_new   = ρE_old + Δt(−∇·F − h_droplet·Source_Y + S_E,wall)
//! ρN_new   = ρN_old + Δt(−∇·F + J)
//! ```
//!
//! Source_Y 在新的 ρY 处取值，因此气相与液相的质量交换逐单元精确抵消。

use cf_foundation::ensure;
use glam::DVec3;
use rayon::prelude::*;

use crate::error::{PhaseError, PhaseResult, RealizabilityKind};
use crate::flux::FluxDivergence;
use crate::sources::CellEvaluation;
use crate::state::{ConservedState, PrimitiveState};
use crate::thermo::{IdealGas, T_MIN};

/// 单元更新结果
#[derive(Debug, Clone, Copy)]
struct CellUpdate {
    rho: f64,
    rho_u: DVec3,
    rho_e: f64,
    rho_n: f64,
    rho_y: f64,
    source_y: f64,
}

/// 恢复后的单元原始变量
#[derive(Debug, Clone, Copy)]
struct RecoveredCell {
    p: f64,
    t: f64,
    u: DVec3,
    rho: f64,
    y: f64,
    n: f64,
    rho_y: f64,
    rho_n: f64,
}

/// 守恒量更新器
#[derive(Debug, Clone, Copy)]
pub struct UpdateDriver<'a> {
    gas: &'a IdealGas,
    t_crit: f64,
}

impl<'a> UpdateDriver<'a> {
    /// 创建
    pub fn new(gas: &'a IdealGas, t_crit: f64) -> Self {
        Self { gas, t_crit }
    }

    fn update_cell(
        &self,
        i: usize,
        dt: f64,
        old: &ConservedState,
        div: &FluxDivergence,
        eval: &CellEvaluation,
    ) -> PhaseResult<CellUpdate> {
        let d = &eval.droplet;

        let denom = 1.0 - dt * d.growth_active_coeff;
        ensure!(
            denom > 0.0,
            PhaseError::realizability(i, RealizabilityKind::LiquidFraction, denom)
        );
        let rho_y = (old.rho_y[i]
            + dt * (-div.rho_y[i] + d.growth_passive + d.growth_active_explicit + d.nucleation))
            / denom;
        let source_y = d.source_y_at(rho_y);

        let wall = &eval.wall_contribution;
        let rho = old.rho[i] + dt * (-div.rho[i] - source_y + wall.s_rho);

        let k = eval.momentum_factor;
        let rho_u = if k > 0.0 {
            (old.rho_u[i] + dt * (-div.rho_u[i] + wall.s_rho_u)) / (1.0 + dt * k)
        } else {
            old.rho_u[i] + dt * (-div.rho_u[i] - k * old.rho_u[i] + wall.s_rho_u)
        };

        let rho_e = old.rho_e[i]
            + dt * (-div.rho_e[i] - eval.closure.h_droplet * source_y + wall.s_rho_e);
        let rho_n = old.rho_n[i] + dt * (-div.rho_n[i] + d.number);

        Ok(CellUpdate {
            rho,
            rho_u,
            rho_e,
            rho_n,
            rho_y,
            source_y,
        })
    }

    /// 由时间步开始时的守恒量与当前源项计算新守恒量
    ///
    /// 返回各单元实际施加的 Source_Y。
    pub fn apply(
        &self,
        dt: f64,
        old: &ConservedState,
        div: &FluxDivergence,
        evaluations: &[CellEvaluation],
        new: &mut ConservedState,
    ) -> PhaseResult<Vec<f64>> {
        let n = old.n_cells();
        PhaseError::check_size("flux_divergence", n, div.n_cells())?;
        PhaseError::check_size("evaluations", n, evaluations.len())?;
        PhaseError::check_size("conserved", n, new.n_cells())?;

        let updates = (0..n)
            .into_par_iter()
            .map(|i| self.update_cell(i, dt, old, div, &evaluations[i]))
            .collect::<PhaseResult<Vec<_>>>()?;

        let mut applied = Vec::with_capacity(n);
        for (i, u) in updates.into_iter().enumerate() {
            new.rho[i] = u.rho;
            new.rho_u[i] = u.rho_u;
            new.rho_e[i] = u.rho_e;
            new.rho_n[i] = u.rho_n;
            new.rho_y[i] = u.rho_y;
            applied.push(u.source_y);
        }
        Ok(applied)
    }

    fn recover_cell(&self, i: usize, cons: &ConservedState) -> PhaseResult<RecoveredCell> {
        let (rho, rho_u, rho_e, rho_n, rho_y) =
            (cons.rho[i], cons.rho_u[i], cons.rho_e[i], cons.rho_n[i], cons.rho_y[i]);

        if !(rho.is_finite()
            && rho_u.is_finite()
            && rho_e.is_finite()
            && rho_n.is_finite()
            && rho_y.is_finite())
        {
            return Err(PhaseError::realizability(i, RealizabilityKind::NonFinite, rho));
        }
        if rho <= 0.0 {
            return Err(PhaseError::realizability(i, RealizabilityKind::Density, rho));
        }

        let u = rho_u / rho;
        let e = rho_e / rho - 0.5 * u.length_squared();
        if e <= 0.0 {
            return Err(PhaseError::realizability(i, RealizabilityKind::Energy, e));
        }
        let t = self.gas.temperature_from_energy(e);
        if t < T_MIN || t >= self.t_crit {
            return Err(PhaseError::realizability(i, RealizabilityKind::Temperature, t));
        }

        let (y, rho_y) = if rho_y < 0.0 { (0.0, 0.0) } else { (rho_y / rho, rho_y) };
        if y > 1.0 {
            return Err(PhaseError::realizability(i, RealizabilityKind::LiquidFraction, y));
        }
        let (n, rho_n) = if rho_n < 0.0 { (0.0, 0.0) } else { (rho_n / rho, rho_n) };

        Ok(RecoveredCell {
            p: self.gas.pressure(rho, t),
            t,
            u,
            rho,
            y,
            n,
            rho_y,
            rho_n,
        })
    }

    /// 由守恒量恢复原始变量
    ///
    /// 负的 ρY、ρN 被截断为零（同时修正守恒量），其余不可实现情况返回错误。
    pub fn recover_primitive(&self, cons: &mut ConservedState, prim: &mut PrimitiveState) -> PhaseResult<()> {
        let n = cons.n_cells();
        PhaseError::check_size("primitive", n, prim.n_cells())?;

        let cells = (0..n)
            .into_par_iter()
            .map(|i| self.recover_cell(i, cons))
            .collect::<PhaseResult<Vec<_>>>()?;

        for (i, c) in cells.into_iter().enumerate() {
            prim.p[i] = c.p;
            prim.t[i] = c.t;
            prim.u[i] = c.u;
            prim.rho[i] = c.rho;
            prim.y[i] = c.y;
            prim.n[i] = c.n;
            cons.rho_y[i] = c.rho_y;
            cons.rho_n[i] = c.rho_n;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::PhaseMesh;
    use crate::params::PhaseParams;
    use crate::sources::{CellInput, SourceBuilder, SourceContext, WallModel};

    fn setup(p: f64, t: f64) -> (PhaseParams, PrimitiveState, ConservedState) {
        let params = PhaseParams::default();
        let prim = PrimitiveState::uniform(1, params.gas(), p, t, DVec3::ZERO);
        let cons = ConservedState::from_primitive(&prim, params.gas());
        (params, prim, cons)
    }

    fn evaluate(params: &PhaseParams, prim: &PrimitiveState, dt: f64) -> CellEvaluation {
        let mesh = PhaseMesh::uniform_channel(1, 0.01, 1e-3);
        let wall = WallModel::new(&params.wall, &mesh);
        let builder = SourceBuilder::new(params, &wall);
        let input = CellInput {
            p: prim.p[0],
            t: prim.t[0],
            rho: prim.rho[0],
            ..CellInput::default()
        };
        builder
            .evaluate_cell(0, &input, None, &SourceContext::new(0.0, dt, params))
            .unwrap()
    }

    #[test]
    fn test_mass_exchange_is_exact() {
        let (params, prim, old) = setup(1000.0, 250.0);
        let dt = 1e-6;
        let eval = evaluate(&params, &prim, dt);
        let driver = UpdateDriver::new(params.gas(), params.closure.sigma.t_crit);
        let mut new = old.clone();
        let div = FluxDivergence::zeros(1);
        let applied = driver.apply(dt, &old, &div, &[eval], &mut new).unwrap();

        assert!(applied[0] > 0.0);
        let before = old.rho[0] + old.rho_y[0];
        let after = new.rho[0] + new.rho_y[0];
        assert!((after - before).abs() < 1e-15 * before);
        assert!((new.rho_y[0] - dt * applied[0]).abs() < 1e-20);
    }

    #[test]
    fn test_implicit_denominator_guard() {
        let (params, prim, old) = setup(1000.0, 250.0);
        let mut eval = evaluate(&params, &prim, 1e-6);
        eval.droplet.growth_active_coeff = 2e6;
        let driver = UpdateDriver::new(params.gas(), params.closure.sigma.t_crit);
        let mut new = old.clone();
        let err = driver
            .apply(1e-6, &old, &FluxDivergence::zeros(1), &[eval], &mut new)
            .unwrap_err();
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_recover_roundtrip() {
        let (params, prim, mut cons) = setup(800.0, 230.0);
        let driver = UpdateDriver::new(params.gas(), params.closure.sigma.t_crit);
        let mut out = PrimitiveState::new(1);
        driver.recover_primitive(&mut cons, &mut out).unwrap();
        assert!((out.t[0] - prim.t[0]).abs() < 1e-9);
        assert!((out.p[0] - prim.p[0]).abs() < 1e-8);
    }

    #[test]
    fn test_recover_clamps_negative_liquid() {
        let (params, _, mut cons) = setup(800.0, 230.0);
        cons.rho_y[0] = -1e-9;
        cons.rho_n[0] = -5.0;
        let driver = UpdateDriver::new(params.gas(), params.closure.sigma.t_crit);
        let mut out = PrimitiveState::new(1);
        driver.recover_primitive(&mut cons, &mut out).unwrap();
        assert_eq!(out.y[0], 0.0);
        assert_eq!(cons.rho_y[0], 0.0);
        assert_eq!(out.n[0], 0.0);
    }

    #[test]
    fn test_recover_rejects_unrealizable() {
        let (params, _, base) = setup(800.0, 230.0);
        let driver = UpdateDriver::new(params.gas(), params.closure.sigma.t_crit);
        let mut out = PrimitiveState::new(1);

        let cases: [(fn(&mut ConservedState), RealizabilityKind); 5] = [
            (|c| c.rho[0] = -1.0, RealizabilityKind::Density),
            (|c| c.rho_e[0] = -1.0, RealizabilityKind::Energy),
            (|c| c.rho_e[0] *= 0.5, RealizabilityKind::Temperature),
            (|c| c.rho_y[0] = 2.0 * c.rho[0], RealizabilityKind::LiquidFraction),
            (|c| c.rho_u[0] = DVec3::splat(f64::NAN), RealizabilityKind::NonFinite),
        ];
        for (mutate, expected) in cases {
            let mut cons = base.clone();
            mutate(&mut cons);
            match driver.recover_primitive(&mut cons, &mut out) {
                Err(PhaseError::Realizability { kind, cell, .. }) => {
                    assert_eq!(kind, expected);
                    assert_eq!(cell, 0);
                }
                other => panic!("期望 {expected}, 得到 {other:?}"),
            }
        }
    }
}
