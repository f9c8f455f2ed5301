// crates/cf_physics/src/engine/iteration.rs

//! 时间步内的外迭代（Picard）
//!
//! 通量散度每步只由旧状态计算一次。每次外迭代：
//!
//! 1. 由当前迭代值构建源项（带亚松弛）
//! 2. 从时间步开始时的守恒量出发更新
//! 3. 恢复原始变量
//!
//! 收敛判据为施加的 Source_Y 的相对变化：
//!
//! ```text
//! residual = max|Source_Y^k − Source_Y^(k−1)| / (max|Source_Y^k| + ε)
//! ```
//!
//! 达到最大迭代次数仍未收敛时记一条警告并采用最后一次估计。

use cf_foundation::float::TINY;

use super::update::UpdateDriver;
use crate::error::{PhaseError, PhaseResult};
use crate::fields::PhaseMemory;
use crate::flux::FluxDivergence;
use crate::params::PhaseParams;
use crate::sources::{CellEvaluation, CellInput, SourceBuilder, SourceContext, SourceHistory};
use crate::state::{ConservedState, PrimitiveState};

/// 外迭代结果
#[derive(Debug, Clone)]
pub struct IterationOutcome {
    /// 执行的迭代次数
    pub iterations: usize,
    /// 最终残差
    pub residual: f64,
    /// 是否收敛
    pub converged: bool,
    /// 最后一次源项评估
    pub evaluations: Vec<CellEvaluation>,
    /// 最后一次施加的 Source_Y
    pub applied_source_y: Vec<f64>,
}

impl IterationOutcome {
    /// 未收敛时对应的错误
    pub fn convergence_error(&self, tolerance: f64) -> Option<PhaseError> {
        (!self.converged).then_some(PhaseError::ConvergenceFailure {
            iterations: self.iterations,
            residual: self.residual,
            tolerance,
        })
    }
}

/// 构建单元输入
pub fn cell_inputs(prim: &PrimitiveState, memory: &PhaseMemory) -> Vec<CellInput> {
    (0..prim.n_cells())
        .map(|i| CellInput {
            p: prim.p[i],
            t: prim.t[i],
            u: prim.u[i],
            rho: prim.rho[i],
            y: prim.y[i],
            n: prim.n[i],
            r_actual: memory.r_actual[i],
            ice_thickness: memory.ice_thickness[i],
            mdot_a: memory.mdot_a[i],
            mdot_s: memory.mdot_s[i],
        })
        .collect()
}

fn max_abs(values: impl Iterator<Item = f64>) -> f64 {
    values.fold(0.0_f64, |m, v| m.max(v.abs()))
}

/// 外迭代器
pub struct OuterIteration<'a> {
    params: &'a PhaseParams,
    builder: SourceBuilder<'a>,
    driver: UpdateDriver<'a>,
}

impl<'a> OuterIteration<'a> {
    /// 创建
    pub fn new(params: &'a PhaseParams, builder: SourceBuilder<'a>) -> Self {
        Self {
            params,
            builder,
            driver: UpdateDriver::new(params.gas(), params.closure.sigma.t_crit),
        }
    }

    /// 更新器
    pub fn driver(&self) -> &UpdateDriver<'a> {
        &self.driver
    }

    /// 执行一个时间步的外迭代
    ///
    /// `new_prim` 与 `new_cons` 进入时为迭代初值（通常是旧状态），返回时为最后一次估计。
    /// `history` 逐次更新，并跨时间步保留。
    #[allow(clippy::too_many_arguments)]
    pub fn run(
        &self,
        time: f64,
        dt: f64,
        old_cons: &ConservedState,
        div: &FluxDivergence,
        memory: &PhaseMemory,
        history: &mut SourceHistory,
        new_prim: &mut PrimitiveState,
        new_cons: &mut ConservedState,
    ) -> PhaseResult<IterationOutcome> {
        let n = old_cons.n_cells();
        if history.len() != n {
            *history = SourceHistory::new(n);
        }
        let relax = &self.params.relaxation;
        let ctx = SourceContext::new(time, dt, self.params);

        let mut previous: Vec<f64> = (0..n)
            .map(|i| history.get(i).map_or(0.0, |h| h.source_y_at(old_cons.rho_y[i])))
            .collect();
        let mut iterations = 0;
        let mut residual = f64::INFINITY;
        let mut evaluations = Vec::new();
        let mut applied = Vec::new();

        while iterations < relax.max_outer_iterations {
            iterations += 1;

            let inputs = cell_inputs(new_prim, memory);
            evaluations = self.builder.evaluate_all(&inputs, history, &ctx)?;
            applied = self.driver.apply(dt, old_cons, div, &evaluations, new_cons)?;
            self.driver.recover_primitive(new_cons, new_prim)?;
            history.store(evaluations.iter().map(|e| e.droplet));

            let change = max_abs(applied.iter().zip(&previous).map(|(a, b)| a - b));
            residual = change / (max_abs(applied.iter().copied()) + TINY);
            log::debug!("外迭代 {iterations}: 残差 {residual:.3e}");
            previous.clone_from(&applied);

            if residual < relax.tolerance {
                break;
            }
        }

        let converged = residual < relax.tolerance;
        let outcome = IterationOutcome {
            iterations,
            residual,
            converged,
            evaluations,
            applied_source_y: applied,
        };
        if let Some(err) = outcome.convergence_error(relax.tolerance) {
            log::warn!("{err}，采用最后一次估计");
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::PhaseMesh;
    use crate::sources::WallModel;
    use glam::DVec3;

    fn run_case(params: &PhaseParams) -> (IterationOutcome, ConservedState, ConservedState) {
        let mesh = PhaseMesh::uniform_channel(3, 0.03, 1e-3);
        let wall = WallModel::new(&params.wall, &mesh);
        let iter = OuterIteration::new(params, SourceBuilder::new(params, &wall));

        let prim0 = PrimitiveState::uniform(3, params.gas(), 1000.0, 250.0, DVec3::ZERO);
        let cons0 = ConservedState::from_primitive(&prim0, params.gas());
        let memory = PhaseMemory::new(3);
        let mut history = SourceHistory::new(3);
        let mut prim = prim0.clone();
        let mut cons = cons0.clone();
        let outcome = iter
            .run(
                0.0,
                1e-7,
                &cons0,
                &FluxDivergence::zeros(3),
                &memory,
                &mut history,
                &mut prim,
                &mut cons,
            )
            .unwrap();
        (outcome, cons0, cons)
    }

    #[test]
    fn test_converges_and_conserves_water() {
        let params = PhaseParams::default();
        let (outcome, cons0, cons) = run_case(&params);
        assert!(outcome.converged, "残差 {}", outcome.residual);
        assert!(outcome.iterations > 1);
        let v = [1.0; 3];
        let before = cons0.total_water_mass(&v);
        let after = cons.total_water_mass(&v);
        assert!((after - before).abs() < 1e-14 * before);
        assert!(cons.total_liquid_mass(&v) > 0.0);
    }

    #[test]
    fn test_iteration_cap_reports_failure() {
        let mut params = PhaseParams::default();
        params.relaxation.max_outer_iterations = 2;
        params.relaxation.tolerance = 1e-14;
        let (outcome, _, cons) = run_case(&params);
        assert_eq!(outcome.iterations, 2);
        assert!(!outcome.converged);
        assert!(matches!(
            outcome.convergence_error(1e-14),
            Some(PhaseError::ConvergenceFailure { iterations: 2, .. })
        ));
        // 最后一次估计已写入
        assert!(cons.rho_y[0] > 0.0);
    }
}
