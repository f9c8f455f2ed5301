// crates/cf_physics/src/engine/solver.rs

//! 两相凝结流求解器
//!
//! 每个时间步：
//!
//! 1. 由 CFL 条件确定 Δt（不越过结束时间）
//! 2. 由旧状态计算一次通量散度
//! 3. 外迭代耦合源项与守恒量更新
//! 4. 接受后提交单元记忆（r_actual、J、dr/dt、S、壁面速率、冰层厚度）
//!
//! 出现不可实现状态时整步回滚，Δt 乘以缩减因子重试；
//! 超过最大拒绝次数或 Δt 低于下限时返回 [`PhaseError::StepRejected`]。
//! 外迭代、更新与恢复都在状态副本上进行，拒绝时旧状态保持不变。

use cf_io::{Checkpoint, FieldSnapshot};
use serde::Serialize;

use super::iteration::{IterationOutcome, OuterIteration};
use super::timestep::CflCalculator;
use crate::error::{PhaseError, PhaseResult};
use crate::fields::{from_snapshot, to_snapshot, PhaseMemory};
use crate::flux::{FluxDivergence, FluxProvider};
use crate::mesh::PhaseMesh;
use crate::params::PhaseParams;
use crate::sources::{
    CellEvaluation, IceLayerModel, RecessionOutcome, SourceBuilder, SourceHistory, WallModel,
    WallSample,
};
use crate::state::{ConservedState, PrimitiveState};

/// 单步统计
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StepStats {
    /// 步号（从 1 开始）
    pub step: usize,
    /// 步末时间 [s]
    pub time: f64,
    /// 接受的时间步长 [s]
    pub dt: f64,
    /// 外迭代次数
    pub outer_iterations: usize,
    /// 外迭代残差
    pub residual: f64,
    /// 外迭代是否收敛
    pub converged: bool,
    /// 本步拒绝次数
    pub rejections: usize,
    /// 液相总质量 [kg]
    pub liquid_mass: f64,
    /// 最大过饱和度
    pub max_s_sat: f64,
    /// 最大成核率 [1/(m³·s)]
    pub max_nucleation_rate: f64,
}

impl StepStats {
    /// 诊断摘要
    pub fn summary(&self) -> String {
        format!(
            "step={} t={:.4e}s dt={:.3e}s iter={} res={:.2e} S_max={:.3} J_max={:.3e} rej={}",
            self.step,
            self.time,
            self.dt,
            self.outer_iterations,
            self.residual,
            self.max_s_sat,
            self.max_nucleation_rate,
            self.rejections
        )
    }
}

/// 两相凝结流求解器
pub struct PhaseSolver {
    params: PhaseParams,
    mesh: PhaseMesh,
    flux: Box<dyn FluxProvider>,
    wall: WallModel,
    ice: IceLayerModel,
    cfl: CflCalculator,
    prim: PrimitiveState,
    cons: ConservedState,
    memory: PhaseMemory,
    history: SourceHistory,
    evaluations: Vec<CellEvaluation>,
    time: f64,
    step: usize,
}

impl PhaseSolver {
    /// 创建求解器
    ///
    /// `memory` 为 `None` 时从零记忆开始。
    pub fn new(
        params: PhaseParams,
        mesh: PhaseMesh,
        flux: Box<dyn FluxProvider>,
        mut prim: PrimitiveState,
        memory: Option<PhaseMemory>,
    ) -> PhaseResult<Self> {
        let n = mesh.n_cells();
        PhaseError::check_size("primitive", n, prim.n_cells())?;
        prim.check_sizes()?;
        let memory = memory.unwrap_or_else(|| PhaseMemory::new(n));
        memory.check_sizes(n)?;

        prim.update_density(params.gas());
        let cons = ConservedState::from_primitive(&prim, params.gas());
        let wall = WallModel::new(&params.wall, &mesh);
        let ice = IceLayerModel::new(&params.wall);
        let cfl = CflCalculator::new(&params.time);

        log::info!(
            "求解器初始化: {} 个单元, {} 个面, 通量 {}, 壁面单元 {}",
            n,
            mesh.n_faces(),
            flux.name(),
            mesh.walls().len()
        );

        Ok(Self {
            params,
            mesh,
            flux,
            wall,
            ice,
            cfl,
            prim,
            cons,
            memory,
            history: SourceHistory::new(n),
            evaluations: Vec::new(),
            time: 0.0,
            step: 0,
        })
    }

    /// 当前时间
    pub fn time(&self) -> f64 {
        self.time
    }

    /// 已完成步数
    pub fn step_count(&self) -> usize {
        self.step
    }

    /// 物理参数
    pub fn params(&self) -> &PhaseParams {
        &self.params
    }

    /// 网格
    pub fn mesh(&self) -> &PhaseMesh {
        &self.mesh
    }

    /// 原始变量
    pub fn primitive(&self) -> &PrimitiveState {
        &self.prim
    }

    /// 守恒变量
    pub fn conserved(&self) -> &ConservedState {
        &self.cons
    }

    /// 单元记忆
    pub fn memory(&self) -> &PhaseMemory {
        &self.memory
    }

    /// 可变单元记忆（用于给定壁面速率等）
    pub fn memory_mut(&mut self) -> &mut PhaseMemory {
        &mut self.memory
    }

    /// 最近一步的源项评估
    pub fn evaluations(&self) -> &[CellEvaluation] {
        &self.evaluations
    }

    /// 壁面模型
    pub fn wall(&self) -> &WallModel {
        &self.wall
    }

    /// 建议时间步长
    pub fn suggested_dt(&self) -> f64 {
        let dt = self.cfl.compute_dt(&self.mesh, &self.prim, self.params.gas());
        CflCalculator::limit_to_end(dt, self.time, self.params.time.end_time)
    }

    /// 按建议步长推进一步
    pub fn step(&mut self) -> PhaseResult<StepStats> {
        let dt = self.suggested_dt();
        self.step_with_dt(dt)
    }

    fn attempt(&self, dt: f64, div: &FluxDivergence) -> PhaseResult<(IterationOutcome, PrimitiveState, ConservedState, SourceHistory)> {
        let builder = SourceBuilder::new(&self.params, &self.wall);
        let iteration = OuterIteration::new(&self.params, builder);
        let mut history = self.history.clone();
        let mut prim = self.prim.clone();
        let mut cons = self.cons.clone();
        let outcome = iteration.run(
            self.time,
            dt,
            &self.cons,
            div,
            &self.memory,
            &mut history,
            &mut prim,
            &mut cons,
        )?;
        Ok((outcome, prim, cons, history))
    }

    /// 以给定初始步长推进一步（必要时缩小步长重试）
    pub fn step_with_dt(&mut self, dt: f64) -> PhaseResult<StepStats> {
        let div = self.flux.divergence(&self.mesh, &self.prim, &self.cons)?;
        let time_cfg = &self.params.time;
        let (shrink, max_rejections, dt_min) = (time_cfg.shrink_factor, time_cfg.max_rejections, time_cfg.dt_min);

        let mut dt = dt;
        let mut rejections = 0;
        let (outcome, prim, cons, history) = loop {
            match self.attempt(dt, &div) {
                Ok(result) => break result,
                Err(err) if err.is_recoverable() => {
                    rejections += 1;
                    let next = dt * shrink;
                    if rejections > max_rejections || next < dt_min {
                        log::error!("时间步在 t={:.6e} 处放弃: {}", self.time, err);
                        return Err(PhaseError::StepRejected {
                            attempts: rejections,
                            dt,
                            source: Box::new(err),
                        });
                    }
                    log::warn!("拒绝时间步 dt={:.3e}: {}，缩小到 {:.3e}", dt, err, next);
                    dt = next;
                }
                Err(err) => return Err(err),
            }
        };

        self.prim = prim;
        self.cons = cons;
        self.history = history;
        self.memory.commit(&outcome.evaluations, &self.wall, &self.ice, dt);
        self.time += dt;
        self.step += 1;

        let stats = StepStats {
            step: self.step,
            time: self.time,
            dt,
            outer_iterations: outcome.iterations,
            residual: outcome.residual,
            converged: outcome.converged,
            rejections,
            liquid_mass: self.cons.total_liquid_mass(self.mesh.volumes()),
            max_s_sat: outcome.evaluations.iter().map(|e| e.closure.s_sat).fold(0.0, f64::max),
            max_nucleation_rate: outcome.evaluations.iter().map(|e| e.kinetics.j).fold(0.0, f64::max),
        };
        self.evaluations = outcome.evaluations;
        log::trace!("{}", stats.summary());
        Ok(stats)
    }

    /// 推进到结束时间，每步之后调用回调
    pub fn run<F>(&mut self, mut on_step: F) -> PhaseResult<Vec<StepStats>>
    where
        F: FnMut(&Self, &StepStats) -> PhaseResult<bool>,
    {
        let end_time = self.params.time.end_time;
        let mut all = Vec::new();
        while self.time < end_time * (1.0 - 1e-12) {
            let stats = self.step()?;
            let keep_going = on_step(self, &stats)?;
            all.push(stats);
            if !keep_going {
                log::info!("在 t={:.6e} 提前停止", self.time);
                break;
            }
        }
        Ok(all)
    }

    // =========================================================================
    // 壁面冰层
    // =========================================================================

    /// 当前壁面速率对应的冰层输入
    pub fn wall_samples(&self) -> Vec<WallSample> {
        self.mesh
            .walls()
            .iter()
            .map(|w| {
                let a_v = self.wall.area_per_volume(w.cell);
                let net = self.memory.mdot_a[w.cell] - self.memory.mdot_s[w.cell];
                WallSample {
                    channel_height: (w.channel_height - self.memory.ice_thickness[w.cell]).max(0.0),
                    net_mass_flux: if a_v > 0.0 { net / a_v } else { 0.0 },
                }
            })
            .collect()
    }

    /// 在慢时间尺度上积分冰层增厚
    pub fn ice_recession(&self) -> RecessionOutcome {
        self.ice.evolve(&self.wall_samples())
    }

    // =========================================================================
    // 持久化
    // =========================================================================

    /// 当前场快照（含最近一步的诊断场）
    pub fn snapshot(&self) -> PhaseResult<FieldSnapshot> {
        let evals = (!self.evaluations.is_empty()).then_some(self.evaluations.as_slice());
        to_snapshot(&self.prim, &self.cons, &self.memory, evals, self.params.gas())
    }

    /// 当前检查点
    pub fn checkpoint(&self) -> PhaseResult<Checkpoint> {
        Ok(Checkpoint::new(self.time, self.step, self.snapshot()?).with_mesh_hash(self.mesh.hash()))
    }

    /// 从检查点恢复
    ///
    /// 只读取必读场；源项历史清空，第一次评估直接采用计算值。
    pub fn restore(&mut self, checkpoint: &Checkpoint) -> PhaseResult<()> {
        checkpoint.verify_mesh_compatibility(self.mesh.n_cells(), self.mesh.hash())?;
        let (prim, memory) = from_snapshot(&checkpoint.fields, self.params.gas())?;
        self.cons = ConservedState::from_primitive(&prim, self.params.gas());
        self.prim = prim;
        self.memory = memory;
        self.history.clear();
        self.evaluations.clear();
        self.time = checkpoint.time;
        self.step = checkpoint.step;
        log::info!("从检查点恢复: t={:.6e}, step={}", self.time, self.step);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flux::RusanovFlux;
    use glam::DVec3;

    fn solver(p: f64, t: f64) -> PhaseSolver {
        let mut params = PhaseParams::default();
        params.time.end_time = 5e-7;
        let mesh = PhaseMesh::uniform_channel(4, 0.04, 1e-3);
        let prim = PrimitiveState::uniform(4, params.gas(), p, t, DVec3::ZERO);
        let flux = Box::new(RusanovFlux::new(*params.gas()));
        PhaseSolver::new(params, mesh, flux, prim, None).unwrap()
    }

    #[test]
    fn test_step_commits_memory() {
        let mut s = solver(1000.0, 250.0);
        let stats = s.step().unwrap();
        assert_eq!(stats.step, 1);
        assert!(stats.dt > 0.0);
        assert!(s.memory().j[0] > 0.0);
        assert!(s.memory().drdt[0] > 0.0);
        assert!(s.memory().r_actual[0] > 0.0);
        assert!((s.memory().s_sat[0] - stats.max_s_sat).abs() < 1e-9 * stats.max_s_sat);
    }

    #[test]
    fn test_run_reaches_end_time() {
        let mut s = solver(1000.0, 250.0);
        let stats = s.run(|_, _| Ok(true)).unwrap();
        assert!(!stats.is_empty());
        assert!((s.time() - 5e-7).abs() < 1e-18);
    }

    #[test]
    fn test_rejection_leaves_state_untouched() {
        let mut s = solver(1000.0, 250.0);
        // 极大的步长使能量为负
        s.params.time.max_rejections = 0;
        s.prim.u = vec![DVec3::new(1e5, 0.0, 0.0); 4];
        s.cons = ConservedState::from_primitive(&s.prim, s.params.gas());
        s.prim.u[0] = DVec3::ZERO;
        s.cons.rho_u[0] = DVec3::ZERO;
        let before = s.cons.clone();
        let err = s.step_with_dt(1.0).unwrap_err();
        assert!(matches!(err, PhaseError::StepRejected { attempts: 1, .. }));
        assert_eq!(s.cons, before);
        assert_eq!(s.step_count(), 0);
    }

    #[test]
    fn test_checkpoint_restore() {
        let mut s = solver(1000.0, 250.0);
        s.step().unwrap();
        let cp = s.checkpoint().unwrap();
        let time = s.time();
        let r = s.memory().r_actual.clone();

        let mut fresh = solver(1000.0, 250.0);
        fresh.restore(&cp).unwrap();
        assert_eq!(fresh.time(), time);
        assert_eq!(fresh.step_count(), 1);
        assert_eq!(fresh.memory().r_actual, r);
    }
}
