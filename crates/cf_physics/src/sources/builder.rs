// crates/cf_physics/src/sources/builder.rs

//! 相变源项构建器
//!
//! 每次外迭代对所有单元并行执行：
//!
//! 1. 热力学闭合（psat、Tsat、S、h_fg、σ、ρ_l）
//! 2. 成核与生长（r*、J、dr/dt）
//! 3. 生长源项线性化分解并与上一迭代值亚松弛
//! 4. 壁面沉积/升华速率
//!
//! 单元之间没有数据依赖，结果按单元顺序收集；任何单元出错即整体失败，
//! 错误中带有单元索引。

use std::f64::consts::PI;

use cf_config::ImplicitGrowth;
use glam::DVec3;
use rayon::prelude::*;

use super::relaxation::{DropletSources, SourceHistory, UnderRelaxation};
use super::traits::{CellView, SourceContext, SourceContribution, SourceTerm};
use super::wall::{WallModel, WallRates};
use crate::error::{PhaseError, PhaseResult};
use crate::nucleation::{KineticsInput, KineticsState, NucleationModel};
use crate::params::PhaseParams;
use crate::thermo::ClosureState;

/// 单元输入（当前迭代的原始变量与持久化记忆）
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CellInput {
    /// 压力 [Pa]
    pub p: f64,
    /// 温度 [K]
    pub t: f64,
    /// 速度 [m/s]
    pub u: DVec3,
    /// 气相密度 [kg/m³]
    pub rho: f64,
    /// 液相质量分数
    pub y: f64,
    /// 液滴数（每千克）
    pub n: f64,
    /// 上一时间步末的实际液滴半径 [m]
    pub r_actual: f64,
    /// 壁面冰层厚度 [m]
    pub ice_thickness: f64,
    /// 给定沉积速率 [kg/(m³·s)]
    pub mdot_a: f64,
    /// 给定升华速率 [kg/(m³·s)]
    pub mdot_s: f64,
}

impl CellInput {
    /// ρY
    #[inline]
    pub fn rho_y(&self) -> f64 {
        self.rho * self.y
    }

    /// ρN
    #[inline]
    pub fn rho_n(&self) -> f64 {
        self.rho * self.n
    }
}

/// 单元源项评估结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellEvaluation {
    /// 闭合状态
    pub closure: ClosureState,
    /// 成核与生长
    pub kinetics: KineticsState,
    /// 松弛后的液相源项分解
    pub droplet: DropletSources,
    /// 在当前迭代值处的生长源 [kg/(m³·s)]
    pub source_y_growth: f64,
    /// 在当前迭代值处的总液相源 [kg/(m³·s)]
    pub source_y: f64,
    /// 动量汇系数 Source_Y/ρ [1/s]
    pub momentum_factor: f64,
    /// 液相带走的能量 h_droplet·Source_Y [W/m³]
    pub source_e: f64,
    /// 壁面速率
    pub wall: WallRates,
    /// 壁面对 (ρ, ρU, ρE) 的贡献
    pub wall_contribution: SourceContribution,
    /// 本步末的实际液滴半径 [m]
    pub r_actual_new: f64,
    /// 液滴比表面积 N·4πr² [m²/kg]
    pub beta: f64,
}

/// 源项构建器
pub struct SourceBuilder<'a> {
    params: &'a PhaseParams,
    wall: &'a WallModel,
    relaxation: UnderRelaxation,
}

impl<'a> SourceBuilder<'a> {
    /// 创建构建器
    pub fn new(params: &'a PhaseParams, wall: &'a WallModel) -> Self {
        Self {
            params,
            wall,
            relaxation: UnderRelaxation::new(params.relaxation.omega),
        }
    }

    /// 亚松弛
    pub fn relaxation(&self) -> UnderRelaxation {
        self.relaxation
    }

    /// 隐式比例 θ
    #[inline]
    fn implicit_fraction(&self, coeff: f64) -> f64 {
        match self.params.relaxation.implicit_growth {
            ImplicitGrowth::NegativeOnly if coeff < 0.0 => 1.0,
            ImplicitGrowth::NegativeOnly => 0.0,
            ImplicitGrowth::Always => 1.0,
            ImplicitGrowth::Never => 0.0,
        }
    }

    /// 线性化分解（未松弛）
    pub fn decompose(&self, input: &CellInput, closure: &ClosureState, kinetics: &KineticsState) -> DropletSources {
        let r = kinetics.r_growth;
        let rho_y = input.rho_y();

        let (growth, coeff) = if r > 0.0 {
            let g = 4.0 * PI * r * r * closure.rho_liquid * kinetics.drdt * input.rho_n();
            (g, 3.0 * kinetics.drdt / r)
        } else {
            (0.0, 0.0)
        };
        let theta = self.implicit_fraction(coeff);

        let nucleation = match kinetics.r_nucleation {
            Some(rn) if kinetics.j > 0.0 => 4.0 / 3.0 * PI * rn.powi(3) * closure.rho_liquid * kinetics.j,
            _ => 0.0,
        };

        DropletSources {
            growth_passive: growth - coeff * rho_y,
            growth_active_explicit: (1.0 - theta) * coeff * rho_y,
            growth_active_coeff: theta * coeff,
            nucleation,
            number: kinetics.j,
        }
    }

    /// 评估单个单元
    pub fn evaluate_cell(
        &self,
        cell: usize,
        input: &CellInput,
        previous: Option<&DropletSources>,
        ctx: &SourceContext<'_>,
    ) -> PhaseResult<CellEvaluation> {
        let closure = self
            .params
            .closure
            .evaluate(input.p, input.t, input.u)
            .map_err(|e| e.at_cell(cell))?;

        let kinetics = NucleationModel::new(self.params).evaluate(
            &KineticsInput {
                p: input.p,
                t: input.t,
                rho: input.rho,
                y: input.y,
                r_actual: input.r_actual,
            },
            &closure,
        );

        let droplet = self
            .decompose(input, &closure, &kinetics)
            .relaxed(previous, &self.relaxation);
        if !droplet.is_finite() {
            return Err(PhaseError::model_domain(cell, "Source_Y", f64::NAN, "源项非有限"));
        }

        let rho_y = input.rho_y();
        let source_y_growth = droplet.growth_at(rho_y);
        let source_y = source_y_growth + droplet.nucleation;
        let momentum_factor = if input.rho > 0.0 { source_y / input.rho } else { 0.0 };

        let view = CellView {
            cell,
            p: input.p,
            t: input.t,
            u: input.u,
            rho: input.rho,
            closure: &closure,
            ice_thickness: input.ice_thickness,
            mdot_a_prescribed: input.mdot_a,
            mdot_s_prescribed: input.mdot_s,
        };
        let wall = self.wall.rates(&view);
        let wall_contribution = if self.wall.is_wall_cell(cell) {
            self.wall.compute_cell(&view, ctx)
        } else {
            SourceContribution::ZERO
        };

        let r_actual_new = (kinetics.r_growth + kinetics.drdt * ctx.dt).max(0.0);
        let beta = input.n * 4.0 * PI * r_actual_new * r_actual_new;

        Ok(CellEvaluation {
            closure,
            kinetics,
            droplet,
            source_y_growth,
            source_y,
            momentum_factor,
            source_e: closure.h_droplet * source_y,
            wall,
            wall_contribution,
            r_actual_new,
            beta,
        })
    }

    /// 并行评估所有单元
    pub fn evaluate_all(
        &self,
        inputs: &[CellInput],
        history: &SourceHistory,
        ctx: &SourceContext<'_>,
    ) -> PhaseResult<Vec<CellEvaluation>> {
        if !history.is_empty() {
            PhaseError::check_size("source_history", inputs.len(), history.len())?;
        }
        (0..inputs.len())
            .into_par_iter()
            .map(|i| self.evaluate_cell(i, &inputs[i], history.get(i), ctx))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::PhaseMesh;
    use cf_config::WallConfig;

    fn input(p: f64, t: f64, y: f64, n: f64, r: f64) -> CellInput {
        let rho = p / (461.52 * t);
        CellInput {
            p,
            t,
            rho,
            y,
            n,
            r_actual: r,
            ..CellInput::default()
        }
    }

    fn setup() -> (PhaseParams, WallModel) {
        let mesh = PhaseMesh::uniform_channel(1, 0.01, 1e-3);
        let wall = WallModel::new(
            &WallConfig::default(),
            &mesh,
        );
        (PhaseParams::default(), wall)
    }

    #[test]
    fn test_fresh_nucleation_cell() {
        let (params, wall) = setup();
        let builder = SourceBuilder::new(&params, &wall);
        let ctx = SourceContext::new(0.0, 1e-7, &params);
        let eval = builder
            .evaluate_cell(0, &input(1000.0, 250.0, 0.0, 0.0, 0.0), None, &ctx)
            .unwrap();

        assert!(eval.kinetics.j > 0.0);
        assert!(eval.droplet.nucleation > 0.0);
        assert_eq!(eval.droplet.number, eval.kinetics.j);
        assert!(eval.source_y > 0.0);
        assert!(eval.r_actual_new > eval.kinetics.r_growth);
    }

    #[test]
    fn test_theta_follows_growth_sign() {
        let (params, wall) = setup();
        let builder = SourceBuilder::new(&params, &wall);
        // 欠饱和且有液滴：c < 0，全隐式
        let cell = input(1000.0, 320.0, 0.01, 1e15, 1e-8);
        let closure = params.closure.evaluate(cell.p, cell.t, cell.u).unwrap();
        let kin = NucleationModel::new(&params).evaluate(
            &KineticsInput {
                p: cell.p,
                t: cell.t,
                rho: cell.rho,
                y: cell.y,
                r_actual: cell.r_actual,
            },
            &closure,
        );
        let d = builder.decompose(&cell, &closure, &kin);
        assert!(d.growth_active_coeff < 0.0);
        assert_eq!(d.growth_active_explicit, 0.0);

        let total = 4.0 * PI * 1e-16 * closure.rho_liquid * kin.drdt * cell.rho_n();
        let rel = (d.growth_at(cell.rho_y()) - total).abs() / total.abs();
        assert!(rel < 1e-10);
    }

    #[test]
    fn test_out_of_range_temperature_reports_cell() {
        let (params, wall) = setup();
        let builder = SourceBuilder::new(&params, &wall);
        let ctx = SourceContext::new(0.0, 1e-7, &params);
        let inputs = [input(1000.0, 250.0, 0.0, 0.0, 0.0), input(1000.0, 150.0, 0.0, 0.0, 0.0)];
        let history = SourceHistory::new(2);
        match builder.evaluate_all(&inputs, &history, &ctx) {
            Err(PhaseError::ModelDomain { cell, quantity, .. }) => {
                assert_eq!(cell, 1);
                assert_eq!(quantity, "T");
            }
            other => panic!("期望 ModelDomain, 得到 {other:?}"),
        }
    }

    #[test]
    fn test_relaxation_uses_history() {
        let (params, wall) = setup();
        let builder = SourceBuilder::new(&params, &wall);
        let ctx = SourceContext::new(0.0, 1e-7, &params);
        let cell = input(1000.0, 250.0, 0.0, 0.0, 0.0);
        let fresh = builder.evaluate_cell(0, &cell, None, &ctx).unwrap();
        let zero = DropletSources::default();
        let relaxed = builder.evaluate_cell(0, &cell, Some(&zero), &ctx).unwrap();
        let omega = params.relaxation.omega;
        assert!((relaxed.droplet.nucleation - omega * fresh.droplet.nucleation).abs() < 1e-12 * fresh.droplet.nucleation);
    }
}
