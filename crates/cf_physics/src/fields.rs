// crates/cf_physics/src/fields.rs

//! 跨时间步的单元记忆与场快照转换
//!
//! [`PhaseMemory`] 保存续算所需、又不能由 (p, T, U, N, Y) 重建的量。
//! 与 [`FieldSnapshot`] 的互转按场目录中的类别进行：写出时给出全部已知场，
//! 由检查点过滤掉 `Ephemeral`；读入时只读取 `Persisted` 场。

use cf_io::FieldSnapshot;
use glam::DVec3;

use crate::error::{PhaseError, PhaseResult};
use crate::sources::{CellEvaluation, IceLayerModel, WallModel};
use crate::state::{ConservedState, PrimitiveState};
use crate::thermo::IdealGas;

/// 单元记忆
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhaseMemory {
    /// 过饱和度（兼容保存，评估时总是重算）
    pub s_sat: Vec<f64>,
    /// 实际液滴半径 [m]
    pub r_actual: Vec<f64>,
    /// 成核率 [1/(m³·s)]
    pub j: Vec<f64>,
    /// 液滴半径增长率 [m/s]
    pub drdt: Vec<f64>,
    /// 沉积速率 [kg/(m³·s)]
    pub mdot_a: Vec<f64>,
    /// 升华速率 [kg/(m³·s)]
    pub mdot_s: Vec<f64>,
    /// 壁面冰层厚度 [m]
    pub ice_thickness: Vec<f64>,
}

impl PhaseMemory {
    /// 创建零记忆
    pub fn new(n_cells: usize) -> Self {
        Self {
            s_sat: vec![0.0; n_cells],
            r_actual: vec![0.0; n_cells],
            j: vec![0.0; n_cells],
            drdt: vec![0.0; n_cells],
            mdot_a: vec![0.0; n_cells],
            mdot_s: vec![0.0; n_cells],
            ice_thickness: vec![0.0; n_cells],
        }
    }

    /// 单元数
    #[inline]
    pub fn n_cells(&self) -> usize {
        self.r_actual.len()
    }

    /// 校验长度
    pub fn check_sizes(&self, n_cells: usize) -> PhaseResult<()> {
        PhaseError::check_size("S_sat", n_cells, self.s_sat.len())?;
        PhaseError::check_size("r_droplet_actual", n_cells, self.r_actual.len())?;
        PhaseError::check_size("J", n_cells, self.j.len())?;
        PhaseError::check_size("drdt", n_cells, self.drdt.len())?;
        PhaseError::check_size("mdot_a", n_cells, self.mdot_a.len())?;
        PhaseError::check_size("mdot_s", n_cells, self.mdot_s.len())?;
        PhaseError::check_size("ice_thickness", n_cells, self.ice_thickness.len())
    }

    /// 提交一个已接受时间步的评估结果
    ///
    /// 贴壁单元的冰层按净沉积面通量增厚。
    pub fn commit(&mut self, evaluations: &[CellEvaluation], wall: &WallModel, ice: &IceLayerModel, dt: f64) {
        for (i, eval) in evaluations.iter().enumerate() {
            self.s_sat[i] = eval.closure.s_sat;
            self.r_actual[i] = eval.r_actual_new;
            self.j[i] = eval.kinetics.j;
            self.drdt[i] = eval.kinetics.drdt;
            let a_v = wall.area_per_volume(i);
            if a_v > 0.0 {
                self.mdot_a[i] = eval.wall.mdot_a;
                self.mdot_s[i] = eval.wall.mdot_s;
                let net_flux = (eval.wall.mdot_a - eval.wall.mdot_s) / a_v;
                self.ice_thickness[i] = (self.ice_thickness[i] + ice.growth_rate(net_flux) * dt).max(0.0);
            }
        }
    }
}

fn column(evals: &[CellEvaluation], f: impl Fn(&CellEvaluation) -> f64) -> Vec<f64> {
    evals.iter().map(f).collect()
}

fn to_arrays(v: &[DVec3]) -> Vec<[f64; 3]> {
    v.iter().map(|u| u.to_array()).collect()
}

/// 构建场快照
///
/// 给出评估结果时一并写出诊断场与源项分解。
pub fn to_snapshot(
    prim: &PrimitiveState,
    cons: &ConservedState,
    memory: &PhaseMemory,
    evaluations: Option<&[CellEvaluation]>,
    gas: &IdealGas,
) -> PhaseResult<FieldSnapshot> {
    let n = prim.n_cells();
    prim.check_sizes()?;
    memory.check_sizes(n)?;
    PhaseError::check_size("rho", n, cons.n_cells())?;

    let mut snap = FieldSnapshot::new(n);
    snap.insert_scalar("p", prim.p.clone())?;
    snap.insert_scalar("T", prim.t.clone())?;
    snap.insert_vector("U", to_arrays(&prim.u))?;
    snap.insert_scalar("N", prim.n.clone())?;
    snap.insert_scalar("Y", prim.y.clone())?;
    snap.insert_scalar("S_sat", memory.s_sat.clone())?;
    snap.insert_scalar("r_droplet_actual", memory.r_actual.clone())?;
    snap.insert_scalar("J", memory.j.clone())?;
    snap.insert_scalar("drdt", memory.drdt.clone())?;
    snap.insert_scalar("mdot_a", memory.mdot_a.clone())?;
    snap.insert_scalar("mdot_s", memory.mdot_s.clone())?;
    snap.insert_scalar("ice_thickness", memory.ice_thickness.clone())?;

    snap.insert_scalar("rho", prim.rho.clone())?;
    snap.insert_scalar("Mach", (0..n).map(|i| prim.mach(i, gas)).collect())?;
    snap.insert_scalar("rhoN", cons.rho_n.clone())?;
    snap.insert_scalar("rhoY", cons.rho_y.clone())?;
    snap.insert_vector(
        "rhoUN",
        (0..n).map(|i| cons.rho_un(i, prim.n[i]).to_array()).collect(),
    )?;
    snap.insert_vector(
        "rhoUY",
        (0..n).map(|i| cons.rho_uy(i, prim.y[i]).to_array()).collect(),
    )?;

    if let Some(evals) = evaluations {
        PhaseError::check_size("evaluations", n, evals.len())?;
        let col = |f: fn(&CellEvaluation) -> f64| column(evals, f);
        snap.insert_scalar("Knudsen_droplet", col(|e| e.kinetics.knudsen))?;
        snap.insert_scalar("psat", col(|e| e.closure.psat))?;
        snap.insert_scalar("Tsat", col(|e| e.closure.tsat))?;
        snap.insert_scalar("T_sc", col(|e| e.closure.t_sc))?;
        snap.insert_scalar("h_fg", col(|e| e.closure.h_fg))?;
        snap.insert_scalar("surface_tension", col(|e| e.closure.surface_tension))?;
        snap.insert_scalar("h_liquid", col(|e| e.closure.h_liquid))?;
        snap.insert_scalar("h_droplet", col(|e| e.closure.h_droplet))?;
        snap.insert_scalar(
            "r_droplet_critical",
            col(|e| e.kinetics.r_critical.unwrap_or(0.0)),
        )?;
        snap.insert_scalar("mean_free_path", col(|e| e.kinetics.mean_free_path))?;
        snap.insert_scalar("v_corr", col(|e| e.kinetics.v_corr))?;
        snap.insert_scalar("beta", col(|e| e.beta))?;
        snap.insert_scalar("Source_Y", col(|e| e.source_y))?;
        snap.insert_scalar("Source_Y_growth", col(|e| e.source_y_growth))?;
        snap.insert_scalar("Source_Y_growth_passive", col(|e| e.droplet.growth_passive))?;
        snap.insert_scalar(
            "Source_Y_growth_active_coeff",
            col(|e| e.droplet.growth_active_coeff),
        )?;
        snap.insert_scalar("Source_Y_nucleation", col(|e| e.droplet.nucleation))?;
        snap.insert_scalar("SourceMomentumFactor", col(|e| e.momentum_factor))?;
        snap.insert_scalar("Source_e", col(|e| e.source_e))?;
        snap.insert_scalar("Source_e_wall", col(|e| e.wall.source_e_wall))?;
    }

    Ok(snap)
}

/// 从场快照恢复原始变量与记忆
///
/// 只读取 `Persisted` 场；ρ 由 p、T 重算。
pub fn from_snapshot(snap: &FieldSnapshot, gas: &IdealGas) -> PhaseResult<(PrimitiveState, PhaseMemory)> {
    snap.verify_persisted()?;
    let scalar = |name: &str| -> PhaseResult<Vec<f64>> { Ok(snap.require_scalar(name)?.to_vec()) };

    let mut prim = PrimitiveState {
        p: scalar("p")?,
        t: scalar("T")?,
        u: snap
            .require_vector("U")?
            .iter()
            .map(|a| DVec3::from_array(*a))
            .collect(),
        rho: Vec::new(),
        y: scalar("Y")?,
        n: scalar("N")?,
    };
    prim.rho = vec![0.0; prim.n_cells()];
    prim.update_density(gas);

    let memory = PhaseMemory {
        s_sat: scalar("S_sat")?,
        r_actual: scalar("r_droplet_actual")?,
        j: scalar("J")?,
        drdt: scalar("drdt")?,
        mdot_a: scalar("mdot_a")?,
        mdot_s: scalar("mdot_s")?,
        ice_thickness: scalar("ice_thickness")?,
    };
    prim.check_sizes()?;
    memory.check_sizes(prim.n_cells())?;
    Ok((prim, memory))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cf_io::FieldClass;

    fn state() -> (PrimitiveState, ConservedState, PhaseMemory, IdealGas) {
        let gas = IdealGas::water_vapor();
        let mut prim = PrimitiveState::uniform(4, &gas, 1000.0, 250.0, DVec3::new(50.0, 0.0, 0.0));
        prim.y[2] = 0.01;
        prim.n[2] = 1e15;
        let cons = ConservedState::from_primitive(&prim, &gas);
        let mut memory = PhaseMemory::new(4);
        memory.r_actual[2] = 2e-9;
        memory.ice_thickness[0] = 1e-7;
        (prim, cons, memory, gas)
    }

    #[test]
    fn test_snapshot_contains_catalog_fields() {
        let (prim, cons, memory, gas) = state();
        let snap = to_snapshot(&prim, &cons, &memory, None, &gas).unwrap();
        assert!(snap.scalar("Mach").is_some());
        assert!(snap.vector("rhoUY").is_some());
        assert!(snap.verify_persisted().is_ok());

        let written = snap.written_only();
        assert!(written.get("rhoY").is_none());
        assert!(written.get("rho").is_some());
        for (name, _) in written.iter() {
            assert_ne!(cf_io::field_class(name), FieldClass::Ephemeral);
        }
    }

    #[test]
    fn test_restore_persisted_fields() {
        let (prim, cons, memory, gas) = state();
        let snap = to_snapshot(&prim, &cons, &memory, None, &gas).unwrap();
        let (prim2, memory2) = from_snapshot(&snap.written_only(), &gas).unwrap();
        assert_eq!(prim2.y, prim.y);
        assert_eq!(prim2.u, prim.u);
        assert_eq!(memory2.r_actual, memory.r_actual);
        assert_eq!(memory2.ice_thickness, memory.ice_thickness);
        assert!((prim2.rho[0] - prim.rho[0]).abs() < 1e-15);
    }

    #[test]
    fn test_missing_persisted_field_fails() {
        let (prim, _, _, gas) = state();
        let mut snap = FieldSnapshot::new(prim.n_cells());
        snap.insert_scalar("p", prim.p.clone()).unwrap();
        assert!(from_snapshot(&snap, &gas).is_err());
    }
}
