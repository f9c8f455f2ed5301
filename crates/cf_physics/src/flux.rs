// crates/cf_physics/src/flux.rs

//! 对流通量
//!
//! 通量离散不属于相变内核，内核只需要每个单元每个守恒量的通量散度
//! （单位体积净流出率）。[`FluxProvider`] 是这一边界；
//! [`RusanovFlux`] 是一阶参考实现，用于算例与测试。
//!
//! # Rusanov 通量
//!
//! ```text
//! F* = 0.5·(F_L + F_R)·n − 0.5·λ·(U_R − U_L)
//! λ  = max(|u_n,L| + c_L, |u_n,R| + c_R)
//! ```
//!
//! 液相随气相平动：F_ρN = ρ(u·n)·N，F_ρY = ρ(u·n)·Y。
//! 滑移壁面只传递压力，(0, p·n, 0, 0, 0)。

use glam::DVec3;
use rayon::prelude::*;

use crate::error::{PhaseError, PhaseResult};
use crate::mesh::{BoundaryKind, FaceKind, PhaseMesh};
use crate::state::{ConservedState, PrimitiveState};
use crate::thermo::IdealGas;

/// 通量散度（单位体积净流出率）
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FluxDivergence {
    /// ρ
    pub rho: Vec<f64>,
    /// ρU
    pub rho_u: Vec<DVec3>,
    /// ρE
    pub rho_e: Vec<f64>,
    /// ρN
    pub rho_n: Vec<f64>,
    /// ρY
    pub rho_y: Vec<f64>,
}

impl FluxDivergence {
    /// 零散度
    pub fn zeros(n_cells: usize) -> Self {
        Self {
            rho: vec![0.0; n_cells],
            rho_u: vec![DVec3::ZERO; n_cells],
            rho_e: vec![0.0; n_cells],
            rho_n: vec![0.0; n_cells],
            rho_y: vec![0.0; n_cells],
        }
    }

    /// 单元数
    #[inline]
    pub fn n_cells(&self) -> usize {
        self.rho.len()
    }

    fn scatter(&mut self, cell: usize, flux: &FaceFlux, scale: f64) {
        self.rho[cell] += scale * flux.rho;
        self.rho_u[cell] += scale * flux.rho_u;
        self.rho_e[cell] += scale * flux.rho_e;
        self.rho_n[cell] += scale * flux.rho_n;
        self.rho_y[cell] += scale * flux.rho_y;
    }
}

/// 通量散度提供者
pub trait FluxProvider: Send + Sync {
    /// 名称
    fn name(&self) -> &'static str;

    /// 计算通量散度
    fn divergence(
        &self,
        mesh: &PhaseMesh,
        prim: &PrimitiveState,
        cons: &ConservedState,
    ) -> PhaseResult<FluxDivergence>;
}

/// 固定边界状态
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundaryState {
    /// 压力 [Pa]
    pub p: f64,
    /// 温度 [K]
    pub t: f64,
    /// 速度 [m/s]
    pub u: DVec3,
    /// 液相质量分数
    pub y: f64,
    /// 液滴数 [1/kg]
    pub n: f64,
}

/// 面一侧的状态
#[derive(Debug, Clone, Copy)]
struct FaceSide {
    rho: f64,
    u: DVec3,
    p: f64,
    rho_e: f64,
    y: f64,
    n: f64,
    c: f64,
}

impl FaceSide {
    fn from_cell(i: usize, prim: &PrimitiveState, cons: &ConservedState, gas: &IdealGas) -> Self {
        Self {
            rho: cons.rho[i],
            u: prim.u[i],
            p: prim.p[i],
            rho_e: cons.rho_e[i],
            y: prim.y[i],
            n: prim.n[i],
            c: gas.sound_speed(prim.t[i]),
        }
    }

    fn from_boundary(b: &BoundaryState, gas: &IdealGas) -> Self {
        let rho = gas.density(b.p, b.t);
        Self {
            rho,
            u: b.u,
            p: b.p,
            rho_e: gas.total_energy(rho, b.t, b.u),
            y: b.y,
            n: b.n,
            c: gas.sound_speed(b.t),
        }
    }

    fn physical_flux(&self, normal: DVec3) -> FaceFlux {
        let un = self.u.dot(normal);
        let m = self.rho * un;
        FaceFlux {
            rho: m,
            rho_u: m * self.u + self.p * normal,
            rho_e: (self.rho_e + self.p) * un,
            rho_n: m * self.n,
            rho_y: m * self.y,
        }
    }

    fn conserved(&self) -> FaceFlux {
        FaceFlux {
            rho: self.rho,
            rho_u: self.rho * self.u,
            rho_e: self.rho_e,
            rho_n: self.rho * self.n,
            rho_y: self.rho * self.y,
        }
    }
}

/// 面通量（单位面积）
#[derive(Debug, Clone, Copy, Default)]
struct FaceFlux {
    rho: f64,
    rho_u: DVec3,
    rho_e: f64,
    rho_n: f64,
    rho_y: f64,
}

impl FaceFlux {
    fn is_finite(&self) -> bool {
        self.rho.is_finite()
            && self.rho_u.is_finite()
            && self.rho_e.is_finite()
            && self.rho_n.is_finite()
            && self.rho_y.is_finite()
    }
}

/// Rusanov 通量
#[derive(Debug, Clone)]
pub struct RusanovFlux {
    gas: IdealGas,
    fixed_states: Vec<BoundaryState>,
}

impl RusanovFlux {
    /// 创建
    pub fn new(gas: IdealGas) -> Self {
        Self {
            gas,
            fixed_states: Vec::new(),
        }
    }

    /// 附加固定边界状态表（按 [`BoundaryKind::FixedState`] 的索引）
    pub fn with_fixed_states(mut self, states: Vec<BoundaryState>) -> Self {
        self.fixed_states = states;
        self
    }

    /// 固定边界状态表
    pub fn fixed_states(&self) -> &[BoundaryState] {
        &self.fixed_states
    }

    fn rusanov(&self, left: &FaceSide, right: &FaceSide, normal: DVec3) -> FaceFlux {
        let fl = left.physical_flux(normal);
        let fr = right.physical_flux(normal);
        let ul = left.conserved();
        let ur = right.conserved();
        let lambda = (left.u.dot(normal).abs() + left.c).max(right.u.dot(normal).abs() + right.c);
        FaceFlux {
            rho: 0.5 * (fl.rho + fr.rho) - 0.5 * lambda * (ur.rho - ul.rho),
            rho_u: 0.5 * (fl.rho_u + fr.rho_u) - 0.5 * lambda * (ur.rho_u - ul.rho_u),
            rho_e: 0.5 * (fl.rho_e + fr.rho_e) - 0.5 * lambda * (ur.rho_e - ul.rho_e),
            rho_n: 0.5 * (fl.rho_n + fr.rho_n) - 0.5 * lambda * (ur.rho_n - ul.rho_n),
            rho_y: 0.5 * (fl.rho_y + fr.rho_y) - 0.5 * lambda * (ur.rho_y - ul.rho_y),
        }
    }

    fn face_flux(
        &self,
        face: usize,
        mesh: &PhaseMesh,
        prim: &PrimitiveState,
        cons: &ConservedState,
    ) -> PhaseResult<FaceFlux> {
        let f = &mesh.faces()[face];
        let left = FaceSide::from_cell(f.owner, prim, cons, &self.gas);
        let flux = match f.kind {
            FaceKind::Interior(nb) => {
                let right = FaceSide::from_cell(nb, prim, cons, &self.gas);
                self.rusanov(&left, &right, f.normal)
            }
            FaceKind::Boundary(BoundaryKind::Transmissive) => left.physical_flux(f.normal),
            FaceKind::Boundary(BoundaryKind::SlipWall) => FaceFlux {
                rho_u: left.p * f.normal,
                ..FaceFlux::default()
            },
            FaceKind::Boundary(BoundaryKind::FixedState(idx)) => {
                let state = self.fixed_states.get(idx).ok_or_else(|| {
                    PhaseError::Config(format!("面 {face} 引用了不存在的边界状态 {idx}"))
                })?;
                let right = FaceSide::from_boundary(state, &self.gas);
                self.rusanov(&left, &right, f.normal)
            }
        };
        Ok(flux)
    }
}

impl FluxProvider for RusanovFlux {
    fn name(&self) -> &'static str {
        "Rusanov"
    }

    fn divergence(
        &self,
        mesh: &PhaseMesh,
        prim: &PrimitiveState,
        cons: &ConservedState,
    ) -> PhaseResult<FluxDivergence> {
        let n = mesh.n_cells();
        PhaseError::check_size("prim", n, prim.n_cells())?;
        PhaseError::check_size("cons", n, cons.n_cells())?;

        let fluxes = (0..mesh.n_faces())
            .into_par_iter()
            .map(|f| self.face_flux(f, mesh, prim, cons))
            .collect::<PhaseResult<Vec<_>>>()?;

        let mut div = FluxDivergence::zeros(n);
        for (face, flux) in mesh.faces().iter().zip(&fluxes) {
            if !flux.is_finite() {
                return Err(PhaseError::realizability(
                    face.owner,
                    crate::error::RealizabilityKind::NonFinite,
                    flux.rho,
                ));
            }
            div.scatter(face.owner, flux, face.area / mesh.volume(face.owner));
            if let FaceKind::Interior(nb) = face.kind {
                div.scatter(nb, flux, -face.area / mesh.volume(nb));
            }
        }
        Ok(div)
    }
}
