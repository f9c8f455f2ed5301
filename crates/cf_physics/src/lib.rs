// crates/cf_physics/src/lib.rs

//! 两相凝结流物理内核
//!
//! 可压缩水蒸气中的均相成核、液滴生长与壁面沉积：
//!
//! - 热力学闭合 (thermo)：饱和曲线、分区间液相物性、单元闭合状态
//! - 成核动力学 (nucleation)：经典成核率、临界半径、Young 生长率
//! - 源项 (sources)：线性化分解、亚松弛、壁面沉积/升华与冰层增厚
//! - 网格与通量 (mesh, flux)：有限体积几何与 Rusanov 参考通量
//! - 引擎 (engine)：守恒量更新、外迭代、时间步拒绝与重试
//! - 场与记忆 (fields)：跨时间步的单元记忆与检查点场快照
//! - 稳态监测 (monitor) 与初始条件 (initial)
//!
//! # 错误处理
//!
//! 所有可失败操作返回 [`PhaseResult`]。闭合关系超出有效范围时不外推；
//! 不可实现的更新触发步长拒绝；外迭代不收敛只记警告。

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod engine;
pub mod error;
pub mod fields;
pub mod flux;
pub mod initial;
pub mod mesh;
pub mod monitor;
pub mod nucleation;
pub mod params;
pub mod sources;
pub mod state;
pub mod thermo;

pub use engine::{CflCalculator, IterationOutcome, OuterIteration, PhaseSolver, StepStats, UpdateDriver};
pub use error::{PhaseError, PhaseResult, RealizabilityKind};
pub use fields::{from_snapshot, to_snapshot, PhaseMemory};
pub use flux::{BoundaryState, FluxDivergence, FluxProvider, RusanovFlux};
pub use initial::{quasi_1d_isentropic, quasi_1d_state, IsentropicProfile, Stagnation};
pub use mesh::{BoundaryKind, FaceKind, MeshFace, PhaseMesh, WallPatch};
pub use monitor::{MonitorReport, SteadyMonitor};
pub use nucleation::{KineticsInput, KineticsState, NucleationModel};
pub use params::{PhaseParams, TransportProperties};
pub use sources::{
    CellEvaluation, CellInput, DropletSources, IceLayerModel, RecessionOutcome, SourceBuilder,
    SourceHistory, UnderRelaxation, WallModel, WallSample,
};
pub use state::{ConservedState, PrimitiveState};
pub use thermo::{ClosureState, IdealGas, LiquidRegime, ThermoClosure};
