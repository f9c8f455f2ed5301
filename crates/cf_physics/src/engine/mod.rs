// crates/cf_physics/src/engine/mod.rs

//! 计算引擎
//!
//! - [`timestep`]：CFL 时间步
//! - [`update`]：守恒量更新与原始变量恢复
//! - [`iteration`]：时间步内的外迭代
//! - [`solver`]：步长拒绝/重试与记忆提交

pub mod iteration;
pub mod solver;
pub mod timestep;
pub mod update;

pub use iteration::{cell_inputs, IterationOutcome, OuterIteration};
pub use solver::{PhaseSolver, StepStats};
pub use timestep::CflCalculator;
pub use update::UpdateDriver;
