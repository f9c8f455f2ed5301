// crates/cf_physics/src/sources/mod.rs

//! 源项模块
//!
//! - [`traits`]：气相源项接口
//! - [`relaxation`]：液相源项分解与亚松弛
//! - [`builder`]：逐单元并行构建源项
//! - [`wall`]：壁面沉积/升华与冰层增厚

pub mod builder;
pub mod relaxation;
pub mod traits;
pub mod wall;

pub use builder::{CellEvaluation, CellInput, SourceBuilder};
pub use relaxation::{DropletSources, SourceHistory, UnderRelaxation};
pub use traits::{CellView, SourceContext, SourceContribution, SourceTerm};
pub use wall::{
    mean_molecular_speed, IceLayerModel, RecessionOutcome, WallModel, WallRates, WallSample,
};
