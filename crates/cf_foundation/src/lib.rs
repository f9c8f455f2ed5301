// crates/cf_foundation/src/lib.rs

//! CondensFlow Foundation Layer
//!
//! 基础层，提供整个项目共享的错误类型和数值安全工具。
//!
//! # 模块概览
//!
//! - [`error`]: 统一错误类型 `CfError` 与 `ensure!` / `require!` 宏
//! - [`float`]: 保护常量、安全平方根、Kahan 求和
//!
//! # 示例
//!
//! ```
//! use cf_foundation::{CfError, CfResult};
//! use cf_foundation::float::safe_sqrt;
//!
//! fn speed(gamma_rt: f64) -> CfResult<f64> {
//!     cf_foundation::ensure!(gamma_rt >= 0.0, CfError::invalid_input("γRT 不能为负"));
//!     Ok(safe_sqrt(gamma_rt))
//! }
//!
//! assert_eq!(speed(4.0).unwrap(), 2.0);
//! assert!(speed(-1.0).is_err());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod float;

pub use error::{CfError, CfResult};
pub use float::{KahanSum, TINY, safe_sqrt};

/// Prelude 模块，包含常用类型
pub mod prelude {
    pub use crate::error::{CfError, CfResult};
    pub use crate::float::{KahanSum, TINY, safe_sqrt};
    pub use crate::{ensure, require};
}
