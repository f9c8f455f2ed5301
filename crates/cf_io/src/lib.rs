// crates/cf_io/src/lib.rs

//! CondensFlow IO 模块
//!
//! 负责场的持久化约定与检查点读写。
//!
//! # 模块
//!
//! - [`fields`]: 场分类 `FieldClass`、场目录、场快照 `FieldSnapshot`
//! - [`checkpoint`]: 二进制检查点与检查点管理器
//! - [`error`]: IO 错误类型
//!
//! # 使用示例
//!
//! ```rust,ignore
//! use cf_io::{Checkpoint, CheckpointManager, FieldSnapshot};
//!
//! let manager = CheckpointManager::new("output", 3);
//! manager.save(&Checkpoint::new(time, step, snapshot))?;
//! ```

#![warn(missing_docs)]

pub mod checkpoint;
pub mod error;
pub mod fields;

pub use checkpoint::{Checkpoint, CheckpointHeader, CheckpointManager, compute_crc32, fnv1a64};
pub use error::{IoError, IoResult};
pub use fields::{
    FIELD_CATALOG, FieldClass, FieldData, FieldKind, FieldSnapshot, FieldSpec, field_class,
    field_spec, persisted_fields,
};
