// crates/cf_io/src/error.rs
//! IO 错误类型定义
//!
//! 检查点读写和场快照校验的统一错误枚举，可转换为 `CfError` 以实现跨层传递。

use cf_foundation::CfError;
use thiserror::Error;

/// IO 模块结果类型别名
pub type IoResult<T> = Result<T, IoError>;

/// IO 错误枚举
#[derive(Error, Debug)]
pub enum IoError {
    /// 底层 IO 错误
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    /// 文件格式错误
    #[error("格式错误: {0}")]
    Format(String),

    /// 版本不兼容
    #[error("版本不兼容: 文件版本 {file}, 当前版本 {current}")]
    Version {
        /// 文件中的版本
        file: u32,
        /// 当前支持的版本
        current: u32,
    },

    /// 校验和错误
    #[error("校验和错误: 期望 {expected:08x}, 实际 {found:08x}")]
    Checksum {
        /// 文件中记录的校验和
        expected: u32,
        /// 重新计算的校验和
        found: u32,
    },

    /// 网格不匹配
    #[error("网格不匹配: 期望 {expected} 单元, 文件 {found} 单元")]
    MeshMismatch {
        /// 当前网格单元数
        expected: usize,
        /// 文件中的单元数
        found: usize,
    },

    /// 缺少必读场
    #[error("缺少必读场: {0}")]
    MissingField(String),

    /// 场长度或类型与快照不一致
    #[error("场 '{name}' 无效: {reason}")]
    InvalidField {
        /// 场名
        name: String,
        /// 原因
        reason: String,
    },
}

impl From<IoError> for CfError {
    fn from(err: IoError) -> Self {
        match err {
            IoError::Io(e) => CfError::from(e),
            IoError::MeshMismatch { expected, found } => {
                CfError::size_mismatch("checkpoint.n_cells", expected, found)
            }
            other => CfError::serialization(other.to_string()),
        }
    }
}
