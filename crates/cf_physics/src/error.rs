// crates/cf_physics/src/error.rs

//! 物理层错误类型
//!
//! 三类物理错误的处理方式不同：
//!
//! - [`PhaseError::ModelDomain`]：闭合关系输入超出有效范围，不外推，由调用方决定
//! - [`PhaseError::Realizability`]：更新后的状态不可实现，触发步长拒绝并缩小 Δt 重试
//! - [`PhaseError::ConvergenceFailure`]：外迭代未收敛，警告级别，仍采用最后一次松弛估计
//!
//! 多次拒绝后以 [`PhaseError::StepRejected`] 终止。

use cf_foundation::CfError;
use thiserror::Error;

/// 物理层结果类型
pub type PhaseResult<T> = Result<T, PhaseError>;

/// 不可实现状态的种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RealizabilityKind {
    /// 密度非正
    Density,
    /// 内能非正
    Energy,
    /// 温度超出闭合范围
    Temperature,
    /// 液相质量分数大于 1
    LiquidFraction,
    /// 出现 NaN 或 Inf
    NonFinite,
}

impl std::fmt::Display for RealizabilityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Density => "密度",
            Self::Energy => "内能",
            Self::Temperature => "温度",
            Self::LiquidFraction => "液相分数",
            Self::NonFinite => "非有限值",
        };
        f.write_str(s)
    }
}

/// 物理层错误
#[derive(Error, Debug)]
pub enum PhaseError {
    /// 闭合关系输入超出模型范围
    #[error("模型范围外: 单元 {cell} 的 {quantity}={value:.6e} ({reason})")]
    ModelDomain {
        /// 单元索引
        cell: usize,
        /// 物理量名称
        quantity: &'static str,
        /// 输入值
        value: f64,
        /// 原因
        reason: &'static str,
    },

    /// 更新后状态不可实现
    #[error("不可实现状态: 单元 {cell} 的{kind}={value:.6e}")]
    Realizability {
        /// 单元索引
        cell: usize,
        /// 种类
        kind: RealizabilityKind,
        /// 违规值
        value: f64,
    },

    /// 外迭代未收敛
    #[error("外迭代未收敛: {iterations} 次迭代后残差 {residual:.3e} > 容差 {tolerance:.3e}")]
    ConvergenceFailure {
        /// 已执行迭代次数
        iterations: usize,
        /// 最终残差
        residual: f64,
        /// 容差
        tolerance: f64,
    },

    /// 多次拒绝后放弃时间步
    #[error("时间步被拒绝 {attempts} 次 (dt={dt:.3e})")]
    StepRejected {
        /// 尝试次数
        attempts: usize,
        /// 最后一次尝试的步长
        dt: f64,
        /// 最后一次拒绝原因
        #[source]
        source: Box<PhaseError>,
    },

    /// 数组大小不匹配
    #[error("数组大小不匹配: {name} 期望 {expected}, 实际 {actual}")]
    SizeMismatch {
        /// 数组名称
        name: &'static str,
        /// 期望大小
        expected: usize,
        /// 实际大小
        actual: usize,
    },

    /// 参数错误
    #[error("参数错误: {0}")]
    Config(String),

    /// 持久化错误
    #[error("持久化错误: {0}")]
    Io(#[from] cf_io::IoError),
}

impl PhaseError {
    /// 模型范围错误
    pub fn model_domain(cell: usize, quantity: &'static str, value: f64, reason: &'static str) -> Self {
        Self::ModelDomain {
            cell,
            quantity,
            value,
            reason,
        }
    }

    /// 不可实现状态错误
    pub fn realizability(cell: usize, kind: RealizabilityKind, value: f64) -> Self {
        Self::Realizability { cell, kind, value }
    }

    /// 把单元索引写入错误（逐单元计算时索引未知，先以 0 占位）
    pub fn at_cell(self, cell: usize) -> Self {
        match self {
            Self::ModelDomain {
                quantity,
                value,
                reason,
                ..
            } => Self::ModelDomain {
                cell,
                quantity,
                value,
                reason,
            },
            Self::Realizability { kind, value, .. } => Self::Realizability { cell, kind, value },
            other => other,
        }
    }

    /// 是否可以通过缩小时间步恢复
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Realizability { .. })
    }

    /// 检查数组大小
    pub fn check_size(name: &'static str, expected: usize, actual: usize) -> PhaseResult<()> {
        if expected != actual {
            Err(Self::SizeMismatch {
                name,
                expected,
                actual,
            })
        } else {
            Ok(())
        }
    }
}

impl From<cf_config::ConfigError> for PhaseError {
    fn from(err: cf_config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<PhaseError> for CfError {
    fn from(err: PhaseError) -> Self {
        match err {
            PhaseError::SizeMismatch {
                name,
                expected,
                actual,
            } => CfError::size_mismatch(name, expected, actual),
            PhaseError::Config(msg) => CfError::config(msg),
            PhaseError::Io(e) => e.into(),
            other => CfError::numerical(other.to_string()),
        }
    }
}
