// crates/cf_io/src/fields.rs

//! 场分类与场快照
//!
//! 每个场都有一个持久化类别 [`FieldClass`]：
//!
//! | 类别 | 读 | 写 |
//! |---|---|---|
//! | `Persisted` | 续算时必须读取 | 自动写出 |
//! | `Checkpointed` | 不读取 | 自动写出 |
//! | `Ephemeral` | 不读取 | 不写出 |
//!
//! 守恒量乘积（ρN、ρY、ρU·N、ρU·Y）以及全部源项分解都是 `Ephemeral`，
//! 每一步由原始量重新计算。

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{IoError, IoResult};

// ============================================================
// 场分类
// ============================================================

/// 持久化类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldClass {
    /// 必读且自动写出
    Persisted,
    /// 仅自动写出
    Checkpointed,
    /// 不读不写
    Ephemeral,
}

impl FieldClass {
    /// 是否写入检查点
    pub fn is_written(self) -> bool {
        !matches!(self, FieldClass::Ephemeral)
    }

    /// 二进制编码
    pub(crate) fn code(self) -> u8 {
        match self {
            FieldClass::Persisted => 0,
            FieldClass::Checkpointed => 1,
            FieldClass::Ephemeral => 2,
        }
    }

    /// 从二进制编码解析
    pub(crate) fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(FieldClass::Persisted),
            1 => Some(FieldClass::Checkpointed),
            2 => Some(FieldClass::Ephemeral),
            _ => None,
        }
    }
}

/// 场的值类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    /// 标量
    Scalar,
    /// 三维矢量
    Vector,
}

/// 场目录条目
#[derive(Debug, Clone, Copy, Serialize)]
pub struct FieldSpec {
    /// 场名
    pub name: &'static str,
    /// 持久化类别
    pub class: FieldClass,
    /// 值类型
    pub kind: FieldKind,
    /// 单位
    pub unit: &'static str,
}

const fn spec(name: &'static str, class: FieldClass, kind: FieldKind, unit: &'static str) -> FieldSpec {
    FieldSpec { name, class, kind, unit }
}

use FieldClass::{Checkpointed, Ephemeral, Persisted};
use FieldKind::{Scalar, Vector};

/// 两相凝结流的全部已知场
pub const FIELD_CATALOG: &[FieldSpec] = &[
    // 必读
    spec("p", Persisted, Scalar, "Pa"),
    spec("T", Persisted, Scalar, "K"),
    spec("U", Persisted, Vector, "m/s"),
    spec("N", Persisted, Scalar, "1/kg"),
    spec("Y", Persisted, Scalar, "-"),
    spec("S_sat", Persisted, Scalar, "-"),
    spec("r_droplet_actual", Persisted, Scalar, "m"),
    spec("J", Persisted, Scalar, "1/(m^3 s)"),
    spec("drdt", Persisted, Scalar, "m/s"),
    spec("mdot_a", Persisted, Scalar, "kg/(m^3 s)"),
    spec("mdot_s", Persisted, Scalar, "kg/(m^3 s)"),
    spec("ice_thickness", Persisted, Scalar, "m"),
    // 仅写出
    spec("rho", Checkpointed, Scalar, "kg/m^3"),
    spec("Mach", Checkpointed, Scalar, "-"),
    spec("Knudsen_droplet", Checkpointed, Scalar, "-"),
    // 每步重算
    spec("psat", Ephemeral, Scalar, "Pa"),
    spec("Tsat", Ephemeral, Scalar, "K"),
    spec("T_sc", Ephemeral, Scalar, "K"),
    spec("h_fg", Ephemeral, Scalar, "J/kg"),
    spec("surface_tension", Ephemeral, Scalar, "N/m"),
    spec("h_liquid", Ephemeral, Scalar, "J/kg"),
    spec("h_droplet", Ephemeral, Scalar, "J/kg"),
    spec("r_droplet_critical", Ephemeral, Scalar, "m"),
    spec("mean_free_path", Ephemeral, Scalar, "m"),
    spec("v_corr", Ephemeral, Scalar, "-"),
    spec("beta", Ephemeral, Scalar, "m^2/kg"),
    spec("Source_Y", Ephemeral, Scalar, "kg/(m^3 s)"),
    spec("Source_Y_growth", Ephemeral, Scalar, "kg/(m^3 s)"),
    spec("Source_Y_growth_passive", Ephemeral, Scalar, "kg/(m^3 s)"),
    spec("Source_Y_growth_active_coeff", Ephemeral, Scalar, "1/s"),
    spec("Source_Y_nucleation", Ephemeral, Scalar, "kg/(m^3 s)"),
    spec("SourceMomentumFactor", Ephemeral, Scalar, "1/s"),
    spec("Source_e", Ephemeral, Scalar, "W/m^3"),
    spec("Source_e_wall", Ephemeral, Scalar, "W/m^3"),
    spec("rhoN", Ephemeral, Scalar, "1/m^3"),
    spec("rhoY", Ephemeral, Scalar, "kg/m^3"),
    spec("rhoUN", Ephemeral, Vector, "1/(m^2 s)"),
    spec("rhoUY", Ephemeral, Vector, "kg/(m^2 s)"),
];

/// 查询场目录
pub fn field_spec(name: &str) -> Option<&'static FieldSpec> {
    FIELD_CATALOG.iter().find(|s| s.name == name)
}

/// 查询场类别，未登记的场按 `Ephemeral` 处理
pub fn field_class(name: &str) -> FieldClass {
    field_spec(name).map_or(FieldClass::Ephemeral, |s| s.class)
}

/// 所有必读场名
pub fn persisted_fields() -> impl Iterator<Item = &'static str> {
    FIELD_CATALOG
        .iter()
        .filter(|s| s.class == FieldClass::Persisted)
        .map(|s| s.name)
}

// ============================================================
// 场快照
// ============================================================

/// 单个场的数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldData {
    /// 标量场
    Scalar(Vec<f64>),
    /// 矢量场
    Vector(Vec<[f64; 3]>),
}

impl FieldData {
    /// 单元数
    pub fn len(&self) -> usize {
        match self {
            FieldData::Scalar(v) => v.len(),
            FieldData::Vector(v) => v.len(),
        }
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 值类型
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldData::Scalar(_) => FieldKind::Scalar,
            FieldData::Vector(_) => FieldKind::Vector,
        }
    }
}

/// 按名称索引的场快照
///
/// 物理层把当前状态写入快照，检查点按 [`FieldClass`] 过滤后落盘。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldSnapshot {
    n_cells: usize,
    fields: BTreeMap<String, FieldData>,
}

impl FieldSnapshot {
    /// 创建空快照
    pub fn new(n_cells: usize) -> Self {
        Self {
            n_cells,
            fields: BTreeMap::new(),
        }
    }

    /// 单元数
    pub fn n_cells(&self) -> usize {
        self.n_cells
    }

    /// 场数量
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// 插入场，长度必须等于单元数
    pub fn insert(&mut self, name: impl Into<String>, data: FieldData) -> IoResult<()> {
        let name = name.into();
        if data.len() != self.n_cells {
            return Err(IoError::InvalidField {
                reason: format!("长度 {} 与单元数 {} 不一致", data.len(), self.n_cells),
                name,
            });
        }
        if let Some(spec) = field_spec(&name) {
            if spec.kind != data.kind() {
                return Err(IoError::InvalidField {
                    reason: format!("期望 {:?}, 实际 {:?}", spec.kind, data.kind()),
                    name,
                });
            }
        }
        self.fields.insert(name, data);
        Ok(())
    }

    /// 插入标量场
    pub fn insert_scalar(&mut self, name: impl Into<String>, values: Vec<f64>) -> IoResult<()> {
        self.insert(name, FieldData::Scalar(values))
    }

    /// 插入矢量场
    pub fn insert_vector(&mut self, name: impl Into<String>, values: Vec<[f64; 3]>) -> IoResult<()> {
        self.insert(name, FieldData::Vector(values))
    }

    /// 获取场
    pub fn get(&self, name: &str) -> Option<&FieldData> {
        self.fields.get(name)
    }

    /// 获取标量场
    pub fn scalar(&self, name: &str) -> Option<&[f64]> {
        match self.fields.get(name) {
            Some(FieldData::Scalar(v)) => Some(v),
            _ => None,
        }
    }

    /// 获取矢量场
    pub fn vector(&self, name: &str) -> Option<&[[f64; 3]]> {
        match self.fields.get(name) {
            Some(FieldData::Vector(v)) => Some(v),
            _ => None,
        }
    }

    /// 获取必读标量场，不存在时报错
    pub fn require_scalar(&self, name: &str) -> IoResult<&[f64]> {
        self.scalar(name)
            .ok_or_else(|| IoError::MissingField(name.to_string()))
    }

    /// 获取必读矢量场，不存在时报错
    pub fn require_vector(&self, name: &str) -> IoResult<&[[f64; 3]]> {
        self.vector(name)
            .ok_or_else(|| IoError::MissingField(name.to_string()))
    }

    /// 遍历 (场名, 数据)
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldData)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// 仅保留需要写出的场
    pub fn written_only(&self) -> Self {
        Self {
            n_cells: self.n_cells,
            fields: self
                .fields
                .iter()
                .filter(|(name, _)| field_class(name).is_written())
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }

    /// 检查全部必读场是否存在
    pub fn verify_persisted(&self) -> IoResult<()> {
        for name in persisted_fields() {
            if !self.fields.contains_key(name) {
                return Err(IoError::MissingField(name.to_string()));
            }
        }
        Ok(())
    }
}
