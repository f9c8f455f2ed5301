// crates/cf_physics/src/sources/relaxation.rs

//! 液相源项分解与亚松弛
//!
//! 生长源项按 Picard 线性化拆成三部分，线性化点为当前迭代值 ρY*：
//!
//! ```text
//! G ≈ passive + active_explicit + active_coeff·(ρY)_new
//! passive         = G − c·ρY*
//! active_explicit = (1 − θ)·c·ρY*
//! active_coeff    = θ·c
//! ```
//!
//! 其中 c = 3·(dr/dt)/r，θ 为隐式比例。当 (ρY)_new = ρY* 时三项之和精确还原 G。
//! 成核源项完全显式。
//!
//! 每一项在外迭代之间做亚松弛：term_k = ω·computed + (1 − ω)·term_{k−1}。

/// 亚松弛
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnderRelaxation {
    omega: f64,
}

impl UnderRelaxation {
    /// 创建，ω 被限制在 (0, 1]
    pub fn new(omega: f64) -> Self {
        Self {
            omega: omega.clamp(f64::MIN_POSITIVE, 1.0),
        }
    }

    /// 松弛因子
    pub fn omega(&self) -> f64 {
        self.omega
    }

    /// 松弛一个标量，无历史值时直接采用计算值
    #[inline]
    pub fn relax(&self, computed: f64, previous: Option<f64>) -> f64 {
        match previous {
            Some(prev) => self.omega * computed + (1.0 - self.omega) * prev,
            None => computed,
        }
    }
}

/// 液相源项分解
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DropletSources {
    /// 被动项 [kg/(m³·s)]
    pub growth_passive: f64,
    /// 主动项的显式部分 [kg/(m³·s)]
    pub growth_active_explicit: f64,
    /// 主动项系数，乘以 (ρY)_new [1/s]
    pub growth_active_coeff: f64,
    /// 成核质量源 [kg/(m³·s)]
    pub nucleation: f64,
    /// 数密度源 [1/(m³·s)]
    pub number: f64,
}

impl DropletSources {
    /// 在给定 ρY 处的生长源
    #[inline]
    pub fn growth_at(&self, rho_y: f64) -> f64 {
        self.growth_passive + self.growth_active_explicit + self.growth_active_coeff * rho_y
    }

    /// 在给定 ρY 处的总液相源
    #[inline]
    pub fn source_y_at(&self, rho_y: f64) -> f64 {
        self.growth_at(rho_y) + self.nucleation
    }

    /// 与上一迭代值做亚松弛
    pub fn relaxed(&self, previous: Option<&Self>, relaxation: &UnderRelaxation) -> Self {
        let r = |computed: f64, pick: fn(&Self) -> f64| relaxation.relax(computed, previous.map(pick));
        Self {
            growth_passive: r(self.growth_passive, |s| s.growth_passive),
            growth_active_explicit: r(self.growth_active_explicit, |s| s.growth_active_explicit),
            growth_active_coeff: r(self.growth_active_coeff, |s| s.growth_active_coeff),
            nucleation: r(self.nucleation, |s| s.nucleation),
            number: r(self.number, |s| s.number),
        }
    }

    /// 所有分量有限
    pub fn is_finite(&self) -> bool {
        self.growth_passive.is_finite()
            && self.growth_active_explicit.is_finite()
            && self.growth_active_coeff.is_finite()
            && self.nucleation.is_finite()
            && self.number.is_finite()
    }
}

/// 逐单元保存上一迭代的松弛后源项
#[derive(Debug, Clone, Default)]
pub struct SourceHistory {
    terms: Vec<Option<DropletSources>>,
}

impl SourceHistory {
    /// 创建空历史
    pub fn new(n_cells: usize) -> Self {
        Self {
            terms: vec![None; n_cells],
        }
    }

    /// 单元数
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// 获取单元历史
    #[inline]
    pub fn get(&self, cell: usize) -> Option<&DropletSources> {
        self.terms.get(cell).and_then(Option::as_ref)
    }

    /// 用新一轮结果覆盖
    pub fn store(&mut self, terms: impl IntoIterator<Item = DropletSources>) {
        self.terms = terms.into_iter().map(Some).collect();
    }

    /// 清空（下一次计算直接采用计算值）
    pub fn clear(&mut self) {
        self.terms.iter_mut().for_each(|t| *t = None);
    }
}
