// crates/cf_foundation/src/float.rs

//! 数值安全工具
//!
//! 残差归一化的保护常量、负数安全的平方根，以及守恒检查用的补偿求和。

// ============================================================================
// 数值常量
// ============================================================================

/// 残差归一化时防止除零的微小量
pub const TINY: f64 = 1e-30;

// ============================================================================
// 辅助函数
// ============================================================================

/// 安全平方根，负数返回 0
#[inline]
pub fn safe_sqrt(x: f64) -> f64 {
    if x > 0.0 { x.sqrt() } else { 0.0 }
}

// ============================================================================
// Kahan 求和
// ============================================================================

/// Kahan 补偿求和
///
/// 用于全场质量/能量守恒检查，避免大量小量累加的舍入误差。
///
/// ```
/// use cf_foundation::float::KahanSum;
///
/// let mut sum = KahanSum::new();
/// for _ in 0..10000 {
///     sum.add(0.1);
/// }
/// assert!((sum.value() - 1000.0).abs() < 1e-10);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct KahanSum {
    sum: f64,
    compensation: f64,
}

impl KahanSum {
    /// 创建新的求和器
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加一个值
    #[inline]
    pub fn add(&mut self, value: f64) {
        let y = value - self.compensation;
        let t = self.sum + y;
        self.compensation = (t - self.sum) - y;
        self.sum = t;
    }

    /// 当前求和值
    #[inline]
    pub fn value(&self) -> f64 {
        self.sum
    }
}

impl std::iter::Sum<f64> for KahanSum {
    fn sum<I: Iterator<Item = f64>>(iter: I) -> Self {
        let mut kahan = KahanSum::new();
        for v in iter {
            kahan.add(v);
        }
        kahan
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_sqrt() {
        assert!((safe_sqrt(4.0) - 2.0).abs() < 1e-10);
        assert_eq!(safe_sqrt(-4.0), 0.0);
        assert_eq!(safe_sqrt(f64::NAN), 0.0);
    }

    #[test]
    fn test_kahan_iter_sum() {
        let total: KahanSum = std::iter::repeat(1e-3).take(1000).sum();
        assert!((total.value() - 1.0).abs() < 1e-12);
    }
}
