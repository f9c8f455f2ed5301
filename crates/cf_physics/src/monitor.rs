// crates/cf_physics/src/monitor.rs

//! 稳态监测
//!
//! 对相邻两次写出的快照逐场比较 RMS：
//!
//! ```text
//! error = |rms₂ − rms₁| / |rms₂|
//! ```
//!
//! 矢量场取模长的 RMS；rms₂ 为零的场跳过。至少比较了一个场且所有场都低于
//! 各自阈值时计数加一，否则清零；连续达到 `steady_count_required` 次判定为稳态。

use std::collections::BTreeMap;

use cf_config::MonitorConfig;
use cf_io::{FieldData, FieldSnapshot};

/// 单次检查结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MonitorReport {
    /// 各场相对 RMS 变化
    pub errors: BTreeMap<String, f64>,
    /// 未达标的场：(名称, 误差, 阈值)
    pub unconverged: Vec<(String, f64, f64)>,
    /// 当前连续达标次数
    pub steady_count: usize,
    /// 是否已达到稳态
    pub steady: bool,
}

/// 场的 RMS，矢量场取模长
pub fn field_rms(data: &FieldData) -> f64 {
    let (sum, n) = match data {
        FieldData::Scalar(v) => (v.iter().map(|x| x * x).sum::<f64>(), v.len()),
        FieldData::Vector(v) => (
            v.iter().map(|a| a[0] * a[0] + a[1] * a[1] + a[2] * a[2]).sum::<f64>(),
            v.len(),
        ),
    };
    if n == 0 {
        f64::NAN
    } else {
        (sum / n as f64).sqrt()
    }
}

/// 稳态监测器
#[derive(Debug, Clone)]
pub struct SteadyMonitor {
    thresholds: Vec<(&'static str, f64)>,
    required: usize,
    previous: Option<BTreeMap<&'static str, f64>>,
    steady_count: usize,
}

impl SteadyMonitor {
    /// 由配置创建
    pub fn new(config: &MonitorConfig) -> Self {
        Self {
            thresholds: config.thresholds.entries().to_vec(),
            required: config.steady_count_required,
            previous: None,
            steady_count: 0,
        }
    }

    /// 当前连续达标次数
    pub fn steady_count(&self) -> usize {
        self.steady_count
    }

    fn rms_values(&self, snapshot: &FieldSnapshot) -> BTreeMap<&'static str, f64> {
        self.thresholds
            .iter()
            .filter_map(|(name, _)| snapshot.get(name).map(|d| (*name, field_rms(d))))
            .collect()
    }

    /// 处理一次新的快照
    pub fn observe(&mut self, snapshot: &FieldSnapshot) -> MonitorReport {
        let current = self.rms_values(snapshot);
        let Some(previous) = self.previous.replace(current.clone()) else {
            return MonitorReport::default();
        };

        let mut report = MonitorReport::default();
        for (name, threshold) in &self.thresholds {
            let (Some(v1), Some(v2)) = (previous.get(name), current.get(name)) else {
                continue;
            };
            if *v2 == 0.0 || !v2.is_finite() {
                continue;
            }
            let error = (v2 - v1).abs() / v2.abs();
            report.errors.insert((*name).to_string(), error);
            if !(error < *threshold) {
                report.unconverged.push(((*name).to_string(), error, *threshold));
            }
        }

        if report.errors.is_empty() {
            self.steady_count = 0;
            log::debug!("没有可比较的监测场, 稳态计数清零");
        } else if report.unconverged.is_empty() {
            self.steady_count += 1;
            log::info!("所有场低于阈值, 稳态计数 {}/{}", self.steady_count, self.required);
        } else {
            self.steady_count = 0;
            for (name, err, th) in &report.unconverged {
                log::debug!("未收敛场 {name}: {err:.3e} > {th:.3e}");
            }
        }
        report.steady_count = self.steady_count;
        report.steady = self.steady_count >= self.required;
        if report.steady {
            log::info!("按 RMS 判定已达到稳态");
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(p: f64, u: f64) -> FieldSnapshot {
        let mut s = FieldSnapshot::new(2);
        s.insert_scalar("p", vec![p, p]).unwrap();
        s.insert_vector("U", vec![[u, 0.0, 0.0], [0.0, u, 0.0]]).unwrap();
        s.insert_scalar("J", vec![0.0, 0.0]).unwrap();
        s
    }

    #[test]
    fn test_field_rms() {
        assert!((field_rms(&FieldData::Scalar(vec![3.0, -3.0])) - 3.0).abs() < 1e-15);
        assert!((field_rms(&FieldData::Vector(vec![[3.0, 4.0, 0.0]])) - 5.0).abs() < 1e-15);
    }

    #[test]
    fn test_steady_after_required_passes() {
        let mut config = MonitorConfig::default();
        config.steady_count_required = 3;
        let mut monitor = SteadyMonitor::new(&config);

        assert!(!monitor.observe(&snapshot(1000.0, 100.0)).steady);
        for k in 1..=3 {
            let report = monitor.observe(&snapshot(1000.0, 100.0));
            assert_eq!(report.steady_count, k);
            // J 全为零，被跳过
            assert!(!report.errors.contains_key("J"));
            assert_eq!(report.steady, k == 3);
        }
    }

    #[test]
    fn test_change_resets_count() {
        let mut monitor = SteadyMonitor::new(&MonitorConfig::default());
        monitor.observe(&snapshot(1000.0, 100.0));
        monitor.observe(&snapshot(1000.0, 100.0));
        assert_eq!(monitor.steady_count(), 1);

        let report = monitor.observe(&snapshot(1100.0, 100.0));
        assert_eq!(report.steady_count, 0);
        assert_eq!(report.unconverged.len(), 1);
        assert_eq!(report.unconverged[0].0, "p");
        let expected = 100.0 / 1100.0;
        assert!((report.errors["p"] - expected).abs() < 1e-12);
    }

    #[test]
    fn test_all_zero_fields_do_not_count() {
        let mut config = MonitorConfig::default();
        config.steady_count_required = 1;
        let mut monitor = SteadyMonitor::new(&config);

        monitor.observe(&snapshot(0.0, 0.0));
        let report = monitor.observe(&snapshot(0.0, 0.0));
        assert!(report.errors.is_empty());
        assert_eq!(report.steady_count, 0);
        assert!(!report.steady);

        // 计数从下一次有效比较重新开始
        monitor.observe(&snapshot(1000.0, 100.0));
        let report = monitor.observe(&snapshot(1000.0, 100.0));
        assert_eq!(report.steady_count, 1);
        assert!(report.steady);
    }
}
