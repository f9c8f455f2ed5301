// apps/cf_cli/src/commands/run.rs

//! 运行模拟命令
//!
//! 在准一维收缩-扩张喷管中计算水蒸气的非平衡凝结。
//!
//! # 流程
//!
//! 1. 读取（或使用默认）`CaseConfig`，应用命令行覆盖项
//! 2. 构建变截面通道网格：入口为固定状态，出口为透射边界
//! 3. 由准一维等熵解（或均匀滞止状态）初始化
//! 4. 推进到结束时间，按写出间隔保存检查点并做稳态监测
//! 5. 可选：按最终壁面速率估算冰层堵塞时间

use anyhow::{Context, Result};
use cf_config::CaseConfig;
use cf_io::{fnv1a64, CheckpointManager};
use cf_physics::{
    quasi_1d_state, BoundaryKind, BoundaryState, PhaseMesh, PhaseParams, PhaseSolver,
    PrimitiveState, RusanovFlux, Stagnation, SteadyMonitor,
};
use clap::Args;
use glam::DVec3;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, warn};

/// 运行模拟参数
#[derive(Args)]
pub struct RunArgs {
    /// 配置文件路径（JSON）
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 输出目录（覆盖配置）
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// 模拟结束时间 [秒]（覆盖配置）
    #[arg(short = 't', long)]
    pub end_time: Option<f64>,

    /// 网格单元数量
    #[arg(long, default_value = "100")]
    pub cells: usize,

    /// 喷管长度 [m]
    #[arg(long, default_value = "0.1")]
    pub length: f64,

    /// 喉部高度 [m]
    #[arg(long, default_value = "0.001")]
    pub throat_height: f64,

    /// 展向宽度 [m]
    #[arg(long, default_value = "0.01")]
    pub depth: f64,

    /// 入口面积比 A_in/A*
    #[arg(long, default_value = "1.5")]
    pub inlet_ratio: f64,

    /// 出口面积比 A_out/A*
    #[arg(long, default_value = "1.15")]
    pub exit_ratio: f64,

    /// 滞止压力 [Pa]
    #[arg(long, default_value = "611.657")]
    pub p0: f64,

    /// 滞止温度 [K]
    #[arg(long, default_value = "273.16")]
    pub t0: f64,

    /// 使用均匀静止初场代替准一维等熵解
    #[arg(long)]
    pub uniform: bool,

    /// 从输出目录中最新的检查点续算
    #[arg(long)]
    pub resume: bool,

    /// 结束后按壁面速率估算冰层堵塞
    #[arg(long)]
    pub recession: bool,
}

/// 抛物线喷管的相对截面积 A(ξ)/A*，ξ ∈ [0, 1]
///
/// 喉部位置由入口与出口面积比确定。
pub fn nozzle_area_ratio(xi: f64, inlet_ratio: f64, exit_ratio: f64) -> f64 {
    let a = (inlet_ratio - 1.0).max(0.0).sqrt();
    let b = (exit_ratio - 1.0).max(0.0).sqrt();
    if a + b == 0.0 {
        return 1.0;
    }
    let xi_t = a / (a + b);
    let k = (a + b) * (a + b);
    1.0 + k * (xi - xi_t) * (xi - xi_t)
}

/// 面位置与面截面积
pub fn nozzle_stations(args: &RunArgs) -> (Vec<f64>, Vec<f64>) {
    let n = args.cells.max(1);
    let a_throat = args.throat_height * args.depth;
    (0..=n)
        .map(|i| {
            let xi = i as f64 / n as f64;
            (
                xi * args.length,
                a_throat * nozzle_area_ratio(xi, args.inlet_ratio, args.exit_ratio),
            )
        })
        .unzip()
}

fn load_config(args: &RunArgs) -> Result<CaseConfig> {
    let mut config = match &args.config {
        Some(path) => CaseConfig::from_file(path)
            .with_context(|| format!("无法加载配置文件 {}", path.display()))?,
        None => CaseConfig::default(),
    };
    if let Some(dir) = &args.output {
        config.output.directory = dir.clone();
    }
    if let Some(end_time) = args.end_time {
        config.time.end_time = end_time;
    }
    config.validate().context("配置无效")?;
    Ok(config)
}

/// 执行运行命令
pub fn execute(args: RunArgs) -> Result<()> {
    info!("=== CondensFlow 模拟启动 ===");

    let config = load_config(&args)?;
    let config_hash = fnv1a64(&serde_json::to_vec(&config)?);
    let params = PhaseParams::from_config(&config)?;
    let gas = *params.gas();

    // 网格
    let (x, areas) = nozzle_stations(&args);
    let mesh = PhaseMesh::channel_1d(
        &x,
        &areas,
        args.depth,
        BoundaryKind::FixedState(0),
        BoundaryKind::Transmissive,
    )
    .context("构建喷管网格失败")?;
    info!(
        "喷管: {} 单元, 长度 {} m, A_in/A*={}, A_out/A*={}",
        mesh.n_cells(),
        args.length,
        args.inlet_ratio,
        args.exit_ratio
    );

    // 初始场
    let stagnation = Stagnation {
        t0: args.t0,
        p0: args.p0,
    };
    let prim = if args.uniform {
        info!("均匀静止初场: p={} Pa, T={} K", args.p0, args.t0);
        PrimitiveState::uniform(mesh.n_cells(), &gas, args.p0, args.t0, DVec3::ZERO)
    } else {
        quasi_1d_state(&mesh, &x, &areas, &gas, stagnation).context("准一维初值计算失败")?
    };
    let inlet = BoundaryState {
        p: prim.p[0],
        t: prim.t[0],
        u: prim.u[0],
        y: 0.0,
        n: 0.0,
    };
    let flux = RusanovFlux::new(gas).with_fixed_states(vec![inlet]);

    let mut solver = PhaseSolver::new(params, mesh, Box::new(flux), prim, None)?;

    // 检查点
    let manager = CheckpointManager::new(&config.output.directory, config.output.keep_checkpoints);
    if args.resume {
        match manager.load_latest()? {
            Some(checkpoint) => {
                if !checkpoint.verify_config_compatibility(config_hash) {
                    warn!("检查点的配置哈希与当前配置不一致");
                }
                solver.restore(&checkpoint)?;
            }
            None => warn!("{} 中没有检查点，从初场开始", manager.directory().display()),
        }
    }

    let write_interval = config.time.write_interval;
    let mut next_write = solver.time() + write_interval;
    let mut monitor = SteadyMonitor::new(&config.monitor);
    let monitor_enabled = config.monitor.enabled;
    let mut total_rejections = 0;
    let mut unconverged_steps = 0;
    let mut last_written_step = None;

    info!(
        "开始推进: 结束时间={:.3e} s, 写出间隔={:.3e} s",
        config.time.end_time, write_interval
    );
    let start = Instant::now();

    let history = solver.run(|s, stats| {
        total_rejections += stats.rejections;
        if !stats.converged {
            unconverged_steps += 1;
        }
        if stats.step % 100 == 0 {
            info!("{}", stats.summary());
        }

        if s.time() + 1e-12 * write_interval < next_write {
            return Ok(true);
        }
        while next_write <= s.time() {
            next_write += write_interval;
        }

        let checkpoint = s.checkpoint()?.with_config_hash(config_hash);
        let path = manager.save(&checkpoint)?;
        last_written_step = Some(s.step_count());
        info!("t={:.4e} s: 写出 {}, 液相质量 {:.3e} kg", s.time(), path.display(), stats.liquid_mass);

        if monitor_enabled && monitor.observe(&checkpoint.fields).steady {
            return Ok(false);
        }
        Ok(true)
    })?;

    // 最终状态总是写出
    if last_written_step != Some(solver.step_count()) {
        let path = manager.save(&solver.checkpoint()?.with_config_hash(config_hash))?;
        info!("写出最终状态 {}", path.display());
    }

    let elapsed = start.elapsed();
    info!("=== 模拟完成 ===");
    info!("总步数: {}", solver.step_count());
    info!("模拟时间: {:.4e} s", solver.time());
    info!("计算时间: {:.2} s", elapsed.as_secs_f64());
    info!("拒绝步数: {}, 外迭代未收敛步数: {}", total_rejections, unconverged_steps);
    if let Some(last) = history.last() {
        info!("最后一步: {}", last.summary());
    }

    if args.recession {
        let outcome = solver.ice_recession();
        let max_growth = outcome.growth.iter().copied().fold(0.0, f64::max);
        if outcome.closed {
            info!(
                "冰层在 {:.3e} s 后堵塞通道 ({} 步), 最大增厚 {:.3e} m",
                outcome.elapsed, outcome.steps, max_growth
            );
        } else {
            info!(
                "冰层未堵塞: 积分 {:.3e} s ({} 步), 最大增厚 {:.3e} m",
                outcome.elapsed, outcome.steps, max_growth
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(output: PathBuf) -> RunArgs {
        RunArgs {
            config: None,
            output: Some(output),
            end_time: Some(1e-6),
            cells: 8,
            length: 0.08,
            throat_height: 1e-3,
            depth: 0.01,
            inlet_ratio: 1.5,
            exit_ratio: 1.15,
            p0: 611.657,
            t0: 273.16,
            uniform: true,
            resume: false,
            recession: true,
        }
    }

    #[test]
    fn test_nozzle_area_ratio() {
        assert!((nozzle_area_ratio(0.0, 1.5, 1.15) - 1.5).abs() < 1e-12);
        assert!((nozzle_area_ratio(1.0, 1.5, 1.15) - 1.15).abs() < 1e-12);
        let a = 0.5_f64.sqrt();
        let xi_t = a / (a + 0.15_f64.sqrt());
        assert!((nozzle_area_ratio(xi_t, 1.5, 1.15) - 1.0).abs() < 1e-12);
        assert_eq!(nozzle_area_ratio(0.3, 1.0, 1.0), 1.0);
    }

    #[test]
    fn test_nozzle_stations() {
        let a = args(PathBuf::from("unused"));
        let (x, areas) = nozzle_stations(&a);
        assert_eq!(x.len(), 9);
        assert_eq!(areas.len(), 9);
        assert!((x[8] - 0.08).abs() < 1e-15);
        let a_throat = 1e-5;
        assert!(areas.iter().all(|&v| v >= a_throat * (1.0 - 1e-12)));
        assert!((areas[0] - 1.5 * a_throat).abs() < 1e-15);
    }

    #[test]
    fn test_run_writes_checkpoints() {
        let dir = std::env::temp_dir().join("cf_cli_run_test");
        let _ = std::fs::remove_dir_all(&dir);

        execute(args(dir.clone())).unwrap();

        let manager = CheckpointManager::new(&dir, 3);
        let list = manager.list_checkpoints().unwrap();
        assert!(!list.is_empty());
        let latest = manager.load_latest().unwrap().unwrap();
        assert!((latest.time - 1e-6).abs() < 1e-15);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
