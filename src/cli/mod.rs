//! # CLI 模块
//!
//! 使用 `clap` 定义命令行参数和子命令。
//!
//! ## 命令结构
//! - `analyze`: 分析功能（嵌套子命令）
//!   - `symmetry`: 空间群识别
//!   - `xrd`: 粉末衍射图样
//!   - `voids`: 空隙与孔道
//!   - `kpath`: 高对称 k 路径
//!   - `bvs`: 键价和
//! - `slab`: 按 Miller 指数切割表面板层
//! - `cell`: 原胞 / 惯用胞转换与超胞
//!
//! ## 依赖关系
//! - 被 `main.rs` 使用
//! - 子模块: analyze, slab, cell

pub mod analyze;
pub mod cell;
pub mod slab;

use clap::{ArgAction, Parser, Subcommand};
use std::time::Duration;

/// crystan - 晶体结构分析工具
#[derive(Parser, Debug)]
#[command(name = "crystan")]
#[command(author = "Changjiang Wu")]
#[command(version)]
#[command(
    about = "Crystal structure analysis: symmetry, powder diffraction, voids, slabs, k-paths and cell transforms",
    long_about = None
)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug); RUST_LOG takes precedence
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Abort any analysis running longer than this many seconds
    #[arg(long, global = true, value_name = "SECONDS")]
    pub timeout: Option<f64>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// `--timeout` 转换为 `Duration`，非正数视为不限时
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
            .filter(|s| s.is_finite() && *s > 0.0)
            .map(Duration::from_secs_f64)
    }

    /// 默认日志级别
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    }
}

/// 可用的子命令
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Analyze a crystal structure (symmetry, XRD, voids, k-path, bond valence)
    Analyze(analyze::AnalyzeArgs),

    /// Cut a surface slab along a Miller plane and write it as POSCAR
    Slab(slab::SlabArgs),

    /// Convert to the primitive or conventional cell and build supercells
    Cell(cell::CellArgs),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_flags() {
        let cli = Cli::parse_from(["crystan", "-vv", "--timeout", "2.5", "analyze", "symmetry", "POSCAR"]);
        assert_eq!(cli.log_level(), "debug");
        assert_eq!(cli.timeout(), Some(Duration::from_millis(2500)));

        let cli = Cli::parse_from(["crystan", "slab", "POSCAR", "--miller", "1,1,1", "--timeout", "0"]);
        assert_eq!(cli.log_level(), "warn");
        assert_eq!(cli.timeout(), None);
    }

    #[test]
    fn test_command_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
