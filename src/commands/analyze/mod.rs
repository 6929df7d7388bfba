//! # analyze 命令实现
//!
//! 分析功能统一入口，包含多个子命令：
//! - `symmetry`: 空间群识别
//! - `xrd`: X 射线衍射图样计算
//! - `voids`: 空隙分析
//! - `kpath`: 能带路径
//! - `bvs`: 键价和
//!
//! ## 依赖关系
//! - 使用 `cli/analyze.rs` 定义的参数
//! - 子模块: symmetry, xrd, voids, kpath, bvs

pub mod bvs;
pub mod kpath;
pub mod symmetry;
pub mod voids;
pub mod xrd;

use crate::cli::analyze::{AnalyzeArgs, AnalyzeCommands};
use crate::error::Result;

use std::time::Duration;

/// 执行 analyze 命令
pub fn execute(args: AnalyzeArgs, timeout: Option<Duration>) -> Result<()> {
    match args.command {
        AnalyzeCommands::Symmetry(sym_args) => symmetry::execute(sym_args, timeout),
        AnalyzeCommands::Xrd(xrd_args) => xrd::execute(xrd_args, timeout),
        AnalyzeCommands::Voids(void_args) => voids::execute(void_args, timeout),
        AnalyzeCommands::Kpath(kpath_args) => kpath::execute(kpath_args, timeout),
        AnalyzeCommands::Bvs(bvs_args) => bvs::execute(bvs_args, timeout),
    }
}
