//! # crystan - 晶体结构分析命令行工具
//!
//! ## 子命令
//! - `analyze` - 分析功能
//!   - `symmetry` - 空间群识别
//!   - `xrd` - XRD 衍射图样计算
//!   - `voids` - 空隙与孔道
//!   - `kpath` - 高对称 k 路径
//! - `slab` - 表面板层切割
//!
//! ## 依赖关系
//! ```text
//! main.rs
//!   ├── cli/        (命令行参数定义)
//!   ├── commands/   (命令执行逻辑)
//!   │     ├── engine/    (分析引擎)
//!   │     └── parsers/   (格式解析器)
//!   └── utils/      (工具函数)
//! ```

use clap::Parser;
use crystan::cli::Cli;
use crystan::{commands, utils};

fn main() {
    // Initialize colored output for Windows compatibility
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(cli.log_level()))
        .format_timestamp(None)
        .init();

    if let Err(e) = commands::run(cli) {
        utils::output::print_error(&format!("{}", e));
        std::process::exit(1);
    }
}
