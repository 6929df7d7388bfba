//! # 命令执行模块
//!
//! 实现各子命令的业务逻辑。每个分析命令的流程相同：读取结构，载入
//! `AnalysisEngine`，提交作业并显示 spinner，结束后打印摘要与表格。
//!
//! ## 依赖关系
//! - 被 `main.rs` 调用
//! - 使用 `cli/`, `engine/`, `parsers/`, `utils/`
//! - 子模块: analyze, slab, cell

pub mod analyze;
pub mod cell;
pub mod slab;

use crate::cli::{Cli, Commands};
use crate::engine::{AnalysisEngine, AnalysisRequest, AnalysisResult};
use crate::error::{CrystanError, Result};
use crate::models::Crystal;
use crate::parsers;
use crate::utils::{output, progress};

use serde::Serialize;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// spinner 刷新间隔
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// 执行命令
pub fn run(cli: Cli) -> Result<()> {
    let timeout = cli.timeout();
    match cli.command {
        Commands::Analyze(args) => analyze::execute(args, timeout),
        Commands::Slab(args) => slab::execute(args, timeout),
        Commands::Cell(args) => cell::execute(args, timeout),
    }
}

/// 读取结构文件并载入新引擎
pub(crate) fn load_engine(path: &Path, timeout: Option<Duration>) -> Result<(AnalysisEngine, Arc<Crystal>)> {
    let crystal = parsers::parse_structure_file(path)?;
    let engine = AnalysisEngine::new().with_timeout(timeout);
    engine.load(crystal)?;
    let crystal = engine.current().ok_or_else(|| CrystanError::InvalidStructure {
        reason: format!("failed to load '{}'", path.display()),
    })?;

    output::print_success(&format!(
        "Loaded structure: {} ({}, {} atoms)",
        crystal.name,
        crystal.formula(),
        crystal.atoms.len()
    ));
    Ok((engine, crystal))
}

/// 提交作业，等待期间显示 spinner
pub(crate) fn run_with_spinner(
    engine: &AnalysisEngine,
    request: AnalysisRequest,
    message: &str,
) -> Result<AnalysisResult> {
    let handle = engine.submit(request)?;
    let spinner = progress::create_spinner(message);
    let result = loop {
        if let Some(result) = handle.wait_timeout(POLL_INTERVAL) {
            break result;
        }
    };
    spinner.finish_and_clear();
    log::debug!("job {} ({}) finished", handle.id(), handle.kind());
    result
}

/// 结果写为格式化 JSON
pub(crate) fn write_json<T: Serialize + ?Sized>(value: &T, path: &Path) -> Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    fs::write(path, text).map_err(|e| CrystanError::FileWriteError {
        path: path.display().to_string(),
        source: e,
    })?;
    output::print_success(&format!("JSON written to '{}'", path.display()));
    Ok(())
}

/// 引擎返回了与请求不符的结果类型
pub(crate) fn unexpected_result(expected: &str) -> CrystanError {
    CrystanError::Other(format!("analysis engine returned a non-{} result", expected))
}
