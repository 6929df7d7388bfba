//! # 批量处理模块
//!
//! 对目录中的多个结构文件执行同一分析。
//!
//! ## 功能
//! - 单文件 / 目录输入，glob 模式过滤
//! - rayon 线程池并行处理
//! - 进度条与失败汇总
//!
//! ## 依赖关系
//! - 被 `commands/analyze/xrd.rs` 使用
//! - 使用 `rayon` 进行并行处理
//! - 使用 `indicatif` 显示进度

pub mod collector;
pub mod runner;

pub use collector::FileCollector;
pub use runner::{BatchResult, BatchRunner, ProcessResult};
