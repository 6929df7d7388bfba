//! # 数据模型模块
//!
//! 定义统一的晶体结构数据模型与元素数据表。
//!
//! ## 依赖关系
//! - 被 `parsers/`、`lattice/` 和所有分析模块使用
//! - 子模块: structure, elements

pub mod elements;
pub mod structure;

pub use structure::{Atom, Crystal, Lattice};
