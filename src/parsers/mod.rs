//! # 结构文件解析
//!
//! 结构从 POSCAR/CONTCAR/`.vasp` 与 JSON 进入，板层结果以 POSCAR 写出。
//!
//! ## 依赖关系
//! - 被 `commands/` 与 `batch/` 使用
//! - 使用 `models/` 数据模型
//! - 子模块: poscar, json

pub mod json;
pub mod poscar;

use crate::error::{CrystanError, Result};
use crate::models::Crystal;

use std::path::Path;

/// 支持的结构格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructureFormat {
    Poscar,
    Json,
}

/// 由扩展名或文件名推断格式
pub fn detect_format(path: &Path) -> Option<StructureFormat> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|s| s.to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "vasp" | "poscar" | "contcar" => return Some(StructureFormat::Poscar),
        "json" => return Some(StructureFormat::Json),
        _ => {}
    }

    let name = path.file_name().and_then(|n| n.to_str())?.to_uppercase();
    (name.starts_with("POSCAR") || name.starts_with("CONTCAR")).then_some(StructureFormat::Poscar)
}

/// 从文件路径推断格式并解析
pub fn parse_structure_file(path: &Path) -> Result<Crystal> {
    if !path.exists() {
        return Err(CrystanError::FileNotFound {
            path: path.display().to_string(),
        });
    }
    match detect_format(path) {
        Some(StructureFormat::Poscar) => poscar::parse_poscar_file(path),
        Some(StructureFormat::Json) => json::parse_json_file(path),
        None => Err(CrystanError::UnsupportedFormat(format!(
            "Cannot determine format for: {}",
            path.display()
        ))),
    }
}
