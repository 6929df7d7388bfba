//! # 统一错误处理模块
//!
//! 定义 Crystan 的所有错误类型，使用 `thiserror` 派生。
//!
//! 分析引擎的错误分为两类：
//! - 致命错误（`InvalidStructure`, `NoValidBasis`, `ComputeTimeout`, `Cancelled` 等）直接作为
//!   `Err` 返回；
//! - 非致命提示（`NumericTolerance`, `UnsupportedLatticeVisualization`）作为结果中的数据返回，
//!   需要展示时再转换为错误值。
//!
//! ## 依赖关系
//! - 被所有其他模块使用
//! - 无外部模块依赖

use thiserror::Error;

/// Crystan 统一错误类型
#[derive(Error, Debug)]
pub enum CrystanError {
    // ─────────────────────────────────────────────────────────────
    // I/O 错误
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to read file: {path}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file: {path}")]
    FileWriteError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    // ─────────────────────────────────────────────────────────────
    // 解析错误
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to parse {format} file: {path}\nReason: {reason}")]
    ParseError {
        format: String,
        path: String,
        reason: String,
    },

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    // ─────────────────────────────────────────────────────────────
    // 参数错误
    // ─────────────────────────────────────────────────────────────
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid range format: {0}")]
    InvalidRange(String),

    // ─────────────────────────────────────────────────────────────
    // 序列化错误
    // ─────────────────────────────────────────────────────────────
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    // ─────────────────────────────────────────────────────────────
    // 结构错误
    // ─────────────────────────────────────────────────────────────
    #[error("Invalid structure: {reason}")]
    InvalidStructure { reason: String },

    #[error("Degenerate lattice (volume = {volume:.3e} Å³)")]
    DegenerateLattice { volume: f64 },

    // ─────────────────────────────────────────────────────────────
    // 数值与搜索边界
    // ─────────────────────────────────────────────────────────────
    #[error("Symmetry match is ambiguous at tolerance {tolerance:.1e} Å: {detail}")]
    NumericTolerance { tolerance: f64, detail: String },

    #[error("No valid surface basis for ({h} {k} {l}) within coefficient range ±{bound}")]
    NoValidBasis { h: i32, k: i32, l: i32, bound: i32 },

    #[error("Brillouin zone wireframe is not available for {bravais}; a placeholder box is used")]
    UnsupportedLatticeVisualization { bravais: String },

    // ─────────────────────────────────────────────────────────────
    // 调度错误
    // ─────────────────────────────────────────────────────────────
    #[error("Computation aborted: {reason}")]
    ComputeTimeout { reason: String },

    #[error("Computation cancelled")]
    Cancelled,

    // ─────────────────────────────────────────────────────────────
    // 其他
    // ─────────────────────────────────────────────────────────────
    #[error("No matching files found with pattern: {pattern}")]
    NoFilesFound { pattern: String },

    #[error("{0}")]
    Other(String),
}

impl CrystanError {
    /// 是否为调度类错误（超时或取消），调用方通常直接丢弃此类结果
    pub fn is_interrupted(&self) -> bool {
        matches!(self, CrystanError::ComputeTimeout { .. } | CrystanError::Cancelled)
    }
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, CrystanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_valid_basis_message() {
        let err = CrystanError::NoValidBasis {
            h: 1,
            k: 2,
            l: 3,
            bound: 16,
        };
        assert_eq!(
            err.to_string(),
            "No valid surface basis for (1 2 3) within coefficient range ±16"
        );
    }

    #[test]
    fn test_interrupted_errors() {
        assert!(CrystanError::Cancelled.is_interrupted());
        assert!(CrystanError::ComputeTimeout {
            reason: "deadline".to_string()
        }
        .is_interrupted());
        assert!(!CrystanError::InvalidArgument("x".to_string()).is_interrupted());
    }
}
