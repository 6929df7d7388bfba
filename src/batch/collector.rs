//! # 文件收集器
//!
//! 根据输入路径和 glob 模式收集待处理的结构文件。
//!
//! ## 功能
//! - 单文件直接返回
//! - 目录按文件名匹配逗号分隔的多个模式
//! - 可选递归搜索，结果按路径排序
//!
//! ## 依赖关系
//! - 被 `commands/analyze/xrd.rs` 调用
//! - 使用 `walkdir` 遍历目录，`glob::Pattern` 匹配文件名

use crate::error::{CrystanError, Result};

use glob::Pattern;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// 默认匹配的结构文件
pub const DEFAULT_PATTERN: &str = "POSCAR*,CONTCAR*,*.vasp,*.json";

/// 文件收集器
pub struct FileCollector {
    input: PathBuf,
    patterns: Vec<Pattern>,
    pattern_text: String,
    recursive: bool,
}

impl FileCollector {
    pub fn new(input: PathBuf) -> Self {
        Self {
            input,
            patterns: Vec::new(),
            pattern_text: String::new(),
            recursive: false,
        }
        .with_default_pattern()
    }

    fn with_default_pattern(mut self) -> Self {
        self.patterns = DEFAULT_PATTERN
            .split(',')
            .filter_map(|p| Pattern::new(p).ok())
            .collect();
        self.pattern_text = DEFAULT_PATTERN.to_string();
        self
    }

    /// 设置匹配模式（逗号分隔）
    pub fn with_pattern(mut self, pattern: &str) -> Result<Self> {
        let patterns = pattern
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                Pattern::new(s).map_err(|e| {
                    CrystanError::InvalidArgument(format!("invalid pattern '{}': {}", s, e))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        if !patterns.is_empty() {
            self.patterns = patterns;
            self.pattern_text = pattern.to_string();
        }
        Ok(self)
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn is_directory(&self) -> bool {
        self.input.is_dir()
    }

    /// 收集所有匹配的文件；一个都没有时报错
    pub fn collect(&self) -> Result<Vec<PathBuf>> {
        if self.input.is_file() {
            return Ok(vec![self.input.clone()]);
        }
        if !self.input.is_dir() {
            return Err(CrystanError::FileNotFound {
                path: self.input.display().to_string(),
            });
        }

        let max_depth = if self.recursive { usize::MAX } else { 1 };
        let mut files: Vec<PathBuf> = WalkDir::new(&self.input)
            .max_depth(max_depth)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| self.matches(e.path()))
            .map(|e| e.path().to_path_buf())
            .collect();
        files.sort();

        if files.is_empty() {
            return Err(CrystanError::NoFilesFound {
                pattern: format!("{}/{}", self.input.display(), self.pattern_text),
            });
        }
        log::debug!("collected {} files under {}", files.len(), self.input.display());
        Ok(files)
    }

    fn matches(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| self.patterns.iter().any(|p| p.matches(name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_default_patterns() {
        let dir = tempdir().unwrap();
        for name in ["POSCAR", "CONTCAR_01", "Si.vasp", "Si.json", "notes.txt"] {
            fs::write(dir.path().join(name), "").unwrap();
        }
        let files = FileCollector::new(dir.path().to_path_buf()).collect().unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["CONTCAR_01", "POSCAR", "Si.json", "Si.vasp"]);
    }

    #[test]
    fn test_custom_pattern_and_recursion() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("a.vasp"), "").unwrap();
        fs::write(dir.path().join("sub").join("b.vasp"), "").unwrap();

        let flat = FileCollector::new(dir.path().to_path_buf())
            .with_pattern("*.vasp")
            .unwrap()
            .collect()
            .unwrap();
        assert_eq!(flat.len(), 1);

        let deep = FileCollector::new(dir.path().to_path_buf())
            .with_pattern("*.vasp")
            .unwrap()
            .recursive(true)
            .collect()
            .unwrap();
        assert_eq!(deep.len(), 2);
    }

    #[test]
    fn test_no_match() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();
        let err = FileCollector::new(dir.path().to_path_buf()).collect().unwrap_err();
        assert!(matches!(err, CrystanError::NoFilesFound { .. }));
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(FileCollector::new(PathBuf::from(".")).with_pattern("[").is_err());
    }
}
