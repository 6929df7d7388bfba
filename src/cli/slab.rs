//! # slab 子命令 CLI 定义
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/slab.rs`

use clap::Args;
use std::path::PathBuf;

/// 解析 Miller 指数，接受 "1,1,0"、"1 1 0" 或紧凑写法 "110"
pub fn parse_miller(input: &str) -> Result<[i32; 3], String> {
    let invalid = || format!("Invalid Miller indices '{}' (expected h,k,l, e.g. 1,1,0)", input);
    let trimmed = input.trim();

    let values: Vec<i32> = if trimmed.contains(',') || trimmed.contains(char::is_whitespace) {
        trimmed
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<i32>().map_err(|_| invalid()))
            .collect::<Result<_, _>>()?
    } else if trimmed.len() == 3 && trimmed.chars().all(|c| c.is_ascii_digit()) {
        trimmed
            .chars()
            .filter_map(|c| c.to_digit(10))
            .map(|d| d as i32)
            .collect()
    } else {
        return Err(invalid());
    };

    match values.as_slice() {
        [0, 0, 0] => Err(format!("Miller indices '{}' must not all be zero", input)),
        &[h, k, l] => Ok([h, k, l]),
        _ => Err(invalid()),
    }
}

/// slab 子命令参数
#[derive(Args, Debug)]
pub struct SlabArgs {
    /// Bulk structure file (POSCAR, CONTCAR, *.vasp or *.json)
    pub file: PathBuf,

    /// Miller indices of the surface plane (e.g. 1,1,0)
    #[arg(short, long, value_parser = parse_miller, allow_hyphen_values = true)]
    pub miller: [i32; 3],

    /// Number of layers stacked along the surface normal
    #[arg(short, long, default_value_t = 1)]
    pub thickness: usize,

    /// Vacuum thickness in Å
    #[arg(long, default_value_t = 10.0)]
    pub vacuum: f64,

    /// Output POSCAR path (default: <name>_<hkl>_slab.vasp)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Distance (Å) under which two atoms count as duplicates
    #[arg(long, default_value_t = 1e-5)]
    pub tolerance: f64,

    /// Largest coefficient range searched for the in-plane basis
    #[arg(long, default_value_t = 16)]
    pub max_range: i32,

    /// Also write the slab model (structure and metadata) as JSON
    #[arg(long, value_name = "OUT")]
    pub json: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_miller() {
        assert_eq!(parse_miller("1,1,0").unwrap(), [1, 1, 0]);
        assert_eq!(parse_miller("1 -1 2").unwrap(), [1, -1, 2]);
        assert_eq!(parse_miller("-1,0,0").unwrap(), [-1, 0, 0]);
        assert_eq!(parse_miller("111").unwrap(), [1, 1, 1]);
        assert!(parse_miller("0,0,0").is_err());
        assert!(parse_miller("1,1").is_err());
        assert!(parse_miller("a,b,c").is_err());
    }
}
