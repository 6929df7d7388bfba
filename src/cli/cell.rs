//! # cell 子命令 CLI 定义
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/cell.rs`

use crate::cell::CellType;

use clap::Args;
use std::path::PathBuf;

/// 解析超胞倍数，接受 "2x2x1"、"2,2,1" 或 "2 2 1"
pub fn parse_supercell(input: &str) -> Result<[u32; 3], String> {
    let invalid = || format!("Invalid supercell '{}' (expected NXxNYxNZ, e.g. 2x2x1)", input);
    let values: Vec<u32> = input
        .trim()
        .split(|c: char| c == 'x' || c == 'X' || c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<u32>().map_err(|_| invalid()))
        .collect::<Result<_, _>>()?;

    match values.as_slice() {
        &[nx, ny, nz] if nx > 0 && ny > 0 && nz > 0 => Ok([nx, ny, nz]),
        &[_, _, _] => Err(format!("Supercell multipliers in '{}' must be at least 1", input)),
        _ => Err(invalid()),
    }
}

/// cell 子命令参数
#[derive(Args, Debug)]
pub struct CellArgs {
    /// Structure file (POSCAR, CONTCAR, *.vasp or *.json)
    pub file: PathBuf,

    /// Convert to the primitive or conventional cell
    #[arg(long, value_enum)]
    pub to: Option<CellType>,

    /// Repeat the (converted) cell along a, b, c (e.g. 2x2x1)
    #[arg(short, long, value_parser = parse_supercell, default_value = "1x1x1")]
    pub supercell: [u32; 3],

    /// Symmetry tolerance in Å
    #[arg(short, long, env = "CRYSTAN_SYMPREC", default_value_t = 1e-3)]
    pub tolerance: f64,

    /// Output POSCAR path (default: <name>_<cell>.vasp)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Also write the transformed structure and metadata as JSON
    #[arg(long, value_name = "OUT")]
    pub json: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;

    #[test]
    fn test_parse_supercell() {
        assert_eq!(parse_supercell("2x2x1").unwrap(), [2, 2, 1]);
        assert_eq!(parse_supercell("3,1,2").unwrap(), [3, 1, 2]);
        assert_eq!(parse_supercell(" 1 1 4 ").unwrap(), [1, 1, 4]);
        assert!(parse_supercell("2x0x1").is_err());
        assert!(parse_supercell("2x2").is_err());
        assert!(parse_supercell("-1x1x1").is_err());
    }

    #[test]
    fn test_cell_args() {
        let cli = Cli::parse_from(["crystan", "cell", "POSCAR", "--to", "prim", "-s", "2x2x2"]);
        let Commands::Cell(args) = cli.command else {
            panic!("expected the cell command");
        };
        assert_eq!(args.to, Some(CellType::Primitive));
        assert_eq!(args.supercell, [2, 2, 2]);

        let cli = Cli::parse_from(["crystan", "cell", "POSCAR", "--to", "conventional"]);
        let Commands::Cell(args) = cli.command else {
            panic!("expected the cell command");
        };
        assert_eq!(args.to, Some(CellType::Conventional));
        assert_eq!(args.supercell, [1, 1, 1]);
    }
}
