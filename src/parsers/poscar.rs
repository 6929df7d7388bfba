//! # VASP POSCAR 格式
//!
//! 读写 VASP POSCAR/CONTCAR 文件。
//!
//! ## 格式说明
//! ```text
//! Comment line (structure name)
//! 1.0                    # 缩放因子；负值表示目标体积（Å³）
//! a1 a2 a3               # 晶格向量 a
//! b1 b2 b3               # 晶格向量 b
//! c1 c2 c3               # 晶格向量 c
//! Element1 Element2 ...  # 元素符号（VASP 5+，可省略）
//! n1 n2 ...              # 各元素原子数
//! Selective dynamics     # 可选
//! Direct/Cartesian       # 坐标类型
//! x1 y1 z1               # 原子坐标
//! ...
//! ```
//!
//! ## 依赖关系
//! - 被 `parsers/mod.rs` 与 `commands/slab.rs` 使用
//! - 使用 `lattice::CellGeometry` 做笛卡尔 → 分数坐标转换

use crate::error::{CrystanError, Result};
use crate::lattice::CellGeometry;
use crate::models::{Atom, Crystal, Lattice};

use nalgebra::Vector3;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

fn parse_error(name: &str, reason: impl Into<String>) -> CrystanError {
    CrystanError::ParseError {
        format: "POSCAR".to_string(),
        path: name.to_string(),
        reason: reason.into(),
    }
}

/// 解析 POSCAR/CONTCAR 文件
pub fn parse_poscar_file(path: &Path) -> Result<Crystal> {
    let content = fs::read_to_string(path).map_err(|e| CrystanError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;

    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown");
    parse_poscar_content(&content, stem).map_err(|e| match e {
        CrystanError::ParseError { format, reason, .. } => CrystanError::ParseError {
            format,
            path: path.display().to_string(),
            reason,
        },
        other => other,
    })
}

/// 从字符串解析 POSCAR
pub fn parse_poscar_content(content: &str, default_name: &str) -> Result<Crystal> {
    let mut lines = content.lines().enumerate();
    let mut next_line = |what: &str| {
        lines
            .next()
            .ok_or_else(|| parse_error(default_name, format!("unexpected end of file, expected {}", what)))
    };

    let (_, comment) = next_line("comment line")?;
    let name = match comment.trim() {
        "" => default_name.to_string(),
        s => s.to_string(),
    };

    let (n, scale_line) = next_line("scaling factor")?;
    let scale: f64 = scale_line
        .split_whitespace()
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| parse_error(&name, format!("invalid scaling factor at line {}", n + 1)))?;
    if scale == 0.0 || !scale.is_finite() {
        return Err(parse_error(&name, "scaling factor must be non-zero"));
    }

    let mut matrix = [[0.0; 3]; 3];
    for row in &mut matrix {
        let (n, line) = next_line("lattice vector")?;
        let parts: Vec<f64> = line
            .split_whitespace()
            .take(3)
            .map(str::parse)
            .collect::<std::result::Result<_, _>>()
            .map_err(|_| parse_error(&name, format!("invalid lattice vector at line {}", n + 1)))?;
        if parts.len() < 3 {
            return Err(parse_error(&name, format!("invalid lattice vector at line {}", n + 1)));
        }
        *row = [parts[0], parts[1], parts[2]];
    }

    // 负缩放因子给出体积
    let factor = if scale < 0.0 {
        let raw = Lattice::from_vectors(matrix).volume().abs();
        if raw < 1e-12 {
            return Err(parse_error(&name, "cannot rescale a zero-volume lattice"));
        }
        (-scale / raw).cbrt()
    } else {
        scale
    };
    let lattice = Lattice::from_vectors(matrix.map(|row| row.map(|x| x * factor)));

    // VASP 5 的元素行可省略（VASP 4），此时用 X1, X2, ... 占位
    let (n, line) = next_line("element symbols or counts")?;
    let first: Vec<&str> = line.split_whitespace().collect();
    let (elements, count_tokens, count_line) = if first.first().is_some_and(|s| s.parse::<usize>().is_ok()) {
        let elements = (0..first.len()).map(|i| format!("X{}", i + 1)).collect::<Vec<_>>();
        (elements, first, n)
    } else {
        let (m, counts) = next_line("atom counts")?;
        let elements = first
            .iter()
            .map(|&s| s.split('/').next().unwrap_or(s).to_string())
            .collect::<Vec<_>>();
        (elements, counts.split_whitespace().collect(), m)
    };
    let counts: Vec<usize> = count_tokens
        .iter()
        .map(|s| s.parse())
        .collect::<std::result::Result<_, _>>()
        .map_err(|_| parse_error(&name, format!("invalid atom counts at line {}", count_line + 1)))?;
    if counts.len() != elements.len() {
        return Err(parse_error(
            &name,
            format!(
                "{} element symbols but {} atom counts",
                elements.len(),
                counts.len()
            ),
        ));
    }

    let (_, mut mode) = next_line("coordinate mode")?;
    if mode.trim_start().to_lowercase().starts_with('s') {
        mode = next_line("coordinate mode")?.1;
    }
    let cartesian = matches!(
        mode.trim_start().chars().next().map(|c| c.to_ascii_lowercase()),
        Some('c') | Some('k')
    );

    let cell = if cartesian {
        Some(CellGeometry::new(&lattice)?)
    } else {
        None
    };

    let total: usize = counts.iter().sum();
    let mut atoms = Vec::with_capacity(total);
    for (element, &count) in elements.iter().zip(&counts) {
        for _ in 0..count {
            let (n, line) = next_line("atom position")?;
            let parts: Vec<f64> = line
                .split_whitespace()
                .take(3)
                .map(str::parse)
                .collect::<std::result::Result<_, _>>()
                .map_err(|_| parse_error(&name, format!("invalid atom position at line {}", n + 1)))?;
            if parts.len() < 3 {
                return Err(parse_error(&name, format!("invalid atom position at line {}", n + 1)));
            }
            let position = match &cell {
                Some(cell) => {
                    let cart = Vector3::new(parts[0], parts[1], parts[2]) * factor;
                    let frac = cell.to_fractional(&cart);
                    [frac.x, frac.y, frac.z]
                }
                None => [parts[0], parts[1], parts[2]],
            };
            atoms.push(Atom::new(element.clone(), position));
        }
    }

    log::debug!("parsed POSCAR {}: {} atoms", name, atoms.len());
    Ok(Crystal::new(name, lattice, atoms))
}

/// 转换为 POSCAR 文本（分数坐标，按元素首次出现的顺序分组）
pub fn to_poscar_string(crystal: &Crystal) -> String {
    let species = crystal.species();

    let mut out = String::new();
    let _ = writeln!(out, "{}", crystal.name);
    let _ = writeln!(out, "1.0");
    for row in &crystal.lattice.matrix {
        let _ = writeln!(out, "  {:16.10}  {:16.10}  {:16.10}", row[0], row[1], row[2]);
    }
    let _ = writeln!(out, "   {}", species.join("   "));
    let counts: Vec<String> = species
        .iter()
        .map(|s| crystal.atoms.iter().filter(|a| a.element == *s).count().to_string())
        .collect();
    let _ = writeln!(out, "   {}", counts.join("   "));
    let _ = writeln!(out, "Direct");
    for s in &species {
        for atom in crystal.atoms.iter().filter(|a| a.element == *s) {
            let p = atom.position;
            let _ = writeln!(out, "  {:16.10}  {:16.10}  {:16.10}", p[0], p[1], p[2]);
        }
    }
    out
}

/// 写出 POSCAR 文件
pub fn write_poscar(crystal: &Crystal, path: &Path) -> Result<()> {
    fs::write(path, to_poscar_string(crystal)).map_err(|e| CrystanError::FileWriteError {
        path: path.display().to_string(),
        source: e,
    })
}
