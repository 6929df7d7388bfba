//! # k 路径子命令实现
//!
//! ## 依赖关系
//! - 使用 `cli/analyze.rs` 定义的 KPathArgs
//! - 通过 `engine/` 调用 `kpath/`（复用对称分析缓存）

use crate::cli::analyze::KPathArgs;
use crate::commands::{load_engine, run_with_spinner, unexpected_result, write_json};
use crate::engine::{AnalysisRequest, AnalysisResult};
use crate::error::{CrystanError, Result};
use crate::kpath::KPath;
use crate::symmetry::SymmetrySettings;
use crate::utils::output;

use std::fs;
use std::time::Duration;
use tabled::{Table, Tabled};

/// 执行 k 路径生成
pub fn execute(args: KPathArgs, timeout: Option<Duration>) -> Result<()> {
    output::print_header("High-Symmetry K-Path");

    let settings = SymmetrySettings::with_tolerance(args.tolerance);
    settings.validate()?;
    if args.kpoints.is_some() && args.divisions == 0 {
        return Err(CrystanError::InvalidArgument(
            "KPOINTS divisions must be at least 1".to_string(),
        ));
    }

    let (engine, _) = load_engine(&args.file, timeout)?;
    let path = match run_with_spinner(&engine, AnalysisRequest::KPath(settings), "Standardizing cell...")? {
        AnalysisResult::KPath(path) => path,
        _ => return Err(unexpected_result("kpath")),
    };

    print_summary(&path);
    print_point_table(&path);
    if let Some(warning) = path.visualization_warning() {
        output::print_warning(&warning.to_string());
    }

    if let Some(out) = &args.kpoints {
        fs::write(out, path.to_line_mode_kpoints(args.divisions)).map_err(|e| CrystanError::FileWriteError {
            path: out.display().to_string(),
            source: e,
        })?;
        output::print_success(&format!("KPOINTS written to '{}'", out.display()));
    }
    if let Some(out) = &args.json {
        write_json(&path, out)?;
    }
    output::print_done(&format!("{}: {}", path.variant, path_string(&path)));
    Ok(())
}

/// 路径的紧凑写法，如 `Γ-X-M-Γ-R-X|M-R`
fn path_string(path: &KPath) -> String {
    path.branches
        .iter()
        .map(|branch| branch.join("-"))
        .collect::<Vec<_>>()
        .join("|")
}

fn print_summary(path: &KPath) {
    output::print_separator();
    output::print_field("Space group", format!("{} (No. {})", path.hm_symbol, path.space_group_number));
    output::print_field("Bravais lattice", path.bravais);
    output::print_field("Lattice variant", path.variant);
    for (name, value) in &path.parameters {
        output::print_field(name, format!("{:.6}", value));
    }
    output::print_field("Path", path_string(path));
    output::print_field(
        "Brillouin zone",
        format!(
            "{} vertices, {} edges{}",
            path.wireframe.vertices.len(),
            path.wireframe.edges.len(),
            if path.wireframe.exact { "" } else { " (placeholder)" }
        ),
    );
    output::print_separator();
}

/// 打印特殊点坐标
fn print_point_table(path: &KPath) {
    #[derive(Tabled)]
    struct PointRow {
        #[tabled(rename = "Label")]
        label: String,
        #[tabled(rename = "Fractional (reciprocal)")]
        fractional: String,
        #[tabled(rename = "Cartesian (1/Å)")]
        cartesian: String,
    }

    let fmt3 = |v: &[f64; 3], precision: usize| {
        format!("{:>9.*} {:>9.*} {:>9.*}", precision, v[0], precision, v[1], precision, v[2])
    };
    let rows: Vec<PointRow> = path
        .points
        .iter()
        .map(|p| PointRow {
            label: p.label.clone(),
            fractional: fmt3(&p.fractional, 5),
            cartesian: fmt3(&p.cartesian, 4),
        })
        .collect();

    output::print_header(&format!("{} Special Points", rows.len()));
    println!("{}", Table::new(&rows));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kpath::KPathGenerator;
    use crate::models::{Atom, Crystal, Lattice};

    #[test]
    fn test_path_string() {
        let crystal = Crystal::new("Po", Lattice::cubic(3.35), vec![Atom::new("Po", [0.0, 0.0, 0.0])]);
        let path = KPathGenerator::default().generate(&crystal).unwrap();
        assert_eq!(path_string(&path), "Γ-X-M-Γ-R-X|M-R");
    }
}
