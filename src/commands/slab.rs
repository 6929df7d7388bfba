//! # slab 子命令实现
//!
//! 切割表面板层并写出 POSCAR。
//!
//! ## 依赖关系
//! - 使用 `cli/slab.rs` 定义的 SlabArgs
//! - 通过 `engine/` 调用 `slab/`
//! - 使用 `parsers/poscar.rs` 写出结果

use crate::cli::slab::SlabArgs;
use crate::commands::{load_engine, run_with_spinner, unexpected_result, write_json};
use crate::engine::{AnalysisRequest, AnalysisResult};
use crate::error::Result;
use crate::parsers::poscar::write_poscar;
use crate::slab::{SlabModel, SlabSettings};
use crate::utils::output;

use std::path::PathBuf;
use std::time::Duration;
use tabled::{Table, Tabled};

impl SlabArgs {
    fn settings(&self) -> SlabSettings {
        SlabSettings {
            duplicate_tolerance: self.tolerance,
            max_search_range: self.max_range,
            ..SlabSettings::new(self.miller, self.thickness, self.vacuum)
        }
    }
}

/// `Cu_111_slab.vasp`，负指数写成 `m1`
fn default_output(name: &str, miller: [i32; 3]) -> PathBuf {
    let hkl: String = miller
        .iter()
        .map(|&i| if i < 0 { format!("m{}", -i) } else { i.to_string() })
        .collect();
    let stem: String = name
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    PathBuf::from(format!("{}_{}_slab.vasp", stem, hkl))
}

/// 执行 slab 构建
pub fn execute(args: SlabArgs, timeout: Option<Duration>) -> Result<()> {
    output::print_header("Surface Slab Construction");

    let settings = args.settings();
    settings.validate()?;

    let (engine, crystal) = load_engine(&args.file, timeout)?;
    let [h, k, l] = settings.miller;
    output::print_info(&format!(
        "Cutting ({} {} {}) with {} layer(s) and {:.2} Å vacuum",
        h, k, l, settings.thickness, settings.vacuum
    ));

    let slab = match run_with_spinner(&engine, AnalysisRequest::Slab(settings), "Searching surface basis...")? {
        AnalysisResult::Slab(slab) => slab,
        _ => return Err(unexpected_result("slab")),
    };

    print_summary(&slab);
    print_transform_table(&slab);
    if slab.conflicting_duplicates > 0 {
        output::print_warning(&format!(
            "{} removed duplicate(s) disagreed in species with the atom kept",
            slab.conflicting_duplicates
        ));
    }

    let output_path = args
        .output
        .clone()
        .unwrap_or_else(|| default_output(&crystal.name, settings.miller));
    write_poscar(&slab.structure, &output_path)?;
    output::print_success(&format!("Slab written to '{}'", output_path.display()));

    if let Some(path) = &args.json {
        write_json(&slab, path)?;
    }
    output::print_done(&format!("{} ({} atoms)", slab.structure.name, slab.structure.atoms.len()));
    Ok(())
}

fn print_summary(slab: &SlabModel) {
    let (a, b, c, alpha, beta, gamma) = slab.structure.lattice.parameters();

    output::print_separator();
    output::print_field("Formula", slab.structure.formula());
    output::print_field("Atoms", slab.structure.atoms.len());
    output::print_field("Interplanar spacing", format!("{:.4} Å", slab.interplanar_spacing));
    output::print_field("Layer height", format!("{:.4} Å", slab.layer_height));
    output::print_field("Slab a b c", format!("{:.4} {:.4} {:.4} Å", a, b, c));
    output::print_field("Slab α β γ", format!("{:.3} {:.3} {:.3}°", alpha, beta, gamma));
    output::print_field("Removed duplicates", slab.removed_duplicates);
    output::print_separator();
}

/// 打印整数变换（体相晶格系数）
fn print_transform_table(slab: &SlabModel) {
    #[derive(Tabled)]
    struct TransformRow {
        #[tabled(rename = "Vector")]
        name: &'static str,
        #[tabled(rename = "a")]
        a: i32,
        #[tabled(rename = "b")]
        b: i32,
        #[tabled(rename = "c")]
        c: i32,
    }

    let rows: Vec<TransformRow> = ["u", "v", "w"]
        .iter()
        .zip(slab.transform.iter())
        .map(|(&name, row)| TransformRow {
            name,
            a: row[0],
            b: row[1],
            c: row[2],
        })
        .collect();

    output::print_header("Slab Vectors in Bulk Lattice Coordinates");
    println!("{}", Table::new(&rows));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_output_name() {
        assert_eq!(default_output("Cu", [1, 1, 1]), PathBuf::from("Cu_111_slab.vasp"));
        assert_eq!(default_output("Si O2", [1, -1, 0]), PathBuf::from("Si_O2_1m10_slab.vasp"));
    }

    #[test]
    fn test_settings_from_args() {
        let args = SlabArgs {
            file: PathBuf::from("POSCAR"),
            miller: [1, 1, 0],
            thickness: 3,
            vacuum: 15.0,
            output: None,
            tolerance: 1e-3,
            max_range: 8,
            json: None,
        };
        let s = args.settings();
        assert_eq!(s.miller, [1, 1, 0]);
        assert_eq!(s.thickness, 3);
        assert_eq!(s.vacuum, 15.0);
        assert_eq!(s.duplicate_tolerance, 1e-3);
        assert_eq!(s.max_search_range, 8);
    }
}
