//! # cell 子命令实现
//!
//! 原胞 / 惯用胞转换与超胞扩展，结果写出为 POSCAR。
//!
//! ## 依赖关系
//! - 使用 `cli/cell.rs` 定义的 CellArgs
//! - 通过 `engine/` 调用 `cell/`
//! - 使用 `parsers/poscar.rs` 写出结果

use crate::cell::{CellModel, CellSettings};
use crate::cli::cell::CellArgs;
use crate::commands::{load_engine, run_with_spinner, unexpected_result, write_json};
use crate::engine::{AnalysisRequest, AnalysisResult};
use crate::error::Result;
use crate::parsers::poscar::write_poscar;
use crate::utils::output;

use std::path::PathBuf;
use std::time::Duration;

impl CellArgs {
    fn settings(&self) -> CellSettings {
        CellSettings::new(self.to, self.supercell).with_tolerance(self.tolerance)
    }
}

/// `NaCl_primitive_2x2x2.vasp`；名称中的非法字符替换为 `_`
fn default_output(name: &str) -> PathBuf {
    let stem: String = name
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    PathBuf::from(format!("{}.vasp", stem))
}

/// 执行晶胞变换
pub fn execute(args: CellArgs, timeout: Option<Duration>) -> Result<()> {
    output::print_header("Cell Transformation");

    let settings = args.settings();
    settings.validate()?;

    let (engine, crystal) = load_engine(&args.file, timeout)?;
    let [nx, ny, nz] = settings.supercell;
    output::print_info(&format!(
        "Target: {}, supercell {}×{}×{}",
        settings.target.map_or_else(|| "input cell".to_string(), |t| format!("{} cell", t)),
        nx,
        ny,
        nz
    ));

    let model = match run_with_spinner(&engine, AnalysisRequest::Cell(settings), "Transforming cell...")? {
        AnalysisResult::Cell(model) => model,
        _ => return Err(unexpected_result("cell")),
    };

    print_summary(&model, crystal.atoms.len());

    let output_path = args
        .output
        .clone()
        .unwrap_or_else(|| default_output(&model.structure.name));
    write_poscar(&model.structure, &output_path)?;
    output::print_success(&format!("Structure written to '{}'", output_path.display()));

    if let Some(path) = &args.json {
        write_json(&model, path)?;
    }
    output::print_done(&format!("{} ({} atoms)", model.structure.name, model.structure.atoms.len()));
    Ok(())
}

fn print_summary(model: &CellModel, input_atoms: usize) {
    let (a, b, c, alpha, beta, gamma) = model.structure.lattice.parameters();

    output::print_separator();
    if let (Some(number), Some(symbol)) = (model.space_group_number, &model.hm_symbol) {
        output::print_field("Space group", format!("{} (No. {})", symbol, number));
    }
    output::print_field("Formula", model.structure.formula());
    output::print_field("Atoms", format!("{} (input {})", model.structure.atoms.len(), input_atoms));
    output::print_field("Volume ratio", format!("{:.4}", model.volume_ratio));
    output::print_field("a b c", format!("{:.4} {:.4} {:.4} Å", a, b, c));
    output::print_field("α β γ", format!("{:.3} {:.3} {:.3}°", alpha, beta, gamma));
    for (name, row) in ["a'", "b'", "c'"].iter().zip(model.transform.iter()) {
        output::print_field(
            name,
            format!("{:>7.3} {:>7.3} {:>7.3}", row[0], row[1], row[2]),
        );
    }
    output::print_separator();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::CellType;

    #[test]
    fn test_default_output_name() {
        assert_eq!(default_output("NaCl_primitive"), PathBuf::from("NaCl_primitive.vasp"));
        assert_eq!(default_output("Si O2_2x2x1"), PathBuf::from("Si_O2_2x2x1.vasp"));
    }

    #[test]
    fn test_settings_from_args() {
        let args = CellArgs {
            file: PathBuf::from("POSCAR"),
            to: Some(CellType::Conventional),
            supercell: [2, 1, 1],
            tolerance: 1e-2,
            output: None,
            json: None,
        };
        let s = args.settings();
        assert_eq!(s.target, Some(CellType::Conventional));
        assert_eq!(s.supercell, [2, 1, 1]);
        assert_eq!(s.tolerance, 1e-2);
    }
}
