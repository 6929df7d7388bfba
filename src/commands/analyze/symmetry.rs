//! # 对称分析子命令实现
//!
//! ## 依赖关系
//! - 使用 `cli/analyze.rs` 定义的 SymmetryArgs
//! - 通过 `engine/` 调用 `symmetry/`

use crate::cli::analyze::SymmetryArgs;
use crate::commands::{load_engine, run_with_spinner, unexpected_result, write_json};
use crate::engine::{AnalysisRequest, AnalysisResult};
use crate::error::Result;
use crate::models::Lattice;
use crate::symmetry::{SymmetryInfo, SymmetrySettings};
use crate::utils::output;

use std::time::Duration;
use tabled::{Table, Tabled};

/// 执行对称分析
pub fn execute(args: SymmetryArgs, timeout: Option<Duration>) -> Result<()> {
    output::print_header("Space Group Analysis");

    let settings = SymmetrySettings::with_tolerance(args.tolerance);
    settings.validate()?;

    let (engine, _) = load_engine(&args.file, timeout)?;
    output::print_info(&format!("Tolerance: {} Å", settings.tolerance));

    let info = match run_with_spinner(&engine, AnalysisRequest::Symmetry(settings), "Searching symmetry operations...")? {
        AnalysisResult::Symmetry(info) => info,
        _ => return Err(unexpected_result("symmetry")),
    };

    print_summary(&info);
    if args.operations {
        print_operation_table(&info);
    }
    for warning in &info.warnings {
        output::print_warning(&warning.to_error(info.tolerance).to_string());
    }

    if let Some(path) = &args.json {
        write_json(&*info, path)?;
    }
    output::print_done(&format!("{} ({})", info.hm_symbol, info.space_group_number));
    Ok(())
}

fn print_summary(info: &SymmetryInfo) {
    output::print_separator();
    output::print_field("Space group", format!("{} (No. {})", info.hm_symbol, info.space_group_number));
    output::print_field("Point group", format!("{} (order {})", info.point_group, info.point_group_order()));
    output::print_field("Crystal system", info.crystal_system);
    output::print_field("Bravais lattice", format!("{} ({})", info.bravais, info.bravais.symbol()));
    output::print_field("Centering", info.centering.letter());
    output::print_field("Symmorphic", if info.symmorphic { "yes" } else { "no" });
    output::print_field("Operations", info.operations.len());
    if !info.alternatives.is_empty() {
        let alternatives: Vec<String> = info.alternatives.iter().map(u16::to_string).collect();
        output::print_field("Equally ranked", alternatives.join(", "));
    }

    let (a, b, c, alpha, beta, gamma) = Lattice::from_vectors(info.conventional_lattice).parameters();
    output::print_field("Conventional a b c", format!("{:.4} {:.4} {:.4} Å", a, b, c));
    output::print_field("Conventional α β γ", format!("{:.3} {:.3} {:.3}°", alpha, beta, gamma));
    let (a, b, c, alpha, beta, gamma) = Lattice::from_vectors(info.primitive_lattice).parameters();
    output::print_field("Primitive a b c", format!("{:.4} {:.4} {:.4} Å", a, b, c));
    output::print_field("Primitive α β γ", format!("{:.3} {:.3} {:.3}°", alpha, beta, gamma));
    output::print_separator();
}

/// 打印对称操作表格
fn print_operation_table(info: &SymmetryInfo) {
    #[derive(Tabled)]
    struct OperationRow {
        #[tabled(rename = "#")]
        index: usize,
        #[tabled(rename = "Type")]
        kind: String,
        #[tabled(rename = "Operation")]
        xyz: String,
    }

    let rows: Vec<OperationRow> = info
        .operations
        .iter()
        .enumerate()
        .map(|(i, op)| OperationRow {
            index: i + 1,
            kind: op.kind().map(|k| k.symbol().to_string()).unwrap_or_else(|| "?".to_string()),
            xyz: op.to_xyz(),
        })
        .collect();

    output::print_header(&format!("{} Symmetry Operations", rows.len()));
    println!("{}", Table::new(&rows));
}
