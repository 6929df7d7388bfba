//! # 键价和子命令实现
//!
//! ## 依赖关系
//! - 使用 `cli/analyze.rs` 定义的 BvsArgs
//! - 通过 `engine/` 调用 `bond_valence/`

use crate::bond_valence::{BondValenceReport, BondValenceSettings};
use crate::cli::analyze::BvsArgs;
use crate::commands::{load_engine, run_with_spinner, unexpected_result, write_json};
use crate::engine::{AnalysisRequest, AnalysisResult};
use crate::error::Result;
use crate::utils::output;

use std::time::Duration;
use tabled::{Table, Tabled};

/// 执行键价和分析
pub fn execute(args: BvsArgs, timeout: Option<Duration>) -> Result<()> {
    output::print_header("Bond Valence Sums");

    let settings = BondValenceSettings::default().with_cutoff(args.cutoff);
    settings.validate()?;

    let (engine, _) = load_engine(&args.file, timeout)?;
    output::print_info(&format!("Cutoff {:.2} Å, B = 0.37 Å", settings.cutoff));

    let report = match run_with_spinner(&engine, AnalysisRequest::BondValence(settings), "Summing bond valences...")? {
        AnalysisResult::BondValence(report) => report,
        _ => return Err(unexpected_result("bond valence")),
    };

    print_site_table(&report);
    print_summary(&report);
    if !report.missing_pairs.is_empty() {
        let pairs: Vec<String> = report
            .missing_pairs
            .iter()
            .map(|(cation, anion)| format!("{}-{}", cation, anion))
            .collect();
        output::print_warning(&format!("No R0 parameters for {}; those bonds are ignored", pairs.join(", ")));
    }

    if let Some(path) = &args.json {
        write_json(&report, path)?;
    }
    match report.quality {
        Some(quality) => output::print_done(&format!("quality {}", quality)),
        None => output::print_done("no site with a known oxidation state"),
    }
    Ok(())
}

fn print_summary(report: &BondValenceReport) {
    output::print_separator();
    output::print_field("Sites", report.sites.len());
    output::print_field("Validated", report.validated);
    if let (Some(mean), Some(max)) = (report.mean_deviation, report.max_deviation) {
        output::print_field("Mean deviation", format!("{:.3} v.u.", mean));
        output::print_field("Max deviation", format!("{:.3} v.u.", max));
    }
    if let Some(quality) = report.quality {
        output::print_field("Quality", quality);
    }
    output::print_separator();
}

/// 打印每个位点的键价和
fn print_site_table(report: &BondValenceReport) {
    #[derive(Tabled)]
    struct SiteRow {
        #[tabled(rename = "#")]
        index: usize,
        #[tabled(rename = "Element")]
        element: String,
        #[tabled(rename = "Bonds")]
        bonds: usize,
        #[tabled(rename = "BVS")]
        bvs: String,
        #[tabled(rename = "Expected")]
        expected: String,
        #[tabled(rename = "Deviation")]
        deviation: String,
    }

    let dash = || "-".to_string();
    let rows: Vec<SiteRow> = report
        .sites
        .iter()
        .map(|site| SiteRow {
            index: site.index + 1,
            element: site.element.clone(),
            bonds: site.bonds,
            bvs: format!("{:.3}", site.bvs),
            expected: site.expected.map_or_else(dash, |v| format!("{:.0}", v)),
            deviation: site.deviation.map_or_else(dash, |v| format!("{:.3}", v)),
        })
        .collect();

    output::print_header(&format!("{} Sites", rows.len()));
    println!("{}", Table::new(&rows));
}

#[cfg(test)]
mod tests {
    use crate::cli::{analyze::AnalyzeCommands, Cli, Commands};
    use clap::Parser;

    #[test]
    fn test_bvs_args() {
        let cli = Cli::parse_from(["crystan", "analyze", "bvs", "POSCAR", "--cutoff", "3.5"]);
        let Commands::Analyze(analyze) = cli.command else {
            panic!("expected the analyze command");
        };
        let AnalyzeCommands::Bvs(args) = analyze.command else {
            panic!("expected the bvs subcommand");
        };
        assert_eq!(args.cutoff, 3.5);
        assert!(args.json.is_none());
    }
}
