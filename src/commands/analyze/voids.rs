//! # 空隙分析子命令实现
//!
//! ## 依赖关系
//! - 使用 `cli/analyze.rs` 定义的 VoidArgs
//! - 通过 `engine/` 调用 `voids/`

use crate::cli::analyze::VoidArgs;
use crate::commands::{load_engine, run_with_spinner, unexpected_result, write_json};
use crate::engine::{AnalysisRequest, AnalysisResult};
use crate::error::Result;
use crate::utils::output;
use crate::voids::{VoidField, VoidSettings};

use std::time::Duration;
use tabled::{Table, Tabled};

impl VoidArgs {
    fn settings(&self) -> VoidSettings {
        let base = VoidSettings {
            radius_set: self.radii,
            radii_scale: self.radii_scale,
            connectivity: self.connectivity,
            ..VoidSettings::default()
        }
        .with_probe(self.probe)
        .with_spacing(self.spacing);

        self.radius_overrides
            .iter()
            .fold(base, |s, (element, radius)| s.with_radius(element.clone(), *radius))
    }
}

/// 执行空隙分析
pub fn execute(args: VoidArgs, timeout: Option<Duration>) -> Result<()> {
    output::print_header("Void and Channel Analysis");

    let settings = args.settings();
    settings.validate()?;

    let (engine, _) = load_engine(&args.file, timeout)?;
    output::print_info(&format!(
        "Probe radius {:.3} Å, grid spacing {:.3} Å, {} radii, {}-connectivity",
        settings.probe_radius, settings.grid_spacing, settings.radius_set, settings.connectivity
    ));

    let field = match run_with_spinner(&engine, AnalysisRequest::Voids(settings), "Mapping void space...")? {
        AnalysisResult::Voids(field) => field,
        _ => return Err(unexpected_result("voids")),
    };

    if !field.unknown_species.is_empty() {
        output::print_warning(&format!(
            "No tabulated radius for {}; default radius used",
            field.unknown_species.join(", ")
        ));
    }
    print_summary(&field);
    print_cluster_table(&field, args.top);

    if let Some(path) = &args.json {
        write_json(&field, path)?;
    }
    output::print_done(&format!(
        "{:.2}% void, {} clusters",
        field.void_fraction,
        field.clusters.len()
    ));
    Ok(())
}

fn print_summary(field: &VoidField) {
    let [nx, ny, nz] = field.dims;
    let sphere = &field.largest_sphere;

    output::print_separator();
    output::print_field("Grid", format!("{} × {} × {} ({} points)", nx, ny, nz, field.total_points()));
    output::print_field("Void points", field.void_points);
    output::print_field("Void fraction", format!("{:.2} %", field.void_fraction));
    output::print_field(
        "Void volume",
        format!("{:.3} Å³ of {:.3} Å³", field.void_volume(), field.cell_volume),
    );
    output::print_field("Clusters", field.clusters.len());
    if sphere.radius.is_finite() {
        output::print_field("Largest sphere radius", format!("{:.3} Å", sphere.radius));
        output::print_field(
            "Largest sphere center",
            format!(
                "({:.4}, {:.4}, {:.4})",
                sphere.center_fractional[0], sphere.center_fractional[1], sphere.center_fractional[2]
            ),
        );
    } else {
        output::print_field("Largest sphere radius", "unbounded (no atoms)");
    }
    if field.fitting_ions.is_empty() {
        output::print_field("Fitting ions", "none");
    } else {
        let names: Vec<String> = field
            .fitting_ions
            .iter()
            .map(|ion| format!("{} ({:.2} Å)", ion.name, ion.radius))
            .collect();
        output::print_field("Fitting ions", names.join(", "));
    }
    output::print_separator();
}

/// 打印最大的若干空隙簇
fn print_cluster_table(field: &VoidField, count: usize) {
    #[derive(Tabled)]
    struct ClusterRow {
        #[tabled(rename = "#")]
        index: usize,
        #[tabled(rename = "Radius (Å)")]
        radius: String,
        #[tabled(rename = "Center (frac)")]
        center: String,
        #[tabled(rename = "Points")]
        points: usize,
        #[tabled(rename = "Volume (Å³)")]
        volume: String,
    }

    let rows: Vec<ClusterRow> = field
        .clusters
        .iter()
        .take(count)
        .enumerate()
        .map(|(i, c)| ClusterRow {
            index: i + 1,
            radius: if c.radius.is_finite() {
                format!("{:.3}", c.radius)
            } else {
                "∞".to_string()
            },
            center: format!(
                "({:.3}, {:.3}, {:.3})",
                c.center_fractional[0], c.center_fractional[1], c.center_fractional[2]
            ),
            points: c.point_count,
            volume: format!("{:.3}", c.volume),
        })
        .collect();

    if !rows.is_empty() {
        output::print_header(&format!("Largest {} Voids", rows.len()));
        println!("{}", Table::new(&rows));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use crate::cli::{analyze::AnalyzeCommands, Commands};
    use crate::voids::{Connectivity, RadiusSet};
    use clap::Parser;

    fn void_args(argv: &[&str]) -> VoidArgs {
        let cli = Cli::parse_from(argv.iter().copied());
        match cli.command {
            Commands::Analyze(a) => match a.command {
                AnalyzeCommands::Voids(v) => v,
                other => panic!("unexpected command {:?}", other),
            },
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_settings_from_args() {
        let args = void_args(&[
            "crystan", "analyze", "voids", "POSCAR", "--probe", "N2", "--spacing", "0.25", "--radii", "ionic",
            "--radius", "O=1.3", "--radius", "Li=0.6", "--connectivity", "26",
        ]);
        let s = args.settings();
        assert_eq!(s.probe_radius, 1.82);
        assert_eq!(s.grid_spacing, 0.25);
        assert_eq!(s.radius_set, RadiusSet::Ionic);
        assert_eq!(s.connectivity, Connectivity::TwentySix);
        assert_eq!(s.radius_overrides.get("O"), Some(&1.3));
        assert_eq!(s.radius_overrides.get("Li"), Some(&0.6));
    }

    #[test]
    fn test_default_args() {
        let s = void_args(&["crystan", "analyze", "voids", "POSCAR"]).settings();
        assert_eq!(s.probe_radius, 1.2);
        assert_eq!(s.radius_set, RadiusSet::VanDerWaals);
        assert_eq!(s.connectivity, Connectivity::Six);
        assert!(s.radius_overrides.is_empty());
    }
}
