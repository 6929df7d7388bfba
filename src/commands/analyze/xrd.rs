//! # XRD 分析子命令实现
//!
//! 从结构文件计算 X 射线衍射图样。
//!
//! ## 功能
//! - 支持单文件和批量目录处理
//! - 批量模式并行计算（rayon）
//! - 可选展宽（Gaussian/Lorentzian/Pseudo-Voigt）
//! - 输出高质量图像 (PNG/SVG)
//! - 导出数据文件 (CSV/XY/JSON)
//!
//! ## 依赖关系
//! - 使用 `cli/analyze.rs` 定义的 XrdArgs
//! - 单文件经 `engine/` 调度，批量模式直接使用 `xrd::XrdCalculator`
//! - 使用 `batch/` 模块进行批量处理
//! - 使用 `parsers/` 读取结构

use crate::batch::{BatchRunner, FileCollector, ProcessResult};
use crate::cli::analyze::{XrdArgs, XrdOutputFormat};
use crate::commands::{load_engine, run_with_spinner, unexpected_result, write_json};
use crate::engine::{AnalysisRequest, AnalysisResult, CancelToken};
use crate::error::{CrystanError, Result};
use crate::parsers;
use crate::utils::output;
use crate::xrd::{self, BroadeningSettings, PlotOptions, Profile, XrdCalculator, XrdPattern, XrdSettings};

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 批量失败列表最多显示的条数
const MAX_LISTED_FAILURES: usize = 10;

/// 执行 XRD 分析
pub fn execute(args: XrdArgs, timeout: Option<Duration>) -> Result<()> {
    output::print_header("X-Ray Diffraction Pattern Calculation");

    let config = XrdConfig::from_args(&args, timeout)?;

    if args.input.is_file() {
        execute_single_file(&args, &config)
    } else if args.input.is_dir() {
        execute_batch(&args, &config)
    } else {
        Err(CrystanError::FileNotFound {
            path: args.input.display().to_string(),
        })
    }
}

/// 单文件与批量模式共用的计算与输出配置
struct XrdConfig {
    settings: XrdSettings,
    broadening: BroadeningSettings,
    plot: PlotOptions,
    format: Option<XrdOutputFormat>,
    timeout: Option<Duration>,
    overwrite: bool,
}

impl XrdConfig {
    fn from_args(args: &XrdArgs, timeout: Option<Duration>) -> Result<Self> {
        let (two_theta_min, two_theta_max) = args.range;
        let settings = XrdSettings {
            merge_tolerance: args.merge_tolerance,
            intensity_cutoff: args.cutoff,
            b_factor: args.b_factor,
            ..XrdSettings::default()
        }
        .with_wavelength(args.wavelength)
        .with_range(two_theta_min, two_theta_max);
        settings.validate()?;

        let broadening = BroadeningSettings {
            profile: args.broadening,
            fwhm: args.fwhm,
            step: args.step,
            eta: args.eta,
        };
        if broadening.profile != Profile::None {
            broadening.validate()?;
        }

        Ok(Self {
            settings,
            broadening,
            plot: PlotOptions {
                title: args.title.clone().unwrap_or_default(),
                width: args.width,
                height: args.height,
                label_peaks: args.label_peaks,
                label_count: args.label_count,
                svg: false,
            },
            format: args.format,
            timeout,
            overwrite: args.overwrite,
        })
    }

    fn print(&self) {
        output::print_info(&format!("Using wavelength: {:.4} Å", self.settings.wavelength));
        output::print_info(&format!(
            "2θ range: {:.1}° - {:.1}°",
            self.settings.two_theta_min, self.settings.two_theta_max
        ));
        if self.settings.b_factor > 0.0 {
            output::print_info(&format!("Debye-Waller B = {:.3} Å²", self.settings.b_factor));
        }
        if self.broadening.profile != Profile::None {
            output::print_info(&format!(
                "Applying {} broadening (FWHM = {:.3}°)",
                self.broadening.profile, self.broadening.fwhm
            ));
        }
    }
}

/// 单文件模式
fn execute_single_file(args: &XrdArgs, config: &XrdConfig) -> Result<()> {
    output::print_info(&format!("Single file mode: '{}'", args.input.display()));

    let (engine, crystal) = load_engine(&args.input, config.timeout)?;
    config.print();

    let pattern = match run_with_spinner(&engine, AnalysisRequest::Xrd(config.settings), "Summing structure factors...")? {
        AnalysisResult::Xrd(pattern) => pattern,
        _ => return Err(unexpected_result("xrd")),
    };
    output::print_success(&format!("Calculated {} diffraction peaks", pattern.peaks.len()));
    if !pattern.unknown_species.is_empty() {
        output::print_warning(&format!(
            "No scattering factors for {}; constant f = Z used",
            pattern.unknown_species.join(", ")
        ));
    }

    let format = config
        .format
        .unwrap_or_else(|| guess_format_from_extension(&args.output));
    let title = if config.plot.title.is_empty() {
        crystal.name.clone()
    } else {
        config.plot.title.clone()
    };
    write_pattern(&pattern, &args.output, format, config, &title)?;

    print_peak_table(&pattern, args.top);

    if let Some(path) = &args.json {
        write_json(&pattern, path)?;
    }
    output::print_success(&format!("XRD saved to '{}'", args.output.display()));
    Ok(())
}

/// 批量处理模式
fn execute_batch(args: &XrdArgs, config: &XrdConfig) -> Result<()> {
    output::print_info(&format!("Batch mode: directory '{}'", args.input.display()));

    let files = FileCollector::new(args.input.clone())
        .with_pattern(&args.pattern)?
        .recursive(args.recursive)
        .collect()?;
    output::print_info(&format!("Found {} structure files", files.len()));

    fs::create_dir_all(&args.output).map_err(|e| CrystanError::FileWriteError {
        path: args.output.display().to_string(),
        source: e,
    })?;

    config.print();
    let format = config.format.unwrap_or(XrdOutputFormat::Png);
    output::print_info(&format!("Output format: {:?}", format));

    let runner = BatchRunner::new(args.jobs);
    output::print_info(&format!("Running on {} worker threads", runner.jobs()));
    let result = runner.run(files, |file| process_batch_file(file, &args.output, format, config))?;

    output::print_separator();
    output::print_success(&format!(
        "Batch complete: {} success, {} skipped, {} failed",
        result.success, result.skipped, result.failed
    ));

    if !result.failures.is_empty() {
        output::print_warning("Failed files:");
        for (path, err) in result.failures.iter().take(MAX_LISTED_FAILURES) {
            output::print_error(&format!("  {}: {}", path, err));
        }
        if result.failures.len() > MAX_LISTED_FAILURES {
            output::print_warning(&format!(
                "  ... and {} more",
                result.failures.len() - MAX_LISTED_FAILURES
            ));
        }
    }

    Ok(())
}

/// 批量输出文件名：`{stem}_xrd.{ext}`
fn batch_output_path(input: &Path, output_dir: &Path, format: XrdOutputFormat) -> PathBuf {
    let stem = input
        .file_name()
        .and_then(|s| s.to_str())
        .map(|name| name.strip_suffix(".vasp").or_else(|| name.strip_suffix(".json")).unwrap_or(name))
        .unwrap_or("output");
    output_dir.join(format!("{}_xrd.{}", stem, format.extension()))
}

/// 处理批量模式中的单个文件
fn process_batch_file(input: &PathBuf, output_dir: &Path, format: XrdOutputFormat, config: &XrdConfig) -> ProcessResult {
    let output_file = batch_output_path(input, output_dir, format);

    if output_file.exists() && !config.overwrite {
        return ProcessResult::Skipped(format!(
            "Output exists, skipping: {}",
            output_file.display()
        ));
    }

    match process_structure(input, &output_file, format, config) {
        Ok(()) => ProcessResult::Success(format!("{} -> {}", input.display(), output_file.display())),
        Err(e) => {
            log::warn!("{}: {}", input.display(), e);
            ProcessResult::Failed(input.display().to_string(), e.to_string())
        }
    }
}

/// 读取、计算并写出单个结构
fn process_structure(input: &Path, output: &Path, format: XrdOutputFormat, config: &XrdConfig) -> Result<()> {
    let crystal = parsers::parse_structure_file(input)?;

    let cancel = match config.timeout {
        Some(timeout) => CancelToken::new().with_timeout(timeout),
        None => CancelToken::new(),
    };
    let pattern = XrdCalculator::new(config.settings)
        .with_cancel(cancel)
        .calculate(&crystal)?;

    let title = if config.plot.title.is_empty() {
        crystal.name.clone()
    } else {
        config.plot.title.clone()
    };
    write_pattern(&pattern, output, format, config, &title)
}

/// 按格式写出图样（展宽时写出展宽曲线）
fn write_pattern(
    pattern: &XrdPattern,
    output: &Path,
    format: XrdOutputFormat,
    config: &XrdConfig,
    title: &str,
) -> Result<()> {
    let broadened = if config.broadening.profile != Profile::None {
        Some(xrd::broaden(
            &pattern.peaks,
            config.settings.two_theta_min,
            config.settings.two_theta_max,
            &config.broadening,
        )?)
    } else {
        None
    };

    match format {
        XrdOutputFormat::Png | XrdOutputFormat::Svg => {
            let opts = PlotOptions {
                title: title.to_string(),
                svg: format == XrdOutputFormat::Svg,
                ..config.plot.clone()
            };
            match &broadened {
                Some(data) => xrd::plot::generate_broadened_xrd_plot(data, pattern, output, &opts),
                None => xrd::plot::generate_xrd_plot(pattern, output, &opts),
            }
        }
        XrdOutputFormat::Csv => match &broadened {
            Some(data) => xrd::export::broadened_to_csv(data, output),
            None => xrd::export::to_csv(pattern, output),
        },
        XrdOutputFormat::Xy => match &broadened {
            Some(data) => xrd::export::broadened_to_xy(data, &pattern.structure_name, pattern.wavelength, output),
            None => xrd::export::to_xy(pattern, output),
        },
    }
}

/// 从文件扩展名推断输出格式
fn guess_format_from_extension(path: &Path) -> XrdOutputFormat {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|s| s.to_lowercase())
        .as_deref()
    {
        Some("svg") => XrdOutputFormat::Svg,
        Some("csv") => XrdOutputFormat::Csv,
        Some("xy") | Some("dat") | Some("txt") => XrdOutputFormat::Xy,
        _ => XrdOutputFormat::Png,
    }
}

/// 打印最强峰表格（按 2θ 排列）
fn print_peak_table(pattern: &XrdPattern, count: usize) {
    use tabled::{Table, Tabled};

    #[derive(Tabled)]
    struct PeakRow {
        #[tabled(rename = "2θ (°)")]
        two_theta: String,
        #[tabled(rename = "d (Å)")]
        d_spacing: String,
        #[tabled(rename = "I (%)")]
        intensity: String,
        #[tabled(rename = "(hkl)")]
        hkl: String,
        #[tabled(rename = "Mult.")]
        multiplicity: usize,
    }

    let mut strongest = pattern.strongest(count);
    strongest.sort_by(|a, b| a.two_theta.total_cmp(&b.two_theta));

    let rows: Vec<PeakRow> = strongest
        .iter()
        .map(|p| PeakRow {
            two_theta: format!("{:.3}", p.two_theta),
            d_spacing: format!("{:.4}", p.d_spacing),
            intensity: format!("{:.1}", p.intensity),
            hkl: p.hkl_label(),
            multiplicity: p.multiplicity,
        })
        .collect();

    if !rows.is_empty() {
        output::print_header(&format!("Top {} XRD Peaks", rows.len()));
        println!("{}", Table::new(&rows));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Atom, Crystal, Lattice};
    use crate::parsers::poscar::write_poscar;
    use tempfile::tempdir;

    fn test_config(profile: Profile) -> XrdConfig {
        XrdConfig {
            settings: XrdSettings::default(),
            broadening: BroadeningSettings {
                profile,
                ..BroadeningSettings::default()
            },
            plot: PlotOptions::default(),
            format: None,
            timeout: None,
            overwrite: false,
        }
    }

    fn write_copper(dir: &Path, name: &str) -> PathBuf {
        let crystal = Crystal::new(
            "Cu",
            Lattice::cubic(3.615),
            vec![
                Atom::new("Cu", [0.0, 0.0, 0.0]),
                Atom::new("Cu", [0.5, 0.5, 0.0]),
                Atom::new("Cu", [0.5, 0.0, 0.5]),
                Atom::new("Cu", [0.0, 0.5, 0.5]),
            ],
        );
        let path = dir.join(name);
        write_poscar(&crystal, &path).unwrap();
        path
    }

    #[test]
    fn test_guess_format() {
        assert_eq!(guess_format_from_extension(Path::new("a.SVG")), XrdOutputFormat::Svg);
        assert_eq!(guess_format_from_extension(Path::new("a.csv")), XrdOutputFormat::Csv);
        assert_eq!(guess_format_from_extension(Path::new("a.dat")), XrdOutputFormat::Xy);
        assert_eq!(guess_format_from_extension(Path::new("a")), XrdOutputFormat::Png);
    }

    #[test]
    fn test_batch_output_path() {
        let out = Path::new("/out");
        assert_eq!(
            batch_output_path(Path::new("/in/Cu.vasp"), out, XrdOutputFormat::Csv),
            PathBuf::from("/out/Cu_xrd.csv")
        );
        assert_eq!(
            batch_output_path(Path::new("/in/POSCAR_1"), out, XrdOutputFormat::Xy),
            PathBuf::from("/out/POSCAR_1_xrd.xy")
        );
    }

    #[test]
    fn test_process_file_writes_csv_and_skips_existing() {
        let dir = tempdir().unwrap();
        let input = write_copper(dir.path(), "Cu.vasp");
        let config = test_config(Profile::None);

        let result = process_batch_file(&input, dir.path(), XrdOutputFormat::Csv, &config);
        assert!(matches!(result, ProcessResult::Success(_)));
        let csv = fs::read_to_string(dir.path().join("Cu_xrd.csv")).unwrap();
        assert!(csv.lines().count() > 3);

        let again = process_batch_file(&input, dir.path(), XrdOutputFormat::Csv, &config);
        assert!(matches!(again, ProcessResult::Skipped(_)));
    }

    #[test]
    fn test_broadened_xy_output() {
        let dir = tempdir().unwrap();
        let input = write_copper(dir.path(), "POSCAR");
        let output = dir.path().join("cu.xy");
        process_structure(&input, &output, XrdOutputFormat::Xy, &test_config(Profile::Gaussian)).unwrap();

        let text = fs::read_to_string(&output).unwrap();
        let data_lines = text.lines().filter(|l| !l.starts_with('#')).count();
        // (90 - 10) / 0.02 + 1
        assert!(data_lines >= 4000);
    }

    #[test]
    fn test_unparseable_file_fails() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("POSCAR_bad");
        fs::write(&input, "garbage\n").unwrap();
        let result = process_batch_file(&input, dir.path(), XrdOutputFormat::Csv, &test_config(Profile::None));
        assert!(matches!(result, ProcessResult::Failed(_, _)));
    }
}
