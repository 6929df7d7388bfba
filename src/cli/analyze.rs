//! # analyze 子命令 CLI 定义
//!
//! 分析功能统一入口，包含多个子命令：
//! - `symmetry`: 空间群识别
//! - `xrd`: X 射线衍射图样计算
//! - `voids`: 空隙分析
//! - `kpath`: 能带路径
//! - `bvs`: 键价和
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/analyze/` 相应模块

use crate::voids::{Connectivity, RadiusSet};
use crate::xrd::Profile;

use clap::{Args, Subcommand, ValueEnum};
use std::path::PathBuf;

// ─────────────────────────────────────────────────────────────
// Analyze 主命令
// ─────────────────────────────────────────────────────────────

/// analyze 主命令参数
#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    #[command(subcommand)]
    pub command: AnalyzeCommands,
}

/// analyze 子命令
#[derive(Subcommand, Debug)]
pub enum AnalyzeCommands {
    /// Identify the space group, point group and Bravais lattice
    Symmetry(SymmetryArgs),

    /// Calculate X-ray diffraction pattern from structure
    Xrd(XrdArgs),

    /// Map voids and channels accessible to a probe
    Voids(VoidArgs),

    /// Generate the high-symmetry k-path for band structures
    Kpath(KPathArgs),

    /// Check bond valence sums against ideal oxidation states
    Bvs(BvsArgs),
}

// ─────────────────────────────────────────────────────────────
// 对称分析子命令
// ─────────────────────────────────────────────────────────────

/// 对称分析子命令参数
#[derive(Args, Debug)]
pub struct SymmetryArgs {
    /// Structure file (POSCAR, CONTCAR, *.vasp or *.json)
    pub file: PathBuf,

    /// Symmetry tolerance in Å
    #[arg(short, long, env = "CRYSTAN_SYMPREC", default_value_t = 1e-3)]
    pub tolerance: f64,

    /// Also list every symmetry operation
    #[arg(long, default_value_t = false)]
    pub operations: bool,

    /// Write the full result as JSON
    #[arg(long, value_name = "OUT")]
    pub json: Option<PathBuf>,
}

// ─────────────────────────────────────────────────────────────
// XRD 分析子命令
// ─────────────────────────────────────────────────────────────

/// 预定义辐射源波长 (Å)
pub fn get_predefined_wavelength(name: &str) -> Option<f64> {
    match name.to_lowercase().as_str() {
        "cu-ka" | "cuka" => Some(1.5418),
        "cu-ka1" | "cuka1" => Some(1.5406),
        "cu-ka2" | "cuka2" => Some(1.5444),
        "cu-kb1" | "cukb1" => Some(1.3922),
        "mo-ka" | "moka" => Some(0.7107),
        "mo-ka1" | "moka1" => Some(0.7093),
        "co-ka" | "coka" => Some(1.7903),
        "fe-ka" | "feka" => Some(1.9373),
        "cr-ka" | "crka" => Some(2.2910),
        "ag-ka" | "agka" => Some(0.5609),
        _ => None,
    }
}

/// 解析波长输入（辐射源名称或数值）
pub fn parse_wavelength(input: &str) -> Result<f64, String> {
    if let Some(wl) = get_predefined_wavelength(input) {
        return Ok(wl);
    }
    match input.trim().parse::<f64>() {
        Ok(wl) if wl > 0.0 && wl.is_finite() => Ok(wl),
        _ => Err(format!(
            "Invalid wavelength '{}'. Use a positive number in Å (e.g., 0.424589) or a name: cu-ka, cu-ka1, mo-ka, co-ka, fe-ka, cr-ka, ag-ka",
            input
        )),
    }
}

/// 解析 2θ 范围，如 "10-90"
pub fn parse_range(range: &str) -> Result<(f64, f64), String> {
    let invalid = || format!("Invalid 2θ range '{}' (expected MIN-MAX, 0 <= MIN < MAX <= 180)", range);
    let (min, max) = range.split_once('-').ok_or_else(invalid)?;
    let min: f64 = min.trim().parse().map_err(|_| invalid())?;
    let max: f64 = max.trim().parse().map_err(|_| invalid())?;
    if min < 0.0 || max <= min || max > 180.0 {
        return Err(invalid());
    }
    Ok((min, max))
}

/// XRD 图像输出格式
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum XrdOutputFormat {
    /// PNG image (publication quality)
    Png,
    /// SVG vector image
    Svg,
    /// CSV data file (2θ, d, intensity, hkl)
    Csv,
    /// XY data file (standard XRD format)
    Xy,
}

impl XrdOutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            XrdOutputFormat::Png => "png",
            XrdOutputFormat::Svg => "svg",
            XrdOutputFormat::Csv => "csv",
            XrdOutputFormat::Xy => "xy",
        }
    }
}

/// XRD 分析子命令参数
#[derive(Args, Debug)]
pub struct XrdArgs {
    /// Input: structure file or directory containing structure files
    pub input: PathBuf,

    /// Output: file path (single mode) or directory (batch mode)
    #[arg(short, long, default_value = "xrd_pattern.png")]
    pub output: PathBuf,

    /// Output format (auto-detected from extension if not specified)
    #[arg(short, long, value_enum)]
    pub format: Option<XrdOutputFormat>,

    /// X-ray wavelength: radiation source name (cu-ka, mo-ka, etc.) or value in Å (e.g., 0.424589)
    #[arg(short, long, default_value = "cu-ka", value_parser = parse_wavelength)]
    pub wavelength: f64,

    /// 2θ range in degrees (e.g., "10-90")
    #[arg(short, long, default_value = "10-90", value_parser = parse_range)]
    pub range: (f64, f64),

    /// Reflections closer than this (degrees 2θ) merge into one peak
    #[arg(long, default_value_t = 0.05)]
    pub merge_tolerance: f64,

    /// Drop peaks weaker than this fraction of the strongest peak (0-1)
    #[arg(long, default_value_t = 1e-4)]
    pub cutoff: f64,

    /// Isotropic Debye-Waller factor B in Å² (0 disables)
    #[arg(long, default_value_t = 0.0)]
    pub b_factor: f64,

    /// Peak broadening profile
    #[arg(long, value_enum, default_value = "none")]
    pub broadening: Profile,

    /// Full Width at Half Maximum (FWHM) for peak broadening, in degrees 2θ
    #[arg(long, default_value_t = 0.1)]
    pub fwhm: f64,

    /// Step size for broadened pattern output (degrees 2θ)
    #[arg(long, default_value_t = 0.02)]
    pub step: f64,

    /// Lorentzian fraction of the pseudo-Voigt profile (0-1)
    #[arg(long, default_value_t = 0.5)]
    pub eta: f64,

    /// Number of strongest peaks to print
    #[arg(long, default_value_t = 10)]
    pub top: usize,

    /// Label peaks with Miller indices (hkl)
    #[arg(long, default_value_t = false)]
    pub label_peaks: bool,

    /// Number of top peaks to label (if --label-peaks is set)
    #[arg(long, default_value_t = 10)]
    pub label_count: usize,

    /// Figure width in pixels (for PNG) or points (for SVG)
    #[arg(long, default_value_t = 1200)]
    pub width: u32,

    /// Figure height in pixels (for PNG) or points (for SVG)
    #[arg(long, default_value_t = 800)]
    pub height: u32,

    /// Title for the plot (default: structure name)
    #[arg(long)]
    pub title: Option<String>,

    /// Also write the peak list as JSON (single mode)
    #[arg(long, value_name = "OUT")]
    pub json: Option<PathBuf>,

    // ─────────────────────────────────────────────────────────────
    // 批量处理参数
    // ─────────────────────────────────────────────────────────────
    /// Glob pattern for input files (batch mode, e.g., "POSCAR*,*.vasp")
    #[arg(long, default_value = crate::batch::collector::DEFAULT_PATTERN)]
    pub pattern: String,

    /// Number of parallel jobs (0 = auto, batch mode only)
    #[arg(short, long, env = "CRYSTAN_JOBS", default_value_t = 0)]
    pub jobs: usize,

    /// Recurse into subdirectories (batch mode)
    #[arg(long, default_value_t = false)]
    pub recursive: bool,

    /// Overwrite existing output files
    #[arg(long, default_value_t = false)]
    pub overwrite: bool,
}

// ─────────────────────────────────────────────────────────────
// 空隙分析子命令
// ─────────────────────────────────────────────────────────────

/// 解析 `--probe`：探针名或 Å
pub fn parse_probe_arg(input: &str) -> Result<f64, String> {
    crate::voids::parse_probe(input).map_err(|e| e.to_string())
}

/// 解析 `--radius EL=Å`
pub fn parse_radius_override(input: &str) -> Result<(String, f64), String> {
    let invalid = || format!("Invalid radius override '{}' (expected ELEMENT=RADIUS, e.g. O=1.40)", input);
    let (element, radius) = input.split_once('=').ok_or_else(invalid)?;
    let element = element.trim();
    let radius: f64 = radius.trim().parse().map_err(|_| invalid())?;
    if element.is_empty() || radius < 0.0 || !radius.is_finite() {
        return Err(invalid());
    }
    Ok((element.to_string(), radius))
}

/// 空隙分析子命令参数
#[derive(Args, Debug)]
pub struct VoidArgs {
    /// Structure file (POSCAR, CONTCAR, *.vasp or *.json)
    pub file: PathBuf,

    /// Probe: gas or ion name (He, N2, CO2, Li+, ...) or radius in Å
    #[arg(short, long, default_value = "1.2", value_parser = parse_probe_arg)]
    pub probe: f64,

    /// Grid spacing in Å
    #[arg(short, long, default_value_t = 0.2)]
    pub spacing: f64,

    /// Atomic radius set
    #[arg(long, value_enum, default_value = "vdw")]
    pub radii: RadiusSet,

    /// Scale factor applied to every atomic radius
    #[arg(long, default_value_t = 1.0)]
    pub radii_scale: f64,

    /// Per-species radius override, repeatable (e.g. --radius O=1.40)
    #[arg(long = "radius", value_name = "EL=Å", value_parser = parse_radius_override)]
    pub radius_overrides: Vec<(String, f64)>,

    /// Grid connectivity used to group void points into clusters
    #[arg(long, value_enum, default_value = "6")]
    pub connectivity: Connectivity,

    /// Number of largest voids to print
    #[arg(long, default_value_t = 10)]
    pub top: usize,

    /// Write the full result as JSON
    #[arg(long, value_name = "OUT")]
    pub json: Option<PathBuf>,
}

// ─────────────────────────────────────────────────────────────
// k 路径子命令
// ─────────────────────────────────────────────────────────────

/// k 路径子命令参数
#[derive(Args, Debug)]
pub struct KPathArgs {
    /// Structure file (POSCAR, CONTCAR, *.vasp or *.json)
    pub file: PathBuf,

    /// Symmetry tolerance in Å
    #[arg(short, long, env = "CRYSTAN_SYMPREC", default_value_t = 1e-3)]
    pub tolerance: f64,

    /// Write a VASP line-mode KPOINTS file
    #[arg(long, value_name = "OUT")]
    pub kpoints: Option<PathBuf>,

    /// Points per segment in the KPOINTS file
    #[arg(long, default_value_t = 40)]
    pub divisions: usize,

    /// Write the full result (points, path, Brillouin zone) as JSON
    #[arg(long, value_name = "OUT")]
    pub json: Option<PathBuf>,
}

// ─────────────────────────────────────────────────────────────
// 键价和子命令
// ─────────────────────────────────────────────────────────────

/// 键价和子命令参数
#[derive(Args, Debug)]
pub struct BvsArgs {
    /// Structure file (POSCAR, CONTCAR, *.vasp or *.json)
    pub file: PathBuf,

    /// Bond search cutoff in Å
    #[arg(short, long, default_value_t = 4.0)]
    pub cutoff: f64,

    /// Write the full result as JSON
    #[arg(long, value_name = "OUT")]
    pub json: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_wavelength() {
        assert_eq!(parse_wavelength("Cu-Ka").unwrap(), 1.5418);
        assert_eq!(parse_wavelength("0.424589").unwrap(), 0.424589);
        assert!(parse_wavelength("-1").is_err());
        assert!(parse_wavelength("tungsten").is_err());
    }

    #[test]
    fn test_parse_range() {
        assert_eq!(parse_range("10-90").unwrap(), (10.0, 90.0));
        assert_eq!(parse_range(" 5.5 - 120 ").unwrap(), (5.5, 120.0));
        assert!(parse_range("90-10").is_err());
        assert!(parse_range("10-200").is_err());
        assert!(parse_range("10").is_err());
    }

    #[test]
    fn test_parse_radius_override() {
        assert_eq!(parse_radius_override("O=1.40").unwrap(), ("O".to_string(), 1.40));
        assert!(parse_radius_override("O").is_err());
        assert!(parse_radius_override("=1.0").is_err());
        assert!(parse_radius_override("O=-1").is_err());
    }

    #[test]
    fn test_probe_names() {
        assert_eq!(parse_probe_arg("N2").unwrap(), 1.82);
        assert_eq!(parse_probe_arg("0.5").unwrap(), 0.5);
        assert!(parse_probe_arg("unobtainium").is_err());
    }
}
