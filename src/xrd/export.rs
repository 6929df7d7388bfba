//! # XRD 数据导出
//!
//! ## 支持格式
//! - CSV: 峰位表（2θ, d, 强度, 多重度, 代表指数, 全部指数），或展宽曲线（2θ, 强度）
//! - XY: 两列文本，`#` 开头的注释头
//!
//! ## 依赖关系
//! - 被 `commands/analyze/xrd.rs` 调用
//! - 使用 `xrd/calculator.rs` 的 XrdPattern 结构
//! - 使用 `csv` 库写入 CSV 文件

use crate::error::{CrystanError, Result};
use crate::xrd::XrdPattern;

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

fn write_error(path: &Path) -> impl Fn(std::io::Error) -> CrystanError + '_ {
    move |source| CrystanError::FileWriteError {
        path: path.display().to_string(),
        source,
    }
}

fn hkl_list(hkl: &[[i32; 3]]) -> String {
    hkl.iter()
        .map(|[h, k, l]| format!("{} {} {}", h, k, l))
        .collect::<Vec<_>>()
        .join(";")
}

/// 导出峰位为 CSV
pub fn to_csv(pattern: &XrdPattern, output_path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(output_path)?;

    wtr.write_record([
        "2theta",
        "d_spacing",
        "intensity",
        "multiplicity",
        "hkl",
        "all_hkl",
    ])?;

    for peak in &pattern.peaks {
        let [h, k, l] = peak.primary_hkl();
        wtr.write_record(&[
            format!("{:.4}", peak.two_theta),
            format!("{:.6}", peak.d_spacing),
            format!("{:.2}", peak.intensity),
            peak.multiplicity.to_string(),
            format!("{} {} {}", h, k, l),
            hkl_list(&peak.hkl),
        ])?;
    }

    wtr.flush().map_err(write_error(output_path))?;
    Ok(())
}

/// 导出展宽曲线为 CSV
pub fn broadened_to_csv(data: &[(f64, f64)], output_path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(output_path)?;
    wtr.write_record(["2theta", "intensity"])?;

    for (two_theta, intensity) in data {
        wtr.write_record(&[format!("{:.4}", two_theta), format!("{:.4}", intensity)])?;
    }

    wtr.flush().map_err(write_error(output_path))?;
    Ok(())
}

fn write_xy(
    output_path: &Path,
    title: &str,
    wavelength: f64,
    rows: impl Iterator<Item = (f64, f64)>,
) -> Result<()> {
    let file = File::create(output_path).map_err(write_error(output_path))?;
    let mut out = BufWriter::new(file);
    let err = write_error(output_path);

    writeln!(out, "# XRD Pattern: {}", title).map_err(&err)?;
    writeln!(out, "# Wavelength: {:.6} Angstrom", wavelength).map_err(&err)?;
    writeln!(out, "# Columns: 2theta (degrees), Intensity (relative)").map_err(&err)?;
    writeln!(out, "#").map_err(&err)?;

    for (two_theta, intensity) in rows {
        writeln!(out, "{:.4}\t{:.4}", two_theta, intensity).map_err(&err)?;
    }
    out.flush().map_err(&err)?;
    Ok(())
}

/// 导出峰位为 XY
pub fn to_xy(pattern: &XrdPattern, output_path: &Path) -> Result<()> {
    write_xy(
        output_path,
        &pattern.structure_name,
        pattern.wavelength,
        pattern.peaks.iter().map(|p| (p.two_theta, p.intensity)),
    )
}

/// 导出展宽曲线为 XY
pub fn broadened_to_xy(
    data: &[(f64, f64)],
    structure_name: &str,
    wavelength: f64,
    output_path: &Path,
) -> Result<()> {
    write_xy(
        output_path,
        &format!("{} (broadened)", structure_name),
        wavelength,
        data.iter().copied(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xrd::Peak;

    fn sample() -> XrdPattern {
        XrdPattern {
            peaks: vec![
                Peak {
                    two_theta: 22.2066,
                    d_spacing: 4.0,
                    intensity: 100.0,
                    hkl: vec![[1, 0, 0], [0, 1, 0]],
                    multiplicity: 2,
                },
                Peak {
                    two_theta: 31.6,
                    d_spacing: 2.83,
                    intensity: 42.5,
                    hkl: vec![[1, 1, 0]],
                    multiplicity: 1,
                },
            ],
            wavelength: 1.5406,
            structure_name: "test".to_string(),
            unknown_species: Vec::new(),
        }
    }

    #[test]
    fn test_csv_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("peaks.csv");
        to_csv(&sample(), &path).unwrap();

        let mut rdr = csv::Reader::from_path(&path).unwrap();
        let rows: Vec<csv::StringRecord> = rdr.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][3], "2");
        assert_eq!(&rows[0][4], "1 0 0");
        assert_eq!(&rows[0][5], "1 0 0;0 1 0");
    }

    #[test]
    fn test_xy_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("peaks.xy");
        to_xy(&sample(), &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let data: Vec<&str> = text.lines().filter(|l| !l.starts_with('#')).collect();
        assert!(text.starts_with("# XRD Pattern: test"));
        assert_eq!(data, vec!["22.2066\t100.0000", "31.6000\t42.5000"]);
    }
}
