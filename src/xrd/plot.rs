//! # XRD 图表生成
//!
//! 使用 `plotters` 绘制 stick 图与展宽曲线，输出 PNG 或 SVG。
//! 最强的若干峰可标注代表性 Miller 指数。
//!
//! ## 依赖关系
//! - 被 `commands/analyze/xrd.rs` 调用
//! - 使用 `xrd/calculator.rs` 的 Peak, XrdPattern 结构
//! - 使用 `plotters` 渲染图表

use crate::error::{CrystanError, Result};
use crate::xrd::{Peak, XrdPattern};

use plotters::coord::cartesian::Cartesian2d;
use plotters::coord::types::RangedCoordf64;
use plotters::coord::Shift;
use plotters::prelude::*;
use std::path::Path;

const LINE_COLOR: RGBColor = RGBColor(0, 102, 204);

/// 低于此相对强度的峰不标注
const LABEL_THRESHOLD: f64 = 5.0;

/// 图像外观参数
#[derive(Debug, Clone)]
pub struct PlotOptions {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub label_peaks: bool,
    pub label_count: usize,
    pub svg: bool,
}

impl Default for PlotOptions {
    fn default() -> Self {
        Self {
            title: String::new(),
            width: 1200,
            height: 800,
            label_peaks: false,
            label_count: 10,
            svg: false,
        }
    }
}

fn plot_err<E: std::fmt::Debug>(e: E) -> CrystanError {
    CrystanError::Other(format!("plot error: {:?}", e))
}

/// 生成 stick 图
pub fn generate_xrd_plot(pattern: &XrdPattern, output_path: &Path, opts: &PlotOptions) -> Result<()> {
    let size = (opts.width, opts.height);
    if opts.svg {
        let root = SVGBackend::new(output_path, size).into_drawing_area();
        draw_stick_chart(&root, pattern, opts)?;
        root.present().map_err(plot_err)?;
    } else {
        let root = BitMapBackend::new(output_path, size).into_drawing_area();
        draw_stick_chart(&root, pattern, opts)?;
        root.present().map_err(plot_err)?;
    }
    log::debug!("wrote stick plot {}", output_path.display());
    Ok(())
}

/// 生成展宽曲线图
pub fn generate_broadened_xrd_plot(
    data: &[(f64, f64)],
    pattern: &XrdPattern,
    output_path: &Path,
    opts: &PlotOptions,
) -> Result<()> {
    let size = (opts.width, opts.height);
    if opts.svg {
        let root = SVGBackend::new(output_path, size).into_drawing_area();
        draw_broadened_chart(&root, data, pattern, opts)?;
        root.present().map_err(plot_err)?;
    } else {
        let root = BitMapBackend::new(output_path, size).into_drawing_area();
        draw_broadened_chart(&root, data, pattern, opts)?;
        root.present().map_err(plot_err)?;
    }
    log::debug!("wrote broadened plot {}", output_path.display());
    Ok(())
}

type Chart<'a, DB> = ChartContext<'a, DB, Cartesian2d<RangedCoordf64, RangedCoordf64>>;

fn build_chart<'a, DB: DrawingBackend + 'a>(
    root: &'a DrawingArea<DB, Shift>,
    title: &str,
    x_range: (f64, f64),
) -> Result<Chart<'a, DB>>
where
    DB::ErrorType: 'static,
{
    root.fill(&WHITE).map_err(plot_err)?;

    let mut chart = ChartBuilder::on(root)
        .caption(title, ("sans-serif", 28).into_font())
        .margin(30)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(x_range.0..x_range.1, 0.0..110.0)
        .map_err(plot_err)?;

    chart
        .configure_mesh()
        .x_desc("2θ (°)")
        .y_desc("Relative Intensity (%)")
        .x_label_style(("sans-serif", 16))
        .y_label_style(("sans-serif", 16))
        .axis_desc_style(("sans-serif", 18))
        .draw()
        .map_err(plot_err)?;

    Ok(chart)
}

/// 在 (2θ, y) 上方标注最强峰的指数；`height` 给出标注所在曲线的高度
fn draw_labels<DB: DrawingBackend>(
    chart: &mut Chart<'_, DB>,
    peaks: Vec<&Peak>,
    height: impl Fn(&Peak) -> f64,
) -> Result<()>
where
    DB::ErrorType: 'static,
{
    for peak in peaks.into_iter().filter(|p| p.intensity >= LABEL_THRESHOLD) {
        let style = ("sans-serif", 12).into_font().color(&BLACK);
        chart
            .draw_series(std::iter::once(Text::new(
                peak.hkl_label(),
                (peak.two_theta, height(peak) + 3.0),
                style,
            )))
            .map_err(plot_err)?;
    }
    Ok(())
}

fn draw_wavelength<DB: DrawingBackend>(
    chart: &mut Chart<'_, DB>,
    wavelength: f64,
    x_max: f64,
) -> Result<()>
where
    DB::ErrorType: 'static,
{
    chart
        .draw_series(std::iter::once(Text::new(
            format!("λ = {:.4} Å", wavelength),
            (x_max - 15.0, 105.0),
            ("sans-serif", 14).into_font().color(&BLACK),
        )))
        .map_err(plot_err)?;
    Ok(())
}

fn draw_stick_chart<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    pattern: &XrdPattern,
    opts: &PlotOptions,
) -> Result<()>
where
    DB::ErrorType: 'static,
{
    let x_range = match (pattern.peaks.first(), pattern.peaks.last()) {
        (Some(first), Some(last)) => (first.two_theta.floor() - 2.0, last.two_theta.ceil() + 2.0),
        _ => (5.0, 90.0),
    };
    let mut chart = build_chart(root, &opts.title, x_range)?;

    chart
        .draw_series(pattern.peaks.iter().filter(|p| p.intensity >= 0.5).map(|p| {
            PathElement::new(
                vec![(p.two_theta, 0.0), (p.two_theta, p.intensity)],
                LINE_COLOR.stroke_width(2),
            )
        }))
        .map_err(plot_err)?;

    if opts.label_peaks {
        draw_labels(&mut chart, pattern.strongest(opts.label_count), |p| {
            p.intensity
        })?;
    }
    draw_wavelength(&mut chart, pattern.wavelength, x_range.1)
}

fn draw_broadened_chart<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    data: &[(f64, f64)],
    pattern: &XrdPattern,
    opts: &PlotOptions,
) -> Result<()>
where
    DB::ErrorType: 'static,
{
    let x_range = (
        data.first().map(|(x, _)| *x).unwrap_or(5.0),
        data.last().map(|(x, _)| *x).unwrap_or(90.0),
    );
    let mut chart = build_chart(root, &opts.title, x_range)?;

    chart
        .draw_series(AreaSeries::new(
            data.iter().copied(),
            0.0,
            LINE_COLOR.mix(0.2),
        ))
        .map_err(plot_err)?;
    chart
        .draw_series(LineSeries::new(
            data.iter().copied(),
            LINE_COLOR.stroke_width(2),
        ))
        .map_err(plot_err)?;

    if opts.label_peaks {
        draw_labels(&mut chart, pattern.strongest(opts.label_count), |p| {
            data.iter()
                .min_by(|a, b| {
                    (a.0 - p.two_theta)
                        .abs()
                        .total_cmp(&(b.0 - p.two_theta).abs())
                })
                .map(|(_, y)| *y)
                .unwrap_or(p.intensity)
        })?;
    }
    draw_wavelength(&mut chart, pattern.wavelength, x_range.1)
}
