//! # 粉末衍射峰计算器
//!
//! ## 算法概述
//! 1. 由 2θ 上限得到 d_min = λ / (2 sin θ_max)，据此限定 |h|, |k|, |l|
//! 2. 对每个 (hkl) 求 |G|、d = 2π/|G| 与 Bragg 角
//! 3. 结构因子 F = Σ f_j(s) · exp(-B s²) · exp(2πi(h x + k y + l z))
//! 4. Lorentz 极化校正 LP = (1 + cos²2θ) / (sin²θ cos θ)
//! 5. 按 2θ 升序排序，合并容差内的峰（强度相加、hkl 取并集）
//! 6. 归一化到 0–100 并丢弃低于相对阈值的峰
//!
//! h 平面之间并行（rayon），每个平面开始前检查取消信号。
//!
//! ## 参考
//! - Structure of Materials, De Graef & McHenry, ch. 12
//!
//! ## 依赖关系
//! - 被 `commands/analyze/xrd.rs` 与 `engine/` 调用
//! - 使用 `lattice::CellGeometry` 计算倒格矢
//! - 使用 `xrd/scattering.rs` 获取原子散射因子

use crate::engine::CancelToken;
use crate::error::{CrystanError, Result};
use crate::lattice::CellGeometry;
use crate::models::Crystal;
use crate::xrd::scattering::{self, ScatteringFactorParams};

use nalgebra::Vector3;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::f64::consts::PI;

/// Cu Kα1
pub const DEFAULT_WAVELENGTH: f64 = 1.5406;

/// 结构因子平方低于此值视为系统消光
const EXTINCTION_THRESHOLD: f64 = 1e-10;

// ─────────────────────────────────────────────────────────────
// 参数
// ─────────────────────────────────────────────────────────────

/// 衍射计算参数
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct XrdSettings {
    /// X 射线波长（Å）
    pub wavelength: f64,
    /// 2θ 下限（度）
    pub two_theta_min: f64,
    /// 2θ 上限（度）
    pub two_theta_max: f64,
    /// 峰合并容差（度 2θ）
    pub merge_tolerance: f64,
    /// 相对强度阈值（相对最强峰，0–1）
    pub intensity_cutoff: f64,
    /// 各向同性 Debye–Waller 因子 B（Å²），0 表示不使用
    pub b_factor: f64,
    /// 单轴 Miller 指数上限，超过即放弃计算
    pub max_index: i32,
}

impl Default for XrdSettings {
    fn default() -> Self {
        Self {
            wavelength: DEFAULT_WAVELENGTH,
            two_theta_min: 10.0,
            two_theta_max: 90.0,
            merge_tolerance: 0.05,
            intensity_cutoff: 1e-4,
            b_factor: 0.0,
            max_index: 60,
        }
    }
}

impl XrdSettings {
    pub fn with_wavelength(mut self, wavelength: f64) -> Self {
        self.wavelength = wavelength;
        self
    }

    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        self.two_theta_min = min;
        self.two_theta_max = max;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.wavelength <= 0.0 || !self.wavelength.is_finite() {
            return Err(CrystanError::InvalidArgument(format!(
                "wavelength must be positive, got {}",
                self.wavelength
            )));
        }
        if self.two_theta_min < 0.0
            || self.two_theta_max <= self.two_theta_min
            || self.two_theta_max > 180.0
        {
            return Err(CrystanError::InvalidRange(format!(
                "{}-{} (must be 0 <= min < max <= 180)",
                self.two_theta_min, self.two_theta_max
            )));
        }
        // 容差为 0 时等 2θ 的反射无法合并，输出不再严格递增
        if self.merge_tolerance <= 0.0 || !self.merge_tolerance.is_finite() {
            return Err(CrystanError::InvalidArgument(format!(
                "merge tolerance must be positive, got {}",
                self.merge_tolerance
            )));
        }
        if !(0.0..1.0).contains(&self.intensity_cutoff) {
            return Err(CrystanError::InvalidArgument(format!(
                "intensity cutoff must lie in [0, 1), got {}",
                self.intensity_cutoff
            )));
        }
        if self.b_factor < 0.0 {
            return Err(CrystanError::InvalidArgument(
                "Debye-Waller factor must not be negative".to_string(),
            ));
        }
        if self.max_index < 1 {
            return Err(CrystanError::InvalidArgument(
                "maximum Miller index must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────
// 结果
// ─────────────────────────────────────────────────────────────

/// 衍射峰（合并后）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Peak {
    /// 衍射角 2θ（度）
    pub two_theta: f64,
    /// d 间距（Å）
    pub d_spacing: f64,
    /// 相对强度（0-100）
    pub intensity: f64,
    /// 贡献该峰的全部 Miller 指数
    pub hkl: Vec<[i32; 3]>,
    /// 贡献反射数
    pub multiplicity: usize,
}

impl Peak {
    /// 代表性指数：非负分量最多、字典序最大者，如 {100} 族给出 (1 0 0)
    pub fn primary_hkl(&self) -> [i32; 3] {
        self.hkl.first().copied().unwrap_or([0, 0, 0])
    }

    pub fn hkl_label(&self) -> String {
        let [h, k, l] = self.primary_hkl();
        format!("({} {} {})", h, k, l)
    }
}

/// 衍射图谱，峰按 2θ 升序
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XrdPattern {
    pub peaks: Vec<Peak>,
    pub wavelength: f64,
    pub structure_name: String,
    /// 散射因子表中缺失、按 f = 1 处理的物种
    pub unknown_species: Vec<String>,
}

impl XrdPattern {
    /// 强度最高的 `count` 个峰（强度降序，同强度按 2θ）
    pub fn strongest(&self, count: usize) -> Vec<&Peak> {
        let mut sorted: Vec<&Peak> = self.peaks.iter().collect();
        sorted.sort_by(|a, b| {
            b.intensity
                .total_cmp(&a.intensity)
                .then(a.two_theta.total_cmp(&b.two_theta))
        });
        sorted.truncate(count);
        sorted
    }
}

/// 未合并的单个反射
#[derive(Debug, Clone)]
struct Reflection {
    two_theta: f64,
    d_spacing: f64,
    intensity: f64,
    hkl: [i32; 3],
}

/// 参与散射的原子
struct Scatterer {
    position: Vector3<f64>,
    params: Option<&'static ScatteringFactorParams>,
    /// 无系数时的常数散射因子
    fallback: f64,
}

impl Scatterer {
    fn form_factor(&self, s: f64) -> f64 {
        self.params.map_or(self.fallback, |p| p.calculate(s))
    }
}

// ─────────────────────────────────────────────────────────────
// 计算器
// ─────────────────────────────────────────────────────────────

/// XRD 计算器
#[derive(Debug, Clone, Default)]
pub struct XrdCalculator {
    settings: XrdSettings,
    cancel: CancelToken,
}

impl XrdCalculator {
    pub fn new(settings: XrdSettings) -> Self {
        Self {
            settings,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn settings(&self) -> &XrdSettings {
        &self.settings
    }

    /// 计算衍射图谱
    pub fn calculate(&self, crystal: &Crystal) -> Result<XrdPattern> {
        self.settings.validate()?;
        crystal.validate()?;
        let cell = CellGeometry::new(&crystal.lattice)?;
        let s = &self.settings;

        let mut unknown_species: BTreeSet<String> = BTreeSet::new();
        let scatterers: Vec<Scatterer> = crystal
            .atoms
            .iter()
            .map(|atom| {
                let params = scattering::lookup(&atom.element);
                let fallback = scattering::fallback_factor(&atom.element);
                if params.is_none() && unknown_species.insert(atom.element.clone()) {
                    log::warn!(
                        "no scattering factor for '{}', using a constant f = {}",
                        atom.element,
                        fallback
                    );
                }
                Scatterer {
                    position: Vector3::from(atom.position),
                    params,
                    fallback,
                }
            })
            .collect();

        let bounds = self.index_bounds(&cell)?;
        log::debug!(
            "xrd: {} atoms, index bounds {:?} for 2θ ≤ {}°",
            scatterers.len(),
            bounds,
            s.two_theta_max
        );

        let planes: Vec<Vec<Reflection>> = (-bounds[0]..=bounds[0])
            .into_par_iter()
            .map(|h| {
                self.cancel.check()?;
                Ok(self.reflections_in_plane(h, bounds, &cell, &scatterers))
            })
            .collect::<Result<_>>()?;

        let mut reflections: Vec<Reflection> = planes.into_iter().flatten().collect();
        reflections.sort_by(|a, b| {
            a.two_theta
                .total_cmp(&b.two_theta)
                .then_with(|| a.hkl.cmp(&b.hkl))
        });
        let raw_count = reflections.len();

        let mut peaks = merge_reflections(reflections, s.merge_tolerance);
        normalize_and_cut(&mut peaks, s.intensity_cutoff);

        log::info!(
            "xrd: {} reflections merged into {} peaks for {}",
            raw_count,
            peaks.len(),
            crystal.name
        );

        Ok(XrdPattern {
            peaks,
            wavelength: s.wavelength,
            structure_name: crystal.name.clone(),
            unknown_species: unknown_species.into_iter().collect(),
        })
    }

    /// |h_i| ≤ |a_i| / d_min
    fn index_bounds(&self, cell: &CellGeometry) -> Result<[i32; 3]> {
        let s = &self.settings;
        let theta_max = (s.two_theta_max / 2.0).to_radians();
        let d_min = s.wavelength / (2.0 * theta_max.sin());

        let mut bounds = [0; 3];
        for (bound, length) in bounds.iter_mut().zip(cell.lengths()) {
            let n = (length / d_min).ceil();
            if n > s.max_index as f64 {
                return Err(CrystanError::ComputeTimeout {
                    reason: format!(
                        "Miller index bound {} exceeds the limit of {} (d_min = {:.4} Å)",
                        n, s.max_index, d_min
                    ),
                });
            }
            *bound = n as i32;
        }
        Ok(bounds)
    }

    fn reflections_in_plane(
        &self,
        h: i32,
        bounds: [i32; 3],
        cell: &CellGeometry,
        scatterers: &[Scatterer],
    ) -> Vec<Reflection> {
        let s = &self.settings;
        let recip = cell.reciprocal();
        let mut out = Vec::new();

        for k in -bounds[1]..=bounds[1] {
            for l in -bounds[2]..=bounds[2] {
                if h == 0 && k == 0 && l == 0 {
                    continue;
                }
                let hkl = Vector3::new(h as f64, k as f64, l as f64);
                let g = (recip * hkl).norm();
                let d = 2.0 * PI / g;

                let sin_theta = s.wavelength / (2.0 * d);
                if !(-1.0..=1.0).contains(&sin_theta) {
                    continue;
                }
                let theta = sin_theta.asin();
                let two_theta = 2.0 * theta.to_degrees();
                if two_theta < s.two_theta_min || two_theta > s.two_theta_max {
                    continue;
                }

                let lp = match lorentz_polarization(theta) {
                    Some(lp) => lp,
                    None => continue,
                };

                let sin_over_lambda = sin_theta / s.wavelength;
                let f_sq = structure_factor_sq(scatterers, &hkl, sin_over_lambda, s.b_factor);
                if f_sq < EXTINCTION_THRESHOLD {
                    continue;
                }

                out.push(Reflection {
                    two_theta,
                    d_spacing: d,
                    intensity: f_sq * lp,
                    hkl: [h, k, l],
                });
            }
        }
        out
    }
}

/// |F|²，相位 2π(hx + ky + lz)
fn structure_factor_sq(
    scatterers: &[Scatterer],
    hkl: &Vector3<f64>,
    sin_over_lambda: f64,
    b_factor: f64,
) -> f64 {
    let debye_waller = (-b_factor * sin_over_lambda * sin_over_lambda).exp();
    let (mut re, mut im) = (0.0, 0.0);
    for atom in scatterers {
        let f = atom.form_factor(sin_over_lambda) * debye_waller;
        let phase = 2.0 * PI * hkl.dot(&atom.position);
        re += f * phase.cos();
        im += f * phase.sin();
    }
    re * re + im * im
}

/// θ 为 0° 或 90° 时无定义，返回 `None`
fn lorentz_polarization(theta: f64) -> Option<f64> {
    let sin_theta = theta.sin();
    let cos_theta = theta.cos();
    if sin_theta.abs() < 1e-10 || cos_theta.abs() < 1e-10 {
        return None;
    }
    let cos_2theta = (2.0 * theta).cos();
    Some((1.0 + cos_2theta * cos_2theta) / (sin_theta * sin_theta * cos_theta))
}

/// 按 2θ 顺序聚类：与簇内第一个反射相差小于容差者并入该簇
///
/// 簇的位置取第一个反射的 2θ，因此相邻输出峰的间隔不小于容差。
fn merge_reflections(reflections: Vec<Reflection>, tolerance: f64) -> Vec<Peak> {
    let mut peaks: Vec<Peak> = Vec::new();
    for r in reflections {
        match peaks.last_mut() {
            Some(last) if r.two_theta - last.two_theta < tolerance => {
                last.intensity += r.intensity;
                last.hkl.push(r.hkl);
            }
            _ => peaks.push(Peak {
                two_theta: r.two_theta,
                d_spacing: r.d_spacing,
                intensity: r.intensity,
                hkl: vec![r.hkl],
                multiplicity: 0,
            }),
        }
    }

    for peak in &mut peaks {
        peak.hkl.sort_by_key(|&idx| hkl_rank(idx));
        peak.multiplicity = peak.hkl.len();
    }
    peaks
}

fn hkl_rank(hkl: [i32; 3]) -> (usize, std::cmp::Reverse<[i32; 3]>) {
    let negatives = hkl.iter().filter(|&&x| x < 0).count();
    (negatives, std::cmp::Reverse(hkl))
}

fn normalize_and_cut(peaks: &mut Vec<Peak>, cutoff: f64) {
    let max_i = peaks.iter().map(|p| p.intensity).fold(0.0_f64, f64::max);
    if max_i <= 0.0 {
        peaks.clear();
        return;
    }
    for p in peaks.iter_mut() {
        p.intensity = 100.0 * p.intensity / max_i;
    }
    peaks.retain(|p| p.intensity >= 100.0 * cutoff);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Atom, Lattice};

    fn rocksalt() -> Crystal {
        let mut atoms = Vec::new();
        for f in [[0.0, 0.0, 0.0], [0.5, 0.5, 0.0], [0.5, 0.0, 0.5], [0.0, 0.5, 0.5]] {
            atoms.push(Atom::new("Na", f));
            atoms.push(Atom::new("Cl", [(f[0] + 0.5) % 1.0, f[1], f[2]]));
        }
        Crystal::new("NaCl", Lattice::cubic(5.64), atoms)
    }

    #[test]
    fn test_simple_cubic_first_peak() {
        let crystal = Crystal::new("X", Lattice::cubic(4.0), vec![Atom::new("X", [0.0; 3])]);
        let pattern = XrdCalculator::default().calculate(&crystal).unwrap();

        let first = &pattern.peaks[0];
        // Bragg: 2θ = 2 asin(λ / 2a) = 22.207°
        assert!((first.two_theta - 22.24).abs() < 0.05, "got {}", first.two_theta);
        assert!((first.d_spacing - 4.0).abs() < 1e-9);
        assert_eq!(first.primary_hkl(), [1, 0, 0]);
        assert_eq!(first.multiplicity, 6);
        assert_eq!(pattern.unknown_species, vec!["X".to_string()]);
    }

    #[test]
    fn test_peaks_sorted_and_separated() {
        let settings = XrdSettings::default();
        let pattern = XrdCalculator::new(settings).calculate(&rocksalt()).unwrap();
        assert!(!pattern.peaks.is_empty());

        for pair in pattern.peaks.windows(2) {
            assert!(pair[1].two_theta > pair[0].two_theta);
            assert!(pair[1].two_theta - pair[0].two_theta >= settings.merge_tolerance);
        }
        let max = pattern.peaks.iter().map(|p| p.intensity).fold(0.0, f64::max);
        assert!((max - 100.0).abs() < 1e-9);
        assert!(pattern.peaks.iter().all(|p| p.intensity >= 100.0 * settings.intensity_cutoff));
    }

    #[test]
    fn test_fcc_extinctions() {
        let pattern = XrdCalculator::default().calculate(&rocksalt()).unwrap();
        for peak in &pattern.peaks {
            for &[h, k, l] in &peak.hkl {
                let all_even = h % 2 == 0 && k % 2 == 0 && l % 2 == 0;
                let all_odd = h % 2 != 0 && k % 2 != 0 && l % 2 != 0;
                assert!(all_even || all_odd, "forbidden reflection {:?}", [h, k, l]);
            }
        }
        // (200) 是岩盐结构的最强峰
        assert_eq!(pattern.strongest(1)[0].primary_hkl(), [2, 0, 0]);
    }

    #[test]
    fn test_debye_waller_damps_high_angles() {
        let crystal = rocksalt();
        let cold = XrdCalculator::default().calculate(&crystal).unwrap();
        let hot = XrdCalculator::new(XrdSettings {
            b_factor: 2.0,
            ..XrdSettings::default()
        })
        .calculate(&crystal)
        .unwrap();

        let last = |p: &XrdPattern| p.peaks.last().map(|x| x.intensity).unwrap_or(0.0);
        assert!(last(&hot) < last(&cold));
    }

    #[test]
    fn test_index_bound_exceeded() {
        let crystal = Crystal::new("big", Lattice::cubic(200.0), vec![Atom::new("C", [0.0; 3])]);
        let result = XrdCalculator::default().calculate(&crystal);
        assert!(matches!(result, Err(CrystanError::ComputeTimeout { .. })));
    }

    #[test]
    fn test_invalid_settings() {
        let crystal = rocksalt();
        let bad_range = XrdSettings::default().with_range(90.0, 10.0);
        assert!(XrdCalculator::new(bad_range).calculate(&crystal).is_err());
        let bad_lambda = XrdSettings::default().with_wavelength(0.0);
        assert!(matches!(
            XrdCalculator::new(bad_lambda).calculate(&crystal),
            Err(CrystanError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_zero_merge_tolerance_rejected() {
        for tolerance in [0.0, -0.01, f64::NAN] {
            let settings = XrdSettings {
                merge_tolerance: tolerance,
                ..XrdSettings::default()
            };
            assert!(matches!(
                XrdCalculator::new(settings).calculate(&rocksalt()),
                Err(CrystanError::InvalidArgument(_))
            ));
        }
    }

    #[test]
    fn test_tiny_merge_tolerance_keeps_strict_order() {
        let crystal = Crystal::new("Cu", Lattice::cubic(3.615), {
            [[0.0, 0.0, 0.0], [0.5, 0.5, 0.0], [0.5, 0.0, 0.5], [0.0, 0.5, 0.5]]
                .into_iter()
                .map(|p| Atom::new("Cu", p))
                .collect()
        });
        let settings = XrdSettings {
            merge_tolerance: 1e-9,
            ..XrdSettings::default()
        };
        let pattern = XrdCalculator::new(settings).calculate(&crystal).unwrap();
        assert!(!pattern.peaks.is_empty());
        for pair in pattern.peaks.windows(2) {
            assert!(pair[1].two_theta > pair[0].two_theta);
        }
        // 等价面族仍并入同一个峰
        assert_eq!(pattern.peaks[0].primary_hkl(), [1, 1, 1]);
        assert_eq!(pattern.peaks[0].multiplicity, 8);
    }

    #[test]
    fn test_heavy_element_scattering() {
        // CsCl 型：(100) 强度正比于 (f_Cs - f_I)²，两者都按真实散射因子计算时很弱
        let crystal = Crystal::new(
            "CsI",
            Lattice::cubic(4.567),
            vec![Atom::new("Cs", [0.0; 3]), Atom::new("I", [0.5, 0.5, 0.5])],
        );
        let settings = XrdSettings {
            intensity_cutoff: 0.0,
            ..XrdSettings::default()
        };
        let pattern = XrdCalculator::new(settings).calculate(&crystal).unwrap();
        assert!(pattern.unknown_species.is_empty());
        assert_eq!(pattern.strongest(1)[0].primary_hkl(), [1, 1, 0]);
        let first = &pattern.peaks[0];
        assert_eq!(first.primary_hkl(), [1, 0, 0]);
        assert!(first.intensity > 0.0 && first.intensity < 1.0, "(100) = {}", first.intensity);
    }

    #[test]
    fn test_untabulated_element_uses_atomic_number() {
        let crystal = Crystal::new("Es", Lattice::cubic(4.0), vec![Atom::new("Es", [0.0; 3])]);
        let pattern = XrdCalculator::default().calculate(&crystal).unwrap();
        assert_eq!(pattern.unknown_species, vec!["Es".to_string()]);
        assert_eq!(pattern.peaks[0].primary_hkl(), [1, 0, 0]);
    }

    #[test]
    fn test_cancelled_before_start() {
        let token = CancelToken::new();
        token.cancel();
        let result = XrdCalculator::default()
            .with_cancel(token)
            .calculate(&rocksalt());
        assert!(matches!(result, Err(CrystanError::Cancelled)));
    }
}
