//! # 键价和
//!
//! Vᵢ = Σⱼ exp((R₀ − dᵢⱼ) / B)，对截断半径内的所有周期镜像求和。
//! 与理想氧化态（绝对值）比较，按平均偏差评估结构的化学合理性。
//!
//! ## 子模块
//! - `database`: R₀ 参数与理想氧化态
//!
//! ## 依赖关系
//! - 被 `commands/analyze/bvs.rs` 与 `engine/` 使用
//! - 使用 `lattice/` 的周期镜像范围

pub mod database;

use crate::engine::CancelToken;
use crate::error::{CrystanError, Result};
use crate::lattice::{wrap_fractional, CellGeometry};
use crate::models::Crystal;

use nalgebra::Vector3;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

/// 键价计算设置
#[derive(Debug, Clone, Copy)]
pub struct BondValenceSettings {
    /// 截断半径（Å）
    pub cutoff: f64,
    /// 比它更近的原子对视为重叠并跳过（Å）
    pub min_distance: f64,
}

impl Default for BondValenceSettings {
    fn default() -> Self {
        Self {
            cutoff: 4.0,
            min_distance: 0.2,
        }
    }
}

impl BondValenceSettings {
    pub fn with_cutoff(mut self, cutoff: f64) -> Self {
        self.cutoff = cutoff;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.cutoff.is_finite() && self.cutoff > 0.0) {
            return Err(CrystanError::InvalidArgument(format!(
                "bond valence cutoff must be positive, got {}",
                self.cutoff
            )));
        }
        if !(self.min_distance >= 0.0 && self.min_distance < self.cutoff) {
            return Err(CrystanError::InvalidArgument(format!(
                "minimum bond distance must lie in [0, {}), got {}",
                self.cutoff, self.min_distance
            )));
        }
        Ok(())
    }
}

/// 按平均偏差划分的结构质量
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BondValenceQuality {
    Excellent,
    Good,
    Acceptable,
    Poor,
}

impl BondValenceQuality {
    /// 阈值 0.15 / 0.25 / 0.40 价单位
    pub fn from_deviation(deviation: f64) -> Self {
        if deviation < 0.15 {
            BondValenceQuality::Excellent
        } else if deviation < 0.25 {
            BondValenceQuality::Good
        } else if deviation < 0.40 {
            BondValenceQuality::Acceptable
        } else {
            BondValenceQuality::Poor
        }
    }
}

impl fmt::Display for BondValenceQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BondValenceQuality::Excellent => "excellent",
            BondValenceQuality::Good => "good",
            BondValenceQuality::Acceptable => "acceptable",
            BondValenceQuality::Poor => "poor",
        };
        write!(f, "{}", name)
    }
}

/// 单个位点的键价和
#[derive(Debug, Clone, Serialize)]
pub struct SiteValence {
    pub index: usize,
    pub element: String,
    pub bvs: f64,
    /// 理想氧化态绝对值
    pub expected: Option<f64>,
    /// |bvs − expected|
    pub deviation: Option<f64>,
    /// 计入的键数
    pub bonds: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct BondValenceReport {
    pub sites: Vec<SiteValence>,
    pub cutoff: f64,
    /// 有理想氧化态的位点数
    pub validated: usize,
    pub mean_deviation: Option<f64>,
    pub max_deviation: Option<f64>,
    pub quality: Option<BondValenceQuality>,
    /// 截断半径内出现、但没有 R₀ 参数的阳离子-阴离子对
    pub missing_pairs: Vec<(String, String)>,
}

#[derive(Debug, Clone, Default)]
pub struct BondValenceAnalyzer {
    settings: BondValenceSettings,
    cancel: CancelToken,
}

impl BondValenceAnalyzer {
    pub fn new(settings: BondValenceSettings) -> Self {
        Self {
            settings,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn analyze(&self, crystal: &Crystal) -> Result<BondValenceReport> {
        let s = self.settings;
        s.validate()?;
        crystal.validate()?;
        if crystal.atoms.is_empty() {
            return Err(CrystanError::InvalidStructure {
                reason: "structure contains no atoms".to_string(),
            });
        }
        let cell = CellGeometry::new(&crystal.lattice)?;
        let range = cell.shell_range(s.cutoff);
        let positions: Vec<Vector3<f64>> = crystal
            .atoms
            .iter()
            .map(|atom| wrap_fractional(&Vector3::from(atom.position)))
            .collect();

        let per_site: Vec<(SiteValence, BTreeSet<(String, String)>)> = (0..crystal.atoms.len())
            .into_par_iter()
            .map(|i| {
                self.cancel.check()?;
                let element = &crystal.atoms[i].element;
                let mut bvs = 0.0;
                let mut bonds = 0;
                let mut missing = BTreeSet::new();

                for (j, other) in crystal.atoms.iter().enumerate() {
                    let d = (positions[j] - positions[i]).map(|x| x - x.round());
                    let r0 = database::r0(element, &other.element);
                    for a in -range[0]..=range[0] {
                        for b in -range[1]..=range[1] {
                            for c in -range[2]..=range[2] {
                                let shift = Vector3::new(a as f64, b as f64, c as f64);
                                let r = cell.to_cartesian(&(d + shift)).norm();
                                if r < s.min_distance || r > s.cutoff {
                                    continue;
                                }
                                match r0 {
                                    Some(r0) => {
                                        bvs += ((r0 - r) / database::SOFTNESS).exp();
                                        bonds += 1;
                                    }
                                    None if database::is_cation_anion_pair(element, &other.element) => {
                                        let pair = if database::is_anion(element) {
                                            (other.element.clone(), element.clone())
                                        } else {
                                            (element.clone(), other.element.clone())
                                        };
                                        missing.insert(pair);
                                    }
                                    None => {}
                                }
                            }
                        }
                    }
                }

                let expected = database::expected_valence(element);
                let site = SiteValence {
                    index: i,
                    element: element.clone(),
                    bvs,
                    expected,
                    deviation: expected.map(|v| (bvs - v).abs()),
                    bonds,
                };
                Ok((site, missing))
            })
            .collect::<Result<_>>()?;

        let mut missing_pairs = BTreeSet::new();
        let mut sites = Vec::with_capacity(per_site.len());
        for (site, missing) in per_site {
            missing_pairs.extend(missing);
            sites.push(site);
        }

        let deviations: Vec<f64> = sites.iter().filter_map(|site| site.deviation).collect();
        let validated = deviations.len();
        let mean_deviation = (validated > 0).then(|| deviations.iter().sum::<f64>() / validated as f64);
        let max_deviation = deviations.iter().copied().reduce(f64::max);
        let quality = mean_deviation.map(BondValenceQuality::from_deviation);

        if !missing_pairs.is_empty() {
            log::warn!("bond valence: {} element pair(s) without R0 parameters", missing_pairs.len());
        }
        log::info!(
            "bond valence for {}: {} sites, {} validated, mean deviation {:?}",
            crystal.name,
            sites.len(),
            validated,
            mean_deviation
        );

        Ok(BondValenceReport {
            sites,
            cutoff: s.cutoff,
            validated,
            mean_deviation,
            max_deviation,
            quality,
            missing_pairs: missing_pairs.into_iter().collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Atom, Lattice};

    fn rocksalt(a: f64, cation: &str, anion: &str) -> Crystal {
        let mut atoms = Vec::new();
        for p in [[0.0, 0.0, 0.0], [0.0, 0.5, 0.5], [0.5, 0.0, 0.5], [0.5, 0.5, 0.0]] {
            atoms.push(Atom::new(cation, p));
            atoms.push(Atom::new(anion, [(p[0] + 0.5) % 1.0, p[1], p[2]]));
        }
        Crystal::new(format!("{}{}", cation, anion), Lattice::cubic(a), atoms)
    }

    #[test]
    fn test_rocksalt_nacl() {
        let report = BondValenceAnalyzer::default().analyze(&rocksalt(5.64, "Na", "Cl")).unwrap();
        // 6 个 2.82 Å 的 Na-Cl 键；下一壳层 4.88 Å 在截断之外
        let expected = 6.0 * ((2.237f64 - 2.82) / 0.37).exp();
        for site in &report.sites {
            assert_eq!(site.bonds, 6, "site {}", site.index);
            assert!((site.bvs - expected).abs() < 1e-9, "{} bvs {}", site.element, site.bvs);
        }
        assert_eq!(report.validated, 8);
        assert!(report.missing_pairs.is_empty());
        // 平均偏差约 0.24
        assert_eq!(report.quality, Some(BondValenceQuality::Good));
    }

    #[test]
    fn test_periclase_is_excellent() {
        let report = BondValenceAnalyzer::default().analyze(&rocksalt(4.212, "Mg", "O")).unwrap();
        for site in &report.sites {
            // 6 个 2.106 Å 键加 8 个 3.648 Å 键
            assert_eq!(site.bonds, 14);
            assert!((site.bvs - 2.0).abs() < 0.05, "{} bvs {}", site.element, site.bvs);
        }
        assert_eq!(report.quality, Some(BondValenceQuality::Excellent));
        assert!(report.max_deviation.unwrap() < 0.05);
    }

    #[test]
    fn test_missing_parameters_reported() {
        let crystal = Crystal::new(
            "EuN",
            Lattice::cubic(3.0),
            vec![Atom::new("Eu", [0.0, 0.0, 0.0]), Atom::new("N", [0.5, 0.5, 0.5])],
        );
        let report = BondValenceAnalyzer::default().analyze(&crystal).unwrap();
        assert_eq!(report.missing_pairs, vec![("Eu".to_string(), "N".to_string())]);
        assert_eq!(report.sites[0].bonds, 0);
        assert_eq!(report.sites[0].bvs, 0.0);
    }

    #[test]
    fn test_unknown_valence_not_validated() {
        let crystal = Crystal::new("Ar", Lattice::cubic(5.26), vec![Atom::new("Ar", [0.0, 0.0, 0.0])]);
        let report = BondValenceAnalyzer::default().analyze(&crystal).unwrap();
        assert_eq!(report.validated, 0);
        assert_eq!(report.mean_deviation, None);
        assert_eq!(report.quality, None);
        assert_eq!(report.sites[0].deviation, None);
    }

    #[test]
    fn test_quality_thresholds() {
        assert_eq!(BondValenceQuality::from_deviation(0.10), BondValenceQuality::Excellent);
        assert_eq!(BondValenceQuality::from_deviation(0.20), BondValenceQuality::Good);
        assert_eq!(BondValenceQuality::from_deviation(0.30), BondValenceQuality::Acceptable);
        assert_eq!(BondValenceQuality::from_deviation(0.50), BondValenceQuality::Poor);
    }

    #[test]
    fn test_invalid_settings() {
        assert!(BondValenceSettings::default().with_cutoff(0.0).validate().is_err());
        assert!(BondValenceSettings::default().with_cutoff(f64::NAN).validate().is_err());
        let inverted = BondValenceSettings {
            cutoff: 1.0,
            min_distance: 2.0,
        };
        assert!(inverted.validate().is_err());
    }
}
