//! # 探针与候选离子目录
//!
//! 气体探针半径取自吸附实验的动力学直径的一半；离子半径为 Shannon (1976)
//! 六配位数值。名称匹配忽略大小写，并接受 ASCII 写法（`N2`, `CO2`, `Li+`, `Mg2+`）。

use crate::error::{CrystanError, Result};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// 命名探针
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Probe {
    pub name: &'static str,
    /// ASCII 别名
    #[serde(skip)]
    pub alias: &'static str,
    /// 半径（Å）
    pub radius: f64,
}

const fn probe(name: &'static str, alias: &'static str, radius: f64) -> Probe {
    Probe {
        name,
        alias,
        radius,
    }
}

/// 气体分子探针
pub const GAS_PROBES: &[Probe] = &[
    probe("He", "He", 1.20),
    probe("H₂", "H2", 1.45),
    probe("H₂O", "H2O", 1.32),
    probe("CO₂", "CO2", 1.65),
    probe("N₂", "N2", 1.82),
    probe("O₂", "O2", 1.73),
    probe("Ar", "Ar", 1.70),
    probe("Kr", "Kr", 1.80),
    probe("CH₄", "CH4", 1.90),
    probe("C₂H₆", "C2H6", 2.20),
    probe("Geometric", "geometric", 0.00),
];

/// 插层离子
pub const CANDIDATE_IONS: &[Probe] = &[
    probe("Li⁺", "Li+", 0.76),
    probe("Mg²⁺", "Mg2+", 0.72),
    probe("Zn²⁺", "Zn2+", 0.74),
    probe("Al³⁺", "Al3+", 0.54),
    probe("Na⁺", "Na+", 1.02),
    probe("Ca²⁺", "Ca2+", 1.00),
    probe("Fe²⁺", "Fe2+", 0.78),
    probe("Co²⁺", "Co2+", 0.75),
    probe("Ni²⁺", "Ni2+", 0.69),
    probe("K⁺", "K+", 1.38),
    probe("Rb⁺", "Rb+", 1.52),
    probe("Cs⁺", "Cs+", 1.67),
    probe("F⁻", "F-", 1.33),
    probe("Cl⁻", "Cl-", 1.81),
    probe("O²⁻", "O2-", 1.40),
    probe("S²⁻", "S2-", 1.84),
];

/// 按名称查找探针（先气体后离子）
pub fn find_probe(name: &str) -> Option<Probe> {
    let name = name.trim();
    GAS_PROBES
        .iter()
        .chain(CANDIDATE_IONS.iter())
        .find(|p| p.name == name || p.alias.eq_ignore_ascii_case(name))
        .copied()
}

/// 解析 `--probe` 取值：探针名或以 Å 为单位的数值
pub fn parse_probe(input: &str) -> Result<f64> {
    if let Some(p) = find_probe(input) {
        return Ok(p.radius);
    }
    match input.trim().parse::<f64>() {
        Ok(r) if r >= 0.0 && r.is_finite() => Ok(r),
        _ => Err(CrystanError::InvalidArgument(format!(
            "unknown probe '{}': use a radius in Å or one of {}",
            input,
            GAS_PROBES
                .iter()
                .chain(CANDIDATE_IONS.iter())
                .map(|p| p.alias)
                .collect::<Vec<_>>()
                .join(", ")
        ))),
    }
}

/// 半径不超过 `radius` 的候选离子，按半径升序
pub fn ions_fitting(radius: f64) -> Vec<Probe> {
    let mut fits: Vec<Probe> = CANDIDATE_IONS
        .iter()
        .filter(|ion| ion.radius <= radius)
        .copied()
        .collect();
    fits.sort_by(|a, b| a.radius.total_cmp(&b.radius));
    fits
}

/// 原子半径来源
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RadiusSet {
    /// Van der Waals radii (Alvarez 2013)
    #[default]
    #[value(name = "vdw")]
    VanDerWaals,
    /// Shannon ionic radii, suited to oxides and halides
    Ionic,
    /// Covalent radii
    Covalent,
}

impl std::fmt::Display for RadiusSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RadiusSet::VanDerWaals => write!(f, "vdw"),
            RadiusSet::Ionic => write!(f, "ionic"),
            RadiusSet::Covalent => write!(f, "covalent"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_and_aliases() {
        assert_eq!(parse_probe("He").unwrap(), 1.20);
        assert_eq!(parse_probe("n2").unwrap(), 1.82);
        assert_eq!(parse_probe("CO₂").unwrap(), 1.65);
        assert_eq!(parse_probe("Li+").unwrap(), 0.76);
        assert_eq!(parse_probe("Na⁺").unwrap(), 1.02);
        assert_eq!(parse_probe("mg2+").unwrap(), 0.72);
        assert_eq!(parse_probe("0.9").unwrap(), 0.9);
    }

    #[test]
    fn test_bad_probe() {
        assert!(parse_probe("unobtainium").is_err());
        assert!(parse_probe("-1").is_err());
    }

    #[test]
    fn test_fitting_ions_sorted() {
        let fits = ions_fitting(0.75);
        let names: Vec<&str> = fits.iter().map(|p| p.alias).collect();
        assert_eq!(names, vec!["Al3+", "Ni2+", "Mg2+", "Zn2+", "Co2+"]);
        assert!(ions_fitting(0.1).is_empty());
        assert_eq!(ions_fitting(f64::INFINITY).len(), CANDIDATE_IONS.len());
    }
}
