//! # 峰形展宽
//!
//! 把离散峰卷积成等步长的连续曲线，再归一化到 0–100。
//!
//! - Gaussian: σ = FWHM / (2√(2 ln 2))
//! - Lorentzian: γ = FWHM / 2
//! - Pseudo-Voigt: η·L + (1-η)·G，η 默认 0.5
//!
//! ## 依赖关系
//! - 被 `commands/analyze/xrd.rs` 调用
//! - `Profile` 同时作为 CLI 的 `--broadening` 取值

use crate::error::{CrystanError, Result};
use crate::xrd::Peak;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// 弱于此相对强度的峰不参与展宽
const MIN_PEAK_INTENSITY: f64 = 0.1;

/// 峰形
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Profile {
    /// No broadening (stick pattern)
    #[default]
    None,
    /// Gaussian broadening
    Gaussian,
    /// Lorentzian broadening
    Lorentzian,
    /// Pseudo-Voigt (eta Lorentzian + (1 - eta) Gaussian)
    PseudoVoigt,
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Profile::None => write!(f, "none"),
            Profile::Gaussian => write!(f, "gaussian"),
            Profile::Lorentzian => write!(f, "lorentzian"),
            Profile::PseudoVoigt => write!(f, "pseudo-voigt"),
        }
    }
}

/// 展宽参数
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BroadeningSettings {
    pub profile: Profile,
    /// 半高全宽（度 2θ）
    pub fwhm: f64,
    /// 输出步长（度 2θ）
    pub step: f64,
    /// Pseudo-Voigt 中 Lorentzian 的比例
    pub eta: f64,
}

impl Default for BroadeningSettings {
    fn default() -> Self {
        Self {
            profile: Profile::None,
            fwhm: 0.1,
            step: 0.02,
            eta: 0.5,
        }
    }
}

impl BroadeningSettings {
    pub fn validate(&self) -> Result<()> {
        if self.fwhm <= 0.0 || self.step <= 0.0 {
            return Err(CrystanError::InvalidArgument(format!(
                "FWHM and step must be positive (fwhm = {}, step = {})",
                self.fwhm, self.step
            )));
        }
        if !(0.0..=1.0).contains(&self.eta) {
            return Err(CrystanError::InvalidArgument(format!(
                "pseudo-Voigt mixing must lie in [0, 1], got {}",
                self.eta
            )));
        }
        Ok(())
    }

    /// 单位峰高的峰形函数在偏移 `delta` 处的值
    fn shape(&self, delta: f64) -> f64 {
        let sigma = self.fwhm / (2.0 * (2.0 * 2.0_f64.ln()).sqrt());
        let gamma = self.fwhm / 2.0;
        let gauss = || (-delta * delta / (2.0 * sigma * sigma)).exp();
        let lorentz = || gamma * gamma / (delta * delta + gamma * gamma);

        match self.profile {
            Profile::None => 0.0,
            Profile::Gaussian => gauss(),
            Profile::Lorentzian => lorentz(),
            Profile::PseudoVoigt => self.eta * lorentz() + (1.0 - self.eta) * gauss(),
        }
    }
}

/// 在 [min, max] 上生成展宽曲线
pub fn broaden(
    peaks: &[Peak],
    two_theta_min: f64,
    two_theta_max: f64,
    settings: &BroadeningSettings,
) -> Result<Vec<(f64, f64)>> {
    settings.validate()?;
    if two_theta_max <= two_theta_min {
        return Err(CrystanError::InvalidRange(format!(
            "{}-{}",
            two_theta_min, two_theta_max
        )));
    }

    let n_points = ((two_theta_max - two_theta_min) / settings.step).ceil() as usize + 1;
    let mut curve: Vec<(f64, f64)> = (0..n_points)
        .map(|i| (two_theta_min + i as f64 * settings.step, 0.0))
        .collect();

    for peak in peaks.iter().filter(|p| p.intensity >= MIN_PEAK_INTENSITY) {
        for (two_theta, intensity) in curve.iter_mut() {
            *intensity += peak.intensity * settings.shape(*two_theta - peak.two_theta);
        }
    }

    let max_intensity = curve.iter().map(|(_, i)| *i).fold(0.0_f64, f64::max);
    if max_intensity > 0.0 {
        for (_, intensity) in curve.iter_mut() {
            *intensity *= 100.0 / max_intensity;
        }
    }

    Ok(curve)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_peak() -> Vec<Peak> {
        vec![Peak {
            two_theta: 30.0,
            d_spacing: 2.97,
            intensity: 100.0,
            hkl: vec![[1, 1, 1]],
            multiplicity: 1,
        }]
    }

    fn value_at(curve: &[(f64, f64)], x: f64) -> f64 {
        curve
            .iter()
            .min_by(|a, b| (a.0 - x).abs().total_cmp(&(b.0 - x).abs()))
            .map(|p| p.1)
            .unwrap()
    }

    #[test]
    fn test_half_maximum_at_half_width() {
        for profile in [Profile::Gaussian, Profile::Lorentzian, Profile::PseudoVoigt] {
            let settings = BroadeningSettings {
                profile,
                fwhm: 0.4,
                step: 0.01,
                ..Default::default()
            };
            let curve = broaden(&single_peak(), 25.0, 35.0, &settings).unwrap();
            assert!((value_at(&curve, 30.0) - 100.0).abs() < 1e-6);
            let half = value_at(&curve, 30.2);
            assert!((half - 50.0).abs() < 1.0, "{}: {}", profile, half);
        }
    }

    #[test]
    fn test_lorentzian_has_heavier_tails() {
        let make = |profile| BroadeningSettings {
            profile,
            ..Default::default()
        };
        let g = broaden(&single_peak(), 25.0, 35.0, &make(Profile::Gaussian)).unwrap();
        let l = broaden(&single_peak(), 25.0, 35.0, &make(Profile::Lorentzian)).unwrap();
        assert!(value_at(&l, 31.0) > value_at(&g, 31.0));
    }

    #[test]
    fn test_rejects_bad_width() {
        let settings = BroadeningSettings {
            profile: Profile::Gaussian,
            fwhm: 0.0,
            ..Default::default()
        };
        assert!(broaden(&single_peak(), 25.0, 35.0, &settings).is_err());
    }
}
