//! # 能带 k 路径生成
//!
//! 由对称分析得到 Bravais 类型，按 Setyawan–Curtarolo 约定选出晶格变体，
//! 给出高对称点（标准原胞倒格基的分数坐标与笛卡尔坐标）、推荐路径和布里渊区线框。
//!
//! ## 子模块
//! - `catalogue`: 25 种变体的高对称点与路径
//! - `standard`: 惯用胞整理与变体判定
//! - `brillouin`: Wigner–Seitz 线框与占位盒子
//!
//! ## 依赖关系
//! - 被 `commands/analyze/kpath.rs` 与 `engine/` 使用
//! - 使用 `symmetry/` 的分析结果（先调用，再把结果传下去）
//! - 使用 `lattice::CellGeometry` 计算倒格子

pub mod brillouin;
pub mod catalogue;
pub mod standard;

pub use brillouin::Wireframe;
pub use catalogue::{CellParams, LatticeVariant};

use crate::engine::CancelToken;
use crate::error::{CrystanError, Result};
use crate::lattice::{self, CellGeometry};
use crate::models::Crystal;
use crate::symmetry::{BravaisLattice, CrystalSystem, SymmetryAnalyzer, SymmetryInfo, SymmetrySettings};

use nalgebra::Vector3;
use serde::Serialize;
use std::fmt::Write as _;

/// 高对称点
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KPoint {
    pub label: String,
    /// 标准原胞倒格基下的分数坐标
    pub fractional: [f64; 3],
    /// 笛卡尔坐标（Å⁻¹，含 2π）
    pub cartesian: [f64; 3],
}

/// k 路径结果
#[derive(Debug, Clone, Serialize)]
pub struct KPath {
    pub structure_name: String,
    pub space_group_number: u16,
    pub hm_symbol: String,
    pub bravais: BravaisLattice,
    pub variant: LatticeVariant,
    /// 变体参数（η, ζ, ν, …）
    pub parameters: Vec<(String, f64)>,
    /// 该变体的全部高对称点
    pub points: Vec<KPoint>,
    /// 连续分支，每个分支为依次经过的点名
    pub branches: Vec<Vec<String>>,
    /// 标准惯用胞（行向量）
    pub conventional_lattice: [[f64; 3]; 3],
    /// 标准原胞（行向量）
    pub primitive_lattice: [[f64; 3]; 3],
    /// 原胞倒格子（行向量，含 2π）
    pub reciprocal_lattice: [[f64; 3]; 3],
    pub wireframe: Wireframe,
}

impl KPath {
    pub fn point(&self, label: &str) -> Option<&KPoint> {
        self.points.iter().find(|p| p.label == label)
    }

    /// 相邻点对
    pub fn segments(&self) -> Vec<(&str, &str)> {
        self.branches
            .iter()
            .flat_map(|branch| branch.windows(2).map(|w| (w[0].as_str(), w[1].as_str())))
            .collect()
    }

    /// 按路径顺序展开的点（分支之间不插入分隔）
    pub fn path_points(&self) -> Vec<&KPoint> {
        self.branches
            .iter()
            .flatten()
            .filter_map(|label| self.point(label))
            .collect()
    }

    /// 线框只是占位时返回对应的提示错误
    pub fn visualization_warning(&self) -> Option<CrystanError> {
        (!self.wireframe.exact).then(|| CrystanError::UnsupportedLatticeVisualization {
            bravais: format!("{} ({})", self.bravais, self.variant),
        })
    }

    /// VASP 线模式 KPOINTS 文本
    pub fn to_line_mode_kpoints(&self, divisions: usize) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "k-path for {} ({})", self.structure_name, self.variant);
        let _ = writeln!(out, "{}", divisions);
        let _ = writeln!(out, "Line-mode");
        let _ = writeln!(out, "Reciprocal");
        for (start, end) in self.segments() {
            for label in [start, end] {
                if let Some(p) = self.point(label) {
                    let _ = writeln!(
                        out,
                        "{:12.8} {:12.8} {:12.8} ! {}",
                        p.fractional[0], p.fractional[1], p.fractional[2], p.label
                    );
                }
            }
            out.push('\n');
        }
        out
    }
}

/// k 路径生成器
pub struct KPathGenerator {
    settings: SymmetrySettings,
    cancel: CancelToken,
}

impl Default for KPathGenerator {
    fn default() -> Self {
        Self::new(SymmetrySettings::default())
    }
}

impl KPathGenerator {
    pub fn new(settings: SymmetrySettings) -> Self {
        Self {
            settings,
            cancel: CancelToken::default(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// 先做对称分析，再生成路径
    pub fn generate(&self, crystal: &Crystal) -> Result<KPath> {
        let info = SymmetryAnalyzer::new(self.settings)
            .with_cancel(self.cancel.clone())
            .analyze(crystal)?;
        self.generate_from(&crystal.name, &info)
    }

    /// 使用已有的对称分析结果
    pub fn generate_from(&self, structure_name: &str, info: &SymmetryInfo) -> Result<KPath> {
        self.cancel.check()?;
        let cell = standard::standardize(info)?;
        let geometry = CellGeometry::from_basis(cell.primitive)?;
        let reciprocal = *geometry.reciprocal();

        let table = catalogue::special_points(cell.variant, &cell.params);
        let points: Vec<KPoint> = table
            .points
            .iter()
            .map(|(label, frac)| {
                let cart = reciprocal * Vector3::from(*frac);
                KPoint {
                    label: label.to_string(),
                    fractional: *frac,
                    cartesian: [cart.x, cart.y, cart.z],
                }
            })
            .collect();

        let branches: Vec<Vec<String>> = cell
            .variant
            .branches()
            .into_iter()
            .map(|branch| branch.into_iter().map(str::to_string).collect())
            .collect();

        let wireframe = if info.crystal_system == CrystalSystem::Cubic {
            brillouin::wigner_seitz(&reciprocal)
        } else {
            log::warn!(
                "Brillouin zone wireframe for {} is a placeholder box",
                info.bravais
            );
            brillouin::placeholder_box(&reciprocal)
        };

        log::info!(
            "{}: k-path {} with {} points in {} branches",
            structure_name,
            cell.variant,
            points.len(),
            branches.len()
        );

        Ok(KPath {
            structure_name: structure_name.to_string(),
            space_group_number: info.space_group_number,
            hm_symbol: info.hm_symbol.clone(),
            bravais: info.bravais,
            variant: cell.variant,
            parameters: table
                .parameters
                .iter()
                .map(|(name, value)| (name.to_string(), *value))
                .collect(),
            points,
            branches,
            conventional_lattice: lattice::lattice_from_basis(&cell.conventional).matrix,
            primitive_lattice: lattice::lattice_from_basis(&cell.primitive).matrix,
            reciprocal_lattice: geometry.reciprocal_rows(),
            wireframe,
        })
    }
}
