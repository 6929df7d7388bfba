//! # 对称性分析引擎
//!
//! 在给定容差 ε（Å）下确定结构的空间群与全部对称操作。
//!
//! ## 算法概述
//! 1. 在约化基中枚举保持度规的整数矩阵（晶格自同构），变换回输入基
//! 2. 对每个旋转，由最稀有物种的原子差构造候选平移
//! 3. 所有原子经操作后必须与同种原子一一对应（二分匹配），偏差不超过 ε
//! 4. 由旋转类型统计得到点群，由对称轴构造惯用晶胞并判定带心类型
//! 5. 与 230 个空间群的静态表比对，得到编号与 Hermann-Mauguin 符号
//!
//! ## 依赖关系
//! - 被 `kpath/`、`engine/` 与 `commands/analyze/symmetry.rs` 使用
//! - 使用 `lattice/` 的 CellGeometry 与基矢约化
//! - 子模块: operations, classify, spacegroups, cache

pub mod cache;
mod classify;
mod operations;
pub mod spacegroups;

pub use cache::SymmetryCache;

use crate::engine::CancelToken;
use crate::error::{CrystanError, Result};
use crate::lattice::{self, CellGeometry};
use crate::models::Crystal;

use nalgebra::{Matrix3, Vector3};
use serde::Serialize;
use std::fmt;

/// 默认对称容差（Å）
pub const DEFAULT_TOLERANCE: f64 = 1e-3;

/// 整数矩阵（行主序），作用于分数坐标列向量
pub type IntMatrix = [[i32; 3]; 3];

/// 对称分析设置
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SymmetrySettings {
    /// 位置容差（Å）
    pub tolerance: f64,
}

impl Default for SymmetrySettings {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}

impl SymmetrySettings {
    pub fn with_tolerance(tolerance: f64) -> Self {
        Self { tolerance }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(CrystanError::InvalidArgument(format!(
                "symmetry tolerance must be positive, got {}",
                self.tolerance
            )));
        }
        Ok(())
    }
}

/// 七大晶系
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum CrystalSystem {
    Triclinic,
    Monoclinic,
    Orthorhombic,
    Tetragonal,
    Trigonal,
    Hexagonal,
    Cubic,
}

impl CrystalSystem {
    /// 由空间群编号得到晶系
    pub fn from_space_group(number: u16) -> Self {
        match number {
            1..=2 => CrystalSystem::Triclinic,
            3..=15 => CrystalSystem::Monoclinic,
            16..=74 => CrystalSystem::Orthorhombic,
            75..=142 => CrystalSystem::Tetragonal,
            143..=167 => CrystalSystem::Trigonal,
            168..=194 => CrystalSystem::Hexagonal,
            _ => CrystalSystem::Cubic,
        }
    }
}

impl fmt::Display for CrystalSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CrystalSystem::Triclinic => "Triclinic",
            CrystalSystem::Monoclinic => "Monoclinic",
            CrystalSystem::Orthorhombic => "Orthorhombic",
            CrystalSystem::Tetragonal => "Tetragonal",
            CrystalSystem::Trigonal => "Trigonal",
            CrystalSystem::Hexagonal => "Hexagonal",
            CrystalSystem::Cubic => "Cubic",
        };
        write!(f, "{}", name)
    }
}

/// 带心类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Centering {
    P,
    A,
    B,
    C,
    I,
    F,
    R,
}

impl Centering {
    pub fn letter(&self) -> char {
        match self {
            Centering::P => 'P',
            Centering::A => 'A',
            Centering::B => 'B',
            Centering::C => 'C',
            Centering::I => 'I',
            Centering::F => 'F',
            Centering::R => 'R',
        }
    }

    pub fn from_letter(c: char) -> Option<Self> {
        match c {
            'P' => Some(Centering::P),
            'A' => Some(Centering::A),
            'B' => Some(Centering::B),
            'C' => Some(Centering::C),
            'I' => Some(Centering::I),
            'F' => Some(Centering::F),
            'R' => Some(Centering::R),
            _ => None,
        }
    }
}

/// 14 种 Bravais 格子（Pearson 记号）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BravaisLattice {
    TriclinicP,
    MonoclinicP,
    MonoclinicC,
    OrthorhombicP,
    OrthorhombicC,
    OrthorhombicI,
    OrthorhombicF,
    TetragonalP,
    TetragonalI,
    Rhombohedral,
    HexagonalP,
    CubicP,
    CubicI,
    CubicF,
}

impl BravaisLattice {
    pub fn new(system: CrystalSystem, centering: Centering) -> Self {
        use BravaisLattice::*;
        match (system, centering) {
            (CrystalSystem::Triclinic, _) => TriclinicP,
            (CrystalSystem::Monoclinic, Centering::P) => MonoclinicP,
            (CrystalSystem::Monoclinic, _) => MonoclinicC,
            (CrystalSystem::Orthorhombic, Centering::P) => OrthorhombicP,
            (CrystalSystem::Orthorhombic, Centering::I) => OrthorhombicI,
            (CrystalSystem::Orthorhombic, Centering::F) => OrthorhombicF,
            (CrystalSystem::Orthorhombic, _) => OrthorhombicC,
            (CrystalSystem::Tetragonal, Centering::P) => TetragonalP,
            (CrystalSystem::Tetragonal, _) => TetragonalI,
            (CrystalSystem::Trigonal, Centering::R) => Rhombohedral,
            (CrystalSystem::Trigonal, _) | (CrystalSystem::Hexagonal, _) => HexagonalP,
            (CrystalSystem::Cubic, Centering::I) => CubicI,
            (CrystalSystem::Cubic, Centering::F) => CubicF,
            (CrystalSystem::Cubic, _) => CubicP,
        }
    }

    /// Pearson 符号，如 `cF`
    pub fn symbol(&self) -> &'static str {
        use BravaisLattice::*;
        match self {
            TriclinicP => "aP",
            MonoclinicP => "mP",
            MonoclinicC => "mC",
            OrthorhombicP => "oP",
            OrthorhombicC => "oC",
            OrthorhombicI => "oI",
            OrthorhombicF => "oF",
            TetragonalP => "tP",
            TetragonalI => "tI",
            Rhombohedral => "hR",
            HexagonalP => "hP",
            CubicP => "cP",
            CubicI => "cI",
            CubicF => "cF",
        }
    }
}

impl fmt::Display for BravaisLattice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// 旋转部分的几何类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum RotationKind {
    Identity,
    Two,
    Three,
    Four,
    Six,
    Inversion,
    Mirror,
    RotoInversion3,
    RotoInversion4,
    RotoInversion6,
}

impl RotationKind {
    /// 由行列式与迹分类
    pub fn classify(det: i32, trace: i32) -> Option<Self> {
        use RotationKind::*;
        match (det, trace) {
            (1, 3) => Some(Identity),
            (1, -1) => Some(Two),
            (1, 0) => Some(Three),
            (1, 1) => Some(Four),
            (1, 2) => Some(Six),
            (-1, -3) => Some(Inversion),
            (-1, 1) => Some(Mirror),
            (-1, 0) => Some(RotoInversion3),
            (-1, -1) => Some(RotoInversion4),
            (-1, -2) => Some(RotoInversion6),
            _ => None,
        }
    }

    /// 对应真转动的阶数
    pub fn order(&self) -> u32 {
        use RotationKind::*;
        match self {
            Identity | Inversion => 1,
            Two | Mirror => 2,
            Three | RotoInversion3 => 3,
            Four | RotoInversion4 => 4,
            Six | RotoInversion6 => 6,
        }
    }

    pub fn symbol(&self) -> &'static str {
        use RotationKind::*;
        match self {
            Identity => "1",
            Two => "2",
            Three => "3",
            Four => "4",
            Six => "6",
            Inversion => "-1",
            Mirror => "m",
            RotoInversion3 => "-3",
            RotoInversion4 => "-4",
            RotoInversion6 => "-6",
        }
    }
}

/// 对称操作 x' = W x + t（输入晶胞的分数坐标）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymmetryOp {
    pub rotation: IntMatrix,
    pub translation: [f64; 3],
}

impl SymmetryOp {
    pub fn identity() -> Self {
        Self {
            rotation: [[1, 0, 0], [0, 1, 0], [0, 0, 1]],
            translation: [0.0; 3],
        }
    }

    pub(crate) fn from_parts(rotation: &Matrix3<f64>, translation: &Vector3<f64>) -> Self {
        let mut r = [[0; 3]; 3];
        for (i, row) in r.iter_mut().enumerate() {
            for (j, x) in row.iter_mut().enumerate() {
                *x = rotation[(i, j)].round() as i32;
            }
        }
        Self {
            rotation: r,
            translation: [translation.x, translation.y, translation.z],
        }
    }

    pub fn rotation_matrix(&self) -> Matrix3<f64> {
        Matrix3::from_fn(|i, j| self.rotation[i][j] as f64)
    }

    pub fn translation_vector(&self) -> Vector3<f64> {
        Vector3::from(self.translation)
    }

    /// 作用于分数坐标
    pub fn apply(&self, frac: &Vector3<f64>) -> Vector3<f64> {
        self.rotation_matrix() * frac + self.translation_vector()
    }

    pub fn determinant(&self) -> i32 {
        int_det(&self.rotation)
    }

    pub fn trace(&self) -> i32 {
        self.rotation[0][0] + self.rotation[1][1] + self.rotation[2][2]
    }

    pub fn kind(&self) -> Option<RotationKind> {
        RotationKind::classify(self.determinant(), self.trace())
    }

    /// 旋转为单位阵且平移（模晶格）为零
    pub fn is_identity(&self) -> bool {
        self.rotation == SymmetryOp::identity().rotation
            && self
                .translation
                .iter()
                .all(|t| (t - t.round()).abs() < 1e-8)
    }

    /// 坐标三元组记法，如 `-y,x-y,z+1/2`
    pub fn to_xyz(&self) -> String {
        const AXES: [char; 3] = ['x', 'y', 'z'];
        let mut parts = Vec::with_capacity(3);
        for i in 0..3 {
            let mut s = String::new();
            for (j, axis) in AXES.iter().enumerate() {
                match self.rotation[i][j] {
                    0 => {}
                    1 => {
                        if !s.is_empty() {
                            s.push('+');
                        }
                        s.push(*axis);
                    }
                    -1 => {
                        s.push('-');
                        s.push(*axis);
                    }
                    n => {
                        if n > 0 && !s.is_empty() {
                            s.push('+');
                        }
                        s.push_str(&format!("{}{}", n, axis));
                    }
                }
            }
            let t = self.translation[i] - self.translation[i].floor();
            if t > 1e-6 && t < 1.0 - 1e-6 {
                s.push('+');
                s.push_str(&fraction_string(t));
            }
            parts.push(s);
        }
        parts.join(",")
    }
}

/// 把 0..1 的小数写成 n/d（d ≤ 24），否则保留四位小数
fn fraction_string(x: f64) -> String {
    for d in [2, 3, 4, 6, 8, 12, 24] {
        let n = (x * d as f64).round();
        if (x * d as f64 - n).abs() < 1e-4 {
            let g = gcd(n as i64, d);
            return format!("{}/{}", n as i64 / g, d / g);
        }
    }
    format!("{:.4}", x)
}

fn gcd(a: i64, b: i64) -> i64 {
    if b == 0 {
        a.abs().max(1)
    } else {
        gcd(b, a % b)
    }
}

pub(crate) fn int_det(m: &IntMatrix) -> i32 {
    m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1]) - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
}

/// 容差边界上的匹配提示（非致命）
#[derive(Debug, Clone, Serialize)]
pub struct ToleranceWarning {
    /// 相关操作的坐标三元组
    pub operation: String,
    /// 最大匹配偏差（Å）
    pub max_deviation: f64,
    /// 是否存在多个候选原子
    pub ambiguous: bool,
}

impl ToleranceWarning {
    pub fn to_error(&self, tolerance: f64) -> CrystanError {
        let detail = if self.ambiguous {
            format!(
                "operation {} has several candidate atoms within tolerance (max deviation {:.2e} Å)",
                self.operation, self.max_deviation
            )
        } else {
            format!(
                "operation {} accepted with deviation {:.2e} Å close to the tolerance",
                self.operation, self.max_deviation
            )
        };
        CrystanError::NumericTolerance { tolerance, detail }
    }
}

/// 对称分析结果
#[derive(Debug, Clone, Serialize)]
pub struct SymmetryInfo {
    /// 空间群编号 (1-230)
    pub space_group_number: u16,
    /// Hermann-Mauguin 短符号
    pub hm_symbol: String,
    pub crystal_system: CrystalSystem,
    /// 点群符号
    pub point_group: String,
    pub centering: Centering,
    pub bravais: BravaisLattice,
    /// 对称操作（规范排序，首个为恒等操作）
    pub operations: Vec<SymmetryOp>,
    /// 是否为点式空间群
    pub symmorphic: bool,
    /// 与所选空间群打分相同的其他候选编号
    pub alternatives: Vec<u16>,
    /// 约化原胞（行向量）
    pub primitive_lattice: [[f64; 3]; 3],
    /// 惯用晶胞（行向量）
    pub conventional_lattice: [[f64; 3]; 3],
    /// 使用的容差（Å）
    pub tolerance: f64,
    pub warnings: Vec<ToleranceWarning>,
}

impl SymmetryInfo {
    /// 点群阶数（不同旋转部分的个数）
    pub fn point_group_order(&self) -> usize {
        let mut rotations: Vec<IntMatrix> = self.operations.iter().map(|op| op.rotation).collect();
        rotations.sort();
        rotations.dedup();
        rotations.len()
    }

    /// 惯用晶胞基矩阵（列向量）
    pub fn conventional_basis(&self) -> Matrix3<f64> {
        lattice::basis_matrix(&crate::models::Lattice::from_vectors(
            self.conventional_lattice,
        ))
    }
}

/// 对称分析器
pub struct SymmetryAnalyzer {
    settings: SymmetrySettings,
    cancel: CancelToken,
}

impl SymmetryAnalyzer {
    pub fn new(settings: SymmetrySettings) -> Self {
        Self {
            settings,
            cancel: CancelToken::default(),
        }
    }

    /// 附加取消信号
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// 确定空间群与对称操作
    pub fn analyze(&self, crystal: &Crystal) -> Result<SymmetryInfo> {
        self.settings.validate()?;
        if crystal.atoms.is_empty() {
            return Err(CrystanError::InvalidStructure {
                reason: "structure contains no atoms".to_string(),
            });
        }
        crystal.validate().map_err(|e| match e {
            CrystanError::DegenerateLattice { volume } => CrystanError::InvalidStructure {
                reason: format!("degenerate lattice (volume {:.3e} Å³)", volume),
            },
            other => other,
        })?;
        let cell = CellGeometry::new(&crystal.lattice)?;
        let tolerance = self.settings.tolerance;

        let rotations = operations::lattice_rotations(&cell, tolerance);
        log::debug!(
            "{}: {} lattice automorphisms at tolerance {:.1e} Å",
            crystal.name,
            rotations.len(),
            tolerance
        );

        let sites = operations::SiteTable::new(crystal);
        let (ops, warnings) =
            operations::find_operations(&sites, &cell, &rotations, tolerance, &self.cancel)?;
        self.cancel.check()?;

        let classification = classify::classify(&cell, &ops, tolerance);
        for w in &warnings {
            log::warn!("{}", w.to_error(tolerance));
        }

        let basis_rows = |m: &Matrix3<f64>| lattice::lattice_from_basis(m).matrix;

        log::info!(
            "{}: space group {} ({}), {} operations",
            crystal.name,
            classification.entry.symbol,
            classification.entry.number,
            ops.len()
        );

        Ok(SymmetryInfo {
            space_group_number: classification.entry.number,
            hm_symbol: classification.entry.symbol.to_string(),
            crystal_system: classification.system,
            point_group: classification.point_group.to_string(),
            centering: classification.centering,
            bravais: BravaisLattice::new(classification.system, classification.centering),
            operations: ops,
            symmorphic: classification.symmorphic,
            alternatives: classification.alternatives,
            primitive_lattice: basis_rows(&classification.primitive),
            conventional_lattice: basis_rows(&classification.conventional),
            tolerance,
            warnings,
        })
    }
}

/// 便捷函数：以给定容差分析结构
pub fn analyze(crystal: &Crystal, tolerance: f64) -> Result<SymmetryInfo> {
    SymmetryAnalyzer::new(SymmetrySettings::with_tolerance(tolerance)).analyze(crystal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Atom, Lattice};

    fn cubic_x() -> Crystal {
        Crystal::new("X", Lattice::cubic(4.0), vec![Atom::new("X", [0.0, 0.0, 0.0])])
    }

    fn rocksalt() -> Crystal {
        let mut atoms = Vec::new();
        for p in [[0.0, 0.0, 0.0], [0.5, 0.5, 0.0], [0.5, 0.0, 0.5], [0.0, 0.5, 0.5]] {
            atoms.push(Atom::new("Na", p));
            atoms.push(Atom::new("Cl", [p[0] + 0.5, p[1], p[2]]));
        }
        Crystal::new("NaCl", Lattice::cubic(5.64), atoms)
    }

    fn rotation_set(info: &SymmetryInfo) -> Vec<IntMatrix> {
        let mut r: Vec<IntMatrix> = info.operations.iter().map(|op| op.rotation).collect();
        r.sort();
        r.dedup();
        r
    }

    #[test]
    fn test_simple_cubic_is_pm3m() {
        let info = analyze(&cubic_x(), DEFAULT_TOLERANCE).unwrap();
        assert_eq!(info.space_group_number, 221);
        assert_eq!(info.hm_symbol, "Pm-3m");
        assert_eq!(info.crystal_system, CrystalSystem::Cubic);
        assert_eq!(info.point_group, "m-3m");
        assert_eq!(info.operations.len(), 48);
        assert!(info.symmorphic);
    }

    #[test]
    fn test_identity_always_present() {
        let crystal = Crystal::new(
            "P1",
            Lattice::from_parameters(3.1, 4.7, 5.3, 71.0, 83.0, 97.0),
            vec![
                Atom::new("A", [0.11, 0.23, 0.37]),
                Atom::new("B", [0.61, 0.02, 0.81]),
                Atom::new("C", [0.33, 0.71, 0.05]),
            ],
        );
        let info = analyze(&crystal, DEFAULT_TOLERANCE).unwrap();
        assert!(info.operations[0].is_identity());
        assert_eq!(info.space_group_number, 1);
        assert_eq!(info.crystal_system, CrystalSystem::Triclinic);
    }

    #[test]
    fn test_rocksalt_is_fm3m() {
        let info = analyze(&rocksalt(), DEFAULT_TOLERANCE).unwrap();
        assert_eq!(info.space_group_number, 225);
        assert_eq!(info.centering, Centering::F);
        assert_eq!(info.bravais, BravaisLattice::CubicF);
        // 48 个点操作 × 4 个带心平移
        assert_eq!(info.operations.len(), 192);
    }

    #[test]
    fn test_bcc_is_im3m() {
        let crystal = Crystal::new(
            "Fe",
            Lattice::cubic(2.87),
            vec![
                Atom::new("Fe", [0.0, 0.0, 0.0]),
                Atom::new("Fe", [0.5, 0.5, 0.5]),
            ],
        );
        let info = analyze(&crystal, DEFAULT_TOLERANCE).unwrap();
        assert_eq!(info.space_group_number, 229);
        assert_eq!(info.bravais, BravaisLattice::CubicI);
    }

    #[test]
    fn test_simple_hexagonal() {
        let crystal = Crystal::new(
            "hex",
            Lattice::from_parameters(3.0, 3.0, 5.0, 90.0, 90.0, 120.0),
            vec![Atom::new("X", [0.0, 0.0, 0.0])],
        );
        let info = analyze(&crystal, DEFAULT_TOLERANCE).unwrap();
        assert_eq!(info.space_group_number, 191);
        assert_eq!(info.crystal_system, CrystalSystem::Hexagonal);
    }

    #[test]
    fn test_tetragonal_primitive() {
        let crystal = Crystal::new(
            "tet",
            Lattice::from_parameters(3.0, 3.0, 5.0, 90.0, 90.0, 90.0),
            vec![Atom::new("X", [0.0, 0.0, 0.0])],
        );
        let info = analyze(&crystal, DEFAULT_TOLERANCE).unwrap();
        assert_eq!(info.space_group_number, 123);
        assert_eq!(info.hm_symbol, "P4/mmm");
    }

    #[test]
    fn test_rutile_is_nonsymmorphic() {
        let u = 0.3049;
        let crystal = Crystal::new(
            "TiO2",
            Lattice::from_parameters(4.594, 4.594, 2.959, 90.0, 90.0, 90.0),
            vec![
                Atom::new("Ti", [0.0, 0.0, 0.0]),
                Atom::new("Ti", [0.5, 0.5, 0.5]),
                Atom::new("O", [u, u, 0.0]),
                Atom::new("O", [1.0 - u, 1.0 - u, 0.0]),
                Atom::new("O", [0.5 + u, 0.5 - u, 0.5]),
                Atom::new("O", [0.5 - u, 0.5 + u, 0.5]),
            ],
        );
        let info = analyze(&crystal, DEFAULT_TOLERANCE).unwrap();
        assert_eq!(info.point_group, "4/mmm");
        assert_eq!(info.centering, Centering::P);
        assert!(!info.symmorphic);
        assert_eq!(info.operations.len(), 16);
        assert_eq!(info.space_group_number, 136);
    }

    /// P3₁21 的六个操作作用于 (x, y, z)；`mirror` 为真时取 z → -z 的镜像结构
    fn p3121_orbit(p: [f64; 3], mirror: bool) -> Vec<[f64; 3]> {
        let [x, y, z] = p;
        let orbit = [
            [x, y, z],
            [-y, x - y, z + 1.0 / 3.0],
            [-x + y, -x, z + 2.0 / 3.0],
            [y, x, -z],
            [x - y, -y, -z + 2.0 / 3.0],
            [-x, -x + y, -z + 1.0 / 3.0],
        ];
        orbit
            .iter()
            .map(|q| {
                let z = if mirror { -q[2] } else { q[2] };
                [q[0].rem_euclid(1.0), q[1].rem_euclid(1.0), z.rem_euclid(1.0)]
            })
            .collect()
    }

    fn quartz(mirror: bool) -> Crystal {
        let mut atoms: Vec<Atom> = Vec::new();
        for pos in p3121_orbit([0.4697, 0.0, 1.0 / 3.0], mirror) {
            if !atoms.iter().any(|a| (0..3).all(|i| (a.position[i] - pos[i]).abs() < 1e-6)) {
                atoms.push(Atom::new("Si", pos));
            }
        }
        for pos in p3121_orbit([0.4135, 0.2669, 0.1191], mirror) {
            atoms.push(Atom::new("O", pos));
        }
        Crystal::new(
            "SiO2",
            Lattice::from_parameters(4.913, 4.913, 5.405, 90.0, 90.0, 120.0),
            atoms,
        )
    }

    /// P4₁ 的一般位置；`mirror` 为真时得到 P4₃
    fn four_fold_helix(mirror: bool) -> Crystal {
        let [x, y, z]: [f64; 3] = [0.13, 0.27, 0.05];
        let sign = if mirror { -1.0 } else { 1.0 };
        let atoms = [
            [x, y, z],
            [-x, -y, z + 0.5],
            [-y, x, z + 0.25],
            [y, -x, z + 0.75],
        ]
        .iter()
        .map(|p| {
            Atom::new(
                "X",
                [p[0].rem_euclid(1.0), p[1].rem_euclid(1.0), (sign * p[2]).rem_euclid(1.0)],
            )
        })
        .collect();
        Crystal::new("helix", Lattice::from_parameters(4.0, 4.0, 6.0, 90.0, 90.0, 90.0), atoms)
    }

    #[test]
    fn test_quartz_enantiomorphs() {
        let right = quartz(false);
        assert_eq!(right.atoms.len(), 9);
        let info = analyze(&right, DEFAULT_TOLERANCE).unwrap();
        assert_eq!(info.point_group, "32");
        assert_eq!(info.operations.len(), 6);
        assert_eq!(info.space_group_number, 152);
        assert!(!info.alternatives.contains(&154));

        let left = analyze(&quartz(true), DEFAULT_TOLERANCE).unwrap();
        assert_eq!(left.space_group_number, 154);
        assert_eq!(left.hm_symbol, "P3_221");
        assert!(!left.alternatives.contains(&152));
    }

    #[test]
    fn test_four_fold_screw_handedness() {
        let info = analyze(&four_fold_helix(false), DEFAULT_TOLERANCE).unwrap();
        assert_eq!(info.point_group, "4");
        assert_eq!(info.space_group_number, 76);

        let info = analyze(&four_fold_helix(true), DEFAULT_TOLERANCE).unwrap();
        assert_eq!(info.space_group_number, 78);
        assert!(info.alternatives.is_empty());
    }

    #[test]
    fn test_invariant_under_uniform_translation() {
        let base = rocksalt();
        let mut shifted = base.clone();
        for atom in &mut shifted.atoms {
            for (x, s) in atom.position.iter_mut().zip([0.137, 0.291, 0.613]) {
                *x = (*x + s).rem_euclid(1.0);
            }
        }

        let a = analyze(&base, DEFAULT_TOLERANCE).unwrap();
        let b = analyze(&shifted, DEFAULT_TOLERANCE).unwrap();
        assert_eq!(a.space_group_number, b.space_group_number);
        assert_eq!(a.hm_symbol, b.hm_symbol);
        assert_eq!(a.crystal_system, b.crystal_system);
        assert_eq!(a.operations.len(), b.operations.len());
        assert_eq!(rotation_set(&a), rotation_set(&b));
    }

    #[test]
    fn test_independent_of_atom_order() {
        let base = rocksalt();
        let mut reordered = base.clone();
        reordered.atoms.reverse();

        let a = analyze(&base, DEFAULT_TOLERANCE).unwrap();
        let b = analyze(&reordered, DEFAULT_TOLERANCE).unwrap();
        assert_eq!(a.operations.len(), b.operations.len());
        for (x, y) in a.operations.iter().zip(&b.operations) {
            assert_eq!(x.rotation, y.rotation);
            for i in 0..3 {
                let d = x.translation[i] - y.translation[i];
                assert!((d - d.round()).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_operations_monotonic_in_tolerance() {
        // 稍有畸变的立方：c = 4.003 Å
        let crystal = Crystal::new(
            "distorted",
            Lattice::from_parameters(4.0, 4.0, 4.003, 90.0, 90.0, 90.0),
            vec![
                Atom::new("A", [0.0, 0.0, 0.0]),
                Atom::new("B", [0.5, 0.5, 0.5002]),
            ],
        );
        let mut previous: Option<SymmetryInfo> = None;
        for tol in [1e-4, 1e-3, 1e-2, 5e-2] {
            let info = analyze(&crystal, tol).unwrap();
            if let Some(prev) = &previous {
                assert!(info.operations.len() >= prev.operations.len());
                for op in &prev.operations {
                    let found = info.operations.iter().any(|o| {
                        o.rotation == op.rotation
                            && (0..3).all(|i| {
                                let d = o.translation[i] - op.translation[i];
                                (d - d.round()).abs() < 2.0 * tol
                            })
                    });
                    assert!(found, "operation {} lost at tolerance {}", op.to_xyz(), tol);
                }
            }
            previous = Some(info);
        }
        let loose = previous.unwrap();
        assert_eq!(loose.crystal_system, CrystalSystem::Cubic);
    }

    #[test]
    fn test_zero_atoms_is_invalid() {
        let crystal = Crystal::new("empty", Lattice::cubic(4.0), vec![]);
        assert!(matches!(
            analyze(&crystal, DEFAULT_TOLERANCE),
            Err(CrystanError::InvalidStructure { .. })
        ));
    }

    #[test]
    fn test_degenerate_lattice_is_invalid() {
        let crystal = Crystal::new(
            "flat",
            Lattice::from_vectors([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 1.0, 0.0]]),
            vec![Atom::new("X", [0.0; 3])],
        );
        assert!(matches!(
            analyze(&crystal, DEFAULT_TOLERANCE),
            Err(CrystanError::InvalidStructure { .. })
        ));
    }

    #[test]
    fn test_op_to_xyz() {
        let op = SymmetryOp {
            rotation: [[0, -1, 0], [1, -1, 0], [0, 0, 1]],
            translation: [0.0, 0.0, 0.5],
        };
        assert_eq!(op.to_xyz(), "-y,x-y,z+1/2");
        assert_eq!(op.kind(), Some(RotationKind::Three));
    }
}
