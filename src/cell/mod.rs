//! # 晶胞变换
//!
//! 原胞与惯用胞互换，以及沿三个晶轴的整数倍超胞扩展。输出新结构，原结构不变。
//!
//! 原胞与惯用胞的晶格取自对称分析结果，与输入处于同一笛卡尔坐标系。
//! 变换矩阵在结构原胞坐标下取整，因此新晶格与输入晶格严格公度；
//! 原子由输入晶胞的周期镜像映射到新晶胞后折回并去重。
//!
//! ## 依赖关系
//! - 被 `commands/cell.rs` 与 `engine/` 使用
//! - 使用 `symmetry/` 的原胞与惯用胞，`lattice/` 的坐标变换

use crate::engine::CancelToken;
use crate::error::{CrystanError, Result};
use crate::lattice::{self, wrap_fractional, CellGeometry};
use crate::models::{Atom, Crystal, Lattice};
use crate::symmetry::{SymmetryAnalyzer, SymmetryInfo, SymmetrySettings, DEFAULT_TOLERANCE};

use clap::ValueEnum;
use nalgebra::{Matrix3, Vector3};
use serde::Serialize;
use std::fmt;

/// 晶格矢量在原胞坐标下偏离整数的上限
const LATTICE_MATCH: f64 = 1e-2;

/// 超胞包含的原胞个数上限
const MAX_SUPERCELL_CELLS: u64 = 100_000;

const FRAC_EPS: f64 = 1e-9;

/// 目标晶胞
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CellType {
    /// Primitive cell spanned by the pure translations of the structure
    #[value(alias = "prim")]
    Primitive,
    /// Conventional cell of the Bravais lattice
    #[value(alias = "conv")]
    Conventional,
}

impl fmt::Display for CellType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellType::Primitive => write!(f, "primitive"),
            CellType::Conventional => write!(f, "conventional"),
        }
    }
}

/// 晶胞变换设置
#[derive(Debug, Clone)]
pub struct CellSettings {
    /// 目标晶胞；`None` 时只做超胞扩展
    pub target: Option<CellType>,
    /// 沿 a, b, c 的倍数，作用在目标晶胞上
    pub supercell: [u32; 3],
    /// 对称识别与原子去重的容差（Å）
    pub tolerance: f64,
}

impl Default for CellSettings {
    fn default() -> Self {
        Self {
            target: None,
            supercell: [1, 1, 1],
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}

impl CellSettings {
    pub fn new(target: Option<CellType>, supercell: [u32; 3]) -> Self {
        Self {
            target,
            supercell,
            ..Self::default()
        }
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn symmetry(&self) -> SymmetrySettings {
        SymmetrySettings::with_tolerance(self.tolerance)
    }

    pub fn validate(&self) -> Result<()> {
        self.symmetry().validate()?;
        validate_multipliers(self.supercell)
    }
}

fn validate_multipliers(multipliers: [u32; 3]) -> Result<()> {
    if multipliers.contains(&0) {
        return Err(CrystanError::InvalidArgument(format!(
            "supercell multipliers must be at least 1, got {:?}",
            multipliers
        )));
    }
    let cells: u64 = multipliers.iter().map(|&n| n as u64).product();
    if cells > MAX_SUPERCELL_CELLS {
        return Err(CrystanError::InvalidArgument(format!(
            "supercell of {} cells exceeds the limit of {}",
            cells, MAX_SUPERCELL_CELLS
        )));
    }
    Ok(())
}

/// 变换结果
#[derive(Debug, Clone, Serialize)]
pub struct CellModel {
    pub structure: Crystal,
    pub target: Option<CellType>,
    pub supercell: [u32; 3],
    /// 目标晶胞矢量在输入晶格坐标中的系数（行为 a', b', c'），不含超胞倍数
    pub transform: [[f64; 3]; 3],
    /// 新旧晶胞体积比
    pub volume_ratio: f64,
    /// 转换依据的空间群，仅在设置了目标晶胞时给出
    pub space_group_number: Option<u16>,
    pub hm_symbol: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CellTransformer {
    settings: CellSettings,
    cancel: CancelToken,
}

impl CellTransformer {
    pub fn new(settings: CellSettings) -> Self {
        Self {
            settings,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// 执行变换；需要时先做对称分析
    pub fn transform(&self, crystal: &Crystal) -> Result<CellModel> {
        self.settings.validate()?;
        match self.settings.target {
            Some(_) => {
                let info = SymmetryAnalyzer::new(self.settings.symmetry())
                    .with_cancel(self.cancel.clone())
                    .analyze(crystal)?;
                self.transform_with(crystal, &info)
            }
            None => self.apply(crystal, None),
        }
    }

    /// 使用已有的对称分析结果（引擎从缓存取得）
    pub fn transform_with(&self, crystal: &Crystal, info: &SymmetryInfo) -> Result<CellModel> {
        self.apply(crystal, Some(info))
    }

    fn apply(&self, crystal: &Crystal, info: Option<&SymmetryInfo>) -> Result<CellModel> {
        let s = &self.settings;
        s.validate()?;
        crystal.validate()?;
        let cell = CellGeometry::new(&crystal.lattice)?;

        let (mut structure, transform) = match (s.target, info) {
            (Some(target), Some(info)) => {
                let transform = target_transform(&cell, info, target, s.tolerance)?;
                let mut structure = recell(crystal, &cell, &transform, s.tolerance, &self.cancel)?;
                structure.name = format!("{}_{}", crystal.name, target);
                log::info!(
                    "{} cell of {} ({}): {} atoms from {}",
                    target,
                    crystal.name,
                    info.hm_symbol,
                    structure.atoms.len(),
                    crystal.atoms.len()
                );
                (structure, transform)
            }
            (Some(_), None) => {
                return Err(CrystanError::InvalidArgument(
                    "cell conversion needs a symmetry analysis of the structure".to_string(),
                ))
            }
            (None, _) => (crystal.clone(), Matrix3::identity()),
        };

        if s.supercell != [1, 1, 1] {
            self.cancel.check()?;
            structure = supercell(&structure, s.supercell)?;
            log::info!("supercell {:?}: {} atoms", s.supercell, structure.atoms.len());
        }

        let volume_ratio = structure.lattice.volume().abs() / crystal.lattice.volume().abs();
        let row = |i: usize| [transform[(0, i)], transform[(1, i)], transform[(2, i)]];
        Ok(CellModel {
            structure,
            target: s.target,
            supercell: s.supercell,
            transform: [row(0), row(1), row(2)],
            volume_ratio,
            space_group_number: info.filter(|_| s.target.is_some()).map(|i| i.space_group_number),
            hm_symbol: info.filter(|_| s.target.is_some()).map(|i| i.hm_symbol.clone()),
        })
    }
}

/// 目标晶胞矢量在输入晶格坐标中的系数（列）
///
/// 输入晶格与目标晶格都是结构原胞晶格的整数组合，先在原胞坐标下取整再组合。
fn target_transform(
    cell: &CellGeometry,
    info: &SymmetryInfo,
    target: CellType,
    tolerance: f64,
) -> Result<Matrix3<f64>> {
    let primitive = CellGeometry::new(&Lattice::from_vectors(info.primitive_lattice))?;
    let in_primitive = |basis: &Matrix3<f64>, what: &str| -> Result<Matrix3<f64>> {
        let columns: Vec<Vector3<f64>> = (0..3)
            .map(|i| primitive.to_fractional(&basis.column(i).into_owned()))
            .collect();
        let m = Matrix3::from_columns(&columns);
        let rounded = m.map(f64::round);
        if (m - rounded).amax() > LATTICE_MATCH {
            return Err(CrystanError::NumericTolerance {
                tolerance,
                detail: format!("{} lattice is not commensurate with the primitive cell", what),
            });
        }
        Ok(rounded)
    };

    let input = in_primitive(cell.basis(), "input")?;
    let wanted = match target {
        CellType::Primitive => Matrix3::identity(),
        CellType::Conventional => in_primitive(&info.conventional_basis(), "conventional")?,
    };
    let input_inv = input
        .try_inverse()
        .ok_or(CrystanError::DegenerateLattice { volume: 0.0 })?;
    let mut transform = input_inv * wanted;
    // 保持右手系
    if transform.determinant() < 0.0 {
        let flipped: Vector3<f64> = -transform.column(2).into_owned();
        transform.set_column(2, &flipped);
    }
    Ok(transform)
}

/// 把结构映射到新晶胞；`transform` 的列为新晶胞矢量在旧晶格坐标中的系数
fn recell(
    crystal: &Crystal,
    cell: &CellGeometry,
    transform: &Matrix3<f64>,
    tolerance: f64,
    cancel: &CancelToken,
) -> Result<Crystal> {
    let transform_inv = transform
        .try_inverse()
        .ok_or(CrystanError::DegenerateLattice { volume: 0.0 })?;
    let new_basis = cell.basis() * transform;
    let new_cell = CellGeometry::from_basis(new_basis)?;

    // 新晶胞在旧分数坐标中的包围盒
    let mut lo = [i32::MAX; 3];
    let mut hi = [i32::MIN; 3];
    for corner in 0..8 {
        let c = Vector3::new((corner & 1) as f64, ((corner >> 1) & 1) as f64, ((corner >> 2) & 1) as f64);
        let v = transform * c;
        for axis in 0..3 {
            lo[axis] = lo[axis].min(v[axis].floor() as i32 - 1);
            hi[axis] = hi[axis].max(v[axis].ceil() as i32);
        }
    }

    let mut atoms: Vec<Atom> = Vec::new();
    for atom in &crystal.atoms {
        cancel.check()?;
        let base = wrap_fractional(&Vector3::from(atom.position));
        for i in lo[0]..=hi[0] {
            for j in lo[1]..=hi[1] {
                for k in lo[2]..=hi[2] {
                    let f = transform_inv * (base + Vector3::new(i as f64, j as f64, k as f64));
                    if !f.iter().all(|&x| x > -FRAC_EPS && x < 1.0 + FRAC_EPS) {
                        continue;
                    }
                    let f = wrap_fractional(&f);
                    let duplicate = atoms.iter().any(|kept| {
                        kept.element == atom.element
                            && new_cell.minimum_image_distance(&Vector3::from(kept.position), &f) < tolerance
                    });
                    if !duplicate {
                        atoms.push(Atom {
                            position: f.into(),
                            ..atom.clone()
                        });
                    }
                }
            }
        }
    }

    let expected = crystal.atoms.len() as f64 * transform.determinant().abs();
    if (atoms.len() as f64 - expected).abs() > 0.5 {
        return Err(CrystanError::NumericTolerance {
            tolerance,
            detail: format!(
                "cell conversion produced {} atoms where {:.0} were expected",
                atoms.len(),
                expected
            ),
        });
    }

    Ok(Crystal::new(
        crystal.name.clone(),
        lattice::lattice_from_basis(&new_basis),
        atoms,
    ))
}

/// 沿 a, b, c 复制 (nx, ny, nz) 次；晶胞平移在外层循环，原子在内层
pub fn supercell(crystal: &Crystal, multipliers: [u32; 3]) -> Result<Crystal> {
    validate_multipliers(multipliers)?;
    let [nx, ny, nz] = multipliers;
    let m = crystal.lattice.matrix;
    let scale = |v: [f64; 3], n: u32| v.map(|x| x * n as f64);
    let lattice = Lattice::from_vectors([scale(m[0], nx), scale(m[1], ny), scale(m[2], nz)]);

    let n = Vector3::new(nx as f64, ny as f64, nz as f64);
    let mut atoms = Vec::with_capacity(crystal.atoms.len() * (nx * ny * nz) as usize);
    for i in 0..nx {
        for j in 0..ny {
            for k in 0..nz {
                let shift = Vector3::new(i as f64, j as f64, k as f64);
                for atom in &crystal.atoms {
                    let f = (wrap_fractional(&Vector3::from(atom.position)) + shift).component_div(&n);
                    atoms.push(Atom {
                        position: f.into(),
                        ..atom.clone()
                    });
                }
            }
        }
    }

    Ok(Crystal::new(
        format!("{}_{}x{}x{}", crystal.name, nx, ny, nz),
        lattice,
        atoms,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rocksalt() -> Crystal {
        let mut atoms = Vec::new();
        for p in [[0.0, 0.0, 0.0], [0.0, 0.5, 0.5], [0.5, 0.0, 0.5], [0.5, 0.5, 0.0]] {
            atoms.push(Atom::new("Na", p));
            atoms.push(Atom::new("Cl", [(p[0] + 0.5) % 1.0, p[1], p[2]]));
        }
        Crystal::new("NaCl", Lattice::cubic(5.64), atoms)
    }

    fn fcc_primitive(a: f64) -> Crystal {
        let h = a / 2.0;
        Crystal::new(
            "Cu",
            Lattice::from_vectors([[0.0, h, h], [h, 0.0, h], [h, h, 0.0]]),
            vec![Atom::new("Cu", [0.0, 0.0, 0.0])],
        )
    }

    fn count(crystal: &Crystal, element: &str) -> usize {
        crystal.atoms.iter().filter(|a| a.element == element).count()
    }

    #[test]
    fn test_rocksalt_to_primitive() {
        let bulk = rocksalt();
        let model = CellTransformer::new(CellSettings::new(Some(CellType::Primitive), [1, 1, 1]))
            .transform(&bulk)
            .unwrap();
        let s = &model.structure;
        assert_eq!(s.atoms.len(), 2);
        assert_eq!(count(s, "Na"), 1);
        assert_eq!(count(s, "Cl"), 1);
        assert!((s.lattice.volume().abs() - 5.64f64.powi(3) / 4.0).abs() < 1e-6);
        assert!((model.volume_ratio - 0.25).abs() < 1e-9);
        assert_eq!(model.space_group_number, Some(225));
        assert_eq!(s.name, "NaCl_primitive");

        // Na 与 Cl 相距 a/2
        let cell = CellGeometry::new(&s.lattice).unwrap();
        let d = cell.minimum_image_distance(
            &Vector3::from(s.atoms[0].position),
            &Vector3::from(s.atoms[1].position),
        );
        assert!((d - 2.82).abs() < 1e-6, "Na-Cl distance {}", d);
    }

    #[test]
    fn test_primitive_to_conventional() {
        let model = CellTransformer::new(CellSettings::new(Some(CellType::Conventional), [1, 1, 1]))
            .transform(&fcc_primitive(3.615))
            .unwrap();
        let s = &model.structure;
        assert_eq!(s.atoms.len(), 4);
        assert!((s.lattice.volume().abs() - 3.615f64.powi(3)).abs() < 1e-6);
        for length in s.lattice.lengths() {
            assert!((length - 3.615).abs() < 1e-6);
        }
        assert!((model.volume_ratio - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_bcc_primitive_to_conventional() {
        let h = 2.87 / 2.0;
        let fe = Crystal::new(
            "Fe",
            Lattice::from_vectors([[-h, h, h], [h, -h, h], [h, h, -h]]),
            vec![Atom::new("Fe", [0.0, 0.0, 0.0])],
        );
        let model = CellTransformer::new(CellSettings::new(Some(CellType::Conventional), [1, 1, 1]))
            .transform(&fe)
            .unwrap();
        assert_eq!(model.structure.atoms.len(), 2);
        assert_eq!(model.space_group_number, Some(229));
    }

    #[test]
    fn test_primitive_of_primitive_keeps_atoms() {
        let model = CellTransformer::new(CellSettings::new(Some(CellType::Primitive), [1, 1, 1]))
            .transform(&fcc_primitive(3.615))
            .unwrap();
        assert_eq!(model.structure.atoms.len(), 1);
        assert!((model.volume_ratio - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_supercell_order_and_size() {
        let bulk = rocksalt();
        let big = supercell(&bulk, [2, 2, 2]).unwrap();
        assert_eq!(big.atoms.len(), 64);
        assert_eq!(big.name, "NaCl_2x2x2");
        for length in big.lattice.lengths() {
            assert!((length - 11.28).abs() < 1e-9);
        }
        // 首个晶胞的原子排在最前，坐标减半
        for (atom, original) in big.atoms.iter().zip(&bulk.atoms) {
            assert_eq!(atom.element, original.element);
            for axis in 0..3 {
                assert!((atom.position[axis] - original.position[axis] / 2.0).abs() < 1e-12);
            }
        }
        // 第二组原子平移 c/2
        assert!((big.atoms[8].position[2] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_conversion_then_supercell() {
        let model = CellTransformer::new(CellSettings::new(Some(CellType::Primitive), [2, 2, 2]))
            .transform(&rocksalt())
            .unwrap();
        assert_eq!(model.structure.atoms.len(), 16);
        assert!((model.volume_ratio - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_supercell_only_skips_symmetry() {
        let model = CellTransformer::new(CellSettings::new(None, [1, 1, 3]))
            .transform(&fcc_primitive(3.615))
            .unwrap();
        assert_eq!(model.structure.atoms.len(), 3);
        assert_eq!(model.space_group_number, None);
        assert_eq!(model.transform, [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]);
    }

    #[test]
    fn test_zero_multiplier_rejected() {
        let err = CellTransformer::new(CellSettings::new(None, [2, 0, 1]))
            .transform(&rocksalt())
            .unwrap_err();
        assert!(matches!(err, CrystanError::InvalidArgument(_)));
        assert!(supercell(&rocksalt(), [0, 1, 1]).is_err());
        assert!(CellSettings::new(None, [1000, 1000, 1]).validate().is_err());
    }
}
