//! # 表面板层构建
//!
//! 1. 求表面晶胞 (u, v, w)，T = [u v w]（列）
//! 2. 原子映射到新晶胞：f' = T⁻¹ f，|det T| > 1 时枚举落入新晶胞的全部镜像
//! 3. 沿面法向复制 `thickness` 层，c 轴垂直于表面，长度 = 层数 × 层高 + 真空
//! 4. 按容差去重，保留先出现的原子（层优先，其次输入顺序）

use super::basis::{find_surface_basis, reduce_miller};
use crate::engine::CancelToken;
use crate::error::{CrystanError, Result};
use crate::lattice::{lattice_from_basis, wrap_fractional, CellGeometry};
use crate::models::{Atom, Crystal};

use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

/// 分数坐标比较容差
const FRAC_EPS: f64 = 1e-9;

/// 板层参数
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SlabSettings {
    pub miller: [i32; 3],
    /// 层数（≥ 1）
    pub thickness: usize,
    /// 真空层厚度（Å）
    pub vacuum: f64,
    /// 去重距离（Å）
    pub duplicate_tolerance: f64,
    /// 面内矢量系数的最大搜索范围
    pub max_search_range: i32,
}

impl Default for SlabSettings {
    fn default() -> Self {
        Self {
            miller: [0, 0, 1],
            thickness: 1,
            vacuum: 10.0,
            duplicate_tolerance: 1e-5,
            max_search_range: 16,
        }
    }
}

impl SlabSettings {
    pub fn new(miller: [i32; 3], thickness: usize, vacuum: f64) -> Self {
        Self {
            miller,
            thickness,
            vacuum,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.miller == [0, 0, 0] {
            return Err(CrystanError::InvalidArgument(
                "Miller indices must not all be zero".to_string(),
            ));
        }
        if self.thickness == 0 {
            return Err(CrystanError::InvalidArgument(
                "slab thickness must be at least one layer".to_string(),
            ));
        }
        if self.vacuum.is_nan() || self.vacuum < 0.0 {
            return Err(CrystanError::InvalidArgument(format!(
                "vacuum must not be negative, got {}",
                self.vacuum
            )));
        }
        if self.duplicate_tolerance.is_nan() || self.duplicate_tolerance <= 0.0 {
            return Err(CrystanError::InvalidArgument(
                "duplicate tolerance must be positive".to_string(),
            ));
        }
        if self.max_search_range < 2 {
            return Err(CrystanError::InvalidArgument(
                "basis search range must be at least 2".to_string(),
            ));
        }
        Ok(())
    }
}

/// 板层模型
#[derive(Debug, Clone, Serialize)]
pub struct SlabModel {
    pub structure: Crystal,
    /// 请求的 Miller 指数
    pub miller: [i32; 3],
    pub thickness: usize,
    pub vacuum: f64,
    /// 单层沿法向的高度（Å）
    pub layer_height: f64,
    /// 约化 (hkl) 的面间距（Å）
    pub interplanar_spacing: f64,
    /// 行为 u, v, w 的整数变换
    pub transform: [[i32; 3]; 3],
    /// 去重删除的原子数
    pub removed_duplicates: usize,
    /// 删除的原子中与保留原子物种不同的个数
    pub conflicting_duplicates: usize,
}

#[derive(Debug, Clone, Default)]
pub struct SlabBuilder {
    settings: SlabSettings,
    cancel: CancelToken,
}

impl SlabBuilder {
    pub fn new(settings: SlabSettings) -> Self {
        Self {
            settings,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// 构建板层；输入结构不被修改
    pub fn build(&self, crystal: &Crystal) -> Result<SlabModel> {
        let s = &self.settings;
        s.validate()?;
        crystal.validate()?;
        let cell = CellGeometry::new(&crystal.lattice)?;

        let hkl = reduce_miller(s.miller)?;
        if hkl != s.miller {
            log::info!("Miller indices {:?} reduced to {:?}", s.miller, hkl);
        }
        let basis = find_surface_basis(&cell, hkl, s.max_search_range, &self.cancel)?;

        let to_vec = |x: [i32; 3]| Vector3::new(x[0] as f64, x[1] as f64, x[2] as f64);
        let transform = Matrix3::from_columns(&[to_vec(basis.u), to_vec(basis.v), to_vec(basis.w)]);
        let transform_inv = transform
            .try_inverse()
            .ok_or(CrystanError::DegenerateLattice { volume: 0.0 })?;

        // 单层晶胞中的原子（分数坐标相对 u, v, w）
        let layer_atoms = remap_atoms(crystal, &transform, &transform_inv, basis.determinant());

        let a_s = cell.to_cartesian(&to_vec(basis.u));
        let b_s = cell.to_cartesian(&to_vec(basis.v));
        let w_cart = cell.to_cartesian(&to_vec(basis.w));
        let mut normal = a_s.cross(&b_s).normalize();
        if w_cart.dot(&normal) < 0.0 {
            normal = -normal;
        }
        let layer_height = w_cart.dot(&normal);
        let interplanar_spacing =
            2.0 * std::f64::consts::PI / (cell.reciprocal() * to_vec(hkl)).norm();

        let c_length = s.thickness as f64 * layer_height + s.vacuum;
        let slab_basis = Matrix3::from_columns(&[a_s, b_s, normal * c_length]);
        let slab_cell = CellGeometry::from_basis(slab_basis)?;

        let mut atoms = Vec::with_capacity(layer_atoms.len() * s.thickness);
        for layer in 0..s.thickness {
            for (element, f) in &layer_atoms {
                let cart = a_s * f.x + b_s * f.y + w_cart * (f.z + layer as f64);
                let mut frac = slab_cell.to_fractional(&cart);
                frac.x -= frac.x.floor();
                frac.y -= frac.y.floor();
                atoms.push(Atom::new(element.clone(), snap(frac).into()));
            }
        }

        let (atoms, removed, conflicting) = deduplicate(atoms, &slab_cell, s.duplicate_tolerance);
        if removed > 0 {
            log::warn!(
                "slab: removed {} duplicate atoms ({} with a different species)",
                removed,
                conflicting
            );
        }

        let [h, k, l] = s.miller;
        let structure = Crystal::new(
            format!("{}_slab_{}{}{}", crystal.name, h, k, l),
            lattice_from_basis(&slab_basis),
            atoms,
        );
        log::info!(
            "slab ({} {} {}): {} atoms, {} layers of {:.4} Å, c = {:.4} Å",
            h,
            k,
            l,
            structure.atoms.len(),
            s.thickness,
            layer_height,
            c_length
        );

        Ok(SlabModel {
            structure,
            miller: s.miller,
            thickness: s.thickness,
            vacuum: s.vacuum,
            layer_height,
            interplanar_spacing,
            transform: basis.rows(),
            removed_duplicates: removed,
            conflicting_duplicates: conflicting,
        })
    }
}

/// 把接近 1 的分量归零
fn snap(f: Vector3<f64>) -> Vector3<f64> {
    f.map(|x| if (1.0 - x).abs() < FRAC_EPS { 0.0 } else { x })
}

/// f' = T⁻¹ f；|det| > 1 时新晶胞包含多个原胞，枚举所有落入 [0,1)³ 的镜像
fn remap_atoms(
    crystal: &Crystal,
    transform: &Matrix3<f64>,
    transform_inv: &Matrix3<f64>,
    det: i64,
) -> Vec<(String, Vector3<f64>)> {
    if det.abs() == 1 {
        return crystal
            .atoms
            .iter()
            .map(|atom| {
                let f = transform_inv * Vector3::from(atom.position);
                (atom.element.clone(), wrap_fractional(&f))
            })
            .collect();
    }

    // 新晶胞在原分数坐标中的包围盒
    let mut lo = [0i32; 3];
    let mut hi = [0i32; 3];
    for axis in 0..3 {
        let row = transform.row(axis);
        let neg: f64 = row.iter().filter(|&&x| x < 0.0).sum();
        let pos: f64 = row.iter().filter(|&&x| x > 0.0).sum();
        lo[axis] = neg.floor() as i32 - 1;
        hi[axis] = pos.ceil() as i32 + 1;
    }

    let mut out = Vec::new();
    for atom in &crystal.atoms {
        let base = wrap_fractional(&Vector3::from(atom.position));
        for i in lo[0]..=hi[0] {
            for j in lo[1]..=hi[1] {
                for k in lo[2]..=hi[2] {
                    let f = snap(transform_inv * (base + Vector3::new(i as f64, j as f64, k as f64)));
                    if f.iter().all(|&x| x > -FRAC_EPS && x < 1.0 - FRAC_EPS) {
                        out.push((atom.element.clone(), f.map(|x| x.max(0.0))));
                    }
                }
            }
        }
    }
    out
}

/// 保留先出现者；返回 (原子, 删除数, 物种冲突数)
fn deduplicate(atoms: Vec<Atom>, cell: &CellGeometry, tolerance: f64) -> (Vec<Atom>, usize, usize) {
    let mut kept: Vec<Atom> = Vec::with_capacity(atoms.len());
    let mut removed = 0;
    let mut conflicting = 0;

    for atom in atoms {
        let p = Vector3::from(atom.position);
        let duplicate_of = kept
            .iter()
            .find(|k| cell.minimum_image_distance(&Vector3::from(k.position), &p) < tolerance);
        match duplicate_of {
            Some(k) => {
                removed += 1;
                if k.element != atom.element {
                    conflicting += 1;
                }
            }
            None => kept.push(atom),
        }
    }
    (kept, removed, conflicting)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Lattice;

    fn lone_cubic(a: f64) -> Crystal {
        Crystal::new("X", Lattice::cubic(a), vec![Atom::new("X", [0.0; 3])])
    }

    #[test]
    fn test_cubic_001_slab_dimensions() {
        let crystal = lone_cubic(4.0);
        let slab = SlabBuilder::new(SlabSettings::new([0, 0, 1], 3, 10.0))
            .build(&crystal)
            .unwrap();

        let lengths = slab.structure.lattice.lengths();
        assert!((lengths[0] - 4.0).abs() < 1e-9);
        assert!((lengths[1] - 4.0).abs() < 1e-9);
        assert!((lengths[2] - 22.0).abs() < 1e-9);
        assert_eq!(slab.structure.atoms.len(), 3);
        assert!((slab.layer_height - 4.0).abs() < 1e-9);
        assert_eq!(slab.removed_duplicates, 0);

        // 原子从底部依次排列，最高一层下面是真空
        let mut z: Vec<f64> = slab.structure.atoms.iter().map(|a| a.position[2]).collect();
        z.sort_by(f64::total_cmp);
        assert!((z[0] - 0.0).abs() < 1e-9);
        assert!((z[2] - 8.0 / 22.0).abs() < 1e-9);

        // 输入结构不变
        assert_eq!(crystal, lone_cubic(4.0));
    }

    #[test]
    fn test_fcc_conventional_001_layers() {
        let crystal = Crystal::new(
            "Cu",
            Lattice::cubic(3.6),
            vec![
                Atom::new("Cu", [0.0, 0.0, 0.0]),
                Atom::new("Cu", [0.5, 0.5, 0.0]),
                Atom::new("Cu", [0.5, 0.0, 0.5]),
                Atom::new("Cu", [0.0, 0.5, 0.5]),
            ],
        );
        let slab = SlabBuilder::new(SlabSettings::new([0, 0, 2], 2, 5.0))
            .build(&crystal)
            .unwrap();
        assert_eq!(slab.miller, [0, 0, 2]);
        assert_eq!(slab.structure.atoms.len(), 8);
        assert!((slab.interplanar_spacing - 3.6).abs() < 1e-9);
        assert!((slab.structure.lattice.lengths()[2] - 12.2).abs() < 1e-9);
    }

    #[test]
    fn test_cubic_111_slab() {
        let slab = SlabBuilder::new(SlabSettings::new([1, 1, 1], 4, 8.0))
            .build(&lone_cubic(3.0))
            .unwrap();
        let d = 3.0 / 3.0_f64.sqrt();
        assert!((slab.layer_height - d).abs() < 1e-9);
        assert!((slab.interplanar_spacing - d).abs() < 1e-9);
        assert_eq!(slab.structure.atoms.len(), 4);

        // c 轴垂直于表面
        let m = slab.structure.lattice.matrix;
        let c = Vector3::from(m[2]);
        assert!(c.dot(&Vector3::from(m[0])).abs() < 1e-9);
        assert!(c.dot(&Vector3::from(m[1])).abs() < 1e-9);
        assert!(slab.structure.lattice.volume() > 0.0);
    }

    #[test]
    fn test_duplicates_removed_and_counted() {
        let crystal = Crystal::new(
            "dup",
            Lattice::cubic(4.0),
            vec![
                Atom::new("A", [0.0, 0.0, 0.0]),
                Atom::new("B", [0.0, 0.0, 1e-7]),
                Atom::new("A", [0.5, 0.5, 0.5]),
                Atom::new("A", [0.5, 0.5, 0.5]),
            ],
        );
        let slab = SlabBuilder::new(SlabSettings::new([0, 0, 1], 2, 5.0))
            .build(&crystal)
            .unwrap();
        assert_eq!(slab.removed_duplicates, 4);
        assert_eq!(slab.conflicting_duplicates, 2);
        assert_eq!(slab.structure.atoms.len(), 4);
        assert!(slab.removed_duplicates <= crystal.atoms.len() * 2);
        assert_eq!(slab.structure.atoms[0].element, "A");
    }

    #[test]
    fn test_invalid_settings() {
        let crystal = lone_cubic(4.0);
        for settings in [
            SlabSettings::new([0, 0, 0], 1, 10.0),
            SlabSettings::new([1, 0, 0], 0, 10.0),
            SlabSettings::new([1, 0, 0], 1, -1.0),
        ] {
            assert!(matches!(
                SlabBuilder::new(settings).build(&crystal),
                Err(CrystanError::InvalidArgument(_))
            ));
        }
    }

    #[test]
    fn test_no_valid_basis() {
        let settings = SlabSettings {
            max_search_range: 2,
            ..SlabSettings::new([17, 0, 1], 1, 5.0)
        };
        assert!(matches!(
            SlabBuilder::new(settings).build(&lone_cubic(4.0)),
            Err(CrystanError::NoValidBasis { .. })
        ));
    }
}
